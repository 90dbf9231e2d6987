//! WebSocket Chat Channel
//!
//! `tokio-tungstenite` implementation of [`ChatChannel`] for remote
//! backends. Frames are JSON text messages of [`ChannelFrame`]; the bearer
//! token is presented in the connect handshake.
//!
//! Enabled with the `websocket` cargo feature.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::auth::TokenSource;

use super::channel::{ChannelError, ChannelFrame, ChatChannel};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket-backed chat channel
pub struct WebSocketChannel {
    url: String,
    tokens: Arc<dyn TokenSource>,
    writer: Mutex<Option<SplitSink<WsStream, Message>>>,
    reader: Mutex<Option<SplitStream<WsStream>>>,
    connected: AtomicBool,
}

impl WebSocketChannel {
    /// Create a channel against `url` (`ws://` or `wss://`)
    ///
    /// Nothing connects until [`ChatChannel::connect`] is called.
    #[must_use]
    pub fn new(url: impl Into<String>, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            url: url.into(),
            tokens,
            writer: Mutex::new(None),
            reader: Mutex::new(None),
            connected: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ChatChannel for WebSocketChannel {
    async fn connect(&self) -> Result<(), ChannelError> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;

        if let Some(token) = self.tokens.token().await {
            let value = format!("Bearer {token}")
                .parse()
                .map_err(|_| ChannelError::ConnectionFailed("invalid bearer token".to_string()))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (stream, _response) = connect_async(request)
            .await
            .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;
        let (sink, source) = stream.split();

        *self.writer.lock().await = Some(sink);
        *self.reader.lock().await = Some(source);
        self.connected.store(true, Ordering::SeqCst);
        tracing::debug!(url = %self.url, "WebSocket channel connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ChannelError> {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(mut sink) = self.writer.lock().await.take() {
            let _ = sink.send(Message::Close(None)).await;
        }
        *self.reader.lock().await = None;
        Ok(())
    }

    async fn send(&self, frame: ChannelFrame) -> Result<(), ChannelError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(ChannelError::InvalidState(
                "Channel not connected".to_string(),
            ));
        }

        let json =
            serde_json::to_string(&frame).map_err(|e| ChannelError::Serialization(e.to_string()))?;

        let mut writer = self.writer.lock().await;
        let Some(sink) = writer.as_mut() else {
            return Err(ChannelError::InvalidState(
                "Channel not connected".to_string(),
            ));
        };
        sink.send(Message::Text(json))
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))
    }

    async fn recv(&self) -> Result<ChannelFrame, ChannelError> {
        let mut reader = self.reader.lock().await;
        let Some(source) = reader.as_mut() else {
            return Err(ChannelError::InvalidState(
                "Channel not connected".to_string(),
            ));
        };

        loop {
            match source.next().await {
                Some(Ok(Message::Text(json))) => match serde_json::from_str(&json) {
                    Ok(frame) => return Ok(frame),
                    Err(e) => {
                        tracing::trace!(error = %e, "Dropping malformed channel frame");
                    }
                },
                Some(Ok(Message::Close(_))) | None => {
                    self.connected.store(false, Ordering::SeqCst);
                    return Err(ChannelError::ConnectionClosed);
                }
                Some(Ok(_)) => {
                    // Ping/pong/binary frames carry no chat payload
                }
                Some(Err(e)) => {
                    self.connected.store(false, Ordering::SeqCst);
                    return Err(ChannelError::ReceiveFailed(e.to_string()));
                }
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
