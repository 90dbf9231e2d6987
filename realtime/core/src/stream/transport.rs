//! Stream Transport
//!
//! The seam between the ingestor and the network. [`HttpStreamTransport`]
//! performs the real streamed POST; [`InProcessStreamTransport`] feeds
//! scripted bytes for embedded/test use, mirroring the in-process chat
//! channel.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use futures_util::StreamExt;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::api::http::error_message_from_body;
use crate::api::traits::AssistantRequest;
use crate::config::RealtimeConfig;

/// Errors from the stream transport
#[derive(Debug, Error)]
pub enum StreamError {
    /// The streamed exchange could not be opened
    #[error("failed to open stream: {0}")]
    Connect(String),

    /// The server answered with a non-success status
    ///
    /// `message` is the parsed `error` field of the body when present, else
    /// a synthesized `Request failed: <status>` string.
    #[error("{message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Human-readable failure description
        message: String,
    },

    /// Reading the response body failed mid-stream
    #[error("stream read failed: {0}")]
    Read(String),
}

/// Incremental byte chunks of one streamed exchange
pub type EventByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, StreamError>> + Send>>;

/// Opens one streamed HTTP exchange against the assistant endpoint
#[async_trait]
pub trait EventStreamTransport: Send + Sync {
    /// Open the exchange and return the response body as a chunk stream
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Connect`] when the request cannot be issued and
    /// [`StreamError::Status`] for a non-success response.
    async fn open(
        &self,
        request: &AssistantRequest,
        token: Option<String>,
    ) -> Result<EventByteStream, StreamError>;
}

/// Production transport: streamed POST over `reqwest`
pub struct HttpStreamTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpStreamTransport {
    /// Create a transport against the configured assistant endpoint
    ///
    /// The client uses a connect timeout only; a total request timeout would
    /// cut long-lived streams short.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Connect`] if the HTTP client cannot be built.
    pub fn new(config: &RealtimeConfig) -> Result<Self, StreamError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout)
            .build()
            .map_err(|e| StreamError::Connect(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: config.assistant_stream_url(),
        })
    }
}

#[async_trait]
impl EventStreamTransport for HttpStreamTransport {
    async fn open(
        &self,
        request: &AssistantRequest,
        token: Option<String>,
    ) -> Result<EventByteStream, StreamError> {
        let mut builder = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(request);
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| StreamError::Connect(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StreamError::Status {
                status: status.as_u16(),
                message: error_message_from_body(status.as_u16(), &body),
            });
        }

        let stream = response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|e| StreamError::Read(e.to_string()))
        });
        Ok(Box::pin(stream))
    }
}

/// In-process transport fed through an mpsc channel
///
/// The far end pushes `Ok(bytes)` chunks with arbitrary boundaries and may
/// push an `Err` to simulate a mid-stream transport failure; dropping the
/// sender ends the stream like a closed socket.
pub struct InProcessStreamTransport {
    chunks: Mutex<Option<mpsc::Receiver<Result<Vec<u8>, StreamError>>>>,
}

impl InProcessStreamTransport {
    /// Create a transport and the sender that feeds it
    #[must_use]
    pub fn new_pair() -> (Self, mpsc::Sender<Result<Vec<u8>, StreamError>>) {
        let (tx, rx) = mpsc::channel(64);
        (
            Self {
                chunks: Mutex::new(Some(rx)),
            },
            tx,
        )
    }
}

#[async_trait]
impl EventStreamTransport for InProcessStreamTransport {
    async fn open(
        &self,
        _request: &AssistantRequest,
        _token: Option<String>,
    ) -> Result<EventByteStream, StreamError> {
        let rx = self
            .chunks
            .lock()
            .take()
            .ok_or_else(|| StreamError::Connect("stream already consumed".to_string()))?;
        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}
