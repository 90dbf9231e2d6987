//! In-Process Chat Channel
//!
//! Direct channel-based frames for embedded mode and tests. The far end
//! receives outbound frames and injects inbound ones, standing in for the
//! chat backend.
//!
//! # Usage
//!
//! ```ignore
//! let (channel, mut outbound, inbound) = InProcessChannel::new_pair();
//!
//! // Give the channel to a RealtimeChatSession; drive the far end:
//! inbound.send(ChannelFrame::Message { .. }).await?;
//! let sent = outbound.recv().await;
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use super::channel::{ChannelFrame, ChatChannel, ChannelError};

/// In-process chat channel using tokio channels
pub struct InProcessChannel {
    /// Outbound frames toward the far end
    outbound_tx: mpsc::Sender<ChannelFrame>,
    /// Inbound frames from the far end
    inbound_rx: Mutex<mpsc::Receiver<ChannelFrame>>,
    /// Connection state
    connected: Arc<AtomicBool>,
}

impl InProcessChannel {
    /// Create a new in-process channel pair
    ///
    /// Returns:
    /// - `InProcessChannel`: give this to the session
    /// - `mpsc::Receiver<ChannelFrame>`: the far end receives outbound frames here
    /// - `mpsc::Sender<ChannelFrame>`: the far end injects inbound frames here
    #[must_use]
    pub fn new_pair() -> (Self, mpsc::Receiver<ChannelFrame>, mpsc::Sender<ChannelFrame>) {
        let (outbound_tx, outbound_rx) = mpsc::channel(100);
        let (inbound_tx, inbound_rx) = mpsc::channel(100);

        let channel = Self {
            outbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
            connected: Arc::new(AtomicBool::new(true)),
        };

        (channel, outbound_rx, inbound_tx)
    }
}

#[async_trait]
impl ChatChannel for InProcessChannel {
    async fn connect(&self) -> Result<(), ChannelError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ChannelError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&self, frame: ChannelFrame) -> Result<(), ChannelError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(ChannelError::InvalidState(
                "Channel not connected".to_string(),
            ));
        }

        self.outbound_tx
            .send(frame)
            .await
            .map_err(|_| ChannelError::SendFailed("Channel closed".to_string()))
    }

    async fn recv(&self) -> Result<ChannelFrame, ChannelError> {
        self.inbound_rx
            .lock()
            .await
            .recv()
            .await
            .ok_or(ChannelError::ConnectionClosed)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
