//! Chat Channel Traits
//!
//! Core trait and wire frames for the duplex chat channel. The session is
//! written against [`ChatChannel`]; implementations supply the mechanism
//! (in-process pair, WebSocket).

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::messages::{ChatMessage, ConversationId, UserId};

/// Errors that can occur during channel operations
#[derive(Debug)]
pub enum ChannelError {
    /// Connection to the backend failed
    ConnectionFailed(String),
    /// Connection was closed
    ConnectionClosed,
    /// Failed to send a frame
    SendFailed(String),
    /// Failed to receive a frame
    ReceiveFailed(String),
    /// Frame serialization/deserialization error
    Serialization(String),
    /// Channel not in expected state
    InvalidState(String),
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed(msg) => write!(f, "Connection failed: {msg}"),
            Self::ConnectionClosed => write!(f, "Connection closed"),
            Self::SendFailed(msg) => write!(f, "Send failed: {msg}"),
            Self::ReceiveFailed(msg) => write!(f, "Receive failed: {msg}"),
            Self::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            Self::InvalidState(msg) => write!(f, "Invalid state: {msg}"),
        }
    }
}

impl std::error::Error for ChannelError {}

/// One frame on the duplex chat channel
///
/// JSON-encoded on the wire, discriminated by `type`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelFrame {
    /// A chat message (either direction)
    Message {
        /// The message payload, including the sender's idempotency key
        message: ChatMessage,
    },

    /// Typing presence relay
    Typing {
        /// Conversation the report belongs to
        conversation_id: ConversationId,
        /// Who is (or stopped) typing
        user_id: UserId,
        /// Current typing state
        is_typing: bool,
    },

    /// The named user read the conversation
    Read {
        /// Conversation that was read
        conversation_id: ConversationId,
        /// Who read it
        user_id: UserId,
    },
}

/// Transport trait for the duplex chat channel
///
/// `recv` takes `&self`: implementations serialize concurrent receivers
/// internally, and the session owns the single receive loop.
#[async_trait]
pub trait ChatChannel: Send + Sync {
    /// Connect to the backend
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::ConnectionFailed`] when the channel cannot be
    /// established.
    async fn connect(&self) -> Result<(), ChannelError>;

    /// Gracefully close the connection
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError`] when teardown fails; the channel is still
    /// considered closed afterwards.
    async fn disconnect(&self) -> Result<(), ChannelError>;

    /// Send a frame
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::InvalidState`] when not connected and
    /// [`ChannelError::SendFailed`] when delivery fails.
    async fn send(&self, frame: ChannelFrame) -> Result<(), ChannelError>;

    /// Receive the next frame (blocks until one is available)
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::ConnectionClosed`] when the peer is gone.
    async fn recv(&self) -> Result<ChannelFrame, ChannelError>;

    /// Check if currently connected
    fn is_connected(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::messages::MessageId;

    #[test]
    fn test_channel_error_display() {
        let err = ChannelError::ConnectionFailed("refused".to_string());
        assert!(err.to_string().contains("Connection failed"));
        assert_eq!(ChannelError::ConnectionClosed.to_string(), "Connection closed");
    }

    #[test]
    fn test_frame_tagging() {
        let frame = ChannelFrame::Typing {
            conversation_id: ConversationId("conv_1".to_string()),
            user_id: UserId("user_1".to_string()),
            is_typing: true,
        };
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains(r#""type":"typing""#));

        let back: ChannelFrame = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, ChannelFrame::Typing { is_typing: true, .. }));
    }

    #[test]
    fn test_message_frame_carries_client_key() {
        let frame = ChannelFrame::Message {
            message: ChatMessage {
                id: MessageId("msg_1".to_string()),
                conversation_id: ConversationId("conv_1".to_string()),
                sender_id: UserId("user_1".to_string()),
                content: "hello".to_string(),
                created_at: Utc::now(),
                read_at: None,
                is_from_current_user: true,
                pending: true,
                client_key: Some("key_1".to_string()),
            },
        };
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains(r#""client_key":"key_1""#));
    }
}
