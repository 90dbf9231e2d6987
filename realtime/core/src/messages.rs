//! Chat Messages and Session State
//!
//! Core data types for the realtime chat layer. These are the types UI
//! surfaces render and the wire carries. The session owns one list of
//! [`ChatMessage`] per conversation; everything here is plain data with no
//! transport knowledge.
//!
//! # Message Lifecycles
//!
//! A [`ChatMessage`] exists in one of two lifecycles:
//!
//! - *Optimistic*: minted locally at send time with a temporary id and
//!   `pending = true`, so the caller sees it before any network round trip.
//! - *Confirmed*: carries a server-issued id and `pending = false`, either
//!   replacing the optimistic entry or arriving independently over the
//!   channel.
//!
//! The idempotency key in `client_key` is how the two lifecycles are matched
//! up when the server echo arrives.

use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a conversation
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a user (chef or customer)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message identifier
///
/// Server-issued for confirmed messages. Optimistic messages use a
/// locally-generated temporary id until the server copy replaces them.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    /// Prefix used for locally-minted temporary ids
    pub const TEMPORARY_PREFIX: &str = "tmp_";

    /// Generate a new temporary id for an optimistic message
    ///
    /// Uses a random 64-bit value so two rapid sends never collide.
    #[must_use]
    pub fn temporary() -> Self {
        use rand::Rng;
        let bytes: [u8; 8] = rand::thread_rng().gen();
        Self(format!("{}{}", Self::TEMPORARY_PREFIX, hex::encode(bytes)))
    }

    /// Whether this id was minted locally and is awaiting confirmation
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(Self::TEMPORARY_PREFIX)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single chat message as the session and the wire see it
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique message id (temporary while `pending`)
    pub id: MessageId,
    /// Conversation this message belongs to
    pub conversation_id: ConversationId,
    /// Who sent the message
    pub sender_id: UserId,
    /// Message body
    pub content: String,
    /// When the message was created
    pub created_at: DateTime<Utc>,
    /// When the remote party read the message, if they have
    #[serde(default)]
    pub read_at: Option<DateTime<Utc>>,
    /// Whether the local user authored this message
    #[serde(default)]
    pub is_from_current_user: bool,
    /// Whether this is an optimistic entry awaiting server confirmation
    #[serde(default)]
    pub pending: bool,
    /// Client-generated idempotency key carried in the wire payload so the
    /// server echo can be matched back to the optimistic entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_key: Option<String>,
}

impl ChatMessage {
    /// Mint an optimistic message for a local send
    ///
    /// The returned message carries a temporary id, `pending = true`, and the
    /// supplied idempotency key. It is appended to the session list before
    /// any network round trip.
    #[must_use]
    pub fn optimistic(
        conversation_id: ConversationId,
        sender_id: UserId,
        content: impl Into<String>,
        client_key: String,
    ) -> Self {
        Self {
            id: MessageId::temporary(),
            conversation_id,
            sender_id,
            content: content.into(),
            created_at: Utc::now(),
            read_at: None,
            is_from_current_user: true,
            pending: true,
            client_key: Some(client_key),
        }
    }
}

/// Connection state of a chat session
///
/// A session begins and ends in `Disconnected`. Transitions:
/// `Disconnected → Connecting → Connected → {Error → Disconnected}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No channel is open
    Disconnected,
    /// Channel connect is in flight
    Connecting,
    /// Duplex channel is open and usable
    Connected,
    /// The channel failed; `disconnect()` returns to `Disconnected`
    Error,
}

impl ConnectionState {
    /// Human-readable description
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting...",
            Self::Connected => "Connected",
            Self::Error => "Connection error",
        }
    }
}

/// Typing presence for one remote user
///
/// Set by inbound typing frames and read by UI surfaces. The state expires
/// after the quiet window so a dropped "stopped typing" frame cannot leave a
/// ghost indicator.
#[derive(Clone, Copy, Debug)]
pub struct TypingState {
    /// Whether the user reported themselves as typing
    pub is_typing: bool,
    /// When this report stops being trustworthy
    pub expires_at: Instant,
}

impl TypingState {
    /// Record a fresh typing report valid for `quiet_window`
    #[must_use]
    pub fn reported(is_typing: bool, quiet_window: Duration) -> Self {
        Self {
            is_typing,
            expires_at: Instant::now() + quiet_window,
        }
    }

    /// Whether the user should currently be shown as typing
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_typing && Instant::now() < self.expires_at
    }
}
