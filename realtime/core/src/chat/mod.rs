//! Realtime Chat
//!
//! The duplex chat layer: an abstract [`ChatChannel`] transport, the
//! [`RealtimeChatSession`] that owns one conversation's message list, and
//! the typing-presence machinery.
//!
//! # Design Philosophy
//!
//! The session is an explicit per-conversation object carrying injected
//! dependencies (channel, API, token supply lives behind them), with no
//! shared module-level state. Everything the UI needs flows through handler
//! callbacks and cheap snapshots.

pub mod channel;
pub mod in_process;
pub mod session;
pub mod typing;
#[cfg(feature = "websocket")]
pub mod websocket;

pub use channel::{ChannelError, ChannelFrame, ChatChannel};
pub use in_process::InProcessChannel;
pub use session::{ChatError, ChatHandlers, RealtimeChatSession};
pub use typing::TypingTable;

#[cfg(feature = "websocket")]
pub use websocket::WebSocketChannel;
