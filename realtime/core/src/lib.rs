//! Realtime Core - Client-Side Realtime Communication for platewire
//!
//! This crate provides the realtime communication layer of the platewire
//! chef↔customer marketplace, completely independent of any UI framework.
//! It can drive a mobile surface, a web surface, or run headless for
//! testing/automation.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       UI Surfaces                             │
//! │        (mobile, web, headless: render snapshots,              │
//! │         react to handler callbacks)                           │
//! └───────────────┬──────────────┬───────────────┬───────────────┘
//!                 │              │               │
//! ┌───────────────┼──────────────┼───────────────┼───────────────┐
//! │               │   REALTIME CORE               │               │
//! │  ┌────────────┴───┐  ┌───────┴────────┐  ┌────┴────────────┐  │
//! │  │ StreamIngestor │  │ GenerationJob  │  │ RealtimeChat    │  │
//! │  │ (SSE events)   │  │ Poller         │  │ Session         │  │
//! │  └────────┬───────┘  └───────┬────────┘  └────┬────────────┘  │
//! │           │                  │                │               │
//! │  EventStreamTransport     JobApi          ChatChannel         │
//! │           └──────────────────┴────── TokenSource ─────────────│
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The three components are causally independent; they share only the
//! [`TokenSource`] collaborator and the transport seams, which makes each
//! one testable with in-process fakes.
//!
//! # Key Types
//!
//! - [`StreamIngestor`]: consumes the assistant's SSE stream, dispatching
//!   typed events with exactly-once completion and cooperative cancellation
//! - [`GenerationJobPoller`]: drives a bounded polling loop against the
//!   generation-job resource
//! - [`RealtimeChatSession`]: one conversation's duplex channel with
//!   optimistic echo, typing presence, and an HTTP fallback
//! - [`RealtimeConfig`]: defaults + env + optional XDG TOML file
//!
//! # Module Overview
//!
//! - [`api`]: request/response API traits and the `reqwest` implementation
//! - [`auth`]: bearer-token supply seam
//! - [`chat`]: duplex chat channel, session, typing presence
//! - [`config`]: client configuration loading
//! - [`events`]: typed assistant stream events
//! - [`jobs`]: generation jobs and the polling loop
//! - [`messages`]: chat messages, ids, connection/typing state
//! - [`stream`]: SSE decoding and the stream ingestor
//!
//! # No UI Dependencies
//!
//! This crate has **zero** dependencies on any UI framework. It's pure
//! protocol and state logic that can be embedded anywhere.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod auth;
pub mod chat;
pub mod config;
pub mod events;
pub mod jobs;
pub mod messages;
pub mod stream;

// Re-exports for convenience
pub use api::{ApiError, AssistantRequest, ChatApi, GenerationRequest, HttpApi, JobApi};
pub use auth::{AuthError, StaticTokenSource, TokenSource};
pub use chat::{
    ChannelError, ChannelFrame, ChatChannel, ChatError, ChatHandlers, InProcessChannel,
    RealtimeChatSession, TypingTable,
};
pub use config::{default_config_path, load_config, load_config_from_path, ConfigError, RealtimeConfig, RealtimeToml};
pub use events::StreamEvent;
pub use jobs::{
    GenerationJob, GenerationJobPoller, JobId, JobStatus, PollError, PollerConfig, PollerHandle,
};
pub use messages::{
    ChatMessage, ConnectionState, ConversationId, MessageId, TypingState, UserId,
};
pub use stream::{
    EventByteStream, EventStreamTransport, HttpStreamTransport, InProcessStreamTransport,
    SseFrameDecoder, StreamError, StreamHandle, StreamHandlers, StreamIngestor, ToolResultPolicy,
};

#[cfg(feature = "websocket")]
pub use chat::WebSocketChannel;
