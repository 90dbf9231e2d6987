//! Assistant Stream Ingestion
//!
//! Consumes the AI assistant's server-sent-event stream and dispatches typed
//! [`StreamEvent`](crate::events::StreamEvent)s to caller-supplied handlers.
//!
//! # Pipeline
//!
//! ```text
//! HTTP response body (byte chunks, arbitrary boundaries)
//!        │
//!   SseFrameDecoder      append-only byte buffer, blank-line framing
//!        │
//!   data: lines          JSON-parsed individually, malformed dropped
//!        │
//!   StreamIngestor       typed dispatch, tool-result policy, exactly-once
//!        │                completion, cooperative cancellation
//!   StreamHandlers
//! ```
//!
//! The decoder buffers raw bytes and only decodes text at complete frame
//! boundaries, so multi-byte characters split across network reads are
//! reassembled correctly.

pub mod decoder;
pub mod ingestor;
pub mod policy;
pub mod transport;

pub use decoder::SseFrameDecoder;
pub use ingestor::{StreamHandle, StreamHandlers, StreamIngestor};
pub use policy::ToolResultPolicy;
pub use transport::{
    EventByteStream, EventStreamTransport, HttpStreamTransport, InProcessStreamTransport,
    StreamError,
};
