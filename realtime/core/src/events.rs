//! Assistant Stream Events
//!
//! Typed events decoded from the AI assistant's server-sent-event stream.
//! The wire carries one JSON object per `data:` line, discriminated by a
//! `type` field; [`StreamEvent`] models that union so dispatch is exhaustive
//! at compile time rather than string-matched ad hoc.
//!
//! # Stream Contract
//!
//! - Zero or more intermediate events (`text`, `response.function_call`,
//!   `tool_result`).
//! - Exactly one terminal event per stream: `response.completed` or `error`.
//! - After a terminal event no further events are emitted.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One decoded event from the assistant stream
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    /// Partial assistant text
    #[serde(rename = "text")]
    Text {
        /// The text fragment
        content: String,
    },

    /// The assistant invoked a tool
    #[serde(rename = "response.function_call")]
    ToolCall {
        /// Tool name
        name: String,
        /// Tool arguments as the backend emitted them (object or encoded string)
        #[serde(default)]
        arguments: Value,
        /// Correlation id linking the call to its result
        #[serde(default)]
        call_id: Option<String>,
    },

    /// A tool invocation finished
    #[serde(rename = "tool_result")]
    ToolResult {
        /// Tool name
        name: String,
        /// Tool output payload
        #[serde(default)]
        output: Value,
        /// Correlation id linking the result to its call
        #[serde(default)]
        call_id: Option<String>,
    },

    /// The stream finished successfully
    #[serde(rename = "response.completed")]
    Completed,

    /// The stream failed; no further events follow
    #[serde(rename = "error")]
    Error {
        /// Human-readable failure description
        message: String,
    },
}

impl StreamEvent {
    /// Returns true if this event terminates the stream
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error { .. })
    }
}
