//! API Traits and Request Types
//!
//! Trait definitions for the two request/response seams the realtime layer
//! depends on. Implementations handle the specific backend; tests inject
//! scripted fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::jobs::{GenerationJob, JobId};
use crate::messages::{ChatMessage, ConversationId};

/// Errors from request/response API calls
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network or protocol failure before a response was produced
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success status
    ///
    /// `message` is the server's `error` field when one was present, else a
    /// synthesized `Request failed: <status>` string.
    #[error("{message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Human-readable failure description
        message: String,
    },

    /// The response body did not match the expected shape
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Request body for the assistant SSE endpoint
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssistantRequest {
    /// Family (household) the assistant is working for
    pub family_id: i64,
    /// Family segment discriminator used by the backend
    pub family_type: String,
    /// The user's message to the assistant
    pub message: String,
}

/// Request body for starting a generation job
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Family (household) the plan is generated for
    pub family_id: i64,
    /// Family segment discriminator used by the backend
    pub family_type: String,
    /// Free-form generation instructions, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// Access to the asynchronous generation-job resource
#[async_trait]
pub trait JobApi: Send + Sync {
    /// Start a generation job (`POST /generate`)
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or a non-success status.
    async fn start_generation(&self, request: &GenerationRequest) -> Result<JobId, ApiError>;

    /// Fetch a job snapshot (`GET /generation-jobs/{id}`)
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or a non-success status.
    async fn fetch_job(&self, id: &JobId) -> Result<GenerationJob, ApiError>;
}

/// Request/response fallback path for chat
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Send a message directly, bypassing the duplex channel
    ///
    /// Returns the server-confirmed message. The idempotency key lets the
    /// backend deduplicate a send that raced with a channel delivery.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or a non-success status.
    async fn send_message(
        &self,
        conversation_id: &ConversationId,
        content: &str,
        client_key: &str,
    ) -> Result<ChatMessage, ApiError>;

    /// Mark the conversation read for the current user
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or a non-success status.
    async fn mark_read(&self, conversation_id: &ConversationId) -> Result<(), ApiError>;
}
