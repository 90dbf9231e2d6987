//! HTTP API Implementation
//!
//! `reqwest`-backed implementation of [`JobApi`] and [`ChatApi`] against the
//! platform backend. The bearer token is read just-in-time from the
//! [`TokenSource`] for every request, so out-of-band refreshes take effect
//! without rebuilding the client.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::auth::TokenSource;
use crate::config::RealtimeConfig;
use crate::jobs::{GenerationJob, JobId};
use crate::messages::{ChatMessage, ConversationId};

use super::traits::{ApiError, ChatApi, GenerationRequest, JobApi};

/// Extract a failure message from a non-success response body
///
/// The backend reports failures as `{"error": "..."}`; anything else (or an
/// empty body) falls back to a synthesized status message.
pub(crate) fn error_message_from_body(status: u16, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .and_then(|e| e.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| format!("Request failed: {status}"))
}

/// Production API client over `reqwest`
#[derive(Clone)]
pub struct HttpApi {
    /// Base URL of the platform API
    base_url: String,
    /// Shared HTTP client
    client: reqwest::Client,
    /// Bearer token supply
    tokens: Arc<dyn TokenSource>,
}

impl HttpApi {
    /// Create a client from the resolved configuration
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] if the underlying HTTP client cannot
    /// be constructed.
    pub fn new(config: &RealtimeConfig, tokens: Arc<dyn TokenSource>) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            client,
            tokens,
        })
    }

    /// Build a full endpoint URL
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Attach the current bearer token, if any
    async fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.tokens.token().await {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Map a non-success response into [`ApiError::Status`]
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Status {
            status: status.as_u16(),
            message: error_message_from_body(status.as_u16(), &body),
        })
    }
}

/// Response body of `POST /generate`
#[derive(Debug, Deserialize)]
struct StartGenerationResponse {
    job_id: JobId,
}

#[async_trait]
impl JobApi for HttpApi {
    async fn start_generation(&self, request: &GenerationRequest) -> Result<JobId, ApiError> {
        let response = self
            .authorize(self.client.post(self.url("/generate")).json(request))
            .await
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        let body: StartGenerationResponse = response.json().await?;
        tracing::debug!(job_id = %body.job_id, "Generation job started");
        Ok(body.job_id)
    }

    async fn fetch_job(&self, id: &JobId) -> Result<GenerationJob, ApiError> {
        let response = self
            .authorize(self.client.get(self.url(&format!("/generation-jobs/{id}"))))
            .await
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        let mut job: GenerationJob = response.json().await?;
        if job.id.0.is_empty() {
            job.id = id.clone();
        }
        Ok(job)
    }
}

#[async_trait]
impl ChatApi for HttpApi {
    async fn send_message(
        &self,
        conversation_id: &ConversationId,
        content: &str,
        client_key: &str,
    ) -> Result<ChatMessage, ApiError> {
        let body = serde_json::json!({
            "content": content,
            "client_key": client_key,
        });
        let response = self
            .authorize(
                self.client
                    .post(self.url(&format!("/conversations/{conversation_id}/messages")))
                    .json(&body),
            )
            .await
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        let message: ChatMessage = response.json().await?;
        Ok(message)
    }

    async fn mark_read(&self, conversation_id: &ConversationId) -> Result<(), ApiError> {
        let response = self
            .authorize(
                self.client
                    .post(self.url(&format!("/conversations/{conversation_id}/read"))),
            )
            .await
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticTokenSource;

    fn test_api() -> HttpApi {
        let config = RealtimeConfig::new().with_api_base_url("https://api.example.test/v1/");
        HttpApi::new(&config, Arc::new(StaticTokenSource::new("tok"))).unwrap()
    }

    #[test]
    fn test_url_building() {
        let api = test_api();
        assert_eq!(
            api.url("/generation-jobs/job_1"),
            "https://api.example.test/v1/generation-jobs/job_1"
        );
        assert_eq!(api.url("/generate"), "https://api.example.test/v1/generate");
    }

    #[test]
    fn test_error_message_prefers_error_field() {
        let message = error_message_from_body(422, r#"{"error":"family not found"}"#);
        assert_eq!(message, "family not found");
    }

    #[test]
    fn test_error_message_synthesized_without_error_field() {
        assert_eq!(
            error_message_from_body(500, "internal server error"),
            "Request failed: 500"
        );
        assert_eq!(
            error_message_from_body(502, r#"{"detail":"upstream"}"#),
            "Request failed: 502"
        );
        assert_eq!(error_message_from_body(503, ""), "Request failed: 503");
    }
}
