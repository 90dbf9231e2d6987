//! Generation Job Polling
//!
//! Meal-plan generation runs server-side as an asynchronous job. The client
//! starts a job, then drives a bounded polling loop against the job resource
//! until a terminal status or the attempt budget runs out.
//!
//! # Scheduling
//!
//! The loop is sequential, not fixed-rate: each tick fully awaits the status
//! fetch before sleeping the interval. When fetch latency exceeds the
//! interval the loop simply slows down instead of stacking requests.
//!
//! # Failure Semantics
//!
//! A transport error during any fetch rejects the whole run immediately; the
//! attempt counter only bounds non-terminal statuses. Cancellation through
//! [`PollerHandle`] rejects with [`PollError::Cancelled`], which is distinct
//! from both timeout and server-reported failure.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Notify;

use crate::api::traits::{ApiError, JobApi};

/// Unique identifier for a generation job
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-reported status of a generation job
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Queued, not yet picked up
    Pending,
    /// A worker is generating
    Processing,
    /// Finished; `result_payload` is populated
    Completed,
    /// Finished unsuccessfully; `error_message` describes why
    Failed,
}

impl JobStatus {
    /// Whether this status ends the polling loop
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Snapshot of a generation job
///
/// Created and mutated server-side only; the client reads snapshots.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationJob {
    /// Job identifier
    #[serde(default)]
    pub id: JobId,
    /// Current status
    pub status: JobStatus,
    /// Failure description when `status == failed`
    #[serde(default)]
    pub error_message: Option<String>,
    /// Generation output when `status == completed`
    #[serde(default)]
    pub result_payload: Option<serde_json::Value>,
}

/// Errors from a polling run
#[derive(Debug, Error)]
pub enum PollError {
    /// The server reported the job as failed
    #[error("{0}")]
    Failed(String),

    /// The attempt budget ran out before a terminal status
    #[error("generation timed out after {attempts} status checks")]
    TimedOut {
        /// Attempts consumed
        attempts: u32,
    },

    /// The run was cancelled through its [`PollerHandle`]
    #[error("polling cancelled")]
    Cancelled,

    /// A status fetch failed
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Configuration for the polling loop
#[derive(Clone, Debug)]
pub struct PollerConfig {
    /// Delay between status fetches (default: 2 seconds)
    pub interval: Duration,
    /// Status fetches allowed before timing out (default: 30)
    pub max_attempts: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
            max_attempts: 30,
        }
    }
}

impl PollerConfig {
    /// Create a config with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the poll interval
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the attempt budget
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Create a config suitable for testing (short interval, small budget)
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            interval: Duration::from_millis(50),
            max_attempts: 3,
        }
    }
}

/// Cancellation handle for a polling run
///
/// Cloneable; `cancel()` takes effect before the next fetch and interrupts
/// an in-flight interval sleep.
#[derive(Clone, Debug, Default)]
pub struct PollerHandle {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl PollerHandle {
    /// Create a fresh handle
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the associated run
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Whether cancellation was requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Drives a generation job to completion
pub struct GenerationJobPoller {
    api: Arc<dyn JobApi>,
    config: PollerConfig,
}

impl GenerationJobPoller {
    /// Create a poller over the given API with the given config
    #[must_use]
    pub fn new(api: Arc<dyn JobApi>, config: PollerConfig) -> Self {
        Self { api, config }
    }

    /// Poll `job_id` until a terminal status or timeout
    ///
    /// `on_progress` is invoked with every snapshot, including the terminal
    /// one.
    ///
    /// # Errors
    ///
    /// - [`PollError::Failed`] when the server reports the job failed
    /// - [`PollError::TimedOut`] when the attempt budget runs out
    /// - [`PollError::Api`] when any status fetch fails
    pub async fn run<F>(&self, job_id: &JobId, on_progress: F) -> Result<GenerationJob, PollError>
    where
        F: FnMut(&GenerationJob),
    {
        self.run_with_handle(job_id, &PollerHandle::new(), on_progress)
            .await
    }

    /// Poll with an external cancellation handle
    ///
    /// # Errors
    ///
    /// As [`run`](Self::run), plus [`PollError::Cancelled`] when the handle
    /// is cancelled.
    pub async fn run_with_handle<F>(
        &self,
        job_id: &JobId,
        handle: &PollerHandle,
        mut on_progress: F,
    ) -> Result<GenerationJob, PollError>
    where
        F: FnMut(&GenerationJob),
    {
        let mut attempts: u32 = 0;

        loop {
            if handle.is_cancelled() {
                tracing::debug!(job_id = %job_id, "Polling cancelled");
                return Err(PollError::Cancelled);
            }

            let job = self.api.fetch_job(job_id).await?;
            on_progress(&job);

            match job.status {
                JobStatus::Completed => {
                    tracing::debug!(job_id = %job_id, attempts = attempts + 1, "Generation completed");
                    return Ok(job);
                }
                JobStatus::Failed => {
                    let message = job
                        .error_message
                        .clone()
                        .unwrap_or_else(|| "Generation failed".to_string());
                    tracing::warn!(job_id = %job_id, error = %message, "Generation failed");
                    return Err(PollError::Failed(message));
                }
                JobStatus::Pending | JobStatus::Processing => {}
            }

            attempts += 1;
            if attempts >= self.config.max_attempts {
                tracing::warn!(job_id = %job_id, attempts, "Generation polling timed out");
                return Err(PollError::TimedOut { attempts });
            }

            tokio::select! {
                () = tokio::time::sleep(self.config.interval) => {}
                () = handle.notify.notified() => {
                    tracing::debug!(job_id = %job_id, "Polling cancelled during interval");
                    return Err(PollError::Cancelled);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::api::traits::GenerationRequest;

    struct ScriptedJobApi {
        snapshots: Mutex<VecDeque<Result<GenerationJob, ApiError>>>,
    }

    impl ScriptedJobApi {
        fn new(snapshots: Vec<Result<GenerationJob, ApiError>>) -> Arc<Self> {
            Arc::new(Self {
                snapshots: Mutex::new(snapshots.into()),
            })
        }
    }

    #[async_trait]
    impl JobApi for ScriptedJobApi {
        async fn start_generation(&self, _request: &GenerationRequest) -> Result<JobId, ApiError> {
            Ok(JobId("job_1".to_string()))
        }

        async fn fetch_job(&self, id: &JobId) -> Result<GenerationJob, ApiError> {
            self.snapshots
                .lock()
                .pop_front()
                .unwrap_or_else(|| panic!("unexpected fetch for {id}"))
        }
    }

    fn job(status: JobStatus) -> GenerationJob {
        GenerationJob {
            id: JobId("job_1".to_string()),
            status,
            error_message: None,
            result_payload: None,
        }
    }

    #[tokio::test]
    async fn test_resolves_on_completed() {
        let api = ScriptedJobApi::new(vec![
            Ok(job(JobStatus::Pending)),
            Ok(job(JobStatus::Processing)),
            Ok(job(JobStatus::Completed)),
        ]);
        let poller = GenerationJobPoller::new(api, PollerConfig::for_testing());

        let mut progress = 0;
        let result = poller
            .run(&JobId("job_1".to_string()), |_| progress += 1)
            .await
            .unwrap();

        assert_eq!(result.status, JobStatus::Completed);
        assert_eq!(progress, 3);
    }

    #[tokio::test]
    async fn test_rejects_with_server_failure_message() {
        let mut failed = job(JobStatus::Failed);
        failed.error_message = Some("no recipes match the dietary profile".to_string());
        let api = ScriptedJobApi::new(vec![Ok(failed)]);
        let poller = GenerationJobPoller::new(api, PollerConfig::for_testing());

        let err = poller
            .run(&JobId("job_1".to_string()), |_| {})
            .await
            .unwrap_err();
        match err {
            PollError::Failed(message) => {
                assert_eq!(message, "no recipes match the dietary profile");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generic_failure_message_when_server_omits_one() {
        let api = ScriptedJobApi::new(vec![Ok(job(JobStatus::Failed))]);
        let poller = GenerationJobPoller::new(api, PollerConfig::for_testing());

        let err = poller
            .run(&JobId("job_1".to_string()), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, PollError::Failed(m) if m == "Generation failed"));
    }

    #[tokio::test]
    async fn test_times_out_after_attempt_budget() {
        let api = ScriptedJobApi::new(vec![
            Ok(job(JobStatus::Pending)),
            Ok(job(JobStatus::Pending)),
            Ok(job(JobStatus::Pending)),
        ]);
        let poller = GenerationJobPoller::new(api, PollerConfig::for_testing());

        let mut progress = 0;
        let err = poller
            .run(&JobId("job_1".to_string()), |_| progress += 1)
            .await
            .unwrap_err();

        assert!(matches!(err, PollError::TimedOut { attempts: 3 }));
        assert_eq!(progress, 3);
    }

    #[tokio::test]
    async fn test_transport_error_rejects_immediately() {
        let api = ScriptedJobApi::new(vec![
            Ok(job(JobStatus::Pending)),
            Err(ApiError::Status {
                status: 502,
                message: "Request failed: 502".to_string(),
            }),
        ]);
        let poller = GenerationJobPoller::new(api, PollerConfig::for_testing());

        let err = poller
            .run(&JobId("job_1".to_string()), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, PollError::Api(ApiError::Status { status: 502, .. })));
    }

    #[tokio::test]
    async fn test_cancel_before_fetch() {
        let api = ScriptedJobApi::new(vec![Ok(job(JobStatus::Pending))]);
        let poller = GenerationJobPoller::new(api, PollerConfig::for_testing());

        let handle = PollerHandle::new();
        handle.cancel();
        let err = poller
            .run_with_handle(&JobId("job_1".to_string()), &handle, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, PollError::Cancelled));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_interval_sleep() {
        let api = ScriptedJobApi::new(vec![Ok(job(JobStatus::Pending))]);
        let config = PollerConfig::new()
            .with_interval(Duration::from_secs(60))
            .with_max_attempts(5);
        let poller = GenerationJobPoller::new(api, config);

        let handle = PollerHandle::new();
        let canceller = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let start = std::time::Instant::now();
        let err = poller
            .run_with_handle(&JobId("job_1".to_string()), &handle, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, PollError::Cancelled));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_status_terminality() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }

    #[test]
    fn test_job_decodes_with_missing_optionals() {
        let job: GenerationJob = serde_json::from_str(r#"{"status":"processing"}"#).unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert!(job.error_message.is_none());
        assert!(job.result_payload.is_none());
    }
}
