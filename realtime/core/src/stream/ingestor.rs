//! Stream Ingestor
//!
//! Owns the read loop of one assistant stream: opens the exchange through an
//! [`EventStreamTransport`], feeds chunks to the [`SseFrameDecoder`], and
//! dispatches decoded events to [`StreamHandlers`].
//!
//! # Guarantees
//!
//! - Events dispatch strictly in arrival order within one stream.
//! - `on_complete` fires exactly once for a stream that does not error:
//!   from the explicit terminal event, or once after the body ends without
//!   one.
//! - Cancellation through [`StreamHandle::cancel`] is checked cooperatively
//!   at each read and is never reported through `on_error`.
//! - Malformed frames are dropped silently and never abort the stream.
//!
//! # Single-Flight
//!
//! One ingestor owns at most one live stream. Starting a new stream cancels
//! the previous one; the superseded stream ends silently.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;
use parking_lot::Mutex;
use serde_json::Value;

use crate::auth::TokenSource;
use crate::events::StreamEvent;

use super::decoder::SseFrameDecoder;
use super::policy::ToolResultPolicy;
use super::transport::EventStreamTransport;
use crate::api::traits::AssistantRequest;

/// Caller-supplied event handlers for one stream
///
/// All handlers default to no-ops; set the ones you care about:
///
/// ```ignore
/// let handlers = StreamHandlers::new()
///     .on_text(|content| print!("{content}"))
///     .on_complete(|| println!());
/// ```
pub struct StreamHandlers {
    on_text: Box<dyn FnMut(String) + Send>,
    on_tool_call: Box<dyn FnMut(String, Value, Option<String>) + Send>,
    on_tool_result: Box<dyn FnMut(String, Value, Option<String>) + Send>,
    on_complete: Box<dyn FnMut() + Send>,
    on_error: Box<dyn FnMut(String) + Send>,
}

impl Default for StreamHandlers {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamHandlers {
    /// Create handlers that ignore every event
    #[must_use]
    pub fn new() -> Self {
        Self {
            on_text: Box::new(|_| {}),
            on_tool_call: Box::new(|_, _, _| {}),
            on_tool_result: Box::new(|_, _, _| {}),
            on_complete: Box::new(|| {}),
            on_error: Box::new(|_| {}),
        }
    }

    /// Handle assistant text fragments
    #[must_use]
    pub fn on_text(mut self, f: impl FnMut(String) + Send + 'static) -> Self {
        self.on_text = Box::new(f);
        self
    }

    /// Handle tool invocations (`name`, `arguments`, `call_id`)
    #[must_use]
    pub fn on_tool_call(mut self, f: impl FnMut(String, Value, Option<String>) + Send + 'static) -> Self {
        self.on_tool_call = Box::new(f);
        self
    }

    /// Handle tool results (`name`, `output`, `call_id`)
    ///
    /// Results for tools hidden by the [`ToolResultPolicy`] never reach this
    /// handler.
    #[must_use]
    pub fn on_tool_result(
        mut self,
        f: impl FnMut(String, Value, Option<String>) + Send + 'static,
    ) -> Self {
        self.on_tool_result = Box::new(f);
        self
    }

    /// Handle stream completion (fires exactly once per non-error stream)
    #[must_use]
    pub fn on_complete(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.on_complete = Box::new(f);
        self
    }

    /// Handle terminal failures (server `error` events and transport errors)
    #[must_use]
    pub fn on_error(mut self, f: impl FnMut(String) + Send + 'static) -> Self {
        self.on_error = Box::new(f);
        self
    }
}

/// Handle to one running stream
///
/// Cloneable. `cancel()` stops the read loop at its next suspension point.
#[derive(Clone, Debug, Default)]
pub struct StreamHandle {
    cancelled: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
}

impl StreamHandle {
    /// Create a fresh handle
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the stream
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Whether the read loop has ended
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

/// Consumes one assistant stream per `start` call
pub struct StreamIngestor {
    transport: Arc<dyn EventStreamTransport>,
    tokens: Arc<dyn TokenSource>,
    policy: ToolResultPolicy,
    active: Mutex<Option<StreamHandle>>,
}

impl StreamIngestor {
    /// Create an ingestor with the default tool-result policy
    #[must_use]
    pub fn new(transport: Arc<dyn EventStreamTransport>, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            transport,
            tokens,
            policy: ToolResultPolicy::default(),
            active: Mutex::new(None),
        }
    }

    /// Replace the tool-result policy
    #[must_use]
    pub fn with_policy(mut self, policy: ToolResultPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Start consuming a stream
    ///
    /// Spawns the read loop and returns immediately; results arrive through
    /// the handlers. A previous unfinished stream on this ingestor is
    /// cancelled first. Must be called within a tokio runtime.
    pub fn start(&self, request: AssistantRequest, handlers: StreamHandlers) -> StreamHandle {
        let handle = StreamHandle::new();
        if let Some(previous) = self.active.lock().replace(handle.clone()) {
            if !previous.is_finished() {
                tracing::debug!("Cancelling superseded assistant stream");
                previous.cancel();
            }
        }

        let transport = Arc::clone(&self.transport);
        let tokens = Arc::clone(&self.tokens);
        let policy = self.policy.clone();
        let task_handle = handle.clone();
        tokio::spawn(async move {
            run_stream(transport, tokens, policy, request, handlers, task_handle).await;
        });

        handle
    }
}

/// The read loop of one stream
async fn run_stream(
    transport: Arc<dyn EventStreamTransport>,
    tokens: Arc<dyn TokenSource>,
    policy: ToolResultPolicy,
    request: AssistantRequest,
    mut handlers: StreamHandlers,
    handle: StreamHandle,
) {
    // Best-effort refresh; the request proceeds with whatever token exists
    if let Err(e) = tokens.refresh().await {
        tracing::debug!(error = %e, "Token refresh failed before stream open");
    }
    let token = tokens.token().await;

    let mut stream = match transport.open(&request, token).await {
        Ok(stream) => stream,
        Err(e) => {
            if !handle.is_cancelled() {
                (handlers.on_error)(e.to_string());
            }
            handle.finished.store(true, Ordering::SeqCst);
            return;
        }
    };

    let mut decoder = SseFrameDecoder::new();
    let mut completed = false;
    let mut terminal = false;

    'read: while let Some(chunk) = stream.next().await {
        if handle.is_cancelled() {
            break;
        }

        let bytes = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                (handlers.on_error)(e.to_string());
                terminal = true;
                break;
            }
        };

        decoder.push(&bytes);
        while let Some(payloads) = decoder.next_frame() {
            if payloads.is_empty() {
                tracing::trace!("Dropping frame without data line");
                continue;
            }
            for payload in payloads {
                let event = match serde_json::from_str::<StreamEvent>(&payload) {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::trace!(error = %e, "Dropping malformed frame");
                        continue;
                    }
                };
                match event {
                    StreamEvent::Text { content } => (handlers.on_text)(content),
                    StreamEvent::ToolCall {
                        name,
                        arguments,
                        call_id,
                    } => (handlers.on_tool_call)(name, arguments, call_id),
                    StreamEvent::ToolResult {
                        name,
                        output,
                        call_id,
                    } => {
                        if policy.is_visible(&name) {
                            (handlers.on_tool_result)(name, output, call_id);
                        } else {
                            tracing::trace!(tool = %name, "Suppressing internal tool result");
                        }
                    }
                    StreamEvent::Completed => {
                        if !completed {
                            completed = true;
                            (handlers.on_complete)();
                        }
                        terminal = true;
                        break 'read;
                    }
                    StreamEvent::Error { message } => {
                        (handlers.on_error)(message);
                        terminal = true;
                        break 'read;
                    }
                }
            }
        }
    }

    // Body ended without a terminal event: completion still fires, once
    if !terminal && !completed && !handle.is_cancelled() {
        (handlers.on_complete)();
    }

    handle.finished.store(true, Ordering::SeqCst);
}
