//! Typing Presence
//!
//! Two halves of the typing protocol live here:
//!
//! - [`TypingRelay`] debounces the *outbound* side: every local edit aborts
//!   the previously scheduled stopped-typing relay and schedules a new one
//!   for the quiet window after the last keystroke.
//! - [`TypingTable`] tracks the *inbound* side: per-remote-user reports with
//!   an expiry, so a lost stopped-typing frame cannot leave a ghost
//!   indicator.

use std::future::Future;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::messages::{TypingState, UserId};

/// Debounces the outbound stopped-typing relay
///
/// At most one relay task is scheduled at a time; a newer edit supersedes
/// it. `cancel` is synchronous so teardown cannot race a stray relay.
#[derive(Debug, Default)]
pub(crate) struct TypingRelay {
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TypingRelay {
    /// Create a relay with nothing scheduled
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Abort the scheduled stopped-typing relay, if any
    pub(crate) fn cancel(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }

    /// Schedule `stop` to run after `quiet_window`, superseding any earlier
    /// schedule
    pub(crate) fn schedule_stop<F>(&self, quiet_window: Duration, stop: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task = tokio::spawn(async move {
            tokio::time::sleep(quiet_window).await;
            stop.await;
        });
        if let Some(previous) = self.task.lock().replace(task) {
            previous.abort();
        }
    }
}

/// Tracks typing reports from remote users
#[derive(Debug)]
pub struct TypingTable {
    entries: DashMap<UserId, TypingState>,
    quiet_window: Duration,
}

impl TypingTable {
    /// Create a table trusting reports for `quiet_window`
    #[must_use]
    pub fn new(quiet_window: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            quiet_window,
        }
    }

    /// Record an inbound typing report
    pub fn record(&self, user_id: UserId, is_typing: bool) {
        self.entries
            .insert(user_id, TypingState::reported(is_typing, self.quiet_window));
    }

    /// Whether `user_id` should currently be shown as typing
    #[must_use]
    pub fn is_typing(&self, user_id: &UserId) -> bool {
        self.entries
            .get(user_id)
            .is_some_and(|state| state.is_active())
    }

    /// Forget all reports
    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_reports_and_expires() {
        let table = TypingTable::new(Duration::from_millis(20));
        let user = UserId("user_2".to_string());

        assert!(!table.is_typing(&user));
        table.record(user.clone(), true);
        assert!(table.is_typing(&user));

        std::thread::sleep(Duration::from_millis(30));
        assert!(!table.is_typing(&user));
    }

    #[test]
    fn test_table_stop_report_wins() {
        let table = TypingTable::new(Duration::from_secs(3));
        let user = UserId("user_2".to_string());

        table.record(user.clone(), true);
        table.record(user.clone(), false);
        assert!(!table.is_typing(&user));
    }

    #[tokio::test]
    async fn test_relay_supersede_keeps_one_task() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;

        let relay = TypingRelay::new();
        let fired = Arc::new(AtomicU32::new(0));

        for _ in 0..5 {
            let fired = Arc::clone(&fired);
            relay.schedule_stop(Duration::from_millis(20), async move {
                fired.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_relay_cancel_prevents_fire() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;

        let relay = TypingRelay::new();
        let fired = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&fired);
        relay.schedule_stop(Duration::from_millis(20), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        relay.cancel();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
