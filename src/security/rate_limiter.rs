//! Sliding-window attempt limiter for auth actions.
//!
//! Attempts are kept per action name (e.g. `"login"`) as a JSON array of
//! millisecond timestamps in the key-value store, so the budget survives
//! restarts. Every read prunes entries older than the window; every write
//! prunes before persisting, bounding storage growth.
//!
//! Unparseable history is treated as empty: the limiter fails open rather
//! than locking a user out because of a corrupt entry.

use crate::clock::Clock;
use crate::storage::KeyValueStore;
use std::sync::Arc;

/// Attempt limiter backed by persistent storage.
pub struct RateLimiter {
    storage: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    namespace: String,
    /// Window used to prune history on write.
    retention_ms: u64,
}

impl RateLimiter {
    /// Create a limiter. `retention_ms` bounds how long recorded attempts
    /// are kept; it should be at least the widest window passed to
    /// [`RateLimiter::is_allowed`].
    pub fn new(
        storage: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        namespace: &str,
        retention_ms: u64,
    ) -> Self {
        Self {
            storage,
            clock,
            namespace: namespace.to_string(),
            retention_ms,
        }
    }

    fn key(&self, action: &str) -> String {
        format!("{}.attempts.{}", self.namespace, action)
    }

    fn load(&self, action: &str) -> Vec<i64> {
        let Some(raw) = self.storage.get(&self.key(action)) else {
            return Vec::new();
        };
        match serde_json::from_str::<Vec<i64>>(&raw) {
            Ok(timestamps) => timestamps,
            Err(e) => {
                tracing::warn!(action, "Discarding unparseable attempt history: {e}");
                Vec::new()
            }
        }
    }

    /// Attempts for `action` that fall inside the trailing window.
    pub fn attempts_in_window(&self, action: &str, window_ms: u64) -> Vec<i64> {
        let window_start = self.clock.now_ms().saturating_sub(window_span(window_ms));
        let mut attempts = self.load(action);
        attempts.retain(|&ts| ts > window_start);
        attempts
    }

    /// Whether another attempt is permitted: true iff fewer than
    /// `max_attempts` attempts fall inside the trailing window.
    pub fn is_allowed(&self, action: &str, max_attempts: u32, window_ms: u64) -> bool {
        let count = self.attempts_in_window(action, window_ms).len();
        u32::try_from(count).unwrap_or(u32::MAX) < max_attempts
    }

    /// Milliseconds until the oldest in-window attempt ages out.
    /// Zero when nothing is recorded.
    pub fn retry_after_ms(&self, action: &str, window_ms: u64) -> u64 {
        let now = self.clock.now_ms();
        self.attempts_in_window(action, window_ms)
            .iter()
            .min()
            .map(|&oldest| {
                let wait = oldest.saturating_add(window_span(window_ms)).saturating_sub(now);
                u64::try_from(wait).unwrap_or(0)
            })
            .unwrap_or(0)
    }

    /// Record an attempt at the current time.
    pub fn record_attempt(&self, action: &str) {
        let now = self.clock.now_ms();
        let mut attempts = self.attempts_in_window(action, self.retention_ms);
        attempts.push(now);

        match serde_json::to_string(&attempts) {
            Ok(raw) => {
                if let Err(e) = self.storage.set(&self.key(action), &raw) {
                    tracing::warn!(action, "Failed to persist attempt history: {e}");
                }
            }
            Err(e) => tracing::warn!(action, "Failed to encode attempt history: {e}"),
        }
    }

    /// Forget every attempt for `action`.
    pub fn clear(&self, action: &str) {
        if let Err(e) = self.storage.remove(&self.key(action)) {
            tracing::warn!(action, "Failed to clear attempt history: {e}");
        }
    }
}

/// Windows wider than `i64::MAX` ms cover all of recorded time.
fn window_span(window_ms: u64) -> i64 {
    i64::try_from(window_ms).unwrap_or(i64::MAX)
}
