//! Proactive token refresh scheduling.
//!
//! One optional armed timer per session. [`RefreshScheduler::schedule`]
//! always cancels the previous timer before arming a new one, so at most
//! one refresh is ever pending from the timer path.
//!
//! When a timer fires it first detaches itself from the slot. The refresh
//! it triggers will normally call `schedule` again for the new token, and
//! that must not abort the task that is still running the refresh.

use super::token::decode_claims;
use crate::clock::Clock;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

struct ArmedTimer {
    id: u64,
    handle: JoinHandle<()>,
}

/// Cancellable one-shot refresh timer.
pub struct RefreshScheduler {
    clock: Arc<dyn Clock>,
    skew_ms: i64,
    slot: Arc<Mutex<Option<ArmedTimer>>>,
    next_id: AtomicU64,
}

impl RefreshScheduler {
    pub fn new(clock: Arc<dyn Clock>, skew_secs: u64) -> Self {
        Self {
            clock,
            skew_ms: i64::try_from(skew_secs.saturating_mul(1000)).unwrap_or(i64::MAX),
            slot: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(1),
        }
    }

    /// How long from now the refresh for `token` should fire.
    /// `None` when the token is undecodable or already inside the skew.
    pub fn delay_for(&self, token: &str) -> Option<Duration> {
        let claims = match decode_claims(token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::warn!("Not scheduling refresh, token did not decode: {e}");
                return None;
            }
        };

        let refresh_in_ms = claims
            .expires_at_ms
            .saturating_sub(self.clock.now_ms())
            .saturating_sub(self.skew_ms);
        if refresh_in_ms <= 0 {
            return None;
        }
        Some(Duration::from_millis(refresh_in_ms as u64))
    }

    /// Arm a one-shot timer that runs `on_fire` shortly before `token`
    /// expires. Any previously armed timer is cancelled first.
    ///
    /// Returns whether a timer was armed. Nothing is armed when the token
    /// is undecodable, already near expiry, or no tokio runtime is running.
    pub fn schedule<F, Fut>(&self, token: &str, on_fire: F) -> bool
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();

        let Some(delay) = self.delay_for(token) else {
            tracing::debug!("Token too close to expiry for a scheduled refresh");
            return false;
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No async runtime, scheduled refresh disabled");
            return false;
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let slot = Arc::clone(&self.slot);
        let deadline = tokio::time::Instant::now() + delay;

        // Hold the slot while spawning so the task cannot observe it
        // before its own handle is stored.
        let mut guard = self.slot.lock();
        let handle = runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            {
                let mut slot = slot.lock();
                if slot.as_ref().is_some_and(|armed| armed.id == id) {
                    slot.take();
                }
            }
            tracing::debug!("Scheduled token refresh firing");
            on_fire().await;
        });
        *guard = Some(ArmedTimer { id, handle });

        tracing::debug!(delay_secs = delay.as_secs(), "Token refresh scheduled");
        true
    }

    /// Cancel the armed timer, if any. Safe to call at any time.
    pub fn cancel(&self) {
        if let Some(armed) = self.slot.lock().take() {
            armed.handle.abort();
            tracing::debug!("Scheduled token refresh cancelled");
        }
    }

    /// Whether a timer is armed and has not fired yet.
    pub fn is_armed(&self) -> bool {
        self.slot
            .lock()
            .as_ref()
            .is_some_and(|armed| !armed.handle.is_finished())
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
