//! Idle-timeout tracking, independent of token expiry.

use super::store::TokenStore;
use crate::clock::Clock;
use std::sync::Arc;

/// Tracks last confirmed activity for the stored session.
#[derive(Clone)]
pub struct ActivityMonitor {
    store: TokenStore,
    clock: Arc<dyn Clock>,
    idle_timeout_ms: i64,
}

impl ActivityMonitor {
    pub fn new(store: TokenStore, clock: Arc<dyn Clock>, idle_timeout_secs: u64) -> Self {
        Self {
            store,
            clock,
            idle_timeout_ms: i64::try_from(idle_timeout_secs.saturating_mul(1000))
                .unwrap_or(i64::MAX),
        }
    }

    /// Record now as the last activity.
    pub fn touch(&self) -> anyhow::Result<()> {
        self.store.set_last_activity_ms(self.clock.now_ms())
    }

    /// Milliseconds since the last recorded activity.
    pub fn idle_for_ms(&self) -> Option<i64> {
        self.store
            .last_activity_ms()
            .map(|at| self.clock.now_ms().saturating_sub(at))
    }

    /// Expired when nothing was ever recorded or the idle time exceeds the timeout.
    pub fn is_expired(&self) -> bool {
        match self.idle_for_ms() {
            Some(idle) => idle > self.idle_timeout_ms,
            None => true,
        }
    }
}
