//! Connectivity probing.
//!
//! Used only to tell "no network" apart from "credentials rejected" when
//! a login fails. The background monitor is advisory: it updates a cached
//! status and never touches the session.

use super::Transport;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Snapshot of connectivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityStatus {
    pub online: bool,
    pub backend_reachable: bool,
}

impl ConnectivityStatus {
    pub const ONLINE: Self = Self {
        online: true,
        backend_reachable: true,
    };
}

/// Synchronous connectivity check.
pub trait ConnectivityProbe: Send + Sync {
    fn current_status(&self) -> ConnectivityStatus;
}

/// Probe for environments without a better signal.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysOnline;

impl ConnectivityProbe for AlwaysOnline {
    fn current_status(&self) -> ConnectivityStatus {
        ConnectivityStatus::ONLINE
    }
}

/// Cached status refreshed by periodic health checks.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    status: RwLock<ConnectivityStatus>,
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self {
            status: RwLock::new(ConnectivityStatus::ONLINE),
        }
    }
}

impl ConnectivityMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, status: ConnectivityStatus) {
        let previous = std::mem::replace(&mut *self.status.write(), status);
        if previous != status {
            tracing::info!(
                online = status.online,
                backend_reachable = status.backend_reachable,
                "Connectivity changed"
            );
        }
    }

    /// Run one health check against `health_path` and record the outcome.
    ///
    /// Any HTTP response, even an error status, proves the network and the
    /// backend are up; only a transport failure marks the backend
    /// unreachable. Telling "offline" apart needs an OS signal, so a
    /// transport failure keeps the previous `online` flag.
    pub async fn check(&self, transport: &dyn Transport, health_path: &str) -> ConnectivityStatus {
        let online = self.current_status().online;
        let status = match transport.get(health_path, None).await {
            Ok(_) => ConnectivityStatus::ONLINE,
            Err(e) if e.status.is_some() => ConnectivityStatus::ONLINE,
            Err(e) => {
                tracing::debug!("Health check failed: {e}");
                ConnectivityStatus {
                    online,
                    backend_reachable: false,
                }
            }
        };
        self.set_status(status);
        status
    }

    /// Poll `health_path` every `interval` until the returned handle is aborted.
    pub fn spawn(
        self: &Arc<Self>,
        transport: Arc<dyn Transport>,
        health_path: String,
        interval: Duration,
    ) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                monitor.check(transport.as_ref(), &health_path).await;
            }
        })
    }
}

impl ConnectivityProbe for ConnectivityMonitor {
    fn current_status(&self) -> ConnectivityStatus {
        *self.status.read()
    }
}
