//! Test doubles shared across module tests.

use crate::net::{ApiRequest, ConnectivityProbe, ConnectivityStatus, Transport, TransportError};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Semaphore;

type Scripted = Result<JsonValue, TransportError>;

/// Transport answering from per-path queues and recording every request.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<HashMap<String, VecDeque<Scripted>>>,
    requests: Mutex<Vec<ApiRequest>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next call to `path`.
    pub fn push(&self, path: &str, response: Scripted) {
        self.responses
            .lock()
            .entry(path.to_string())
            .or_default()
            .push_back(response);
    }

    /// Make every call wait for [`ScriptedTransport::release`].
    pub fn hold(&self) {
        *self.gate.lock() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self, calls: usize) {
        if let Some(gate) = self.gate.lock().as_ref() {
            gate.add_permits(calls);
        }
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.requests.lock().iter().filter(|r| r.path == path).count()
    }

    pub fn total_calls(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<JsonValue, TransportError> {
        let path = request.path.clone();
        self.requests.lock().push(request);

        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        self.responses
            .lock()
            .get_mut(&path)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(TransportError::network(format!("no scripted response for {path}"))))
    }
}

/// Probe returning a settable status.
pub struct FixedProbe {
    status: Mutex<ConnectivityStatus>,
}

impl FixedProbe {
    pub fn new(status: ConnectivityStatus) -> Self {
        Self {
            status: Mutex::new(status),
        }
    }

    pub fn set(&self, status: ConnectivityStatus) {
        *self.status.lock() = status;
    }
}

impl ConnectivityProbe for FixedProbe {
    fn current_status(&self) -> ConnectivityStatus {
        *self.status.lock()
    }
}

/// Let spawned tasks run until they block.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
