//! reqwest-backed [`Transport`] for the portal REST API.
//!
//! ## Design
//! - JSON in, JSON out; empty success bodies become `Null`
//! - Bearer authentication only when the request carries a token
//! - Error bodies of the form `{"message": "..."}` (or `error`) are
//!   surfaced as [`TransportError::message`]

use super::{ApiRequest, Method, StatusClass, Transport, TransportError};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::time::Duration;

/// HTTP transport for the portal API.
pub struct HttpTransport {
    base_url: String,
    http: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport rooted at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Build the absolute URL for an API path.
    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Pull a human-readable message out of an error body.
fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<JsonValue>(trimmed) {
        Ok(json) => ["message", "error", "detail"]
            .iter()
            .find_map(|key| json.get(key).and_then(|v| v.as_str()))
            .map(str::to_string),
        Err(_) => Some(trimmed.chars().take(200).collect()),
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<JsonValue, TransportError> {
        let url = self.url(&request.path);
        let mut builder = match request.method {
            Method::Get => self.http.get(&url),
            Method::Post => self.http.post(&url),
            Method::Put => self.http.put(&url),
            Method::Delete => self.http.delete(&url),
        };
        if let Some(ref token) = request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await.map_err(|e| {
            tracing::debug!(method = request.method.as_str(), path = %request.path, "Request failed: {e}");
            TransportError::network(e.to_string())
        })?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| TransportError::network(e.to_string()))?;

        if !status.is_success() {
            tracing::debug!(
                method = request.method.as_str(),
                path = %request.path,
                status = status.as_u16(),
                "API returned an error status"
            );
            return Err(TransportError::from_status(status.as_u16(), error_message(&body)));
        }

        if body.trim().is_empty() {
            return Ok(JsonValue::Null);
        }
        serde_json::from_str(&body).map_err(|e| TransportError {
            class: StatusClass::ClientError,
            status: Some(status.as_u16()),
            message: Some(format!("Response is not valid JSON: {e}")),
        })
    }
}
