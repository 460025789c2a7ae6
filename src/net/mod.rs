//! Network collaborator contract.
//!
//! The session layer never sees headers, retries or raw status codes. A
//! [`Transport`] returns either a JSON payload or a [`TransportError`]
//! whose [`StatusClass`] was decided once, here at the boundary.

pub mod connectivity;
pub mod http;

pub use connectivity::{AlwaysOnline, ConnectivityMonitor, ConnectivityProbe, ConnectivityStatus};
pub use http::HttpTransport;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

/// HTTP verb of an [`ApiRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

/// One call against the portal API.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API base, e.g. `/auth/login`.
    pub path: String,
    pub body: Option<JsonValue>,
    /// Bearer token to attach, if the call is authenticated.
    pub bearer: Option<String>,
}

impl ApiRequest {
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            body: None,
            bearer: None,
        }
    }

    pub fn with_body(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_bearer(mut self, token: Option<&str>) -> Self {
        self.bearer = token.map(str::to_string);
        self
    }
}

/// Closed classification of a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// 401
    Unauthorized,
    /// 403
    Forbidden,
    /// Any other 4xx (and unexpected non-success codes).
    ClientError,
    /// 5xx
    ServerError,
    /// No response at all: DNS, connect, TLS, timeout.
    Network,
}

impl StatusClass {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            500..=599 => Self::ServerError,
            _ => Self::ClientError,
        }
    }
}

/// A failed call, already classified.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{class:?} (status {status:?}): {}", .message.as_deref().unwrap_or("no details"))]
pub struct TransportError {
    pub class: StatusClass,
    pub status: Option<u16>,
    /// Server-provided or transport-level detail.
    pub message: Option<String>,
}

impl TransportError {
    pub fn from_status(status: u16, message: Option<String>) -> Self {
        Self {
            class: StatusClass::from_status(status),
            status: Some(status),
            message,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self {
            class: StatusClass::Network,
            status: None,
            message: Some(message.into()),
        }
    }
}

/// Request/response transport for the portal API.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform `request`. Success bodies are JSON (`Null` when empty).
    async fn send(&self, request: ApiRequest) -> Result<JsonValue, TransportError>;

    async fn get(&self, path: &str, bearer: Option<&str>) -> Result<JsonValue, TransportError> {
        self.send(ApiRequest::new(Method::Get, path).with_bearer(bearer))
            .await
    }

    async fn post(
        &self,
        path: &str,
        body: JsonValue,
        bearer: Option<&str>,
    ) -> Result<JsonValue, TransportError> {
        self.send(
            ApiRequest::new(Method::Post, path)
                .with_body(body)
                .with_bearer(bearer),
        )
        .await
    }

    async fn put(
        &self,
        path: &str,
        body: JsonValue,
        bearer: Option<&str>,
    ) -> Result<JsonValue, TransportError> {
        self.send(
            ApiRequest::new(Method::Put, path)
                .with_body(body)
                .with_bearer(bearer),
        )
        .await
    }

    async fn delete(&self, path: &str, bearer: Option<&str>) -> Result<JsonValue, TransportError> {
        self.send(ApiRequest::new(Method::Delete, path).with_bearer(bearer))
            .await
    }
}
