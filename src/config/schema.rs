use serde::{Deserialize, Serialize};

/// Default idle timeout: 30 minutes.
const DEFAULT_SESSION_IDLE_TIMEOUT_SECS: u64 = 30 * 60;

/// Default refresh lead time: 5 minutes before expiry.
const DEFAULT_REFRESH_SKEW_SECS: u64 = 5 * 60;

/// Default login attempt budget per window.
const DEFAULT_MAX_LOGIN_ATTEMPTS: u32 = 5;

/// Default login attempt window: 15 minutes.
const DEFAULT_LOGIN_ATTEMPT_WINDOW_MS: u64 = 15 * 60 * 1000;

/// Client-side auth configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Base URL of the booking portal API (e.g. `https://portal.example/api`).
    pub api_base_url: String,
    /// Idle time after which a session is considered expired.
    pub session_idle_timeout_secs: u64,
    /// Lead time before token expiry at which the scheduled refresh fires.
    pub refresh_skew_secs: u64,
    /// Maximum failed logins allowed inside the attempt window.
    pub max_login_attempts: u32,
    /// Trailing window over which login attempts are counted.
    pub login_attempt_window_ms: u64,
    /// Per-request timeout for the HTTP transport.
    pub request_timeout_secs: u64,
    /// Prefix for every persisted storage key.
    pub storage_namespace: String,
    /// Poll interval of the background connectivity monitor.
    pub connectivity_probe_interval_secs: u64,
    /// Path polled by the connectivity monitor.
    pub health_path: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080/api".into(),
            session_idle_timeout_secs: DEFAULT_SESSION_IDLE_TIMEOUT_SECS,
            refresh_skew_secs: DEFAULT_REFRESH_SKEW_SECS,
            max_login_attempts: DEFAULT_MAX_LOGIN_ATTEMPTS,
            login_attempt_window_ms: DEFAULT_LOGIN_ATTEMPT_WINDOW_MS,
            request_timeout_secs: 30,
            storage_namespace: "portal".into(),
            connectivity_probe_interval_secs: 30,
            health_path: "/health".into(),
        }
    }
}
