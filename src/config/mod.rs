//! Configuration loading.
//!
//! `~/.portal-auth/config.toml` is optional; every field has a default and
//! can be overridden through `PORTAL_AUTH_*` environment variables.

pub mod schema;

pub use schema::AuthConfig;

use anyhow::{bail, Context, Result};
use directories::UserDirs;
use std::path::{Path, PathBuf};

/// Environment variable prefix for overrides.
const ENV_PREFIX: &str = "PORTAL_AUTH_";

/// Directory holding the config file and the session database.
pub fn default_config_dir() -> Result<PathBuf> {
    let home = UserDirs::new()
        .map(|u| u.home_dir().to_path_buf())
        .ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?;
    Ok(home.join(".portal-auth"))
}

impl AuthConfig {
    /// Load from `path` (missing file means defaults), then apply
    /// environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            Self::from_toml_str(&contents)?
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document. Absent fields take their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| anyhow::anyhow!("Failed to parse config: {e}"))
    }

    /// Apply `PORTAL_AUTH_*` overrides from `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let var = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(url) = var("API_BASE_URL") {
            self.api_base_url = url;
        }
        if let Some(ns) = var("STORAGE_NAMESPACE") {
            self.storage_namespace = ns;
        }
        if let Some(v) = var("SESSION_IDLE_TIMEOUT_SECS") {
            self.session_idle_timeout_secs = parse_number("SESSION_IDLE_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = var("REFRESH_SKEW_SECS") {
            self.refresh_skew_secs = parse_number("REFRESH_SKEW_SECS", &v)?;
        }
        if let Some(v) = var("MAX_LOGIN_ATTEMPTS") {
            self.max_login_attempts = parse_number("MAX_LOGIN_ATTEMPTS", &v)?;
        }
        if let Some(v) = var("LOGIN_ATTEMPT_WINDOW_MS") {
            self.login_attempt_window_ms = parse_number("LOGIN_ATTEMPT_WINDOW_MS", &v)?;
        }
        if let Some(v) = var("REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_number("REQUEST_TIMEOUT_SECS", &v)?;
        }
        Ok(())
    }

    /// Reject settings that would disable the session guards outright.
    pub fn validate(&self) -> Result<()> {
        if self.api_base_url.trim().is_empty() {
            bail!("api_base_url cannot be empty");
        }
        if self.storage_namespace.trim().is_empty() {
            bail!("storage_namespace cannot be empty");
        }
        if self.session_idle_timeout_secs == 0 {
            bail!("session_idle_timeout_secs must be greater than zero");
        }
        if self.max_login_attempts == 0 {
            bail!("max_login_attempts must be greater than zero");
        }
        if self.login_attempt_window_ms == 0 {
            bail!("login_attempt_window_ms must be greater than zero");
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow::anyhow!("{ENV_PREFIX}{name} must be a number, got '{value}'"))
}
