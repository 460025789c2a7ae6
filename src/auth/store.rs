//! Session Record persistence.
//!
//! Keys (under the configured namespace):
//! - `<ns>.access_token`: bearer token
//! - `<ns>.refresh_token`: refresh credential, optional
//! - `<ns>.user`: JSON-encoded [`UserSnapshot`]
//! - `<ns>.last_activity`: ms since epoch
//!
//! A record is either whole or absent: missing token, missing user, or a
//! user entry that does not parse all read back as "no session".

use super::types::{SessionRecord, UserSnapshot};
use crate::storage::KeyValueStore;
use anyhow::{Context, Result};
use std::sync::Arc;

const ACCESS_TOKEN: &str = "access_token";
const REFRESH_TOKEN: &str = "refresh_token";
const USER: &str = "user";
const LAST_ACTIVITY: &str = "last_activity";

/// Typed view over the key-value store for one session.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn KeyValueStore>,
    namespace: String,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn KeyValueStore>, namespace: &str) -> Self {
        Self {
            storage,
            namespace: namespace.to_string(),
        }
    }

    fn key(&self, field: &str) -> String {
        format!("{}.{}", self.namespace, field)
    }

    // ── Reads ───────────────────────────────────────────────────────

    pub fn access_token(&self) -> Option<String> {
        self.storage
            .get(&self.key(ACCESS_TOKEN))
            .filter(|t| !t.is_empty())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.storage
            .get(&self.key(REFRESH_TOKEN))
            .filter(|t| !t.is_empty())
    }

    /// Stored user, `None` if absent or unparseable.
    pub fn user(&self) -> Option<UserSnapshot> {
        let raw = self.storage.get(&self.key(USER))?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!("Stored user record is unparseable: {e}");
                None
            }
        }
    }

    pub fn last_activity_ms(&self) -> Option<i64> {
        self.storage
            .get(&self.key(LAST_ACTIVITY))
            .and_then(|raw| raw.trim().parse().ok())
    }

    /// The whole record, or `None` if any mandatory part is missing.
    pub fn load(&self) -> Option<SessionRecord> {
        Some(SessionRecord {
            access_token: self.access_token()?,
            user: self.user()?,
            refresh_token: self.refresh_token(),
            last_activity_ms: self.last_activity_ms(),
        })
    }

    /// Whether any session key is present at all, parseable or not.
    pub fn has_any(&self) -> bool {
        [ACCESS_TOKEN, REFRESH_TOKEN, USER, LAST_ACTIVITY]
            .iter()
            .any(|field| self.storage.get(&self.key(field)).is_some())
    }

    // ── Writes ──────────────────────────────────────────────────────

    /// Persist a freshly issued session. A missing refresh token removes
    /// any stale one.
    pub fn save_session(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
        user: &UserSnapshot,
    ) -> Result<()> {
        self.save_user(user)?;
        match refresh_token {
            Some(token) => self.storage.set(&self.key(REFRESH_TOKEN), token)?,
            None => self.storage.remove(&self.key(REFRESH_TOKEN))?,
        }
        // token last: a crash before this leaves the record absent, not partial
        self.storage.set(&self.key(ACCESS_TOKEN), access_token)?;
        Ok(())
    }

    /// Replace token fields in place. The refresh token is only replaced
    /// when the server rotated it.
    pub fn replace_tokens(&self, access_token: &str, refresh_token: Option<&str>) -> Result<()> {
        if let Some(token) = refresh_token {
            self.storage.set(&self.key(REFRESH_TOKEN), token)?;
        }
        self.storage.set(&self.key(ACCESS_TOKEN), access_token)?;
        Ok(())
    }

    pub fn save_user(&self, user: &UserSnapshot) -> Result<()> {
        let raw = serde_json::to_string(user).context("Failed to encode user record")?;
        self.storage.set(&self.key(USER), &raw)
    }

    pub fn set_last_activity_ms(&self, at_ms: i64) -> Result<()> {
        self.storage.set(&self.key(LAST_ACTIVITY), &at_ms.to_string())
    }

    /// Remove every session key. Attempt history is left alone.
    pub fn clear(&self) -> Result<()> {
        for field in [ACCESS_TOKEN, REFRESH_TOKEN, USER, LAST_ACTIVITY] {
            self.storage.remove(&self.key(field))?;
        }
        Ok(())
    }
}
