use serde::{Deserialize, Serialize};

// ── Principal ────────────────────────────────────────────────────

/// Role of the authenticated principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    Guest,
    Manager,
    Admin,
    #[serde(other)]
    Unknown,
}

/// Cached copy of the authenticated user, readable without the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: UserRole,
}

impl UserSnapshot {
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.email.clone()
        } else {
            full.to_string()
        }
    }
}

// ── Outbound payloads ────────────────────────────────────────────

/// Registration form, minus the password.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationProfile {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Partial profile edit. Absent fields are left unchanged server-side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

// ── Inbound payloads ─────────────────────────────────────────────

/// Body of login, register and refresh responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthResponse {
    #[serde(default, alias = "access_token", alias = "accessToken")]
    pub token: Option<String>,
    #[serde(default, alias = "refreshToken")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<UserSnapshot>,
}

/// Body of a profile update response: either the user itself or `{ "user": ... }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum ProfileResponse {
    Wrapped { user: UserSnapshot },
    Bare(UserSnapshot),
}

impl ProfileResponse {
    pub(crate) fn into_user(self) -> UserSnapshot {
        match self {
            Self::Wrapped { user } | Self::Bare(user) => user,
        }
    }
}

// ── Session ──────────────────────────────────────────────────────

/// A fully present persisted session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user: UserSnapshot,
    /// Last confirmed activity, ms since epoch. `None` if never recorded.
    pub last_activity_ms: Option<i64>,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoutReason {
    Manual,
    RefreshFailed,
    NoRefreshToken,
    Unauthorized,
    Expired,
}

/// Session lifecycle notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    LoggedIn { user_id: String },
    Registered { user_id: String },
    Refreshed,
    ProfileUpdated { user_id: String },
    LoggedOut { reason: LogoutReason },
}
