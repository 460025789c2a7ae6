use crate::net::{StatusClass, TransportError};

/// Every way an auth operation can fail, each with its own user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum AuthError {
    #[error("Too many attempts. Please try again in {retry_after_secs} seconds.")]
    TooManyAttempts { retry_after_secs: u64 },
    #[error("The {field} contains characters that are not allowed.")]
    InvalidInput { field: &'static str },
    #[error("You appear to be offline. Check your internet connection.")]
    NetworkOffline,
    #[error("The booking service is unreachable right now. Please try again later.")]
    BackendUnreachable,
    #[error("Incorrect email or password.")]
    CredentialsRejected,
    #[error("This account has been suspended.")]
    AccountSuspended,
    #[error("The server encountered an error ({status}). Please try again later.")]
    ServerError { status: u16 },
    #[error("Something went wrong: {0}")]
    Unknown(String),
    #[error("Your session has ended. Please sign in again.")]
    NoRefreshToken,
    #[error("You are not signed in.")]
    NotSignedIn,
    #[error("Session storage is unavailable: {0}")]
    Storage(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl AuthError {
    /// Map a transport failure that carries an HTTP status. Failures without
    /// a status need connectivity context and are classified by the service.
    pub(crate) fn from_status(err: &TransportError) -> Option<Self> {
        let status = err.status?;
        Some(match err.class {
            StatusClass::Unauthorized => Self::CredentialsRejected,
            StatusClass::Forbidden => Self::AccountSuspended,
            StatusClass::ServerError => Self::ServerError { status },
            StatusClass::ClientError | StatusClass::Network => {
                Self::Unknown(err.message.clone().unwrap_or_else(|| format!("HTTP {status}")))
            }
        })
    }

    pub(crate) fn storage(err: anyhow::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
