//! Client-side authentication and session lifecycle.
//!
//! Provides:
//! - Token decoding and expiry checks (unsigned JWT payload read)
//! - Persisted session state (access/refresh token, user, last activity)
//! - Idle timeout tracking
//! - Proactive refresh timer, one armed at a time
//! - [`AuthService`], the single entry point that ties them together
//!
//! ## Design Decisions
//! - Signatures are never verified here; the server is the authority and a
//!   forged token only fools the local UI state.
//! - Sessions are all-or-nothing: a partially readable record is treated
//!   as signed out.

pub mod activity;
pub mod error;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod token;
pub mod types;

pub use activity::ActivityMonitor;
pub use error::AuthError;
pub use scheduler::RefreshScheduler;
pub use service::{AuthService, AuthServiceBuilder, RegistrationOutcome};
pub use store::TokenStore;
pub use token::{decode_claims, TokenClaims, TokenDecodeError, TokenValidator};
pub use types::{
    AuthResponse, LogoutReason, ProfileUpdate, RegistrationProfile, SessionEvent, SessionRecord,
    UserRole, UserSnapshot,
};
