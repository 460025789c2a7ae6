//! Client-side authentication and session management for the camp booking
//! portal: credential screening, login throttling, token persistence,
//! proactive refresh and idle expiry.

pub mod auth;
pub mod clock;
pub mod config;
pub mod net;
pub mod security;
pub mod storage;
pub mod telemetry;

#[cfg(test)]
mod testing;

pub use auth::{AuthError, AuthService, SessionEvent, UserSnapshot};
pub use config::AuthConfig;
