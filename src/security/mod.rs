//! Local guards applied before any credential leaves the client.
//!
//! - [`sanitize`]: identifier/profile cleanup and injection screening
//! - [`rate_limiter`]: persisted sliding-window attempt limits

pub mod rate_limiter;
pub mod sanitize;

pub use rate_limiter::RateLimiter;
pub use sanitize::{
    contains_injection, find_injection, find_secret_injection, sanitize, InjectionKind,
    InjectionMatch,
};
