//! Bearer token decoding and validity checks.
//!
//! Tokens are three dot-separated base64url segments; only the payload is
//! read, for its `exp` claim. Signatures are the server's business: the
//! client never trusts a token further than "not yet expired".
//!
//! [`decode_claims`] is the single decode path shared by the validator and
//! the refresh scheduler. It never panics; malformed input is a
//! [`TokenDecodeError`].

use crate::clock::Clock;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Why a token could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenDecodeError {
    #[error("token must have three segments, found {0}")]
    Malformed(usize),
    #[error("payload segment is not valid base64url")]
    Encoding,
    #[error("payload is not a JSON object")]
    Json,
    #[error("payload has no exp claim")]
    MissingExpiry,
    #[error("exp claim is not a number")]
    NonNumericExpiry,
}

/// Claims the client cares about.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenClaims {
    /// Expiry instant, milliseconds since epoch.
    pub expires_at_ms: i64,
    pub subject: Option<String>,
    pub issued_at: Option<i64>,
}

impl TokenClaims {
    /// Expiry in whole seconds since epoch.
    pub fn expires_at_secs(&self) -> i64 {
        self.expires_at_ms.div_euclid(1000)
    }
}

// Expiries outside +/- 2^53 ms are not meaningful timestamps and would not
// survive the f64 -> i64 conversion exactly.
const MAX_EXPIRY_MS: f64 = 9_007_199_254_740_992.0;
const MIN_EXPIRY_MS: f64 = -MAX_EXPIRY_MS;

/// Decode the payload segment of `token`.
pub fn decode_claims(token: &str) -> Result<TokenClaims, TokenDecodeError> {
    let segments: Vec<&str> = token.trim().split('.').collect();
    if segments.len() != 3 {
        return Err(TokenDecodeError::Malformed(segments.len()));
    }

    let payload = URL_SAFE_NO_PAD
        .decode(segments[1].trim_end_matches('='))
        .map_err(|_| TokenDecodeError::Encoding)?;
    let json: JsonValue =
        serde_json::from_slice(&payload).map_err(|_| TokenDecodeError::Json)?;
    let claims = json.as_object().ok_or(TokenDecodeError::Json)?;

    let exp = claims
        .get("exp")
        .ok_or(TokenDecodeError::MissingExpiry)?
        .as_f64()
        .map(|v| (v * 1000.0).round())
        .filter(|ms| ms.is_finite() && (MIN_EXPIRY_MS..=MAX_EXPIRY_MS).contains(ms))
        .ok_or(TokenDecodeError::NonNumericExpiry)?;

    Ok(TokenClaims {
        expires_at_ms: exp as i64,
        subject: claims
            .get("sub")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        issued_at: claims.get("iat").and_then(|v| v.as_i64()),
    })
}

/// Whether `token` is unexpired at `now_ms`. Undecodable tokens are invalid.
pub fn is_valid_at(token: &str, now_ms: i64) -> bool {
    match decode_claims(token) {
        Ok(claims) => claims.expires_at_ms > now_ms,
        Err(e) => {
            tracing::debug!("Rejecting undecodable token: {e}");
            false
        }
    }
}

/// Token validity against a clock.
#[derive(Clone)]
pub struct TokenValidator {
    clock: Arc<dyn Clock>,
}

impl TokenValidator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn is_valid(&self, token: &str) -> bool {
        is_valid_at(token, self.clock.now_ms())
    }

    /// Milliseconds until expiry (negative once expired), `None` if undecodable.
    pub fn remaining_ms(&self, token: &str) -> Option<i64> {
        decode_claims(token)
            .ok()
            .map(|claims| claims.expires_at_ms.saturating_sub(self.clock.now_ms()))
    }
}

/// Build an unsigned token carrying `claims`. Test helper.
#[cfg(test)]
pub(crate) fn encode_unsigned(claims: &JsonValue) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

/// Unsigned token expiring at `exp_secs`. Test helper.
#[cfg(test)]
pub(crate) fn token_expiring_at(exp_secs: i64) -> String {
    encode_unsigned(&serde_json::json!({ "sub": "user-1", "exp": exp_secs }))
}
