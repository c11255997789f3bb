//! Bearer token claims decoding
//!
//! Tokens are treated as opaque strings. When the second dot-delimited
//! segment decodes (base64url, padding optional) to a JSON object carrying a
//! numeric `exp`, that claim drives automatic expiry. Anything else means the
//! token never expires on the client side.

use std::time::Duration;

use base64::{
    alphabet,
    engine::{general_purpose, DecodePaddingMode, GeneralPurpose},
    Engine,
};
use chrono::DateTime;
use serde::Deserialize;

const CLAIMS_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    general_purpose::NO_PAD.with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Claims the session cares about
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TokenClaims {
    /// Expires at, in seconds since the Unix epoch
    #[serde(default)]
    pub exp: Option<f64>,
}

impl TokenClaims {
    /// Expiry instant in milliseconds since the Unix epoch.
    ///
    /// A zero `exp`, or one outside the range of representable instants,
    /// counts as absent.
    pub fn expires_at_millis(&self) -> Option<i64> {
        let millis = self
            .exp
            .filter(|exp| exp.is_finite() && *exp != 0.0)
            .map(|exp| exp * 1000.0)
            .filter(|millis| millis.abs() < i64::MAX as f64)? as i64;

        DateTime::from_timestamp_millis(millis).map(|_| millis)
    }
}

/// Decode the claims segment of `token`, or `None` when it is not decodable.
pub fn decode_claims(token: &str) -> Option<TokenClaims> {
    let segment = token.split('.').nth(1)?;

    let bytes = match CLAIMS_ENGINE.decode(segment) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(error = %e, "Token claims segment is not base64url");
            return None;
        }
    };

    match serde_json::from_slice::<TokenClaims>(&bytes) {
        Ok(claims) => Some(claims),
        Err(e) => {
            tracing::debug!(error = %e, "Token claims segment is not a JSON object");
            None
        }
    }
}

/// Time left before the session must be dropped: `exp*1000 - now - margin`.
///
/// Returns `None` when the token carries no usable `exp` or when the margin
/// has already elapsed.
pub fn expiry_delay(token: &str, now_millis: i64, margin: Duration) -> Option<Duration> {
    let expires_at = decode_claims(token)?.expires_at_millis()?;
    let margin = i64::try_from(margin.as_millis()).unwrap_or(i64::MAX);
    let remaining = expires_at
        .saturating_sub(now_millis)
        .saturating_sub(margin);

    if remaining > 0 {
        Some(Duration::from_millis(remaining as u64))
    } else {
        None
    }
}
