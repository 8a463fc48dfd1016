//! Access token expiry inspection
//!
//! Only the `exp` claim is read; signatures are not verified here because the
//! token is opaque to this client and only ever presented back to the server
//! that issued it.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;

/// Tokens are treated as expired this many seconds before `exp`.
pub const EXPIRY_MARGIN_SECS: i64 = 60;

/// Read the `exp` claim (seconds since epoch) from a JWT.
///
/// Returns `None` for anything that is not a three-segment token with a
/// base64url JSON payload carrying a numeric `exp`. Padding is tolerated.
#[must_use]
pub fn decode_expiry(token: &str) -> Option<i64> {
    let mut segments = token.split('.');
    let (_header, payload, _signature) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.get("exp")?;

    #[allow(clippy::cast_possible_truncation)]
    exp.as_i64().or_else(|| exp.as_f64().map(|secs| secs as i64))
}

/// Whether `token` is expired, or expires within [`EXPIRY_MARGIN_SECS`].
///
/// A token whose expiry cannot be read counts as expired.
#[must_use]
pub fn is_token_expired(token: &str) -> bool {
    is_expired_at(token, Utc::now().timestamp())
}

fn is_expired_at(token: &str, now: i64) -> bool {
    match decode_expiry(token) {
        Some(exp) => now + EXPIRY_MARGIN_SECS >= exp,
        None => true,
    }
}
