//! Test fixture generators
//!
//! Every fixture is deterministic so values compare equal across calls.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::auth::{StoredCredential, UserInfo};

/// `exp` of 2100-01-01T00:00:00Z.
pub const FAR_FUTURE_EXP: i64 = 4_102_444_800;

/// Build an unsigned JWT whose payload carries `exp`
///
/// # Examples
///
/// ```
/// use nima_common::auth::jwt::decode_expiry;
/// use nima_common::testing::fixtures::jwt_with_exp;
///
/// assert_eq!(decode_expiry(&jwt_with_exp(1_700_000_000)), Some(1_700_000_000));
/// ```
#[must_use]
pub fn jwt_with_exp(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"user_01","exp":{exp}}}"#));
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

#[must_use]
pub fn sample_user() -> UserInfo {
    UserInfo {
        id: "user_01".to_string(),
        email: "ada@example.com".to_string(),
        first_name: Some("Ada".to_string()),
        last_name: Some("Lovelace".to_string()),
        profile_picture_url: None,
        email_verified: true,
    }
}

/// Credential with an access token valid until [`FAR_FUTURE_EXP`].
#[must_use]
pub fn sample_credential() -> StoredCredential {
    StoredCredential {
        access_token: jwt_with_exp(FAR_FUTURE_EXP),
        refresh_token: "refresh_token_01".to_string(),
        user: sample_user(),
    }
}
