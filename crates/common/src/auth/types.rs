//! OAuth 2.0 types and structures
//!
//! Credential, user profile, and configuration types shared by the token
//! client, flow driver, and session.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use super::pkce::PKCEChallenge;

/// Profile of the signed-in user as issued by the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture_url: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
}

/// Access/refresh token pair plus the user they were issued to.
///
/// Created on successful code exchange, overwritten on refresh, and deleted
/// on sign-out or unrecoverable refresh failure.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredential {
    /// JWT access token for API authentication
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserInfo,
}

impl StoredCredential {
    /// Apply a refresh grant. Fields the grant omits keep their current value.
    #[must_use]
    pub fn merged_with(&self, grant: TokenGrant) -> Self {
        Self {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token.unwrap_or_else(|| self.refresh_token.clone()),
            user: grant.user.unwrap_or_else(|| self.user.clone()),
        }
    }
}

impl fmt::Debug for StoredCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredCredential")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("user", &self.user)
            .finish()
    }
}

/// Normalized result of a refresh grant.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user: Option<UserInfo>,
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("user", &self.user)
            .finish()
    }
}

/// Raw token endpoint response. Every field is optional so that missing
/// values surface as a typed error instead of a parse failure.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<UserInfo>,
}

/// Externally observable authentication state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthState {
    pub is_loading: bool,
    pub is_authenticated: bool,
    pub user: Option<UserInfo>,
}

impl AuthState {
    /// State before bootstrap has finished.
    #[must_use]
    pub const fn loading() -> Self {
        Self { is_loading: true, is_authenticated: false, user: None }
    }

    #[must_use]
    pub const fn unauthenticated() -> Self {
        Self { is_loading: false, is_authenticated: false, user: None }
    }

    #[must_use]
    pub const fn authenticated(user: UserInfo) -> Self {
        Self { is_loading: false, is_authenticated: true, user: Some(user) }
    }
}

/// Whether the hosted page should open on sign-in or sign-up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SignInMode {
    #[default]
    SignIn,
    SignUp,
}

impl fmt::Display for SignInMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SignIn => write!(f, "sign-in"),
            Self::SignUp => write!(f, "sign-up"),
        }
    }
}

/// OAuth configuration for the hosted authorization server
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// OAuth client ID
    pub client_id: String,

    /// Redirect URI (loopback for desktop apps, deep link for mobile)
    pub redirect_uri: String,

    /// Hosted login page, e.g. `https://auth.example.com/authorize`
    pub authorization_endpoint: String,

    /// Code/refresh exchange endpoint. Usually a trusted backend function
    /// proxying the provider's token endpoint.
    pub token_endpoint: String,

    /// Identity provider hint sent as the `provider` parameter
    pub provider: String,
}

impl OAuthConfig {
    /// Create a new OAuth configuration
    #[must_use]
    pub fn new(
        client_id: String,
        redirect_uri: String,
        authorization_endpoint: String,
        token_endpoint: String,
        provider: String,
    ) -> Self {
        Self { client_id, redirect_uri, authorization_endpoint, token_endpoint, provider }
    }

    /// Build the authorization URL for one login attempt.
    ///
    /// # Errors
    /// Returns `url::ParseError` if `authorization_endpoint` is not a valid
    /// absolute URL.
    pub fn authorization_url(
        &self,
        challenge: &PKCEChallenge,
        mode: SignInMode,
    ) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&self.authorization_endpoint)?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.client_id)
                .append_pair("redirect_uri", &self.redirect_uri)
                .append_pair("response_type", "code")
                .append_pair("code_challenge", &challenge.code_challenge)
                .append_pair("code_challenge_method", challenge.challenge_method())
                .append_pair("provider", &self.provider)
                .append_pair("state", &challenge.state);

            if mode == SignInMode::SignUp {
                query.append_pair("screen_hint", "sign-up");
            }
        }

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::types.
    use std::collections::HashMap;

    use super::*;

    fn sample_user() -> UserInfo {
        UserInfo {
            id: "user_01".to_string(),
            email: "ada@example.com".to_string(),
            first_name: Some("Ada".to_string()),
            last_name: None,
            profile_picture_url: None,
            email_verified: true,
        }
    }

    fn test_config() -> OAuthConfig {
        OAuthConfig::new(
            "client_123".to_string(),
            "http://127.0.0.1:8765/callback".to_string(),
            "https://auth.example.com/authorize".to_string(),
            "https://api.example.com/auth/token".to_string(),
            "authkit".to_string(),
        )
    }

    fn query_map(url: &Url) -> HashMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    /// Validates `OAuthConfig::authorization_url` behavior for the sign-in
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms every required query parameter is present.
    /// - Ensures `screen_hint` is absent for sign-in.
    #[test]
    fn test_authorization_url_sign_in() {
        let challenge = PKCEChallenge::generate().unwrap();
        let url = test_config().authorization_url(&challenge, SignInMode::SignIn).unwrap();
        let params = query_map(&url);

        assert!(url.as_str().starts_with("https://auth.example.com/authorize?"));
        assert_eq!(params["client_id"], "client_123");
        assert_eq!(params["redirect_uri"], "http://127.0.0.1:8765/callback");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["code_challenge"], challenge.code_challenge);
        assert_eq!(params["code_challenge_method"], "S256");
        assert_eq!(params["provider"], "authkit");
        assert_eq!(params["state"], challenge.state);
        assert!(!params.contains_key("screen_hint"));
    }

    #[test]
    fn test_authorization_url_sign_up_hint() {
        let challenge = PKCEChallenge::generate().unwrap();
        let url = test_config().authorization_url(&challenge, SignInMode::SignUp).unwrap();

        assert_eq!(query_map(&url)["screen_hint"], "sign-up");
    }

    #[test]
    fn test_authorization_url_rejects_relative_endpoint() {
        let mut config = test_config();
        config.authorization_endpoint = "/authorize".to_string();
        let challenge = PKCEChallenge::generate().unwrap();

        assert!(config.authorization_url(&challenge, SignInMode::SignIn).is_err());
    }

    #[test]
    fn test_user_info_optional_fields() {
        let user: UserInfo =
            serde_json::from_str(r#"{"id":"user_01","email":"ada@example.com"}"#).unwrap();

        assert_eq!(user.first_name, None);
        assert!(!user.email_verified);
    }

    #[test]
    fn test_merge_keeps_previous_refresh_token_and_user() {
        let current = StoredCredential {
            access_token: "old_access".to_string(),
            refresh_token: "old_refresh".to_string(),
            user: sample_user(),
        };

        let merged = current.merged_with(TokenGrant {
            access_token: "new_access".to_string(),
            refresh_token: None,
            user: None,
        });

        assert_eq!(merged.access_token, "new_access");
        assert_eq!(merged.refresh_token, "old_refresh");
        assert_eq!(merged.user, sample_user());
    }

    #[test]
    fn test_credential_debug_redacts_tokens() {
        let credential = StoredCredential {
            access_token: "secret_access".to_string(),
            refresh_token: "secret_refresh".to_string(),
            user: sample_user(),
        };

        let rendered = format!("{credential:?}");
        assert!(!rendered.contains("secret_access"));
        assert!(!rendered.contains("secret_refresh"));
        assert!(rendered.contains("ada@example.com"));
    }

    #[test]
    fn test_auth_state_constructors() {
        assert!(AuthState::loading().is_loading);
        assert_eq!(
            AuthState::unauthenticated(),
            AuthState { is_loading: false, is_authenticated: false, user: None }
        );
        assert!(AuthState::authenticated(sample_user()).is_authenticated);
    }
}
