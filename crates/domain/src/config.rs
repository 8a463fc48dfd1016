//! Configuration management

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_AUTH_PROVIDER, DEFAULT_KEYCHAIN_SERVICE, DEFAULT_LOGIN_TIMEOUT_SECS,
};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub auth: AuthConfig,
}

/// Authentication configuration
///
/// `client_id`, `redirect_uri` and both endpoints are required; the loader
/// reports their absence as a configuration error at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    pub client_id: String,
    pub redirect_uri: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_keychain_service")]
    pub keychain_service: String,
    #[serde(default = "default_login_timeout_secs")]
    pub login_timeout_secs: u64,
}

impl AuthConfig {
    /// Create a configuration with defaults for the optional fields.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        authorization_endpoint: impl Into<String>,
        token_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            authorization_endpoint: authorization_endpoint.into(),
            token_endpoint: token_endpoint.into(),
            provider: default_provider(),
            keychain_service: default_keychain_service(),
            login_timeout_secs: default_login_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    DEFAULT_AUTH_PROVIDER.to_string()
}

fn default_keychain_service() -> String {
    DEFAULT_KEYCHAIN_SERVICE.to_string()
}

const fn default_login_timeout_secs() -> u64 {
    DEFAULT_LOGIN_TIMEOUT_SECS
}
