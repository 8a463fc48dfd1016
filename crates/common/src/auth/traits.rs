//! Traits for token exchange and browser operations
//!
//! These traits enable dependency injection and testing by abstracting
//! external dependencies (the token endpoint, the system browser).

use async_trait::async_trait;
use url::Url;

use super::client::TokenExchangeError;
use super::types::{StoredCredential, TokenGrant};

/// Trait for token endpoint operations
///
/// This trait abstracts the code and refresh grants to enable testing with
/// mock implementations.
#[async_trait]
pub trait TokenClientTrait: Send + Sync {
    /// Exchange an authorization code for a full credential
    ///
    /// # Arguments
    /// * `code` - Authorization code from the redirect callback
    /// * `code_verifier` - PKCE verifier matching the challenge that was sent
    /// * `redirect_uri` - Redirect URI used in the authorization request
    ///
    /// # Errors
    /// Returns error if the request fails, the server answers non-2xx, or the
    /// response lacks tokens or user data
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<StoredCredential, TokenExchangeError>;

    /// Refresh the access token
    ///
    /// Returns `None` on any failure; callers treat that as an unrecoverable
    /// session.
    async fn refresh(&self, refresh_token: &str) -> Option<TokenGrant>;
}

/// Outcome of an interactive browser authorization session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserResult {
    /// Browser navigated to the redirect URI; `url` is the full callback URL
    Success { url: String },
    /// User cancelled the session
    Cancel,
    /// Session was dismissed without a result (closed window, timeout)
    Dismiss,
    /// Browser or listener failure
    Error(String),
}

/// Trait for opening the hosted authorization page
///
/// Implementations open `auth_url` and resolve once the browser reaches
/// `redirect_uri` or the session ends some other way.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn open_auth_session(&self, auth_url: &Url, redirect_uri: &str) -> BrowserResult;
}
