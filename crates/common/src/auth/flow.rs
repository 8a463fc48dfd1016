//! Interactive OAuth authorization-code flow
//!
//! One login attempt moves through:
//!
//! ```text
//! Idle -> AwaitingRedirect -> Success | Cancelled | Failed
//! ```
//!
//! The driver generates a fresh PKCE challenge, opens the hosted page through
//! a [`BrowserSession`], extracts the authorization code from the redirect,
//! exchanges it, and persists the resulting credential. Only one attempt may
//! be awaiting its redirect at a time.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use super::client::{TokenExchangeClient, TokenExchangeError};
use super::pkce::{validate_state, PKCEChallenge, PkceError};
use super::token_store::CredentialStore;
use super::traits::{BrowserResult, BrowserSession, TokenClientTrait};
use super::types::{OAuthConfig, SignInMode, StoredCredential};
use crate::security::KeychainError;

/// Observable state of the flow driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowState {
    #[default]
    Idle,
    AwaitingRedirect,
    Success,
    Cancelled,
    Failed,
}

/// Result of a completed sign-in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSuccess {
    pub credential: StoredCredential,
}

/// Flow errors
///
/// Cancellation and malformed redirects are not errors; `launch_auth`
/// reports them as `Ok(None)`.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("an authorization flow is already awaiting its redirect")]
    AlreadyInProgress,

    #[error("PKCE generation failed: {0}")]
    Pkce(#[from] PkceError),

    #[error("invalid authorization endpoint: {0}")]
    InvalidAuthorizationUrl(#[from] url::ParseError),

    #[error("code exchange failed: {0}")]
    Exchange(#[from] TokenExchangeError),

    #[error("failed to persist credential: {0}")]
    Storage(#[from] KeychainError),
}

/// Drives the browser-based authorization-code flow
pub struct OAuthFlow<C: TokenClientTrait = TokenExchangeClient> {
    config: OAuthConfig,
    client: Arc<C>,
    store: Arc<CredentialStore>,
    browser: Arc<dyn BrowserSession>,
    state: Mutex<FlowState>,
}

impl<C: TokenClientTrait> OAuthFlow<C> {
    pub fn new(
        config: OAuthConfig,
        client: Arc<C>,
        store: Arc<CredentialStore>,
        browser: Arc<dyn BrowserSession>,
    ) -> Self {
        Self { config, client, store, browser, state: Mutex::new(FlowState::Idle) }
    }

    /// Current flow state
    #[must_use]
    pub fn state(&self) -> FlowState {
        *self.state.lock()
    }

    #[must_use]
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Run one sign-in or sign-up attempt
    ///
    /// Returns `Ok(Some(_))` once the credential is exchanged and persisted,
    /// and `Ok(None)` when the user cancels or the redirect is unusable.
    ///
    /// # Errors
    /// - `AlreadyInProgress` if another attempt is awaiting its redirect
    /// - `Pkce` / `InvalidAuthorizationUrl` if the request cannot be built
    /// - `Exchange` if the token endpoint rejects the code
    /// - `Storage` if the credential cannot be persisted
    pub async fn launch_auth(&self, mode: SignInMode) -> Result<Option<AuthSuccess>, FlowError> {
        let attempt = self.begin()?;

        match self.run(mode).await {
            Ok(Outcome::Success(success)) => {
                attempt.finish(FlowState::Success);
                Ok(Some(success))
            }
            Ok(Outcome::Cancelled) => {
                attempt.finish(FlowState::Cancelled);
                Ok(None)
            }
            Ok(Outcome::Failed) => {
                attempt.finish(FlowState::Failed);
                Ok(None)
            }
            Err(e) => {
                attempt.finish(FlowState::Failed);
                Err(e)
            }
        }
    }

    fn begin(&self) -> Result<Attempt<'_>, FlowError> {
        let mut state = self.state.lock();
        if *state == FlowState::AwaitingRedirect {
            return Err(FlowError::AlreadyInProgress);
        }
        *state = FlowState::AwaitingRedirect;
        Ok(Attempt { state: &self.state, done: false })
    }

    async fn run(&self, mode: SignInMode) -> Result<Outcome, FlowError> {
        let challenge = PKCEChallenge::generate()?;
        let auth_url = self.config.authorization_url(&challenge, mode)?;

        info!(%mode, "Opening authorization page");
        let redirect =
            match self.browser.open_auth_session(&auth_url, &self.config.redirect_uri).await {
                BrowserResult::Success { url } => url,
                BrowserResult::Cancel => {
                    warn!("Authorization cancelled by user");
                    return Ok(Outcome::Cancelled);
                }
                BrowserResult::Dismiss => {
                    warn!("Authorization session dismissed");
                    return Ok(Outcome::Cancelled);
                }
                BrowserResult::Error(reason) => {
                    warn!(%reason, "Authorization session failed to complete");
                    return Ok(Outcome::Cancelled);
                }
            };

        let Some(code) = extract_code(&redirect, &challenge.state) else {
            return Ok(Outcome::Failed);
        };

        debug!("Authorization code received, exchanging");
        let credential = self
            .client
            .exchange_code(&code, &challenge.code_verifier, &self.config.redirect_uri)
            .await?;
        self.store.save(&credential)?;

        info!(user_id = %credential.user.id, "Sign-in complete");
        Ok(Outcome::Success(AuthSuccess { credential }))
    }
}

enum Outcome {
    Success(AuthSuccess),
    Cancelled,
    Failed,
}

/// Pull the code out of the redirect, logging why when it cannot.
///
/// A redirect without `state` is accepted; one with a different `state` is
/// not.
fn extract_code(redirect: &str, expected_state: &str) -> Option<String> {
    let params: HashMap<String, String> = match Url::parse(redirect) {
        Ok(url) => url.query_pairs().into_owned().collect(),
        Err(e) => {
            warn!(error = %e, "Redirect URL could not be parsed");
            return None;
        }
    };

    if let Some(error) = params.get("error") {
        let description = params.get("error_description").map_or("", String::as_str);
        warn!(%error, %description, "Authorization server returned an error");
        return None;
    }

    if let Some(state) = params.get("state") {
        if !validate_state(expected_state, state) {
            warn!("Redirect state does not match the request");
            return None;
        }
    }

    match params.get("code") {
        Some(code) if !code.is_empty() => Some(code.clone()),
        _ => {
            warn!("Redirect did not include an authorization code");
            None
        }
    }
}

/// Holds the driver in `AwaitingRedirect` for one attempt. Dropping it
/// unfinished (the caller abandoned the future) resets the driver to
/// `Cancelled`.
struct Attempt<'a> {
    state: &'a Mutex<FlowState>,
    done: bool,
}

impl Attempt<'_> {
    fn finish(mut self, outcome: FlowState) {
        *self.state.lock() = outcome;
        info!(state = ?outcome, "Authorization flow finished");
        self.done = true;
    }
}

impl Drop for Attempt<'_> {
    fn drop(&mut self) {
        if !self.done {
            *self.state.lock() = FlowState::Cancelled;
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::flow.
    use super::*;
    use crate::testing::{sample_credential, MockBrowserSession, MockSecureStorage, MockTokenClient};

    struct Harness {
        storage: Arc<MockSecureStorage>,
        client: Arc<MockTokenClient>,
        browser: Arc<MockBrowserSession>,
        flow: OAuthFlow<MockTokenClient>,
    }

    fn test_config() -> OAuthConfig {
        OAuthConfig::new(
            "client_123".to_string(),
            "nima://callback".to_string(),
            "https://auth.example.com/authorize".to_string(),
            "https://api.example.com/auth/token".to_string(),
            "authkit".to_string(),
        )
    }

    fn harness(browser: MockBrowserSession) -> Harness {
        let storage = Arc::new(MockSecureStorage::new());
        let client = Arc::new(MockTokenClient::new());
        let browser = Arc::new(browser);
        let store = Arc::new(CredentialStore::new(storage.clone()));
        let flow = OAuthFlow::new(test_config(), client.clone(), store, browser.clone());
        Harness { storage, client, browser, flow }
    }

    /// Validates `OAuthFlow::launch_auth` behavior for the successful
    /// redirect scenario.
    ///
    /// Assertions:
    /// - Confirms the code and verifier reach the token client.
    /// - Confirms the credential is persisted and the state is `Success`.
    #[tokio::test]
    async fn successful_redirect_exchanges_and_persists() {
        let h = harness(MockBrowserSession::redirect_with_code("auth_code"));
        h.client.set_exchange_result(Ok(sample_credential()));

        let success = h.flow.launch_auth(SignInMode::SignIn).await.unwrap().unwrap();

        assert_eq!(success.credential, sample_credential());
        assert_eq!(h.flow.state(), FlowState::Success);

        let calls = h.client.exchange_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].code, "auth_code");
        assert_eq!(calls[0].code_verifier.len(), 64);
        assert_eq!(calls[0].redirect_uri, "nima://callback");

        let store = CredentialStore::new(h.storage.clone());
        assert_eq!(store.load().unwrap(), Some(sample_credential()));
    }

    #[tokio::test]
    async fn verifier_matches_challenge_sent_to_browser() {
        let h = harness(MockBrowserSession::redirect_with_code("auth_code"));
        h.client.set_exchange_result(Ok(sample_credential()));

        h.flow.launch_auth(SignInMode::SignIn).await.unwrap();

        let opened = h.browser.opened_urls();
        let params: HashMap<String, String> = opened[0].query_pairs().into_owned().collect();
        let verifier = &h.client.exchange_calls()[0].code_verifier;
        assert_eq!(params["code_challenge"], crate::auth::pkce::generate_code_challenge(verifier));
    }

    #[tokio::test]
    async fn sign_up_mode_adds_screen_hint() {
        let h = harness(MockBrowserSession::cancel());

        h.flow.launch_auth(SignInMode::SignUp).await.unwrap();

        let opened = h.browser.opened_urls();
        assert!(opened[0].query_pairs().any(|(k, v)| k == "screen_hint" && v == "sign-up"));
    }

    /// Validates `OAuthFlow::launch_auth` behavior for the user cancel
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms `Ok(None)` is returned.
    /// - Confirms no storage writes and no exchange happened.
    #[tokio::test]
    async fn cancel_returns_none_without_writes() {
        for browser in [
            MockBrowserSession::cancel(),
            MockBrowserSession::dismiss(),
            MockBrowserSession::fail("listener closed"),
        ] {
            let h = harness(browser);

            let result = h.flow.launch_auth(SignInMode::SignIn).await.unwrap();

            assert!(result.is_none());
            assert_eq!(h.flow.state(), FlowState::Cancelled);
            assert_eq!(h.storage.write_count(), 0);
            assert_eq!(h.client.exchange_call_count(), 0);
        }
    }

    #[tokio::test]
    async fn redirect_without_code_fails() {
        let h = harness(MockBrowserSession::redirect_raw("nima://callback?foo=bar"));

        let result = h.flow.launch_auth(SignInMode::SignIn).await.unwrap();

        assert!(result.is_none());
        assert_eq!(h.flow.state(), FlowState::Failed);
        assert_eq!(h.client.exchange_call_count(), 0);
    }

    #[tokio::test]
    async fn redirect_with_error_param_fails() {
        let h = harness(MockBrowserSession::redirect_raw(
            "nima://callback?error=access_denied&error_description=User%20denied",
        ));

        assert!(h.flow.launch_auth(SignInMode::SignIn).await.unwrap().is_none());
        assert_eq!(h.flow.state(), FlowState::Failed);
    }

    #[tokio::test]
    async fn redirect_with_foreign_state_fails() {
        let h = harness(MockBrowserSession::redirect_raw(
            "nima://callback?code=auth_code&state=forged",
        ));

        assert!(h.flow.launch_auth(SignInMode::SignIn).await.unwrap().is_none());
        assert_eq!(h.flow.state(), FlowState::Failed);
        assert_eq!(h.client.exchange_call_count(), 0);
    }

    #[tokio::test]
    async fn redirect_without_state_is_accepted() {
        let h = harness(MockBrowserSession::redirect_raw("nima://callback?code=auth_code"));
        h.client.set_exchange_result(Ok(sample_credential()));

        assert!(h.flow.launch_auth(SignInMode::SignIn).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn exchange_error_propagates() {
        let h = harness(MockBrowserSession::redirect_with_code("auth_code"));
        h.client.set_exchange_result(Err(TokenExchangeError::MissingTokens));

        let err = h.flow.launch_auth(SignInMode::SignIn).await.unwrap_err();

        assert!(matches!(err, FlowError::Exchange(TokenExchangeError::MissingTokens)));
        assert_eq!(h.flow.state(), FlowState::Failed);
        assert_eq!(h.storage.write_count(), 0);
    }

    #[tokio::test]
    async fn storage_error_propagates() {
        let h = harness(MockBrowserSession::redirect_with_code("auth_code"));
        h.client.set_exchange_result(Ok(sample_credential()));
        h.storage.fail_writes(true);

        let err = h.flow.launch_auth(SignInMode::SignIn).await.unwrap_err();

        assert!(matches!(err, FlowError::Storage(_)));
    }

    #[tokio::test]
    async fn second_launch_while_pending_is_rejected() {
        let browser = MockBrowserSession::redirect_with_code("auth_code")
            .with_delay(std::time::Duration::from_millis(100));
        let h = harness(browser);
        h.client.set_exchange_result(Ok(sample_credential()));

        let (first, second) = tokio::join!(
            h.flow.launch_auth(SignInMode::SignIn),
            async {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                assert_eq!(h.flow.state(), FlowState::AwaitingRedirect);
                h.flow.launch_auth(SignInMode::SignIn).await
            }
        );

        assert!(first.unwrap().is_some());
        assert!(matches!(second, Err(FlowError::AlreadyInProgress)));
        assert_eq!(h.browser.opened_urls().len(), 1);
    }

    #[tokio::test]
    async fn abandoned_attempt_releases_driver() {
        let browser = MockBrowserSession::redirect_with_code("auth_code")
            .with_delay(std::time::Duration::from_secs(60));
        let h = harness(browser);

        let abandoned = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            h.flow.launch_auth(SignInMode::SignIn),
        )
        .await;

        assert!(abandoned.is_err());
        assert_eq!(h.flow.state(), FlowState::Cancelled);
    }

    #[test]
    fn extract_code_reads_query() {
        assert_eq!(
            extract_code("http://127.0.0.1:8765/callback?code=abc&state=s1", "s1").as_deref(),
            Some("abc")
        );
        assert_eq!(extract_code("http://127.0.0.1:8765/callback?code=", "s1"), None);
        assert_eq!(extract_code("not a url", "s1"), None);
    }
}
