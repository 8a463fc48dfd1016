//! Host-side auth wiring
//!
//! Connects the auth library in `nima-common` to the platform: the system
//! keychain for storage, the system browser plus a loopback listener for the
//! authorization redirect, and `NimaError` for everything the host sees.

pub mod browser;

use std::sync::Arc;
use std::time::Duration;

use nima_common::auth::{
    AuthSession, AuthState, BrowserSession, CredentialStore, OAuthConfig, OAuthFlow, SignInMode,
    TokenClientTrait, TokenExchangeClient, UserInfo,
};
use nima_common::security::{KeychainProvider, SecureStorage};
use nima_domain::{AuthConfig, NimaError, Result};
use tracing::info;

pub use browser::SystemBrowser;

use crate::errors::InfraError;

/// Everything a host needs to sign users in and hand out access tokens
///
/// One context owns one session and one flow driver. Clone the session via
/// [`AuthContext::session`] to share it with other tasks.
pub struct AuthContext<C: TokenClientTrait + 'static = TokenExchangeClient> {
    session: AuthSession<C>,
    flow: OAuthFlow<C>,
}

impl AuthContext {
    /// Build a context backed by the system keychain, the HTTP token client,
    /// and the system browser.
    pub fn from_config(config: &AuthConfig) -> Self {
        let storage: Arc<dyn SecureStorage> =
            Arc::new(KeychainProvider::new(config.keychain_service.clone()));
        let client = Arc::new(TokenExchangeClient::new(
            config.client_id.clone(),
            config.token_endpoint.clone(),
        ));

        let mut browser = SystemBrowser::new();
        if config.login_timeout_secs > 0 {
            browser = browser.with_timeout(Duration::from_secs(config.login_timeout_secs));
        }

        Self::with_parts(config, storage, client, Arc::new(browser))
    }
}

impl<C: TokenClientTrait + 'static> AuthContext<C> {
    /// Build a context from explicit collaborators.
    pub fn with_parts(
        config: &AuthConfig,
        storage: Arc<dyn SecureStorage>,
        client: Arc<C>,
        browser: Arc<dyn BrowserSession>,
    ) -> Self {
        let store = Arc::new(CredentialStore::new(storage));
        let oauth = OAuthConfig::new(
            config.client_id.clone(),
            config.redirect_uri.clone(),
            config.authorization_endpoint.clone(),
            config.token_endpoint.clone(),
            config.provider.clone(),
        );

        let flow = OAuthFlow::new(oauth, client.clone(), store.clone(), browser);
        let session = AuthSession::new(store, client);
        Self { session, flow }
    }

    /// Restore the stored credential, refreshing it if it expired.
    pub async fn bootstrap(&self) -> AuthState {
        self.session.bootstrap().await
    }

    /// Run the interactive sign-in (or sign-up) flow.
    ///
    /// Returns `None` when the user cancelled or closed the browser.
    ///
    /// # Errors
    /// Returns `NimaError` if the code exchange or credential storage fails.
    pub async fn login(&self, mode: SignInMode) -> Result<Option<UserInfo>> {
        let user = self.session.sign_in(&self.flow, mode).await.map_err(into_domain)?;
        if let Some(user) = &user {
            info!(user_id = %user.id, %mode, "Login complete");
        }
        Ok(user)
    }

    /// Current access token, refreshed when expired or when `force_refresh`.
    ///
    /// # Errors
    /// Returns `NimaError::Auth` when nobody is signed in or the refresh was
    /// rejected.
    pub async fn access_token(&self, force_refresh: bool) -> Result<String> {
        self.session
            .fetch_access_token(force_refresh)
            .await
            .ok_or_else(|| NimaError::Auth("not signed in".to_string()))
    }

    /// Sign out and remove the stored credential.
    ///
    /// # Errors
    /// Returns `NimaError::Security` if the keychain could not be cleared.
    pub async fn logout(&self) -> Result<()> {
        self.session.sign_out().await.map_err(into_domain)
    }

    pub fn auth_state(&self) -> AuthState {
        self.session.auth_state()
    }

    pub fn session(&self) -> &AuthSession<C> {
        &self.session
    }

    pub fn flow(&self) -> &OAuthFlow<C> {
        &self.flow
    }

    /// Stop publishing state changes; pending work finishes silently.
    pub fn dispose(&self) {
        self.session.dispose();
    }
}

fn into_domain<E>(err: E) -> NimaError
where
    InfraError: From<E>,
{
    InfraError::from(err).into()
}
