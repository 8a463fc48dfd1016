//! Authentication session
//!
//! [`AuthSession`] owns the in-memory credential and the observable
//! [`AuthState`], and hands out access tokens to the rest of the app. A
//! session is built explicitly, shared by cloning, and shut down with
//! [`AuthSession::dispose`].
//!
//! ## Refresh coalescing
//!
//! At most one refresh request is in flight per session. Callers arriving
//! while it runs await the same shared future and observe the same outcome.
//!
//! ## Lifecycle
//!
//! ```text
//! Bootstrapping -> Authenticated | Unauthenticated
//! Authenticated -> Unauthenticated   (sign-out, refresh failure)
//! Unauthenticated -> Authenticated   (sign-in)
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use super::client::TokenExchangeClient;
use super::flow::{FlowError, OAuthFlow};
use super::jwt::is_token_expired;
use super::token_store::CredentialStore;
use super::traits::TokenClientTrait;
use super::types::{AuthState, SignInMode, StoredCredential, UserInfo};
use crate::security::KeychainError;

type RefreshFuture = Shared<BoxFuture<'static, Option<String>>>;

/// Session errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session has been disposed")]
    Disposed,

    #[error(transparent)]
    Flow(#[from] FlowError),

    #[error("credential storage failed: {0}")]
    Storage(#[from] KeychainError),
}

/// Authentication session handle
///
/// Cloning is cheap; clones share the same state.
pub struct AuthSession<C: TokenClientTrait + 'static = TokenExchangeClient> {
    inner: Arc<SessionInner<C>>,
}

struct SessionInner<C: TokenClientTrait + 'static> {
    store: Arc<CredentialStore>,
    client: Arc<C>,
    credential: RwLock<Option<StoredCredential>>,
    state: watch::Sender<AuthState>,
    in_flight: Mutex<Option<RefreshFuture>>,
    /// Bumped whenever the credential is replaced or removed outside a
    /// refresh; a refresh that started under an older epoch is discarded.
    epoch: AtomicU64,
    disposed: AtomicBool,
}

impl<C: TokenClientTrait + 'static> Clone for AuthSession<C> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<C: TokenClientTrait + 'static> AuthSession<C> {
    /// Create a session in the loading state. Call [`Self::bootstrap`] next.
    pub fn new(store: Arc<CredentialStore>, client: Arc<C>) -> Self {
        let (state, _) = watch::channel(AuthState::loading());

        Self {
            inner: Arc::new(SessionInner {
                store,
                client,
                credential: RwLock::new(None),
                state,
                in_flight: Mutex::new(None),
                epoch: AtomicU64::new(0),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// Restore the persisted session
    ///
    /// Makes no network call when there is no credential or when the access
    /// token is still fresh. An expired token is refreshed once; if that
    /// fails the stored credential is cleared. Storage read failures are
    /// treated as signed out.
    pub async fn bootstrap(&self) -> AuthState {
        if self.is_disposed() {
            return self.auth_state();
        }

        let loaded = match self.inner.store.load() {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(error = %e, "Could not read stored credential");
                None
            }
        };

        let Some(credential) = loaded else {
            debug!("No stored credential");
            self.inner.publish(AuthState::unauthenticated());
            return self.auth_state();
        };

        let expired = is_token_expired(&credential.access_token);
        let user = credential.user.clone();
        *self.inner.credential.write().await = Some(credential);

        if expired {
            info!("Stored access token expired, refreshing");
            self.refresh_coalesced().await;
        } else {
            info!(user_id = %user.id, "Session restored");
            self.inner.publish(AuthState::authenticated(user));
        }

        self.auth_state()
    }

    /// Current access token, refreshed first when expired or when
    /// `force_refresh` is set
    ///
    /// Returns `None` when signed out, disposed, or when the refresh fails
    /// (which also signs the session out).
    pub async fn fetch_access_token(&self, force_refresh: bool) -> Option<String> {
        if self.is_disposed() {
            return None;
        }

        let access_token = {
            let guard = self.inner.credential.read().await;
            guard.as_ref()?.access_token.clone()
        };

        if !force_refresh && !is_token_expired(&access_token) {
            return Some(access_token);
        }

        self.refresh_coalesced().await
    }

    /// Run the interactive flow and adopt its credential
    ///
    /// Returns the signed-in user, or `None` when the user cancelled.
    ///
    /// # Errors
    /// Returns `SessionError::Disposed` after [`Self::dispose`], or the flow
    /// error when the exchange or persistence fails.
    pub async fn sign_in<F: TokenClientTrait>(
        &self,
        flow: &OAuthFlow<F>,
        mode: SignInMode,
    ) -> Result<Option<UserInfo>, SessionError> {
        if self.is_disposed() {
            return Err(SessionError::Disposed);
        }

        let Some(success) = flow.launch_auth(mode).await? else {
            return Ok(None);
        };

        let user = success.credential.user.clone();
        let mut guard = self.inner.credential.write().await;
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        // a refresh of the previous credential may have written over the flow's save
        if let Err(e) = self.inner.store.save(&success.credential) {
            error!(error = %e, "Failed to persist signed-in credential");
        }
        *guard = Some(success.credential);
        self.inner.publish(AuthState::authenticated(user.clone()));
        drop(guard);

        info!(user_id = %user.id, "Signed in");
        Ok(Some(user))
    }

    /// Forget the credential in memory and in storage
    ///
    /// # Errors
    /// Returns `SessionError::Storage` if the stored credential could not be
    /// deleted; the in-memory state is signed out regardless.
    pub async fn sign_out(&self) -> Result<(), SessionError> {
        if self.is_disposed() {
            return Err(SessionError::Disposed);
        }

        let mut guard = self.inner.credential.write().await;
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        *guard = None;
        self.inner.publish(AuthState::unauthenticated());

        let cleared = self.inner.store.clear();
        drop(guard);
        cleared?;
        info!("Signed out");
        Ok(())
    }

    /// Snapshot of the current state
    #[must_use]
    pub fn auth_state(&self) -> AuthState {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every state change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    /// Stop serving tokens. The last published state is kept.
    pub fn dispose(&self) {
        if !self.inner.disposed.swap(true, Ordering::SeqCst) {
            debug!("Auth session disposed");
        }
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    async fn refresh_coalesced(&self) -> Option<String> {
        let refresh = {
            let mut slot = self.inner.in_flight.lock().await;
            match slot.as_ref() {
                Some(pending) => {
                    debug!("Joining in-flight refresh");
                    pending.clone()
                }
                None => {
                    let inner = Arc::clone(&self.inner);
                    let fut = async move { inner.refresh_once().await }.boxed().shared();
                    *slot = Some(fut.clone());
                    fut
                }
            }
        };

        refresh.await
    }
}

impl<C: TokenClientTrait + 'static> SessionInner<C> {
    async fn refresh_once(self: Arc<Self>) -> Option<String> {
        let result = self.perform_refresh().await;
        *self.in_flight.lock().await = None;
        result
    }

    async fn perform_refresh(&self) -> Option<String> {
        let epoch = self.epoch.load(Ordering::SeqCst);
        let current = self.credential.read().await.clone()?;

        let Some(grant) = self.client.refresh(&current.refresh_token).await else {
            warn!("Token refresh failed, signing out");
            self.invalidate(epoch).await;
            return None;
        };

        // held through persistence so sign-in and sign-out cannot interleave
        let mut guard = self.credential.write().await;
        if self.epoch.load(Ordering::SeqCst) != epoch || self.disposed.load(Ordering::SeqCst) {
            debug!("Discarding refresh result for a replaced session");
            return None;
        }

        let updated = current.merged_with(grant);
        if let Err(e) = self.store.save(&updated) {
            error!(error = %e, "Failed to persist refreshed credential");
        }

        let access_token = updated.access_token.clone();
        let user = updated.user.clone();
        *guard = Some(updated);
        self.publish(AuthState::authenticated(user));
        drop(guard);

        debug!("Access token refreshed");
        Some(access_token)
    }

    async fn invalidate(&self, epoch: u64) {
        let mut guard = self.credential.write().await;
        if self.epoch.load(Ordering::SeqCst) != epoch || self.disposed.load(Ordering::SeqCst) {
            return;
        }

        if let Err(e) = self.store.clear() {
            error!(error = %e, "Failed to clear stored credential");
        }
        *guard = None;
        self.publish(AuthState::unauthenticated());
    }

    fn publish(&self, state: AuthState) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        info!(
            authenticated = state.is_authenticated,
            loading = state.is_loading,
            "Auth state changed"
        );
        self.state.send_replace(state);
    }
}

impl<C: TokenClientTrait + 'static> std::fmt::Debug for AuthSession<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("state", &*self.inner.state.borrow())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
