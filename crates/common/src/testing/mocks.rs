//! Mock implementations of the auth seams
//!
//! Provides in-memory stand-ins for the platform keychain, the token
//! endpoint, and the system browser.

#![allow(clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use url::Url;

use crate::auth::{
    BrowserResult, BrowserSession, StoredCredential, TokenClientTrait, TokenExchangeError,
    TokenGrant,
};
use crate::security::{KeychainError, SecureStorage};

/// In-memory [`SecureStorage`] with write counting and failure injection
///
/// # Examples
///
/// ```
/// use nima_common::security::SecureStorage;
/// use nima_common::testing::MockSecureStorage;
///
/// let storage = MockSecureStorage::new();
/// storage.set_item("key1", "value1")?;
///
/// assert_eq!(storage.get_item("key1")?, Some("value1".to_string()));
/// assert_eq!(storage.write_count(), 1);
/// # Ok::<(), nima_common::security::KeychainError>(())
/// ```
#[derive(Debug, Default)]
pub struct MockSecureStorage {
    data: Mutex<HashMap<String, String>>,
    writes: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    write_delay: Mutex<Option<Duration>>,
}

impl MockSecureStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `get_item` fail with `AccessFailed`
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `set_item` and `delete_item` fail with
    /// `AccessFailed`
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Block the calling thread for `delay` inside every `set_item`, like a
    /// slow keychain daemon
    pub fn set_write_delay(&self, delay: Duration) {
        *self.write_delay.lock() = Some(delay);
    }

    /// Number of successful `set_item` calls
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Read a key directly, bypassing failure injection
    pub fn raw_get(&self, key: &str) -> Option<String> {
        self.data.lock().get(key).cloned()
    }

    /// Insert a key directly, bypassing counters and failure injection
    pub fn raw_insert(&self, key: &str, value: &str) {
        self.data.lock().insert(key.to_string(), value.to_string());
    }

    pub fn raw_remove(&self, key: &str) {
        self.data.lock().remove(key);
    }

    /// All stored keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.data.lock().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl SecureStorage for MockSecureStorage {
    fn set_item(&self, key: &str, value: &str) -> Result<(), KeychainError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(KeychainError::AccessFailed(format!("injected write failure for {key}")));
        }
        let delay = *self.write_delay.lock();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        self.data.lock().insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn get_item(&self, key: &str) -> Result<Option<String>, KeychainError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(KeychainError::AccessFailed(format!("injected read failure for {key}")));
        }
        Ok(self.data.lock().get(key).cloned())
    }

    fn delete_item(&self, key: &str) -> Result<(), KeychainError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(KeychainError::AccessFailed(format!("injected delete failure for {key}")));
        }
        self.data.lock().remove(key);
        Ok(())
    }
}

/// Arguments of one recorded `exchange_code` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeCall {
    pub code: String,
    pub code_verifier: String,
    pub redirect_uri: String,
}

/// Scripted [`TokenClientTrait`] implementation
///
/// The exchange result is consumed by the first call; later calls report
/// `MissingTokens`. The refresh result is returned on every call and
/// defaults to `None`.
#[derive(Debug, Default)]
pub struct MockTokenClient {
    exchange_result: Mutex<Option<Result<StoredCredential, TokenExchangeError>>>,
    refresh_result: Mutex<Option<TokenGrant>>,
    exchange_calls: Mutex<Vec<ExchangeCall>>,
    refresh_calls: Mutex<Vec<String>>,
    delay: Mutex<Option<Duration>>,
}

impl MockTokenClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_exchange_result(&self, result: Result<StoredCredential, TokenExchangeError>) {
        *self.exchange_result.lock() = Some(result);
    }

    pub fn set_refresh_result(&self, result: Option<TokenGrant>) {
        *self.refresh_result.lock() = result;
    }

    /// Delay every call by `delay` before answering
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn exchange_calls(&self) -> Vec<ExchangeCall> {
        self.exchange_calls.lock().clone()
    }

    pub fn exchange_call_count(&self) -> usize {
        self.exchange_calls.lock().len()
    }

    /// Refresh tokens received, in call order
    pub fn refresh_calls(&self) -> Vec<String> {
        self.refresh_calls.lock().clone()
    }

    pub fn refresh_call_count(&self) -> usize {
        self.refresh_calls.lock().len()
    }

    async fn pause(&self) {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl TokenClientTrait for MockTokenClient {
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<StoredCredential, TokenExchangeError> {
        self.exchange_calls.lock().push(ExchangeCall {
            code: code.to_string(),
            code_verifier: code_verifier.to_string(),
            redirect_uri: redirect_uri.to_string(),
        });
        self.pause().await;

        let scripted = self.exchange_result.lock().take();
        scripted.unwrap_or(Err(TokenExchangeError::MissingTokens))
    }

    async fn refresh(&self, refresh_token: &str) -> Option<TokenGrant> {
        self.refresh_calls.lock().push(refresh_token.to_string());
        self.pause().await;

        self.refresh_result.lock().clone()
    }
}

#[derive(Debug, Clone)]
enum BrowserScript {
    /// Redirect to the redirect URI with this code and the request's state
    Code(String),
    Raw(String),
    Result(BrowserResult),
}

/// Scripted [`BrowserSession`] that records every URL it is asked to open
#[derive(Debug)]
pub struct MockBrowserSession {
    script: BrowserScript,
    delay: Option<Duration>,
    opened: Mutex<Vec<Url>>,
}

impl MockBrowserSession {
    fn scripted(script: BrowserScript) -> Self {
        Self { script, delay: None, opened: Mutex::new(Vec::new()) }
    }

    /// Complete the session by redirecting with `code`, echoing the `state`
    /// from the authorization URL
    pub fn redirect_with_code(code: impl Into<String>) -> Self {
        Self::scripted(BrowserScript::Code(code.into()))
    }

    /// Complete the session with a fixed callback URL
    pub fn redirect_raw(url: impl Into<String>) -> Self {
        Self::scripted(BrowserScript::Raw(url.into()))
    }

    pub fn cancel() -> Self {
        Self::scripted(BrowserScript::Result(BrowserResult::Cancel))
    }

    pub fn dismiss() -> Self {
        Self::scripted(BrowserScript::Result(BrowserResult::Dismiss))
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self::scripted(BrowserScript::Result(BrowserResult::Error(reason.into())))
    }

    /// Wait `delay` before answering
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Authorization URLs opened so far
    pub fn opened_urls(&self) -> Vec<Url> {
        self.opened.lock().clone()
    }
}

#[async_trait]
impl BrowserSession for MockBrowserSession {
    async fn open_auth_session(&self, auth_url: &Url, redirect_uri: &str) -> BrowserResult {
        self.opened.lock().push(auth_url.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.script {
            BrowserScript::Code(code) => {
                let Ok(mut callback) = Url::parse(redirect_uri) else {
                    return BrowserResult::Error(format!("invalid redirect URI {redirect_uri}"));
                };
                let state = auth_url
                    .query_pairs()
                    .find(|(key, _)| key == "state")
                    .map(|(_, value)| value.into_owned())
                    .unwrap_or_default();
                callback.query_pairs_mut().append_pair("code", code).append_pair("state", &state);
                BrowserResult::Success { url: callback.into() }
            }
            BrowserScript::Raw(url) => BrowserResult::Success { url: url.clone() },
            BrowserScript::Result(result) => result.clone(),
        }
    }
}
