//! System browser session with a loopback redirect listener.
//!
//! Opens the authorization URL in the user's default browser and serves the
//! registered redirect URI on the local machine until the provider redirects
//! back. The full callback URL is handed to the flow driver untouched; code
//! and state validation happen there.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::RawQuery;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use nima_common::auth::{BrowserResult, BrowserSession};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

/// Opens a URL outside the process
pub type Launcher = Arc<dyn Fn(&str) -> std::io::Result<()> + Send + Sync>;

const SUCCESS_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Sign-in Complete</title></head>
<body><h1>Sign-in Complete</h1><p>You can close this window and return to Nima.</p></body>
</html>"#;

const FAILURE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Sign-in Failed</title></head>
<body><h1>Sign-in Failed</h1><p>The authorization server did not return a code.</p></body>
</html>"#;

/// [`BrowserSession`] backed by the system browser and a loopback listener
///
/// The redirect URI must point at this machine (`http://127.0.0.1:PORT/path`
/// or `http://localhost:PORT/path`). With a timeout configured, a session that
/// never redirects back resolves to [`BrowserResult::Dismiss`].
pub struct SystemBrowser {
    timeout: Option<Duration>,
    launcher: Launcher,
}

impl SystemBrowser {
    pub fn new() -> Self {
        Self { timeout: None, launcher: Arc::new(|url: &str| open::that(url)) }
    }

    /// Give up waiting for the redirect after `timeout`
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Replace the default `open::that` launcher
    #[must_use]
    pub fn with_launcher<F>(mut self, launcher: F) -> Self
    where
        F: Fn(&str) -> std::io::Result<()> + Send + Sync + 'static,
    {
        self.launcher = Arc::new(launcher);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl Default for SystemBrowser {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SystemBrowser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemBrowser").field("timeout", &self.timeout).finish_non_exhaustive()
    }
}

#[async_trait]
impl BrowserSession for SystemBrowser {
    async fn open_auth_session(&self, auth_url: &Url, redirect_uri: &str) -> BrowserResult {
        let redirect = match Url::parse(redirect_uri) {
            Ok(url) => url,
            Err(err) => return BrowserResult::Error(format!("invalid redirect URI: {err}")),
        };

        let mut server = match CallbackServer::start(&redirect).await {
            Ok(server) => server,
            Err(reason) => return BrowserResult::Error(reason),
        };

        info!(port = server.port, "Opening system browser for authorization");
        if let Err(err) = (self.launcher)(auth_url.as_str()) {
            server.shutdown().await;
            return BrowserResult::Error(format!("failed to open browser: {err}"));
        }

        let result = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, server.wait_for_callback()).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(timeout_secs = timeout.as_secs(), "Timed out waiting for redirect");
                    BrowserResult::Dismiss
                }
            },
            None => server.wait_for_callback().await,
        };

        server.shutdown().await;
        result
    }
}

/// Loopback HTTP server bound to the redirect URI's host and port
struct CallbackServer {
    port: u16,
    callback_rx: Option<oneshot::Receiver<String>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl CallbackServer {
    async fn start(redirect: &Url) -> Result<Self, String> {
        let host = redirect
            .host_str()
            .ok_or_else(|| "redirect URI has no host".to_string())?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = redirect
            .port_or_known_default()
            .ok_or_else(|| "redirect URI has no port".to_string())?;

        let listener = TcpListener::bind((host.as_str(), port))
            .await
            .map_err(|err| format!("failed to bind redirect listener on {host}:{port}: {err}"))?;
        let port = listener
            .local_addr()
            .map_err(|err| format!("failed to determine listener port: {err}"))?
            .port();

        let mut base = redirect.clone();
        base.set_query(None);
        base.set_fragment(None);
        let route_path = if redirect.path().is_empty() { "/" } else { redirect.path() };

        let (callback_tx, callback_rx) = oneshot::channel();
        let callback_tx = Arc::new(Mutex::new(Some(callback_tx)));

        let app = Router::new().route(
            route_path,
            get(move |query: RawQuery| handle_callback(query, base.clone(), callback_tx.clone())),
        );

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
            {
                error!("Redirect listener error: {}", err);
            }
        });

        debug!(port, path = route_path, "Redirect listener started");

        Ok(Self {
            port,
            callback_rx: Some(callback_rx),
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    async fn wait_for_callback(&mut self) -> BrowserResult {
        let Some(rx) = self.callback_rx.as_mut() else {
            return BrowserResult::Error("redirect already consumed".to_string());
        };

        match rx.await {
            Ok(url) => {
                self.callback_rx = None;
                BrowserResult::Success { url }
            }
            Err(_) => BrowserResult::Error("redirect listener stopped".to_string()),
        }
    }

    async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                if err.is_panic() {
                    error!("Redirect listener panicked: {err}");
                }
            }
        }
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if !handle.is_finished() {
                handle.abort();
            }
        }
    }
}

async fn handle_callback(
    RawQuery(query): RawQuery,
    mut callback: Url,
    callback_tx: Arc<Mutex<Option<oneshot::Sender<String>>>>,
) -> Html<&'static str> {
    callback.set_query(query.as_deref());
    let has_code = callback.query_pairs().any(|(key, value)| key == "code" && !value.is_empty());

    match callback_tx.lock().await.take() {
        Some(tx) => {
            let _ = tx.send(callback.into());
        }
        None => debug!("Ignoring repeated redirect"),
    }

    if has_code {
        Html(SUCCESS_PAGE)
    } else {
        Html(FAILURE_PAGE)
    }
}
