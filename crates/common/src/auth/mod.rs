//! OAuth 2.0 + PKCE authentication
//!
//! Everything needed to sign a user in through a hosted authorization page
//! and keep their session alive.
//!
//! # Features
//!
//! - **PKCE Flow**: RFC 7636 S256 challenges from the OS random source
//! - **Credential Storage**: one versioned record in chunked secure storage,
//!   with migration from the older three-key layout
//! - **Coalesced Refresh**: concurrent token requests share one refresh call
//! - **Observable State**: `watch` channel of [`AuthState`]
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   AuthSession   │  bootstrap, token accessor, sign-in/out
//! └────────┬────────┘
//!          │
//!          ├──► OAuthFlow           (authorize URL, browser, redirect)
//!          │         │
//!          │         ├──► PKCE utilities     (challenge generation)
//!          │         └──► BrowserSession     (system browser adapter)
//!          │
//!          ├──► TokenExchangeClient (code + refresh grants)
//!          │
//!          └──► CredentialStore     (versioned record)
//!                    │
//!                    └──► ChunkedStore ──► SecureStorage (keychain)
//! ```
//!
//! # Usage Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use nima_common::auth::{AuthSession, CredentialStore, TokenExchangeClient};
//! use nima_common::security::KeychainProvider;
//!
//! #[tokio::main]
//! async fn main() {
//!     let keychain = Arc::new(KeychainProvider::new("Nima.auth"));
//!     let store = Arc::new(CredentialStore::new(keychain));
//!     let client = Arc::new(TokenExchangeClient::new(
//!         "client_123",
//!         "https://api.example.com/auth/token",
//!     ));
//!
//!     let session = AuthSession::new(store, client);
//!     let state = session.bootstrap().await;
//!
//!     if state.is_authenticated {
//!         let _token = session.fetch_access_token(false).await;
//!     }
//!
//!     session.dispose();
//! }
//! ```

pub mod client;
pub mod flow;
pub mod jwt;
pub mod pkce;
pub mod session;
pub mod token_store;
pub mod traits;
pub mod types;

pub use client::{TokenExchangeClient, TokenExchangeError};
pub use flow::{AuthSuccess, FlowError, FlowState, OAuthFlow};
pub use jwt::{decode_expiry, is_token_expired, EXPIRY_MARGIN_SECS};
pub use pkce::{PKCEChallenge, PkceError};
pub use session::{AuthSession, SessionError};
pub use token_store::CredentialStore;
pub use traits::{BrowserResult, BrowserSession, TokenClientTrait};
pub use types::{
    AuthState, OAuthConfig, SignInMode, StoredCredential, TokenGrant, TokenResponse, UserInfo,
};
