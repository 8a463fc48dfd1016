//! Testing utilities and helpers
//!
//! - **[`mocks`]**: in-memory secure storage, scripted token client, and
//!   scripted browser session
//! - **[`fixtures`]**: deterministic users, credentials, and JWTs
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use nima_common::auth::CredentialStore;
//! use nima_common::testing::{sample_credential, MockSecureStorage};
//!
//! let storage = Arc::new(MockSecureStorage::new());
//! let store = CredentialStore::new(storage.clone());
//! store.save(&sample_credential())?;
//! assert!(storage.write_count() > 0);
//! # Ok::<(), nima_common::security::KeychainError>(())
//! ```

pub mod fixtures;
pub mod mocks;

pub use fixtures::{jwt_with_exp, sample_credential, sample_user, FAR_FUTURE_EXP};
pub use mocks::{ExchangeCall, MockBrowserSession, MockSecureStorage, MockTokenClient};
