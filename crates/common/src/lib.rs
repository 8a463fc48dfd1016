//! Authentication building blocks shared across Nima crates.
//!
//! # Safety and Quality
//!
//! This crate forbids `unsafe` and never logs secrets.
//!
//! # Feature Tiers
//!
//! - `runtime` (default): async auth infrastructure (token client, flow
//!   driver, session) and the in-memory test doubles
//! - `platform` (default): platform keychain storage via `keyring`
//! - `apple-native` / `windows-native` / `linux-native`: native keyring
//!   backends; without one `keyring` falls back to its in-process mock store
//! - `test-utils`: exposes [`testing`] to downstream crates

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod security;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod auth;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "runtime", feature = "test-utils"))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "runtime")]
pub use auth::{AuthSession, AuthState, CredentialStore, OAuthConfig, OAuthFlow, SignInMode};
#[cfg(feature = "platform")]
pub use security::KeychainProvider;
pub use security::{KeychainError, SecureStorage};
