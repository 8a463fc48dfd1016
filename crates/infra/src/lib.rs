//! # Nima Infrastructure
//!
//! Platform-facing pieces of the Nima auth stack.
//!
//! This crate contains:
//! - Configuration loading (environment variables, TOML/JSON files)
//! - The system browser session with a loopback redirect listener
//! - `AuthContext`, which wires keychain, token client, flow, and session
//! - Error conversions into `NimaError`
//! - Tracing subscriber initialization
//!
//! ## Architecture
//! - Implements the seams defined in `nima-common::auth`
//! - Depends on `nima-common` and `nima-domain`
//! - Contains all "impure" code (keychain, sockets, browser launch)

pub mod auth;
pub mod config;
pub mod errors;
pub mod observability;

// Re-export commonly used items
pub use auth::{AuthContext, SystemBrowser};
pub use errors::InfraError;
pub use observability::{init_tracing, LogFormat};
