//! # Nima Domain
//!
//! Domain types shared by the Nima authentication crates.
//!
//! This crate contains:
//! - Application error type and Result definition
//! - Authentication configuration structure
//! - Domain constants (defaults for optional settings)
//!
//! ## Architecture
//! - No dependencies on other Nima crates
//! - Only external dependencies allowed
//! - Pure data structures

pub mod config;
pub mod constants;
pub mod errors;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
