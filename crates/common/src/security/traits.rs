//! Trait abstractions for security components
//!
//! Storage backends implement [`SecureStorage`] so the chunking and
//! credential layers can run against the platform keychain in production and
//! an in-memory map in tests.

use super::keychain::KeychainError;

/// Key/value secret storage with a per-entry size ceiling.
///
/// Implementations must be durable once a call returns `Ok`. A missing key is
/// not an error: `get_item` returns `Ok(None)` and `delete_item` is a no-op.
pub trait SecureStorage: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    /// Returns `KeychainError` if the backend rejects the write.
    fn set_item(&self, key: &str, value: &str) -> Result<(), KeychainError>;

    /// Read the value stored under `key`.
    ///
    /// # Errors
    /// Returns `KeychainError` if the backend cannot be read.
    fn get_item(&self, key: &str) -> Result<Option<String>, KeychainError>;

    /// Remove `key` (idempotent).
    ///
    /// # Errors
    /// Returns `KeychainError` if the backend rejects the delete.
    fn delete_item(&self, key: &str) -> Result<(), KeychainError>;
}
