//! Generic keychain provider for secure credential storage
//!
//! This module exposes a thin wrapper over the platform keychain for storing
//! arbitrary secrets across macOS (Keychain Access), Windows (Credential
//! Manager), and Linux (kernel keyutils).
//!
//! ## Module Relationships
//!
//! - This module (`security::keychain`): generic secret storage
//! - `security::chunked`: splits oversized values across several entries
//! - `auth::token_store`: credential record persistence on top of chunking
//!
//! ## Usage
//!
//! ```no_run
//! use nima_common::security::KeychainProvider;
//!
//! let keychain = KeychainProvider::new("Nima.auth");
//! keychain.set_secret("service_account", "super-secret")?;
//! let secret = keychain.get_secret("service_account")?;
//! assert_eq!(secret, "super-secret");
//! # Ok::<(), nima_common::security::KeychainError>(())
//! ```

#[cfg(feature = "platform")]
use keyring::Entry;
use thiserror::Error;
#[cfg(feature = "platform")]
use tracing::debug;

#[cfg(feature = "platform")]
use super::traits::SecureStorage;

/// Platform keychain provider scoped to one service name.
#[cfg(feature = "platform")]
pub struct KeychainProvider {
    service_name: String,
}

#[cfg(feature = "platform")]
impl KeychainProvider {
    /// Create a new keychain provider for a specific service
    ///
    /// # Examples
    /// ```
    /// use nima_common::security::KeychainProvider;
    ///
    /// let keychain = KeychainProvider::new("Nima.auth");
    /// assert_eq!(keychain.service_name(), "Nima.auth");
    /// ```
    pub fn new(service_name: impl Into<String>) -> Self {
        Self { service_name: service_name.into() }
    }

    /// Service identifier every entry is stored under.
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Store a secret value in the platform keychain
    ///
    /// # Errors
    /// Returns `KeychainError::AccessFailed` if keychain access fails
    pub fn set_secret(&self, key: &str, value: &str) -> Result<(), KeychainError> {
        debug!(service = %self.service_name, key = %key, "Storing secret in keychain");

        let entry = self.create_entry(key)?;
        entry.set_password(value).map_err(|e| {
            KeychainError::AccessFailed(format!("Failed to store secret for {key}: {e}"))
        })?;

        Ok(())
    }

    /// Retrieve a secret value from the platform keychain
    ///
    /// # Errors
    /// Returns `KeychainError::NotFound` if secret doesn't exist
    /// Returns `KeychainError::AccessFailed` if keychain access fails
    pub fn get_secret(&self, key: &str) -> Result<String, KeychainError> {
        debug!(service = %self.service_name, key = %key, "Retrieving secret from keychain");

        let entry = self.create_entry(key)?;
        entry.get_password().map_err(|e| {
            if matches!(e, keyring::Error::NoEntry) {
                KeychainError::NotFound
            } else {
                KeychainError::AccessFailed(format!("Failed to retrieve secret for {key}: {e}"))
            }
        })
    }

    /// Delete a secret from the platform keychain (idempotent)
    ///
    /// # Errors
    /// Returns `KeychainError::AccessFailed` if the entry exists but cannot be
    /// removed
    pub fn delete_secret(&self, key: &str) -> Result<(), KeychainError> {
        debug!(service = %self.service_name, key = %key, "Deleting secret from keychain");

        let entry = self.create_entry(key)?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(KeychainError::AccessFailed(format!(
                "Failed to delete secret for {key}: {e}"
            ))),
        }
    }

    /// Check if a secret exists in the keychain
    #[must_use]
    pub fn secret_exists(&self, key: &str) -> bool {
        self.create_entry(key).is_ok_and(|entry| entry.get_password().is_ok())
    }

    fn create_entry(&self, account: &str) -> Result<Entry, KeychainError> {
        Entry::new(&self.service_name, account).map_err(|e| {
            KeychainError::AccessFailed(format!("Failed to create keychain entry: {e}"))
        })
    }
}

#[cfg(feature = "platform")]
impl SecureStorage for KeychainProvider {
    fn set_item(&self, key: &str, value: &str) -> Result<(), KeychainError> {
        self.set_secret(key, value)
    }

    fn get_item(&self, key: &str) -> Result<Option<String>, KeychainError> {
        match self.get_secret(key) {
            Ok(value) => Ok(Some(value)),
            Err(KeychainError::NotFound) => Ok(None),
            Err(other) => Err(other),
        }
    }

    fn delete_item(&self, key: &str) -> Result<(), KeychainError> {
        self.delete_secret(key)
    }
}

#[cfg(feature = "platform")]
impl std::fmt::Debug for KeychainProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeychainProvider").field("service_name", &self.service_name).finish()
    }
}

/// Keychain error types
#[derive(Debug, Error)]
pub enum KeychainError {
    /// Keychain access failed (permission denied, not available, etc.)
    #[error("Keychain access failed: {0}")]
    AccessFailed(String),

    /// Entry not found in keychain
    #[error("Entry not found")]
    NotFound,

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(all(test, feature = "platform"))]
mod tests {
    //! Unit tests for security::keychain.
    use super::*;

    /// Create a test service name to avoid conflicts with real keychain entries
    fn test_service_name() -> String {
        format!("NimaTest.{}", uuid::Uuid::new_v4())
    }

    #[test]
    fn test_keychain_provider_creation() {
        let keychain = KeychainProvider::new("test-service");
        assert_eq!(keychain.service_name(), "test-service");
    }

    /// Validates `KeychainProvider::delete_item` behavior for the missing
    /// entry scenario.
    ///
    /// Assertion coverage: deleting a key that was never written succeeds.
    #[test]
    fn test_delete_missing_entry_is_noop() {
        let keychain = KeychainProvider::new(test_service_name());
        assert!(keychain.delete_item("never.written").is_ok());
    }

    #[test]
    fn test_debug_hides_nothing_sensitive() {
        let keychain = KeychainProvider::new("Nima.auth");
        let rendered = format!("{keychain:?}");
        assert_eq!(rendered, "KeychainProvider { service_name: \"Nima.auth\" }");
    }
}
