//! Credential persistence on top of chunked secure storage
//!
//! The credential is written as one versioned JSON record under the chunked
//! key `credential`. Installs that still carry the older three-key layout
//! (`access_token` and `refresh_token` chunked, `user_info` as a single
//! entry) are migrated on first load.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::types::{StoredCredential, UserInfo};
use crate::security::{ChunkedStore, KeychainError, SecureStorage};

/// Chunked key holding the versioned credential record.
pub const CREDENTIAL_KEY: &str = "credential";

/// Current record format.
pub const RECORD_VERSION: u32 = 1;

const LEGACY_ACCESS_TOKEN_KEY: &str = "access_token";
const LEGACY_REFRESH_TOKEN_KEY: &str = "refresh_token";
const LEGACY_USER_INFO_KEY: &str = "user_info";

#[derive(Serialize, Deserialize)]
struct CredentialRecord {
    version: u32,
    #[serde(flatten)]
    credential: StoredCredential,
}

/// Persists the signed-in credential.
pub struct CredentialStore {
    chunks: ChunkedStore<dyn SecureStorage>,
}

impl CredentialStore {
    pub fn new(storage: Arc<dyn SecureStorage>) -> Self {
        Self { chunks: ChunkedStore::new(storage) }
    }

    /// Store with a custom fragment size.
    pub fn with_chunk_size(storage: Arc<dyn SecureStorage>, chunk_size: usize) -> Self {
        Self { chunks: ChunkedStore::with_chunk_size(storage, chunk_size) }
    }

    /// Replace the stored credential.
    ///
    /// # Errors
    /// Returns `KeychainError` if serialization or any storage write fails.
    pub fn save(&self, credential: &StoredCredential) -> Result<(), KeychainError> {
        let record = CredentialRecord { version: RECORD_VERSION, credential: credential.clone() };
        let json = serde_json::to_string(&record)?;

        self.chunks.set_large_value(CREDENTIAL_KEY, &json)?;
        debug!(user_id = %credential.user.id, "Credential saved");
        Ok(())
    }

    /// Load the stored credential, if any.
    ///
    /// An undecodable record or unknown version reads as `None`.
    ///
    /// # Errors
    /// Returns `KeychainError` if the storage backend fails.
    pub fn load(&self) -> Result<Option<StoredCredential>, KeychainError> {
        if let Some(raw) = self.chunks.get_large_value(CREDENTIAL_KEY)? {
            return Ok(decode_record(&raw));
        }

        self.load_legacy()
    }

    /// Delete the credential in both the current and legacy layouts.
    ///
    /// # Errors
    /// Returns `KeychainError` if any delete fails.
    pub fn clear(&self) -> Result<(), KeychainError> {
        self.chunks.delete_large_value(CREDENTIAL_KEY)?;
        self.clear_legacy()?;
        debug!("Credential cleared");
        Ok(())
    }

    fn load_legacy(&self) -> Result<Option<StoredCredential>, KeychainError> {
        let access_token = self.chunks.get_large_value(LEGACY_ACCESS_TOKEN_KEY)?;
        let refresh_token = self.chunks.get_large_value(LEGACY_REFRESH_TOKEN_KEY)?;
        let user_info = self.chunks.storage().get_item(LEGACY_USER_INFO_KEY)?;

        let (Some(access_token), Some(refresh_token), Some(user_info)) =
            (access_token, refresh_token, user_info)
        else {
            return Ok(None);
        };

        let user: UserInfo = match serde_json::from_str(&user_info) {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "Legacy user profile is not valid JSON");
                return Ok(None);
            }
        };

        let credential = StoredCredential { access_token, refresh_token, user };
        match self.save(&credential).and_then(|()| self.clear_legacy()) {
            Ok(()) => info!("Migrated legacy credential layout"),
            Err(e) => warn!(error = %e, "Legacy credential migration failed"),
        }

        Ok(Some(credential))
    }

    fn clear_legacy(&self) -> Result<(), KeychainError> {
        self.chunks.delete_large_value(LEGACY_ACCESS_TOKEN_KEY)?;
        self.chunks.delete_large_value(LEGACY_REFRESH_TOKEN_KEY)?;
        self.chunks.storage().delete_item(LEGACY_USER_INFO_KEY)
    }
}

fn decode_record(raw: &str) -> Option<StoredCredential> {
    match serde_json::from_str::<CredentialRecord>(raw) {
        Ok(record) if record.version == RECORD_VERSION => Some(record.credential),
        Ok(record) => {
            warn!(version = record.version, "Unknown credential record version");
            None
        }
        Err(e) => {
            warn!(error = %e, "Stored credential record is corrupt");
            None
        }
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore").field("chunk_size", &self.chunks.chunk_size()).finish()
    }
}
