//! Transparent chunking for values larger than one secure-storage entry.
//!
//! A value stored under `base` is laid out as:
//!
//! ```text
//! {base}_chunks  -> "N"            (decimal fragment count)
//! {base}_0       -> fragment 0
//! ...
//! {base}_{N-1}   -> fragment N-1
//! ```
//!
//! Reads fail closed: if the count marker is absent or unparsable, or any
//! fragment is missing, the value is reported absent. Partial data is never
//! returned.

use std::sync::Arc;

use tracing::{debug, warn};

use super::keychain::KeychainError;
use super::traits::SecureStorage;

/// Fragment size in bytes, kept safely below the 2 KB per-entry ceiling of
/// mobile secure stores.
pub const DEFAULT_CHUNK_SIZE: usize = 1800;

/// Smallest usable fragment size; a UTF-8 scalar is at most 4 bytes.
const MIN_CHUNK_SIZE: usize = 4;

const CHUNK_COUNT_SUFFIX: &str = "_chunks";

/// Chunking layer over any [`SecureStorage`] backend.
pub struct ChunkedStore<S: SecureStorage + ?Sized> {
    storage: Arc<S>,
    chunk_size: usize,
}

impl<S: SecureStorage + ?Sized> ChunkedStore<S> {
    /// Wrap `storage` using [`DEFAULT_CHUNK_SIZE`].
    pub fn new(storage: Arc<S>) -> Self {
        Self::with_chunk_size(storage, DEFAULT_CHUNK_SIZE)
    }

    /// Wrap `storage` with a custom fragment size (clamped to at least 4
    /// bytes).
    pub fn with_chunk_size(storage: Arc<S>, chunk_size: usize) -> Self {
        Self { storage, chunk_size: chunk_size.max(MIN_CHUNK_SIZE) }
    }

    /// Fragment size in bytes.
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Underlying storage backend.
    #[must_use]
    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Store `value` under `key`, splitting it into fragments.
    ///
    /// Every fragment of the previous value is removed first, so shrinking a
    /// value never leaves stale higher-index fragments behind. The count
    /// marker is written before the fragments; an interrupted write therefore
    /// reads back as absent rather than truncated.
    ///
    /// # Errors
    /// Propagates the first storage error encountered.
    pub fn set_large_value(&self, key: &str, value: &str) -> Result<(), KeychainError> {
        self.delete_large_value(key)?;

        let chunks = split_chunks(value, self.chunk_size);
        debug!(key = %key, chunks = chunks.len(), bytes = value.len(), "Writing chunked value");

        self.storage.set_item(&count_key(key), &chunks.len().to_string())?;
        for (index, chunk) in chunks.iter().enumerate() {
            self.storage.set_item(&chunk_key(key, index), chunk)?;
        }

        Ok(())
    }

    /// Read the value stored under `key`.
    ///
    /// Returns `Ok(None)` when the marker is absent or unparsable, or when any
    /// fragment is missing.
    ///
    /// # Errors
    /// Propagates storage read errors.
    pub fn get_large_value(&self, key: &str) -> Result<Option<String>, KeychainError> {
        let Some(count) = self.read_count(key)? else {
            return Ok(None);
        };

        let mut value = String::new();
        for index in 0..count {
            match self.storage.get_item(&chunk_key(key, index))? {
                Some(chunk) => value.push_str(&chunk),
                None => {
                    warn!(key = %key, index, count, "Chunked value is missing a fragment");
                    return Ok(None);
                }
            }
        }

        Ok(Some(value))
    }

    /// Remove every fragment and the count marker for `key`. No-op when the
    /// marker is absent.
    ///
    /// # Errors
    /// Propagates storage delete errors.
    pub fn delete_large_value(&self, key: &str) -> Result<(), KeychainError> {
        let Some(count) = self.read_count(key)? else {
            return Ok(());
        };

        for index in 0..count {
            self.storage.delete_item(&chunk_key(key, index))?;
        }
        self.storage.delete_item(&count_key(key))?;

        debug!(key = %key, chunks = count, "Deleted chunked value");
        Ok(())
    }

    fn read_count(&self, key: &str) -> Result<Option<usize>, KeychainError> {
        let Some(raw) = self.storage.get_item(&count_key(key))? else {
            return Ok(None);
        };

        match raw.trim().parse::<usize>() {
            Ok(count) => Ok(Some(count)),
            Err(_) => {
                warn!(key = %key, "Chunk count marker is not a number");
                Ok(None)
            }
        }
    }
}

fn count_key(key: &str) -> String {
    format!("{key}{CHUNK_COUNT_SUFFIX}")
}

fn chunk_key(key: &str, index: usize) -> String {
    format!("{key}_{index}")
}

/// Split on UTF-8 boundaries so no fragment exceeds `size` bytes.
fn split_chunks(value: &str, size: usize) -> Vec<&str> {
    let mut chunks = Vec::with_capacity(value.len() / size + 1);
    let mut start = 0;

    while start < value.len() {
        let mut end = (start + size).min(value.len());
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        chunks.push(&value[start..end]);
        start = end;
    }

    chunks
}
