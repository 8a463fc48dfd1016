//! Security primitives and utilities
//!
//! Device-level secret storage and the chunking layer that lets values larger
//! than a single keychain entry be stored transparently.

pub mod chunked;
pub mod keychain;
pub mod traits;

pub use chunked::{ChunkedStore, DEFAULT_CHUNK_SIZE};
pub use keychain::KeychainError;
#[cfg(feature = "platform")]
pub use keychain::KeychainProvider;
pub use traits::SecureStorage;
