//! PKCE (Proof Key for Code Exchange) implementation for OAuth 2.0
//!
//! Implements RFC 7636 for authorization without client secrets. Verifiers
//! are drawn from the operating system CSPRNG over the unreserved character
//! set `[A-Z] / [a-z] / [0-9] / "-" / "." / "_" / "~"`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Unreserved characters permitted in a code verifier (RFC 7636 §4.1).
const VERIFIER_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// Verifier length used by [`PKCEChallenge::generate`].
pub const DEFAULT_VERIFIER_LENGTH: usize = 64;

pub const MIN_VERIFIER_LENGTH: usize = 43;
pub const MAX_VERIFIER_LENGTH: usize = 128;

/// PKCE generation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PkceError {
    #[error("code verifier length {0} is outside 43..=128")]
    InvalidLength(usize),

    #[error("secure random source unavailable: {0}")]
    RandomSource(String),
}

/// Generate a code verifier of `length` characters from the unreserved set
///
/// # Errors
/// Returns `PkceError::InvalidLength` if `length` is outside 43..=128, or
/// `PkceError::RandomSource` if the OS random source fails.
pub fn generate_code_verifier(length: usize) -> Result<String, PkceError> {
    if !(MIN_VERIFIER_LENGTH..=MAX_VERIFIER_LENGTH).contains(&length) {
        return Err(PkceError::InvalidLength(length));
    }

    // Probe the OS source once so an unavailable RNG surfaces as an error
    // instead of a panic inside `gen_range`.
    let mut probe = [0u8; 1];
    OsRng.try_fill_bytes(&mut probe).map_err(|e| PkceError::RandomSource(e.to_string()))?;

    let mut rng = OsRng;
    let verifier = (0..length)
        .map(|_| char::from(VERIFIER_CHARSET[rng.gen_range(0..VERIFIER_CHARSET.len())]))
        .collect();

    Ok(verifier)
}

/// Generate code challenge from verifier using SHA256
///
/// Per RFC 7636, the challenge is BASE64URL(SHA256(ASCII(code_verifier)))
/// without padding.
#[must_use]
pub fn generate_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Generate a random state token for CSRF protection
///
/// Returns 32 random bytes as unpadded base64url (43 characters).
///
/// # Errors
/// Returns `PkceError::RandomSource` if the OS random source fails.
pub fn generate_state() -> Result<String, PkceError> {
    let mut bytes = [0u8; 32];
    OsRng.try_fill_bytes(&mut bytes).map_err(|e| PkceError::RandomSource(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Validate that the state token matches
///
/// Comparison runs in time independent of where the strings first differ.
#[must_use]
pub fn validate_state(expected: &str, actual: &str) -> bool {
    let (expected, actual) = (expected.as_bytes(), actual.as_bytes());
    if expected.len() != actual.len() {
        return false;
    }
    expected.iter().zip(actual).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}

/// PKCE challenge pair for OAuth 2.0 authorization
///
/// Contains the code verifier (sent during token exchange) and the
/// code challenge (sent during authorization request). Lives for one login
/// attempt only.
#[derive(Clone)]
pub struct PKCEChallenge {
    /// Random string (64 chars, unreserved set)
    /// Kept secret until token exchange
    pub code_verifier: String,

    /// SHA256 hash of code_verifier (base64url encoded)
    pub code_challenge: String,

    /// Random CSRF protection token
    /// Must match between authorization request and callback
    pub state: String,
}

impl PKCEChallenge {
    /// Generate a new PKCE challenge with cryptographically secure random
    /// values
    ///
    /// # Examples
    /// ```
    /// use nima_common::auth::pkce::PKCEChallenge;
    ///
    /// let challenge = PKCEChallenge::generate()?;
    /// assert_eq!(challenge.code_verifier.len(), 64);
    /// assert_eq!(challenge.challenge_method(), "S256");
    /// # Ok::<(), nima_common::auth::pkce::PkceError>(())
    /// ```
    ///
    /// # Errors
    /// Returns `PkceError::RandomSource` if the OS random source fails.
    pub fn generate() -> Result<Self, PkceError> {
        let code_verifier = generate_code_verifier(DEFAULT_VERIFIER_LENGTH)?;
        let code_challenge = generate_code_challenge(&code_verifier);
        let state = generate_state()?;

        Ok(Self { code_verifier, code_challenge, state })
    }

    /// Get the challenge method (always "S256" for SHA256)
    #[must_use]
    pub fn challenge_method(&self) -> &'static str {
        "S256"
    }
}

impl std::fmt::Debug for PKCEChallenge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PKCEChallenge")
            .field("code_verifier", &"<redacted>")
            .field("code_challenge", &self.code_challenge)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::pkce.
    use super::*;

    /// Validates `PKCEChallenge::generate` behavior for the generate pkce
    /// challenge scenario.
    ///
    /// Assertions:
    /// - Ensures the verifier is exactly 64 characters.
    /// - Ensures every verifier character is in the unreserved set.
    #[test]
    fn test_generate_pkce_challenge() {
        let challenge = PKCEChallenge::generate().expect("Failed to generate challenge");

        assert_eq!(challenge.code_verifier.len(), DEFAULT_VERIFIER_LENGTH);
        assert!(challenge.code_verifier.bytes().all(|b| VERIFIER_CHARSET.contains(&b)));
        assert!(!challenge.code_challenge.is_empty());
        assert!(!challenge.state.is_empty());
    }

    #[test]
    fn test_unique_challenges() {
        let challenge1 = PKCEChallenge::generate().expect("Failed to generate challenge 1");
        let challenge2 = PKCEChallenge::generate().expect("Failed to generate challenge 2");

        assert_ne!(challenge1.code_verifier, challenge2.code_verifier);
        assert_ne!(challenge1.code_challenge, challenge2.code_challenge);
        assert_ne!(challenge1.state, challenge2.state);
    }

    /// Validates `generate_code_challenge` against the RFC 7636 Appendix B
    /// test vector.
    ///
    /// Assertions:
    /// - Confirms the S256 transform of the published verifier equals the
    ///   published challenge.
    #[test]
    fn test_rfc7636_known_vector() {
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(
            generate_code_challenge(verifier),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_challenge_is_unpadded_base64url() {
        let challenge = PKCEChallenge::generate().expect("Failed to generate challenge");

        assert_eq!(challenge.code_challenge.len(), 43);
        assert!(!challenge.code_challenge.contains('='));
        assert!(!challenge.code_challenge.contains('+'));
        assert!(!challenge.code_challenge.contains('/'));
        assert!(!challenge.state.contains('='));
    }

    #[test]
    fn test_code_challenge_deterministic() {
        let challenge = PKCEChallenge::generate().expect("Failed to generate challenge");
        assert_eq!(challenge.code_challenge, generate_code_challenge(&challenge.code_verifier));
    }

    #[test]
    fn test_verifier_length_bounds() {
        assert_eq!(generate_code_verifier(42), Err(PkceError::InvalidLength(42)));
        assert_eq!(generate_code_verifier(129), Err(PkceError::InvalidLength(129)));
        assert_eq!(generate_code_verifier(43).unwrap().len(), 43);
        assert_eq!(generate_code_verifier(128).unwrap().len(), 128);
    }

    #[test]
    fn test_validate_state() {
        assert!(validate_state("abc123", "abc123"));
        assert!(!validate_state("abc123", "abc124"));
        assert!(!validate_state("abc123", "abc1234"));
        assert!(!validate_state("abc123", ""));
    }

    #[test]
    fn test_debug_redacts_verifier() {
        let challenge = PKCEChallenge::generate().expect("Failed to generate challenge");
        assert!(!format!("{challenge:?}").contains(&challenge.code_verifier));
    }
}
