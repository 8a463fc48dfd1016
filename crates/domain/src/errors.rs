//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Nima
#[derive(Error, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum NimaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Security error: {0}")]
    Security(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Nima operations
pub type Result<T> = std::result::Result<T, NimaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_category() {
        let err = NimaError::Config("missing NIMA_CLIENT_ID".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing NIMA_CLIENT_ID");
    }

    #[test]
    fn serializes_with_type_tag() {
        let err = NimaError::Auth("session expired".to_string());
        let json = serde_json::to_value(&err).unwrap();

        assert_eq!(json["type"], "Auth");
        assert_eq!(json["message"], "session expired");
    }
}
