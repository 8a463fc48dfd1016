//! Conversions from auth library errors into domain errors.

use nima_common::auth::{FlowError, PkceError, SessionError, TokenExchangeError};
use nima_common::security::KeychainError;
use nima_domain::NimaError;
use reqwest::Error as HttpError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub NimaError);

impl From<InfraError> for NimaError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<NimaError> for InfraError {
    fn from(value: NimaError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoNimaError {
    fn into_nima(self) -> NimaError;
}

/* -------------------------------------------------------------------------- */
/* KeychainError → NimaError */
/* -------------------------------------------------------------------------- */

impl IntoNimaError for KeychainError {
    fn into_nima(self) -> NimaError {
        match self {
            KeychainError::AccessFailed(msg) => {
                NimaError::Security(format!("unable to access secure storage: {msg}"))
            }
            KeychainError::NotFound => NimaError::Security("keychain entry not found".into()),
            KeychainError::Serialization(err) => {
                NimaError::Internal(format!("stored credential could not be encoded: {err}"))
            }
        }
    }
}

impl From<KeychainError> for InfraError {
    fn from(value: KeychainError) -> Self {
        InfraError(value.into_nima())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → NimaError */
/* -------------------------------------------------------------------------- */

impl IntoNimaError for HttpError {
    fn into_nima(self) -> NimaError {
        if self.is_timeout() {
            return NimaError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return NimaError::Network("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            return status_error(status.as_u16(), status.canonical_reason().unwrap_or("unknown"));
        }

        NimaError::Network(self.to_string())
    }
}

fn status_error(code: u16, detail: &str) -> NimaError {
    let message = format!("HTTP {code} {detail}");
    // token endpoints reject a stale or replayed code with 400
    match code {
        400 | 401 | 403 => NimaError::Auth(message),
        429 => NimaError::Network(message),
        402..=499 => NimaError::InvalidInput(message),
        _ => NimaError::Network(message),
    }
}

/* -------------------------------------------------------------------------- */
/* TokenExchangeError → NimaError */
/* -------------------------------------------------------------------------- */

impl IntoNimaError for TokenExchangeError {
    fn into_nima(self) -> NimaError {
        match self {
            TokenExchangeError::Http { status, body } => status_error(status, &body),
            TokenExchangeError::Request(err) => err.into_nima(),
            TokenExchangeError::MissingTokens => {
                NimaError::Auth("token endpoint response is missing tokens or user".into())
            }
            TokenExchangeError::Parse(msg) => {
                NimaError::InvalidInput(format!("unreadable token response: {msg}"))
            }
        }
    }
}

impl From<TokenExchangeError> for InfraError {
    fn from(value: TokenExchangeError) -> Self {
        InfraError(value.into_nima())
    }
}

/* -------------------------------------------------------------------------- */
/* FlowError / SessionError → NimaError */
/* -------------------------------------------------------------------------- */

impl IntoNimaError for FlowError {
    fn into_nima(self) -> NimaError {
        match self {
            FlowError::AlreadyInProgress => {
                NimaError::Auth("a sign-in is already in progress".into())
            }
            FlowError::Pkce(PkceError::RandomSource(msg)) => {
                NimaError::Security(format!("secure random source unavailable: {msg}"))
            }
            FlowError::Pkce(err) => NimaError::Internal(err.to_string()),
            FlowError::InvalidAuthorizationUrl(err) => {
                NimaError::Config(format!("invalid authorization endpoint: {err}"))
            }
            FlowError::Exchange(err) => err.into_nima(),
            FlowError::Storage(err) => err.into_nima(),
        }
    }
}

impl From<FlowError> for InfraError {
    fn from(value: FlowError) -> Self {
        InfraError(value.into_nima())
    }
}

impl IntoNimaError for SessionError {
    fn into_nima(self) -> NimaError {
        match self {
            SessionError::Disposed => NimaError::Internal("auth session has been disposed".into()),
            SessionError::Flow(err) => err.into_nima(),
            SessionError::Storage(err) => err.into_nima(),
        }
    }
}

impl From<SessionError> for InfraError {
    fn from(value: SessionError) -> Self {
        InfraError(value.into_nima())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
