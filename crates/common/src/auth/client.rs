//! Token exchange client
//!
//! Talks to the token endpoint (typically a trusted backend function that
//! holds the provider secret) for two grants:
//! - `authorization_code` + PKCE verifier, yielding a full credential
//! - `refresh_token`, yielding a new access token and optionally a rotated
//!   refresh token and updated profile

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, warn};

use super::traits::TokenClientTrait;
use super::types::{StoredCredential, TokenGrant, TokenResponse};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Error type for code exchange
#[derive(Debug, Error)]
pub enum TokenExchangeError {
    /// Token endpoint answered with a non-2xx status
    #[error("token endpoint returned {status}: {body}")]
    Http { status: u16, body: String },

    /// Transport failure (DNS, TLS, timeout, connection reset)
    #[error("token request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// 2xx response without access token, refresh token, or user
    #[error("token response is missing tokens or user")]
    MissingTokens,

    /// 2xx response whose body is not the expected JSON
    #[error("failed to parse token response: {0}")]
    Parse(String),
}

#[derive(Serialize)]
struct CodeGrantRequest<'a> {
    client_id: &'a str,
    grant_type: &'static str,
    code: &'a str,
    code_verifier: &'a str,
    redirect_uri: &'a str,
}

#[derive(Serialize)]
struct RefreshGrantRequest<'a> {
    client_id: &'a str,
    grant_type: &'static str,
    refresh_token: &'a str,
}

/// HTTP client for the token endpoint
#[derive(Debug, Clone)]
pub struct TokenExchangeClient {
    client_id: String,
    token_endpoint: String,
    http: Client,
}

impl TokenExchangeClient {
    /// Create a client posting to `token_endpoint` on behalf of `client_id`
    ///
    /// # Examples
    /// ```
    /// use nima_common::auth::TokenExchangeClient;
    ///
    /// let client = TokenExchangeClient::new("client_123", "https://api.example.com/auth/token");
    /// assert_eq!(client.token_endpoint(), "https://api.example.com/auth/token");
    /// ```
    #[must_use]
    pub fn new(client_id: impl Into<String>, token_endpoint: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client_id: client_id.into(), token_endpoint: token_endpoint.into(), http }
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn token_endpoint(&self) -> &str {
        &self.token_endpoint
    }

    /// Exchange an authorization code for tokens
    ///
    /// # Errors
    /// Returns error if:
    /// - The request cannot be sent (`Request`)
    /// - The endpoint answers non-2xx (`Http`)
    /// - The body is not JSON (`Parse`)
    /// - The access token, refresh token, or user is absent (`MissingTokens`)
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<StoredCredential, TokenExchangeError> {
        let request = CodeGrantRequest {
            client_id: &self.client_id,
            grant_type: "authorization_code",
            code,
            code_verifier,
            redirect_uri,
        };

        debug!(endpoint = %self.token_endpoint, "Exchanging authorization code");
        let response = self.http.post(&self.token_endpoint).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status.is_server_error() {
                error!(status = status.as_u16(), "Token endpoint failed during code exchange");
            } else {
                warn!(status = status.as_u16(), "Token endpoint rejected code exchange");
            }
            return Err(TokenExchangeError::Http { status: status.as_u16(), body });
        }

        let body: TokenResponse =
            response.json().await.map_err(|e| TokenExchangeError::Parse(e.to_string()))?;

        match body {
            TokenResponse {
                access_token: Some(access_token),
                refresh_token: Some(refresh_token),
                user: Some(user),
            } if !access_token.is_empty() && !refresh_token.is_empty() => {
                Ok(StoredCredential { access_token, refresh_token, user })
            }
            _ => Err(TokenExchangeError::MissingTokens),
        }
    }

    /// Refresh the access token
    ///
    /// Every failure (transport, non-2xx, malformed or tokenless body) is
    /// logged and reported as `None`.
    pub async fn refresh(&self, refresh_token: &str) -> Option<TokenGrant> {
        if refresh_token.is_empty() {
            warn!("Refresh skipped: no refresh token");
            return None;
        }

        let request = RefreshGrantRequest {
            client_id: &self.client_id,
            grant_type: "refresh_token",
            refresh_token,
        };

        debug!(endpoint = %self.token_endpoint, "Refreshing access token");
        let response = match self.http.post(&self.token_endpoint).json(&request).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Refresh request failed");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Token endpoint rejected refresh");
            return None;
        }

        let body: TokenResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Refresh response was not valid JSON");
                return None;
            }
        };

        match body.access_token {
            Some(access_token) if !access_token.is_empty() => Some(TokenGrant {
                access_token,
                refresh_token: body.refresh_token.filter(|token| !token.is_empty()),
                user: body.user,
            }),
            _ => {
                warn!("Refresh response did not include an access token");
                None
            }
        }
    }
}

#[async_trait]
impl TokenClientTrait for TokenExchangeClient {
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<StoredCredential, TokenExchangeError> {
        self.exchange_code(code, code_verifier, redirect_uri).await
    }

    async fn refresh(&self, refresh_token: &str) -> Option<TokenGrant> {
        self.refresh(refresh_token).await
    }
}
