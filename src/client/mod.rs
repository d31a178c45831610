//! HTTP boundary: bearer auth, command execution, loan fetches

pub mod auth;
pub mod commands;
pub mod fetch;

use std::sync::Arc;

use reqwest::StatusCode;
use serde::Deserialize;

use crate::config::ApiConfig;
use crate::error::{CoreError, CoreResult};

pub use auth::TokenStore;
pub use commands::{Command, CommandClient, CommandOutcome, HttpCommandClient};
pub use fetch::{HttpLoanFetcher, LoanFetcher};

/// Structured error body returned by the API
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub code: Option<u32>,
    pub error: Option<String>,
    pub message: Option<String>,
}

/// Map a non-success response onto the core error taxonomy, preferring the
/// server's structured message when one is present.
pub(crate) async fn error_from_response(response: reqwest::Response) -> CoreError {
    let status = response.status();
    let message = response
        .json::<ApiErrorBody>()
        .await
        .ok()
        .and_then(|body| body.message)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CoreError::Unauthorized(message),
        StatusCode::CONFLICT => CoreError::Conflict(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            CoreError::Validation(message)
        }
        status if status.is_server_error() => CoreError::Transient(message),
        status => CoreError::Transient(format!("unexpected status {}: {}", status, message)),
    }
}

/// Transport-level failures (connect, timeout, body decode) are all
/// candidates for a retry.
pub(crate) fn error_from_transport(err: reqwest::Error) -> CoreError {
    CoreError::Transient(err.to_string())
}

/// Container wiring the HTTP boundary for one API endpoint.
#[derive(Clone)]
pub struct Clients {
    pub tokens: Arc<TokenStore>,
    pub commands: Arc<HttpCommandClient>,
    pub fetcher: Arc<HttpLoanFetcher>,
}

impl Clients {
    /// Create all clients for the given API configuration
    pub fn new(config: &ApiConfig) -> CoreResult<Self> {
        let tokens = Arc::new(TokenStore::new());
        let commands = Arc::new(HttpCommandClient::new(config, tokens.clone())?);
        let fetcher = Arc::new(HttpLoanFetcher::new(config, tokens.clone())?);
        Ok(Self {
            tokens,
            commands,
            fetcher,
        })
    }
}
