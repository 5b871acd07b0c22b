use std::time::Duration;

use thiserror::Error;

/// Failure classes produced while executing a request against the Slack Web API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Failed to reach Slack: {0}")]
    Network(String),

    #[error("Slack rejected the credential: {0}")]
    Auth(String),

    #[error("Slack rate limited the request, retry after {}s", .retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    #[error("Slack server error: {0}")]
    ServerError(String),

    #[error("Malformed Slack response: {0}")]
    Malformed(String),
}

impl TransportError {
    /// Network and server failures are worth another attempt; everything else is final.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::ServerError(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        // Never surface the request URL; query strings can carry user text.
        TransportError::Network(error.without_url().to_string())
    }
}

/// Errors returned by the adapter's public operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Slack authentication failed: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Slack rate limit exhausted, retry after {}s", .retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    #[error("Failed to reach Slack: {0}")]
    Network(String),

    #[error("Slack server error: {0}")]
    ServerError(String),

    #[error("Malformed Slack response: {0}")]
    Malformed(String),

    #[error("{method} error: {code}")]
    Api { method: String, code: String },
}

impl AdapterError {
    /// Cooldown hint for callers that want to schedule their own retry.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

impl From<TransportError> for AdapterError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Network(msg) => AdapterError::Network(msg),
            TransportError::Auth(msg) => AdapterError::Auth(msg),
            TransportError::RateLimited { retry_after } => {
                AdapterError::RateLimited { retry_after }
            }
            TransportError::ServerError(msg) => AdapterError::ServerError(msg),
            TransportError::Malformed(msg) => AdapterError::Malformed(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, AdapterError>;
