use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::kv::KvError;

/// Failure of a call to the target reservation service.
///
/// `is_transient` splits the taxonomy: transient failures are retried by the
/// client and counted by the circuit breaker, everything else surfaces
/// immediately.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("permission denied: {0}")]
    Permission(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("rate limited by target service")]
    RateLimited { retry_after: Option<u64> },
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },
    #[error("unexpected status {status}: {message}")]
    UnexpectedStatus { status: u16, message: String },
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("circuit open, next probe allowed at {retry_at}")]
    CircuitOpen { retry_at: DateTime<Utc> },
    #[error("invalid response: {0}")]
    Decode(String),
    #[error("state store error: {0}")]
    Store(String),
}

impl ApiError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ApiError::Connection(_) | ApiError::Server { .. } | ApiError::RateLimited { .. }
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Auth(_) => "auth",
            ApiError::Permission(_) => "permission",
            ApiError::NotFound(_) => "not_found",
            ApiError::Validation(_) => "validation",
            ApiError::RateLimited { .. } => "rate_limited",
            ApiError::Server { .. } => "server",
            ApiError::UnexpectedStatus { .. } => "unexpected_status",
            ApiError::Connection(_) => "connection",
            ApiError::CircuitOpen { .. } => "circuit_open",
            ApiError::Decode(_) => "decode",
            ApiError::Store(_) => "store",
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Connection(err.to_string())
        }
    }
}

impl From<KvError> for ApiError {
    fn from(err: KvError) -> Self {
        Self::Store(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{field} is invalid: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}
