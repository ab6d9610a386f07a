//! Error types for bookline.
//!
//! Each subsystem gets its own error enum so callers can match on the
//! failures they actually handle instead of unwrapping a grab bag.

use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },
}

/// Errors from LLM completion providers.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Rate limited by provider {provider}")]
    RateLimited {
        provider: String,
        retry_after: Option<std::time::Duration>,
    },

    #[error("Request to provider {provider} failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from provider {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

/// Errors from messaging channels (inbound webhook plumbing and outbound sends).
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Send via {name} failed: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Channel {name} is not configured: {reason}")]
    NotConfigured { name: String, reason: String },
}

/// Errors from the tenant/reservation store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(#[from] tokio_postgres::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Row not found: {0}")]
    NotFound(String),
}

impl From<deadpool_postgres::PoolError> for StoreError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        StoreError::Pool(err.to_string())
    }
}
