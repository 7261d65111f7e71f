//! Error types

mod api;
mod field;

pub use api::*;
pub use field::*;

use std::time::Duration;

/// Top-level error for every fallible operation in the crate.
///
/// `Error` is `Clone` because a single failed fetch is delivered to every
/// caller that joined the same in-flight request.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The remote store rejected or failed the request.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A record field was missing or had an unexpected type.
    #[error(transparent)]
    Field(#[from] FieldError),

    /// A cached fetch did not complete within the configured timeout.
    #[error("Fetch timed out after {0:?}")]
    Timeout(Duration),

    /// Cache keys must be non-empty.
    #[error("Invalid cache key: {0:?}")]
    InvalidKey(String),

    /// A list query had out-of-range paging parameters.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// The requested record does not exist.
    #[error("{table} record '{id}' not found")]
    NotFound { table: String, id: String },

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The durable local store failed.
    #[error("Durable store error: {0}")]
    Durable(String),

    /// A value could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Creates a not-found error.
    pub fn not_found(table: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            table: table.into(),
            id: id.into(),
        }
    }

    /// Returns `true` if retrying the same request might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Api(api) => api.is_retryable(),
            Self::Timeout(_) => true,
            _ => false,
        }
    }
}

impl From<async_sqlite::Error> for Error {
    fn from(err: async_sqlite::Error) -> Self {
        Self::Durable(err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
