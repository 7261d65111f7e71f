//! Remote store error types

use std::sync::Arc;
use std::time::Duration;

/// Errors that can occur while talking to the REST gateway.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    /// HTTP error response from the gateway.
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
        /// Gateway error code (e.g. a Postgres SQLSTATE), if available.
        code: Option<String>,
        /// Hint returned alongside the error, if any.
        hint: Option<String>,
    },

    /// Network error during the call.
    #[error("Network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Request timed out.
    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to parse the gateway response.
    #[error("Response parse error: {message}")]
    Parse {
        /// Description of the parse error.
        message: String,
        /// Raw response body, if available.
        body: Option<String>,
    },
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest does not expose the configured duration
            return Self::Timeout(Duration::ZERO);
        }
        Self::Network(Arc::new(err))
    }
}

/// Error body returned by the REST gateway.
#[derive(Debug, Clone, serde::Deserialize)]
pub(crate) struct GatewayErrorBody {
    pub message: Option<String>,
    pub code: Option<String>,
    pub hint: Option<String>,
}

impl ApiError {
    /// Creates a new HTTP error.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
            code: None,
            hint: None,
        }
    }

    /// Builds an HTTP error from a raw response body, using the gateway's
    /// structured error fields when the body parses.
    pub fn from_body(status: u16, body: &str) -> Self {
        match serde_json::from_str::<GatewayErrorBody>(body) {
            Ok(parsed) => Self::Http {
                status,
                message: parsed.message.unwrap_or_else(|| body.to_string()),
                code: parsed.code,
                hint: parsed.hint,
            },
            Err(_) => Self::http(status, body),
        }
    }

    /// Creates a new parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            body: None,
        }
    }

    /// Creates a new parse error with the raw response body.
    pub fn parse_with_body(message: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            body: Some(body.into()),
        }
    }

    /// Returns the HTTP status code if this is an HTTP error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the gateway error code if available.
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::Http { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Returns `true` if this error is potentially retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            Self::Network(_) => true,
            Self::Timeout(_) => true,
            _ => false,
        }
    }
}
