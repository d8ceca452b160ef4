//! Error types for crowntalk
//!
//! Two layers of errors live here:
//! - [`Error`] covers invocation-level failures (bad input, a run already in
//!   flight, configuration and transport problems). These are returned as `Err`
//!   and mapped to HTTP status codes through [`ToHttpStatus`].
//! - [`FetchError`] and [`GenerationError`] are produced by the external
//!   collaborators. They never escape a batch run: the scheduler converts them
//!   into per-item outcomes.

use crate::retry::{ErrorClass, Retryable};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for crowntalk operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for crowntalk
#[derive(Debug, Error)]
pub enum Error {
    /// The caller's request violates the invocation contract
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A batch run is already in flight for this process
    #[error("a batch run is already in progress")]
    RunInProgress,

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "batch.chunk_size")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Content could not be retrieved for an identifier
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The content is missing, private or deleted
    #[error("content unavailable: {0}")]
    Unavailable(String),

    /// The retrieval service could not be reached in time (timeout, connect, 5xx)
    #[error("content unavailable (service unreachable): {0}")]
    Unreachable(String),
}

impl Retryable for FetchError {
    fn error_class(&self) -> ErrorClass {
        match self {
            FetchError::Unavailable(_) => ErrorClass::Permanent,
            FetchError::Unreachable(_) => ErrorClass::Transient,
        }
    }
}

/// Text generation failed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    /// The generation service rejected the call because of its rate limit / quota
    #[error("generation rate limited: {0}")]
    RateLimited(String),

    /// Temporary failure (timeouts, 5xx, output that missed the contract)
    #[error("transient generation error: {0}")]
    Transient(String),

    /// The request can never succeed as-is (malformed input, auth, bad model)
    #[error("permanent generation error: {0}")]
    Permanent(String),
}

impl Retryable for GenerationError {
    fn error_class(&self) -> ErrorClass {
        match self {
            GenerationError::RateLimited(_) => ErrorClass::RateLimited,
            GenerationError::Transient(_) => ErrorClass::Transient,
            GenerationError::Permanent(_) => ErrorClass::Permanent,
        }
    }
}

/// API error response format
///
/// ```json
/// {
///   "error": {
///     "code": "invalid_input",
///     "message": "invalid input: no URLs provided"
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "invalid_input", "run_in_progress")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            Error::InvalidInput(_) => 400,
            Error::Config { .. } => 400,
            Error::RunInProgress => 409,
            Error::Network(_) => 502,
            Error::Io(_) | Error::Serialization(_) | Error::ApiServerError(_) | Error::Other(_) => {
                500
            }
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::InvalidInput(_) => "invalid_input",
            Error::RunInProgress => "run_in_progress",
            Error::Config { .. } => "config_error",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({ "key": key })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
