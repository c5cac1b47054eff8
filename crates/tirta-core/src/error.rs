//! Error types for tirta-core.
//!
//! This module defines the errors returned by the API client, the retry
//! helpers and the calibration controller handle.
//!
//! # Error Recovery Strategies
//!
//! | Error Type | Strategy | Rationale |
//! |------------|----------|-----------|
//! | [`Error::NotReachable`] | Retry with backoff | Network or backend briefly down |
//! | [`Error::Timeout`] | Retry (2-3 times) | Slow backend |
//! | [`Error::Api`] with 5xx status | Retry with backoff | Server-side fault |
//! | [`Error::Api`] with 4xx status | Do not retry | Request is wrong, show the message |
//! | [`Error::Decode`] | Do not retry | Backend contract changed |
//! | [`Error::InvalidUrl`] | Do not retry | Fix configuration |
//! | [`Error::InvalidConfig`] | Do not retry | Fix configuration |
//! | [`Error::Validation`] | Do not retry | Fix the form input |
//! | [`Error::Cancelled`] | Do not retry | Cancelled on purpose |
//! | [`Error::ControllerClosed`] | Do not retry | Controller task has stopped |
//!
//! Retries apply to idempotent reads only. Calibration dispatch is never
//! retried automatically: a second dispatch would start a second command on
//! the node.
//!
//! ## Using RetryConfig
//!
//! ```ignore
//! use tirta_core::{RetryConfig, with_retry};
//!
//! let nodes = with_retry(&RetryConfig::default(), "list_nodes", || async {
//!     client.list_nodes().await
//! }).await?;
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;

use tirta_types::{ParseError, ValidationErrors};

/// Errors that can occur when talking to the monitoring API.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The API could not be reached at all.
    #[cfg(feature = "http-client")]
    #[error("API not reachable at {url}: {source}")]
    NotReachable {
        /// The URL that was requested.
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Transport-level HTTP failure after a connection was made.
    #[cfg(feature = "http-client")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message from the response envelope, or the status text.
        message: String,
        /// Per-field messages, if the backend sent any.
        fields: BTreeMap<String, Vec<String>>,
    },

    /// A success response could not be decoded.
    #[error("Failed to decode response from {url}: {message}")]
    Decode {
        /// The URL that was requested.
        url: String,
        /// Decoder message.
        message: String,
    },

    /// The configured base URL is malformed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input failed validation before being sent.
    #[error("Validation failed:\n{0}")]
    Validation(ValidationErrors),

    /// A domain value could not be parsed.
    #[error(transparent)]
    Parse(ParseError),

    /// Operation timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// Operation was cancelled.
    #[error("Operation cancelled")]
    Cancelled,

    /// The calibration controller task is no longer running.
    #[error("Calibration controller has shut down")]
    ControllerClosed,
}

impl Error {
    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Create an API error without field details.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            #[cfg(feature = "http-client")]
            Error::NotReachable { .. } => true,
            #[cfg(feature = "http-client")]
            Error::Http(e) => e.is_timeout() || e.is_connect(),
            Error::Timeout { .. } => true,
            Error::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Field messages rendered as `• Field: message` lines, if any.
    pub fn field_messages(&self) -> Option<String> {
        match self {
            Error::Api { fields, .. } if !fields.is_empty() => {
                Some(tirta_types::format_field_errors(fields.iter().flat_map(
                    |(field, messages)| messages.iter().map(move |m| (field.as_str(), m.as_str())),
                )))
            }
            Error::Validation(errors) => Some(errors.to_string()),
            _ => None,
        }
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::Validation(errors) => Error::Validation(errors),
            other => Error::Parse(other),
        }
    }
}

impl From<ValidationErrors> for Error {
    fn from(errors: ValidationErrors) -> Self {
        Error::Validation(errors)
    }
}

/// Result type alias using tirta-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
