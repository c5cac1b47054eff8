//! Error types for parsing and validating domain values in tirta-types.

use thiserror::Error;

use crate::form::ValidationErrors;

/// Errors that can occur when parsing or validating monitoring data.
///
/// This error type is transport-agnostic and does not include HTTP
/// errors (those belong in tirta-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// A value could not be interpreted.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Unknown calibration target.
    #[error("Unknown sensor kind '{0}' (expected one of: ph, ec, do, turb)")]
    UnknownSensorKind(String),

    /// Unknown measured metric.
    #[error("Unknown metric '{0}' (expected one of: temp, ph, ec, turb, do)")]
    UnknownMetric(String),

    /// Time of day not in `HH:MM` form.
    #[error("Invalid time of day '{0}' (expected HH:MM)")]
    InvalidTime(String),

    /// One or more form fields failed validation.
    #[error("Validation failed:\n{0}")]
    Validation(ValidationErrors),
}

/// Result type alias using tirta-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
