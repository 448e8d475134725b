//! Core error types.

use thiserror::Error;

/// Errors produced by the instrumentation layer itself.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RapidaError {
    /// Input rejected before any network I/O happened.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The backend answered with a non-success status.
    #[error("API error {code}: {message}")]
    ApiError {
        code: u16,
        message: String,
        details: Option<serde_json::Value>,
    },

    /// Failure while talking HTTP (connect, TLS, body read, ...).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    JsonError(String),

    /// A custom transport failed before producing a response.
    #[error("Transport error: {0}")]
    TransportError(String),
}

impl RapidaError {
    /// Shorthand for a validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    /// Shorthand for a configuration failure.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError(message.into())
    }

    /// Build an `ApiError` without structured details.
    pub fn api_error(code: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// HTTP status carried by this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::ApiError { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// True for 4xx API errors.
    pub fn is_client_error(&self) -> bool {
        matches!(self.status_code(), Some(code) if (400..500).contains(&code))
    }

    /// True for errors that were raised before touching the network.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::ValidationError(_))
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, RapidaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_exposes_status() {
        let err = RapidaError::api_error(404, "Not found");
        assert_eq!(err.status_code(), Some(404));
        assert!(err.is_client_error());
        assert_eq!(err.to_string(), "API error 404: Not found");
    }

    #[test]
    fn validation_is_not_client_error() {
        let err = RapidaError::validation("bad data type");
        assert!(err.is_validation());
        assert!(!err.is_client_error());
        assert_eq!(err.status_code(), None);
    }
}
