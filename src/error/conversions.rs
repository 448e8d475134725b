//! Type Conversions for RapidaError
//!
//! From trait implementations for the library errors we bubble up.

use super::types::RapidaError;

impl From<reqwest::Error> for RapidaError {
    fn from(err: reqwest::Error) -> Self {
        Self::HttpError(err.to_string())
    }
}

impl From<serde_json::Error> for RapidaError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

impl From<reqwest::header::InvalidHeaderName> for RapidaError {
    fn from(err: reqwest::header::InvalidHeaderName) -> Self {
        Self::ConfigurationError(format!("Invalid header name: {err}"))
    }
}

impl From<reqwest::header::InvalidHeaderValue> for RapidaError {
    fn from(err: reqwest::header::InvalidHeaderValue) -> Self {
        Self::ConfigurationError(format!("Invalid header value: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: RapidaError = json_err.into();
        assert!(matches!(err, RapidaError::JsonError(_)));
    }

    #[test]
    fn test_from_invalid_header_name() {
        let bad = reqwest::header::HeaderName::from_bytes(b"bad header").unwrap_err();
        let err: RapidaError = bad.into();
        assert!(matches!(err, RapidaError::ConfigurationError(_)));
    }
}
