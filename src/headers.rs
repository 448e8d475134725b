//! HTTP Headers
//!
//! Header names exchanged with the Rapida proxy plus small helpers for moving
//! between the string maps callers hand us and reqwest's `HeaderMap`.

use crate::error::RapidaError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::HashMap;

/// Authentication header understood by the proxy and the feedback endpoint.
pub const RAPIDA_AUTH: &str = "Rapida-Auth";

/// Correlation id placed on every intercepted request.
pub const RAPIDA_REQUEST_ID: &str = "rapida-request-id";

/// Prefix for custom property headers (`Rapida-Property-<name>`).
pub const RAPIDA_PROPERTY_PREFIX: &str = "Rapida-Property-";

pub const RAPIDA_USER_ID: &str = "Rapida-User-Id";
pub const RAPIDA_NODE_ID: &str = "Rapida-Node-Id";
pub const RAPIDA_CACHE_ENABLED: &str = "Rapida-Cache-Enabled";
pub const RAPIDA_RETRY_ENABLED: &str = "Rapida-Retry-Enabled";
pub const RAPIDA_RETRY_NUM: &str = "Rapida-Retry-Num";
pub const RAPIDA_RETRY_FACTOR: &str = "Rapida-Retry-Factor";
pub const RAPIDA_RETRY_MIN_TIMEOUT: &str = "Rapida-Retry-Min-Timeout";
pub const RAPIDA_RETRY_MAX_TIMEOUT: &str = "Rapida-Retry-Max-Timeout";

/// Rate-limit policy. Sent on requests, echoed back on responses.
pub const RAPIDA_RATE_LIMIT_POLICY: &str = "Rapida-RateLimit-Policy";

/// Upstream base URL forwarded when a call is routed through the proxy.
pub const RAPIDA_OPENAI_API_BASE: &str = "Rapida-OpenAI-Api-Base";

/// Response headers written by the proxy.
pub mod response {
    pub const RAPIDA_ID: &str = "Rapida-Id";
    pub const RAPIDA_STATUS: &str = "Rapida-Status";
    pub const RAPIDA_CACHE: &str = "Rapida-Cache";
    pub const RAPIDA_RATE_LIMIT_LIMIT: &str = "Rapida-RateLimit-Limit";
    pub const RAPIDA_RATE_LIMIT_REMAINING: &str = "Rapida-RateLimit-Remaining";
    pub const RAPIDA_RATE_LIMIT_RESET: &str = "Rapida-RateLimit-Reset";
    pub const RAPIDA_RATE_LIMIT_POLICY: &str = super::RAPIDA_RATE_LIMIT_POLICY;
}

/// Format a bearer token value.
pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Case-insensitive lookup in a plain string header map.
pub fn find_header<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Insert `name`, replacing any entry that differs from it only by case.
pub fn set_header(headers: &mut HashMap<String, String>, name: &str, value: impl Into<String>) {
    headers.retain(|k, _| !k.eq_ignore_ascii_case(name));
    headers.insert(name.to_string(), value.into());
}

/// Convert a string map into a `HeaderMap`, rejecting invalid names or values.
pub fn to_header_map(headers: &HashMap<String, String>) -> Result<HeaderMap, RapidaError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (key, value) in headers {
        let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
            RapidaError::ConfigurationError(format!("Invalid header name '{key}': {e}"))
        })?;
        let value = HeaderValue::from_str(value).map_err(|e| {
            RapidaError::ConfigurationError(format!("Invalid header value for '{key}': {e}"))
        })?;
        map.insert(name, value);
    }
    Ok(map)
}

/// Read a header as `&str`; non-UTF-8 values count as absent.
pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
