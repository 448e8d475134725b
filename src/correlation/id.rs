use crate::error::RapidaError;
use crate::headers::{RAPIDA_REQUEST_ID, header_str};
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque per-call token, a random v4 UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Mint a fresh id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Id carried on a wire-level header map, if any.
    ///
    /// A malformed value is treated as absent: the hook only observes.
    pub fn from_header_map(headers: &HeaderMap) -> Option<Self> {
        header_str(headers, RAPIDA_REQUEST_ID).and_then(|v| v.parse().ok())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for CorrelationId {
    type Err = RapidaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| RapidaError::ValidationError(format!("Invalid correlation id '{s}': {e}")))
    }
}
