//! Async log records, in the wire shape the Rapida log endpoints accept.

use crate::error::RapidaError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Request half of a log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRequest {
    pub url: String,
    pub json: Value,
    /// Metadata headers (`Rapida-Property-*`, `Rapida-User-Id`, ...).
    pub meta: BTreeMap<String, String>,
}

/// Response half of a log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub json: Value,
    pub status: u16,
    pub headers: BTreeMap<String, String>,
}

impl ProviderResponse {
    pub fn success(json: Value) -> Self {
        Self {
            json,
            status: 200,
            headers: BTreeMap::new(),
        }
    }

    /// Failure record: status 500 with the error text under `"error"`.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            json: serde_json::json!({ "error": message.into() }),
            status: 500,
            headers: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnixTimestamp {
    pub seconds: i64,
    pub milliseconds: u32,
}

impl UnixTimestamp {
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self {
            seconds: dt.timestamp(),
            milliseconds: dt.timestamp_subsec_millis(),
        }
    }

    /// From milliseconds since the Unix epoch.
    pub fn from_millis(millis: i64) -> Self {
        Self {
            seconds: millis.div_euclid(1000),
            milliseconds: millis.rem_euclid(1000) as u32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timing {
    pub start_time: UnixTimestamp,
    pub end_time: UnixTimestamp,
}

impl Timing {
    pub fn from_datetimes(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start_time: UnixTimestamp::from_datetime(start),
            end_time: UnixTimestamp::from_datetime(end),
        }
    }

    pub fn from_millis(start: i64, end: i64) -> Self {
        Self {
            start_time: UnixTimestamp::from_millis(start),
            end_time: UnixTimestamp::from_millis(end),
        }
    }
}

/// One request/response pair, as POSTed to a log endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsyncLogRequest {
    pub provider_request: ProviderRequest,
    pub provider_response: ProviderResponse,
    pub timing: Timing,
}

/// Upstream provider a record is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "azure-openai")]
    AzureOpenAi,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "custom-model")]
    CustomModel,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::AzureOpenAi => "azure-openai",
            Self::Anthropic => "anthropic",
            Self::CustomModel => "custom-model",
        }
    }

    /// Log endpoint path.
    pub fn path(&self) -> &'static str {
        match self {
            Self::OpenAi | Self::AzureOpenAi => "/oai/v1/log",
            Self::Anthropic => "/anthropic/v1/log",
            Self::CustomModel => "/custom/v1/log",
        }
    }

    /// Full log URL under `base_url`.
    ///
    /// Custom-model logs live at the root of the host, so any path on the
    /// base URL is replaced. Query and fragment are always dropped.
    pub fn log_url(&self, base_url: &str) -> Result<String, RapidaError> {
        let mut url = reqwest::Url::parse(base_url).map_err(|e| {
            RapidaError::configuration(format!("Invalid logging base URL '{base_url}': {e}"))
        })?;
        if !url.has_host() {
            return Err(RapidaError::configuration(format!(
                "Logging base URL '{base_url}' has no host"
            )));
        }

        if *self == Self::CustomModel {
            return Ok(format!("{}{}", url.origin().ascii_serialization(), self.path()));
        }
        let path = format!("{}{}", url.path().trim_end_matches('/'), self.path());
        url.set_path(&path);
        url.set_query(None);
        url.set_fragment(None);
        Ok(url.into())
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = RapidaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(Self::OpenAi),
            "azure-openai" => Ok(Self::AzureOpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "custom-model" => Ok(Self::CustomModel),
            other => Err(RapidaError::validation(format!("Unknown provider {other}"))),
        }
    }
}
