//! Request metadata
//!
//! Caller-declared, call-scoped intent (custom properties, cache, retry and
//! rate-limit policies) and its translation into proxy headers.
//!
//! Metadata reaches the interceptor either as a pre-built [`RequestMetadata`]
//! or inline among the call parameters. [`RequestMetadata::extract`] pulls the
//! recognised keys out of the parameter map so they never reach the provider
//! body.

use crate::error::RapidaError;
use crate::headers::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Parameter key holding a complete metadata object.
pub const META_KEY: &str = "rapida_meta";

/// Inline keys recognised by [`RequestMetadata::extract`].
pub const INLINE_KEYS: &[&str] = &[
    "properties",
    "custom_properties",
    "user_id",
    "node_id",
    "cache",
    "retry",
    "rate_limit_policy",
];

/// Structured retry policy forwarded to the proxy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryProps {
    pub num: Option<u32>,
    pub factor: Option<f64>,
    pub min_timeout: Option<f64>,
    pub max_timeout: Option<f64>,
}

impl RetryProps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_num(mut self, num: u32) -> Self {
        self.num = Some(num);
        self
    }

    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = Some(factor);
        self
    }

    pub fn with_min_timeout(mut self, ms: f64) -> Self {
        self.min_timeout = Some(ms);
        self
    }

    pub fn with_max_timeout(mut self, ms: f64) -> Self {
        self.max_timeout = Some(ms);
        self
    }
}

/// Either a plain on/off switch or a full policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RetrySetting {
    Enabled(bool),
    Policy(RetryProps),
}

impl From<bool> for RetrySetting {
    fn from(enabled: bool) -> Self {
        Self::Enabled(enabled)
    }
}

impl From<RetryProps> for RetrySetting {
    fn from(props: RetryProps) -> Self {
        Self::Policy(props)
    }
}

/// Rate-limit policy, by name or as a quota description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RateLimitPolicy {
    Named(String),
    Quota {
        quota: u64,
        time_window: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        segment: Option<String>,
    },
}

impl RateLimitPolicy {
    /// Header value understood by the proxy, e.g. `100;w=60;s=user`.
    pub fn header_value(&self) -> String {
        match self {
            Self::Named(name) => name.clone(),
            Self::Quota {
                quota,
                time_window,
                segment,
            } => {
                let mut policy = format!("{quota};w={time_window}");
                if let Some(segment) = segment.as_deref().filter(|s| !s.is_empty()) {
                    policy.push_str(";s=");
                    policy.push_str(segment);
                }
                policy
            }
        }
    }
}

impl From<&str> for RateLimitPolicy {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

/// Caller-declared metadata for one call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestMetadata {
    #[serde(default, alias = "properties")]
    pub custom_properties: BTreeMap<String, Value>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(default)]
    pub cache: Option<bool>,
    #[serde(default)]
    pub retry: Option<RetrySetting>,
    #[serde(default)]
    pub rate_limit_policy: Option<RateLimitPolicy>,
}

impl RequestMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.custom_properties.insert(key.into(), value.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_node_id(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_retry(mut self, retry: impl Into<RetrySetting>) -> Self {
        self.retry = Some(retry.into());
        self
    }

    pub fn with_rate_limit_policy(mut self, policy: impl Into<RateLimitPolicy>) -> Self {
        self.rate_limit_policy = Some(policy.into());
        self
    }

    /// Translate into proxy headers.
    pub fn to_headers(&self) -> BTreeMap<String, String> {
        MetadataHeaderBuilder::new(self)
            .with_properties()
            .with_user()
            .with_node()
            .with_cache()
            .with_retry()
            .with_rate_limit_policy()
            .build()
    }

    /// Remove metadata keys from call parameters and normalise them.
    ///
    /// A complete object under [`META_KEY`] wins; inline keys are still
    /// stripped so they never reach the provider, but are ignored in that
    /// case. Mistyped values are rejected here, before the call is made.
    pub fn extract(params: &mut Map<String, Value>) -> Result<Self, RapidaError> {
        let explicit = params.remove(META_KEY);
        let inline: Vec<(&str, Value)> = INLINE_KEYS
            .iter()
            .filter_map(|key| params.remove(*key).map(|v| (*key, v)))
            .collect();

        if let Some(meta) = explicit {
            if !inline.is_empty() {
                tracing::debug!(
                    target: "rapida::metadata",
                    ignored = inline.len(),
                    "explicit {META_KEY} supplied; ignoring inline metadata keys"
                );
            }
            return serde_json::from_value(meta).map_err(|e| {
                RapidaError::ValidationError(format!("Invalid {META_KEY} object: {e}"))
            });
        }

        let mut meta = Self::default();
        for (key, value) in inline {
            if value.is_null() {
                continue;
            }
            match key {
                "properties" | "custom_properties" => {
                    let Value::Object(props) = value else {
                        return Err(invalid(key, "an object"));
                    };
                    meta.custom_properties.extend(props);
                }
                "user_id" => meta.user_id = Some(expect_string(key, value)?),
                "node_id" => meta.node_id = Some(expect_string(key, value)?),
                "cache" => {
                    meta.cache = Some(value.as_bool().ok_or_else(|| invalid(key, "a boolean"))?)
                }
                "retry" => {
                    meta.retry = Some(
                        serde_json::from_value(value)
                            .map_err(|_| invalid(key, "a boolean or a retry policy object"))?,
                    )
                }
                "rate_limit_policy" => {
                    meta.rate_limit_policy = Some(
                        serde_json::from_value(value)
                            .map_err(|_| invalid(key, "a policy name or quota object"))?,
                    )
                }
                _ => {}
            }
        }
        Ok(meta)
    }
}

fn invalid(key: &str, expected: &str) -> RapidaError {
    RapidaError::ValidationError(format!("Metadata field '{key}' must be {expected}"))
}

fn expect_string(key: &str, value: Value) -> Result<String, RapidaError> {
    match value {
        Value::String(s) => Ok(s),
        _ => Err(invalid(key, "a string")),
    }
}

/// String form used for property headers: strings verbatim, everything else
/// as JSON text.
fn coerce(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn non_zero(v: f64) -> bool {
    v != 0.0 && !v.is_nan()
}

/// Step-wise header builder over a borrowed [`RequestMetadata`].
///
/// Every step is a no-op when its field is absent or falsy.
pub struct MetadataHeaderBuilder<'a> {
    meta: &'a RequestMetadata,
    headers: BTreeMap<String, String>,
}

impl<'a> MetadataHeaderBuilder<'a> {
    pub fn new(meta: &'a RequestMetadata) -> Self {
        Self {
            meta,
            headers: BTreeMap::new(),
        }
    }

    pub fn with_properties(mut self) -> Self {
        for (key, value) in &self.meta.custom_properties {
            self.headers
                .insert(format!("{RAPIDA_PROPERTY_PREFIX}{key}"), coerce(value));
        }
        self
    }

    pub fn with_user(mut self) -> Self {
        if let Some(user) = self.meta.user_id.as_deref().filter(|u| !u.is_empty()) {
            self.headers.insert(RAPIDA_USER_ID.into(), user.into());
        }
        self
    }

    pub fn with_node(mut self) -> Self {
        if let Some(node) = self.meta.node_id.as_deref().filter(|n| !n.is_empty()) {
            self.headers.insert(RAPIDA_NODE_ID.into(), node.into());
        }
        self
    }

    pub fn with_cache(mut self) -> Self {
        if self.meta.cache == Some(true) {
            self.headers
                .insert(RAPIDA_CACHE_ENABLED.into(), "true".into());
        }
        self
    }

    pub fn with_retry(mut self) -> Self {
        match &self.meta.retry {
            Some(RetrySetting::Enabled(true)) => {
                self.headers
                    .insert(RAPIDA_RETRY_ENABLED.into(), "true".into());
            }
            Some(RetrySetting::Policy(props)) => {
                self.headers
                    .insert(RAPIDA_RETRY_ENABLED.into(), "true".into());
                if let Some(num) = props.num.filter(|n| *n != 0) {
                    self.headers.insert(RAPIDA_RETRY_NUM.into(), num.to_string());
                }
                if let Some(factor) = props.factor.filter(|f| non_zero(*f)) {
                    self.headers
                        .insert(RAPIDA_RETRY_FACTOR.into(), factor.to_string());
                }
                if let Some(min) = props.min_timeout.filter(|t| non_zero(*t)) {
                    self.headers
                        .insert(RAPIDA_RETRY_MIN_TIMEOUT.into(), min.to_string());
                }
                if let Some(max) = props.max_timeout.filter(|t| non_zero(*t)) {
                    self.headers
                        .insert(RAPIDA_RETRY_MAX_TIMEOUT.into(), max.to_string());
                }
            }
            Some(RetrySetting::Enabled(false)) | None => {}
        }
        self
    }

    pub fn with_rate_limit_policy(mut self) -> Self {
        if let Some(policy) = &self.meta.rate_limit_policy {
            let value = policy.header_value();
            if !value.is_empty() {
                self.headers.insert(RAPIDA_RATE_LIMIT_POLICY.into(), value);
            }
        }
        self
    }

    pub fn build(self) -> BTreeMap<String, String> {
        self.headers
    }
}
