use crate::headers::{header_str, response::*};
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field added to caller-visible results.
pub const RAPIDA_FIELD: &str = "rapida";

/// Rate-limit state reported by the proxy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
    pub limit: Option<String>,
    pub remaining: Option<String>,
    pub reset: Option<String>,
    pub policy: Option<String>,
}

/// Server-observed facts about a completed call.
///
/// Every field is optional: a call that never reached the proxy, or whose
/// hook never fired, correlates to `ResponseMetadata::default()`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub id: Option<String>,
    pub status: Option<String>,
    pub cache: Option<String>,
    pub rate_limit: Option<RateLimitSnapshot>,
}

impl ResponseMetadata {
    /// Read the proxy's response headers.
    ///
    /// The rate-limit snapshot is only present when the proxy reports a policy.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let get = |name: &str| header_str(headers, name).map(str::to_string);

        let rate_limit = get(RAPIDA_RATE_LIMIT_POLICY).map(|policy| RateLimitSnapshot {
            limit: get(RAPIDA_RATE_LIMIT_LIMIT),
            remaining: get(RAPIDA_RATE_LIMIT_REMAINING),
            reset: get(RAPIDA_RATE_LIMIT_RESET),
            policy: Some(policy),
        });

        Self {
            id: get(RAPIDA_ID),
            status: get(RAPIDA_STATUS),
            cache: get(RAPIDA_CACHE),
            rate_limit,
        }
    }

    /// JSON form attached under [`RAPIDA_FIELD`].
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "id": self.id,
            "status": self.status,
            "cache": self.cache,
            "rate_limit": self.rate_limit.as_ref().map(|rl| serde_json::json!({
                "limit": rl.limit,
                "remaining": rl.remaining,
                "reset": rl.reset,
                "policy": rl.policy,
            })),
        })
    }

    /// Insert this metadata into a JSON object under [`RAPIDA_FIELD`].
    ///
    /// Returns `false` and leaves the value untouched when it is not an
    /// object.
    pub fn attach_to(&self, value: &mut Value) -> bool {
        match value.as_object_mut() {
            Some(object) => {
                object.insert(RAPIDA_FIELD.to_string(), self.to_value());
                true
            }
            None => false,
        }
    }
}
