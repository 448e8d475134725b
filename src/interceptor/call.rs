//! Call Types
//!
//! The shapes an intercepted call goes in and comes out as.

use crate::correlation::CorrelationId;
use crate::error::RapidaError;
use crate::headers::to_header_map;
use crate::metadata::RequestMetadata;
use crate::transport::TransportRequest;
use futures::Stream;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::pin::Pin;

/// Blocking stream of response chunks.
pub type ChunkIter<E> = Box<dyn Iterator<Item = Result<Value, E>> + Send>;

/// Async stream of response chunks.
pub type ChunkStream<E> = Pin<Box<dyn Stream<Item = Result<Value, E>> + Send>>;

/// Result of a provider call: one value, or a lazily produced sequence.
///
/// The tag is decided once, by the call, and every layer above dispatches on
/// it instead of inspecting the payload.
pub enum CallResult<S> {
    Value(Value),
    Stream(S),
}

/// Result of a blocking provider call.
pub type SyncCallResult<E> = CallResult<ChunkIter<E>>;

/// Result of an async provider call.
pub type AsyncCallResult<E> = CallResult<ChunkStream<E>>;

impl<S> CallResult<S> {
    pub fn is_stream(&self) -> bool {
        matches!(self, Self::Stream(_))
    }

    /// The value, if this is not a stream.
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Stream(_) => None,
        }
    }

    /// The stream, if this is one.
    pub fn into_stream(self) -> Option<S> {
        match self {
            Self::Value(_) => None,
            Self::Stream(stream) => Some(stream),
        }
    }
}

impl<S> std::fmt::Debug for CallResult<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// What the caller hands to an intercepted call.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    /// Caller-declared headers. Generated headers replace same-named entries,
    /// except `Rapida-Auth`, which the caller may supply.
    pub headers: HashMap<String, String>,
    /// Provider parameters. Inline metadata keys are stripped before the call.
    pub params: Map<String, Value>,
    /// Pre-built metadata. Takes precedence over inline keys.
    pub metadata: Option<RequestMetadata>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a JSON object of parameters. Non-objects yield empty params.
    pub fn from_params(params: Value) -> Self {
        let params = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            params,
            ..Default::default()
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn metadata(mut self, metadata: RequestMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A call after interception: what the underlying provider call receives.
#[derive(Debug, Clone)]
pub struct PreparedCall {
    pub correlation_id: CorrelationId,
    /// Merged headers: caller headers, auth, correlation id, metadata.
    pub headers: HashMap<String, String>,
    /// Provider parameters with metadata keys removed.
    pub params: Map<String, Value>,
    /// Base URL this call must be sent to. `None` leaves the provider's own
    /// configuration in charge.
    pub base_url: Option<String>,
}

impl PreparedCall {
    /// Parameters as a JSON body.
    pub fn body(&self) -> Value {
        Value::Object(self.params.clone())
    }

    /// Build a JSON POST for `path`, resolved against [`base_url`](Self::base_url)
    /// or `fallback_base` when no routing applies.
    pub fn transport_request(
        &self,
        fallback_base: &str,
        path: &str,
    ) -> Result<TransportRequest, RapidaError> {
        let base = self.base_url.as_deref().unwrap_or(fallback_base);
        let url = format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Ok(TransportRequest::post(url, to_header_map(&self.headers)?, self.body()))
    }
}
