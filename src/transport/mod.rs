//! HTTP transport abstraction
//!
//! The "send request, get raw response" entry points the provider client goes
//! through. Both shapes exist: [`Transport`] for blocking call surfaces and
//! [`AsyncTransport`] for async ones. [`ResponseHook`] wraps either to observe
//! the proxy's response headers, and the reqwest-backed implementations in
//! [`http`] do the actual I/O. Streamed bodies are decoded by [`sse`] as they
//! arrive.

mod hook;
pub mod http;
pub mod sse;

pub use hook::{ResponseHook, install};
pub use http::{BlockingReqwestTransport, ReqwestTransport};
pub use sse::decode_events;

use crate::correlation::CorrelationId;
use crate::error::RapidaError;
use crate::interceptor::ChunkStream;
use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::HeaderMap;

/// Transport-level request.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
}

impl TransportRequest {
    /// JSON POST to `url`.
    pub fn post(url: impl Into<String>, headers: HeaderMap, body: serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            headers,
            body: Some(body),
        }
    }

    /// Correlation id placed on this request by the interceptor.
    pub fn correlation_id(&self) -> Option<CorrelationId> {
        CorrelationId::from_header_map(&self.headers)
    }
}

/// Transport-level response.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON.
    pub fn json(&self) -> Result<serde_json::Value, RapidaError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Response whose body is a live server-sent-event stream.
///
/// Status and headers are known before the first event is read; callers
/// check [`status`](Self::status) before consuming [`events`](Self::events).
pub struct StreamingResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub events: ChunkStream<RapidaError>,
}

impl StreamingResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl std::fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Blocking transport entry point.
pub trait Transport: Send + Sync {
    fn execute(&self, request: TransportRequest) -> Result<TransportResponse, RapidaError>;
}

/// Async transport entry point.
#[async_trait]
pub trait AsyncTransport: Send + Sync {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, RapidaError>;

    /// Send `request` and decode the response body as server-sent events.
    ///
    /// The default reads the whole body through [`execute`](Self::execute)
    /// first; transports that can read incrementally override it.
    async fn execute_stream(
        &self,
        request: TransportRequest,
    ) -> Result<StreamingResponse, RapidaError> {
        let TransportResponse {
            status,
            headers,
            body,
        } = self.execute(request).await?;
        let body = futures::stream::once(async move { Ok::<_, RapidaError>(body) });
        Ok(StreamingResponse {
            status,
            headers,
            events: decode_events(body),
        })
    }
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn execute(&self, request: TransportRequest) -> Result<TransportResponse, RapidaError> {
        (**self).execute(request)
    }
}

#[async_trait]
impl<T: AsyncTransport + ?Sized> AsyncTransport for std::sync::Arc<T> {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, RapidaError> {
        (**self).execute(request).await
    }

    async fn execute_stream(
        &self,
        request: TransportRequest,
    ) -> Result<StreamingResponse, RapidaError> {
        (**self).execute_stream(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    fn response(body: &str) -> TransportResponse {
        TransportResponse {
            status: 200,
            headers: HeaderMap::new(),
            body: body.as_bytes().to_vec(),
        }
    }

    /// Answers every request with a fixed buffered body.
    struct Canned(&'static str);

    #[async_trait]
    impl AsyncTransport for Canned {
        async fn execute(
            &self,
            _request: TransportRequest,
        ) -> Result<TransportResponse, RapidaError> {
            Ok(response(self.0))
        }
    }

    #[tokio::test]
    async fn buffered_transports_still_stream_events() {
        let transport = Canned("data: {\"n\":1}\n\ndata: {\"n\":2}\n\ndata: [DONE]\n\n");
        let request = TransportRequest::post("http://proxy.invalid", HeaderMap::new(), json!({}));

        let response = transport.execute_stream(request).await.unwrap();
        assert!(response.is_success());

        let events: Vec<_> = response.events.map(Result::unwrap).collect().await;
        assert_eq!(events, vec![json!({"n": 1}), json!({"n": 2})]);
    }

    #[test]
    fn json_body_decodes() {
        let value = response("{\"ok\":true}").json().unwrap();
        assert_eq!(value["ok"], true);
        assert!(response("nope").json().is_err());
    }
}
