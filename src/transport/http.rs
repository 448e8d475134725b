//! reqwest-backed transports.

use super::{
    AsyncTransport, StreamingResponse, Transport, TransportRequest, TransportResponse,
    decode_events,
};
use crate::error::RapidaError;
use async_trait::async_trait;

/// Async transport over `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn builder(&self, request: TransportRequest) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);
        match &request.body {
            Some(body) => builder.json(body),
            None => builder,
        }
    }
}

#[async_trait]
impl AsyncTransport for ReqwestTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, RapidaError> {
        let response = self.builder(request).send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }

    async fn execute_stream(
        &self,
        request: TransportRequest,
    ) -> Result<StreamingResponse, RapidaError> {
        let response = self.builder(request).send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();

        Ok(StreamingResponse {
            status,
            headers,
            events: decode_events(response.bytes_stream()),
        })
    }
}

/// Blocking transport over `reqwest::blocking::Client`.
///
/// Like the client it wraps, it must not be driven from inside an async
/// runtime worker thread.
#[derive(Debug, Clone)]
pub struct BlockingReqwestTransport {
    client: reqwest::blocking::Client,
}

impl BlockingReqwestTransport {
    pub fn new(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }
}

impl Default for BlockingReqwestTransport {
    fn default() -> Self {
        Self::new(reqwest::blocking::Client::new())
    }
}

impl Transport for BlockingReqwestTransport {
    fn execute(&self, request: TransportRequest) -> Result<TransportResponse, RapidaError> {
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send()?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes()?.to_vec();

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::{CorrelationId, CorrelationStore};
    use crate::headers::RAPIDA_REQUEST_ID;
    use crate::transport::ResponseHook;
    use futures::StreamExt;
    use reqwest::header::{HeaderMap, HeaderValue};
    use std::sync::Arc;

    #[tokio::test]
    async fn reqwest_transport_round_trip_through_hook() {
        let mut server = mockito::Server::new_async().await;
        let id = CorrelationId::new();
        let _m = server
            .mock("POST", "/v1/chat/completions")
            .match_header(RAPIDA_REQUEST_ID, id.to_string().as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_header("Rapida-Id", "resp-42")
            .with_header("Rapida-Cache", "MISS")
            .with_body("{\"id\":\"chatcmpl-1\"}")
            .create_async()
            .await;

        let store = Arc::new(CorrelationStore::default());
        let transport = ResponseHook::new(ReqwestTransport::default(), store.clone());

        let mut headers = HeaderMap::new();
        headers.insert(
            RAPIDA_REQUEST_ID,
            HeaderValue::from_str(&id.to_string()).unwrap(),
        );
        let request = TransportRequest::post(
            format!("{}/v1/chat/completions", server.url()),
            headers,
            serde_json::json!({"model": "gpt-4o"}),
        );

        let response = AsyncTransport::execute(&transport, request).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.json().unwrap()["id"], "chatcmpl-1");
        let meta = store.get(&id).unwrap();
        assert_eq!(meta.id.as_deref(), Some("resp-42"));
        assert_eq!(meta.cache.as_deref(), Some("MISS"));
    }

    #[tokio::test]
    async fn non_success_status_is_returned_not_raised() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/v1/chat/completions")
            .with_status(429)
            .with_body("slow down")
            .create_async()
            .await;

        let transport = ReqwestTransport::default();
        let request = TransportRequest::post(
            format!("{}/v1/chat/completions", server.url()),
            HeaderMap::new(),
            serde_json::json!({}),
        );

        let response = AsyncTransport::execute(&transport, request).await.unwrap();
        assert_eq!(response.status, 429);
        assert!(!response.is_success());
        assert_eq!(response.body, b"slow down");
    }

    #[tokio::test]
    async fn streamed_events_are_decoded_and_recorded() {
        let mut server = mockito::Server::new_async().await;
        let id = CorrelationId::new();
        let _m = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_header("Rapida-Id", "resp-sse")
            .with_body(
                "data: {\"delta\":\"Hel\"}\n\n\
                 event: message\ndata: {\"delta\":\"lo\"}\n\n\
                 data: [DONE]\n\n",
            )
            .create_async()
            .await;

        let store = Arc::new(CorrelationStore::default());
        let transport = ResponseHook::new(ReqwestTransport::default(), store.clone());
        let mut headers = HeaderMap::new();
        headers.insert(
            RAPIDA_REQUEST_ID,
            HeaderValue::from_str(&id.to_string()).unwrap(),
        );
        let request = TransportRequest::post(
            format!("{}/v1/chat/completions", server.url()),
            headers,
            serde_json::json!({"stream": true}),
        );

        let response = transport.execute_stream(request).await.unwrap();
        assert_eq!(store.get(&id).and_then(|m| m.id).as_deref(), Some("resp-sse"));

        let deltas: Vec<_> = response
            .events
            .map(|event| event.unwrap()["delta"].clone())
            .collect()
            .await;
        assert_eq!(deltas, vec!["Hel", "lo"]);
    }
}
