//! Response hook
//!
//! Observation point on the transport. It never changes what goes over the
//! wire, retries, or error semantics; it only files the proxy's response
//! headers under the request's correlation id.

use super::{AsyncTransport, StreamingResponse, Transport, TransportRequest, TransportResponse};
use crate::correlation::{CorrelationId, CorrelationStore, ResponseMetadata};
use crate::error::RapidaError;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use std::sync::Arc;

/// Transport wrapper that records response metadata per correlation id.
#[derive(Debug, Clone)]
pub struct ResponseHook<T> {
    inner: T,
    store: Arc<CorrelationStore>,
}

impl<T> ResponseHook<T> {
    pub fn new(inner: T, store: Arc<CorrelationStore>) -> Self {
        Self { inner, store }
    }

    pub fn store(&self) -> &Arc<CorrelationStore> {
        &self.store
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    fn record(&self, id: Option<CorrelationId>, status: u16, headers: &HeaderMap) {
        if let Some(id) = id {
            let metadata = ResponseMetadata::from_headers(headers);
            tracing::trace!(
                target: "rapida::hook",
                correlation_id = %id,
                status,
                rapida_id = ?metadata.id,
                "recorded response metadata"
            );
            self.store.put(id, metadata);
        }
    }
}

/// Wrap `transport` against the process-wide correlation store.
pub fn install<T>(transport: T) -> ResponseHook<T> {
    ResponseHook::new(transport, CorrelationStore::global())
}

impl<T: Transport> Transport for ResponseHook<T> {
    fn execute(&self, request: TransportRequest) -> Result<TransportResponse, RapidaError> {
        let id = request.correlation_id();
        let response = self.inner.execute(request)?;
        self.record(id, response.status, &response.headers);
        Ok(response)
    }
}

#[async_trait]
impl<T: AsyncTransport> AsyncTransport for ResponseHook<T> {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, RapidaError> {
        let id = request.correlation_id();
        let response = self.inner.execute(request).await?;
        self.record(id, response.status, &response.headers);
        Ok(response)
    }

    /// Records as soon as headers arrive, before any event is read.
    async fn execute_stream(
        &self,
        request: TransportRequest,
    ) -> Result<StreamingResponse, RapidaError> {
        let id = request.correlation_id();
        let response = self.inner.execute_stream(request).await?;
        self.record(id, response.status, &response.headers);
        Ok(response)
    }
}
