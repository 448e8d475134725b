//! Result Correlator
//!
//! Joins a call's result with the response metadata the hook recorded for its
//! correlation id. Values are augmented in place; streams are wrapped so each
//! element is augmented as it is pulled, never ahead of time.

use crate::correlation::{CorrelationId, CorrelationStore, ResponseMetadata};
use crate::interceptor::{
    AsyncCallResult, CallResult, ChunkIter, ChunkStream, SyncCallResult,
};
use futures::StreamExt;
use serde_json::Value;
use std::sync::Arc;

/// Attaches [`ResponseMetadata`] to call results.
#[derive(Debug, Clone)]
pub struct ResultCorrelator {
    store: Arc<CorrelationStore>,
}

impl ResultCorrelator {
    pub fn new(store: Arc<CorrelationStore>) -> Self {
        Self { store }
    }

    /// Correlator over the process-wide store.
    pub fn global() -> Self {
        Self::new(CorrelationStore::global())
    }

    pub fn store(&self) -> &Arc<CorrelationStore> {
        &self.store
    }

    /// Metadata recorded for `id`, or all-null metadata when the hook never
    /// fired for it.
    pub fn lookup(&self, id: &CorrelationId) -> ResponseMetadata {
        self.store.get(id).unwrap_or_default()
    }

    /// Add the `rapida` field to one value.
    pub fn attach(&self, id: &CorrelationId, mut value: Value) -> Value {
        let metadata = self.lookup(id);
        if !metadata.attach_to(&mut value) {
            tracing::warn!(
                target: "rapida::correlator",
                correlation_id = %id,
                "result is not a JSON object; returning it without response metadata"
            );
        }
        value
    }

    /// Wrap a blocking chunk iterator.
    pub fn correlate_iter<E>(&self, id: CorrelationId, inner: ChunkIter<E>) -> CorrelatedIter<E> {
        CorrelatedIter {
            inner,
            id,
            correlator: self.clone(),
        }
    }

    /// Wrap an async chunk stream.
    pub fn correlate_stream<E>(&self, id: CorrelationId, inner: ChunkStream<E>) -> ChunkStream<E>
    where
        E: Send + 'static,
    {
        let correlator = self.clone();
        Box::pin(inner.map(move |item| item.map(|chunk| correlator.attach(&id, chunk))))
    }

    /// Correlate a blocking call's result, preserving its shape.
    pub fn correlate<E>(&self, id: CorrelationId, result: SyncCallResult<E>) -> SyncCallResult<E>
    where
        E: Send + 'static,
    {
        match result {
            CallResult::Value(value) => CallResult::Value(self.attach(&id, value)),
            CallResult::Stream(chunks) => {
                CallResult::Stream(Box::new(self.correlate_iter(id, chunks)))
            }
        }
    }

    /// Correlate an async call's result, preserving its shape.
    pub fn correlate_async<E>(
        &self,
        id: CorrelationId,
        result: AsyncCallResult<E>,
    ) -> AsyncCallResult<E>
    where
        E: Send + 'static,
    {
        match result {
            CallResult::Value(value) => CallResult::Value(self.attach(&id, value)),
            CallResult::Stream(chunks) => CallResult::Stream(self.correlate_stream(id, chunks)),
        }
    }
}

impl Default for ResultCorrelator {
    fn default() -> Self {
        Self::global()
    }
}

/// Iterator adapter produced by [`ResultCorrelator::correlate_iter`].
pub struct CorrelatedIter<E> {
    inner: ChunkIter<E>,
    id: CorrelationId,
    correlator: ResultCorrelator,
}

impl<E> Iterator for CorrelatedIter<E> {
    type Item = Result<Value, E>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.inner.next()?;
        Some(item.map(|chunk| self.correlator.attach(&self.id, chunk)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<E> std::fmt::Debug for CorrelatedIter<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorrelatedIter")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::{RAPIDA_FIELD, StoreStats};
    use crate::error::RapidaError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn seeded(id: CorrelationId) -> ResultCorrelator {
        let store = Arc::new(CorrelationStore::default());
        store.put(
            id,
            ResponseMetadata {
                id: Some("resp-7".into()),
                status: Some("200".into()),
                cache: Some("HIT".into()),
                rate_limit: None,
            },
        );
        ResultCorrelator::new(store)
    }

    #[test]
    #[tracing_test::traced_test]
    fn non_object_result_logs_warning() {
        let id = CorrelationId::new();
        let correlator = seeded(id);

        let value = correlator.attach(&id, json!(["a", "b"]));

        assert_eq!(value, json!(["a", "b"]));
        assert!(logs_contain("not a JSON object"));
    }

    fn chunks(n: usize) -> Vec<Result<Value, RapidaError>> {
        (0..n).map(|i| Ok(json!({"index": i}))).collect()
    }

    #[test]
    fn value_gains_exactly_the_rapida_field() {
        let id = CorrelationId::new();
        let correlator = seeded(id);

        let value = correlator.attach(
            &id,
            json!({"id": "chatcmpl-1", "object": "chat.completion"}),
        );

        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 3);
        assert_eq!(object["id"], "chatcmpl-1");
        assert_eq!(object[RAPIDA_FIELD]["id"], "resp-7");
        assert_eq!(object[RAPIDA_FIELD]["cache"], "HIT");
    }

    #[test]
    fn missing_entry_yields_null_metadata() {
        let correlator = ResultCorrelator::new(Arc::new(CorrelationStore::default()));
        let value = correlator.attach(&CorrelationId::new(), json!({}));
        assert_eq!(
            value[RAPIDA_FIELD],
            json!({"id": null, "status": null, "cache": null, "rate_limit": null})
        );
    }

    #[test]
    fn non_object_passes_through() {
        let correlator = ResultCorrelator::new(Arc::new(CorrelationStore::default()));
        assert_eq!(correlator.attach(&CorrelationId::new(), json!("text")), json!("text"));
    }

    #[test]
    fn five_chunk_stream_reads_store_five_times() {
        let id = CorrelationId::new();
        let correlator = seeded(id);

        let result: SyncCallResult<RapidaError> =
            CallResult::Stream(Box::new(chunks(5).into_iter()));
        let CallResult::Stream(stream) = correlator.correlate(id, result) else {
            panic!("stream result must stay a stream");
        };
        let out: Vec<Value> = stream.map(Result::unwrap).collect();

        assert_eq!(out.len(), 5);
        for (i, chunk) in out.iter().enumerate() {
            assert_eq!(chunk["index"], i);
            assert_eq!(chunk[RAPIDA_FIELD], out[0][RAPIDA_FIELD]);
        }
        assert_eq!(correlator.store().stats(), StoreStats { reads: 5, writes: 1 });
    }

    #[test]
    fn iterator_is_lazy() {
        let id = CorrelationId::new();
        let correlator = seeded(id);
        let pulled = Arc::new(AtomicUsize::new(0));

        let counter = pulled.clone();
        let source = (0..3).map(move |i| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, RapidaError>(json!({"index": i}))
        });
        let mut iter = correlator.correlate_iter(id, Box::new(source));

        assert_eq!(pulled.load(Ordering::SeqCst), 0);
        assert_eq!(correlator.store().stats().reads, 0);

        iter.next().unwrap().unwrap();
        assert_eq!(pulled.load(Ordering::SeqCst), 1);
        assert_eq!(correlator.store().stats().reads, 1);
    }

    #[test]
    fn error_elements_pass_through() {
        let id = CorrelationId::new();
        let correlator = seeded(id);
        let source = vec![
            Ok(json!({"index": 0})),
            Err(RapidaError::TransportError("reset".into())),
        ];

        let out: Vec<_> = correlator
            .correlate_iter(id, Box::new(source.into_iter()))
            .collect();

        assert!(out[0].as_ref().unwrap().get(RAPIDA_FIELD).is_some());
        assert_eq!(out[1], Err(RapidaError::TransportError("reset".into())));
        assert_eq!(correlator.store().stats().reads, 1);
    }

    #[tokio::test]
    async fn async_stream_is_correlated_per_chunk() {
        let id = CorrelationId::new();
        let correlator = seeded(id);

        let stream: ChunkStream<RapidaError> = Box::pin(futures::stream::iter(chunks(5)));
        let CallResult::Stream(stream) =
            correlator.correlate_async(id, CallResult::Stream(stream))
        else {
            panic!("stream result must stay a stream");
        };

        assert_eq!(correlator.store().stats().reads, 0);
        let out: Vec<_> = stream.collect().await;

        assert_eq!(out.len(), 5);
        assert!(out.iter().all(|c| c.as_ref().unwrap()[RAPIDA_FIELD]["id"] == "resp-7"));
        assert_eq!(correlator.store().stats(), StoreStats { reads: 5, writes: 1 });
    }

    #[tokio::test]
    async fn async_value_is_correlated() {
        let id = CorrelationId::new();
        let correlator = seeded(id);

        let result = correlator
            .correlate_async::<RapidaError>(id, CallResult::Value(json!({"ok": true})));

        let value = result.into_value().unwrap();
        assert_eq!(value["ok"], true);
        assert_eq!(value[RAPIDA_FIELD]["status"], "200");
    }
}
