//! Logging interceptor
//!
//! Calls are made as-is; the exchange is recorded and handed to a
//! [`LogSink`]. Stream results are logged once, as a `streamed_data`
//! aggregate, after the caller has pulled the last chunk.

use super::{AsyncLogRequest, LogSink, Provider, ProviderRequest, ProviderResponse, Timing};
use crate::correlation::CorrelationId;
use crate::error::RapidaError;
use crate::interceptor::{
    ApiResource, AsyncCallResult, AsyncEntryPoint, CallArgs, CallResult, ChunkIter, ChunkStream,
    Intercept, PreparedCall, SyncCallResult, SyncEntryPoint,
};
use crate::metadata::RequestMetadata;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Field carrying the metadata headers on logged results.
pub const RAPIDA_META_FIELD: &str = "rapida_meta";

/// Field holding the chunks of a logged stream.
pub const STREAMED_DATA_FIELD: &str = "streamed_data";

/// Recorded when the caller gives no URL and no entry point supplies one.
const UNKNOWN_URL: &str = "N/A";

/// Record under construction for one call.
struct PendingLog {
    sink: Arc<dyn LogSink>,
    provider: Provider,
    request: ProviderRequest,
    started: DateTime<Utc>,
}

impl PendingLog {
    fn finish(self, response: ProviderResponse) {
        let record = AsyncLogRequest {
            provider_request: self.request,
            provider_response: response,
            timing: Timing::from_datetimes(self.started, Utc::now()),
        };
        self.sink.submit(record, self.provider);
    }

    fn meta_value(&self) -> Value {
        Value::Object(
            self.request
                .meta
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        )
    }

    /// Tag a chunk or value with the metadata headers.
    fn tag(&self, value: &mut Value) {
        if let Some(object) = value.as_object_mut() {
            object.insert(RAPIDA_META_FIELD.to_string(), self.meta_value());
        }
    }
}

/// Interceptor that logs each call instead of proxying it.
#[derive(Clone)]
pub struct LoggingInterceptor {
    sink: Arc<dyn LogSink>,
    provider: Provider,
    url: Option<String>,
}

impl fmt::Debug for LoggingInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingInterceptor")
            .field("provider", &self.provider)
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl LoggingInterceptor {
    /// Logs as [`Provider::OpenAi`].
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink,
            provider: Provider::OpenAi,
            url: None,
        }
    }

    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.provider = provider;
        self
    }

    /// URL recorded on every request made through [`call`](Self::call) and
    /// [`call_async`](Self::call_async).
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    fn begin(
        &self,
        url: Option<&str>,
        args: CallArgs,
    ) -> Result<(PreparedCall, PendingLog), RapidaError> {
        let CallArgs {
            headers,
            mut params,
            metadata,
        } = args;
        let inline = RequestMetadata::extract(&mut params)?;
        let metadata = metadata.unwrap_or(inline);
        let meta: BTreeMap<String, String> = metadata.to_headers();

        let url = url
            .or(self.url.as_deref())
            .unwrap_or(UNKNOWN_URL)
            .to_string();
        let pending = PendingLog {
            sink: self.sink.clone(),
            provider: self.provider,
            request: ProviderRequest {
                url,
                json: Value::Object(params.clone()),
                meta,
            },
            started: Utc::now(),
        };
        let call = PreparedCall {
            correlation_id: CorrelationId::new(),
            headers,
            params,
            base_url: None,
        };
        Ok((call, pending))
    }

    fn run<F, E>(&self, url: Option<&str>, args: CallArgs, f: F) -> Result<SyncCallResult<E>, E>
    where
        F: FnOnce(PreparedCall) -> Result<SyncCallResult<E>, E>,
        E: From<RapidaError> + fmt::Display + Send + 'static,
    {
        let (call, pending) = self.begin(url, args)?;
        match f(call) {
            Ok(CallResult::Value(mut value)) => {
                pending.tag(&mut value);
                pending.finish(ProviderResponse::success(value.clone()));
                Ok(CallResult::Value(value))
            }
            Ok(CallResult::Stream(chunks)) => Ok(CallResult::Stream(Box::new(LoggedChunks {
                inner: chunks,
                pending: Some(pending),
                collected: Vec::new(),
            }))),
            Err(e) => {
                pending.finish(ProviderResponse::failure(e.to_string()));
                Err(e)
            }
        }
    }

    async fn run_async<F, Fut, E>(
        &self,
        url: Option<&str>,
        args: CallArgs,
        f: F,
    ) -> Result<AsyncCallResult<E>, E>
    where
        F: FnOnce(PreparedCall) -> Fut + Send,
        Fut: Future<Output = Result<AsyncCallResult<E>, E>> + Send,
        E: From<RapidaError> + fmt::Display + Send + 'static,
    {
        let (call, pending) = self.begin(url, args)?;
        match f(call).await {
            Ok(CallResult::Value(mut value)) => {
                pending.tag(&mut value);
                pending.finish(ProviderResponse::success(value.clone()));
                Ok(CallResult::Value(value))
            }
            Ok(CallResult::Stream(chunks)) => {
                Ok(CallResult::Stream(logged_stream(chunks, pending)))
            }
            Err(e) => {
                pending.finish(ProviderResponse::failure(e.to_string()));
                Err(e)
            }
        }
    }

    /// Make a blocking call and log it.
    pub fn call<F, E>(&self, args: CallArgs, f: F) -> Result<SyncCallResult<E>, E>
    where
        F: FnOnce(PreparedCall) -> Result<SyncCallResult<E>, E>,
        E: From<RapidaError> + fmt::Display + Send + 'static,
    {
        self.run(None, args, f)
    }

    /// Make an async call and log it.
    pub async fn call_async<F, Fut, E>(&self, args: CallArgs, f: F) -> Result<AsyncCallResult<E>, E>
    where
        F: FnOnce(PreparedCall) -> Fut + Send,
        Fut: Future<Output = Result<AsyncCallResult<E>, E>> + Send,
        E: From<RapidaError> + fmt::Display + Send + 'static,
    {
        self.run_async(None, args, f).await
    }
}

/// Blocking stream adapter that tags chunks and logs the aggregate once the
/// inner stream is exhausted.
struct LoggedChunks<E> {
    inner: ChunkIter<E>,
    /// Taken when the aggregate is delivered or abandoned.
    pending: Option<PendingLog>,
    collected: Vec<Value>,
}

impl<E> Iterator for LoggedChunks<E> {
    type Item = Result<Value, E>;

    fn next(&mut self) -> Option<Self::Item> {
        let pending = self.pending.as_ref()?;
        match self.inner.next() {
            Some(Ok(mut chunk)) => {
                pending.tag(&mut chunk);
                self.collected.push(chunk.clone());
                Some(Ok(chunk))
            }
            Some(Err(e)) => {
                // The aggregate is never delivered for a failed stream.
                self.pending = None;
                Some(Err(e))
            }
            None => {
                if let Some(pending) = self.pending.take() {
                    let chunks = std::mem::take(&mut self.collected);
                    pending.finish(ProviderResponse::success(streamed_data(chunks)));
                }
                None
            }
        }
    }
}

fn logged_stream<E: Send + 'static>(inner: ChunkStream<E>, pending: PendingLog) -> ChunkStream<E> {
    Box::pin(async_stream::stream! {
        let mut inner = inner;
        let mut collected = Vec::new();
        let mut failed = false;
        while let Some(item) = inner.next().await {
            match item {
                Ok(mut chunk) => {
                    pending.tag(&mut chunk);
                    collected.push(chunk.clone());
                    yield Ok(chunk);
                }
                Err(e) => {
                    failed = true;
                    yield Err(e);
                    break;
                }
            }
        }
        if !failed {
            pending.finish(ProviderResponse::success(streamed_data(collected)));
        }
    })
}

fn streamed_data(chunks: Vec<Value>) -> Value {
    let mut object = Map::new();
    object.insert(STREAMED_DATA_FIELD.to_string(), Value::Array(chunks));
    Value::Object(object)
}

#[async_trait]
impl<E> Intercept<E> for LoggingInterceptor
where
    E: From<RapidaError> + fmt::Display + Send + 'static,
{
    fn intercept(
        &self,
        resource: ApiResource,
        args: CallArgs,
        entry: &SyncEntryPoint<E>,
    ) -> Result<SyncCallResult<E>, E> {
        let url = self.url.clone().unwrap_or_else(|| resource.path().to_string());
        self.run(Some(&url), args, |call| entry(call))
    }

    async fn intercept_async(
        &self,
        resource: ApiResource,
        args: CallArgs,
        entry: AsyncEntryPoint<E>,
    ) -> Result<AsyncCallResult<E>, E> {
        let url = self.url.clone().unwrap_or_else(|| resource.path().to_string());
        self.run_async(Some(&url), args, move |call| entry(call)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::RAPIDA_USER_ID;
    use crate::interceptor::EntryPointRegistry;
    use serde_json::json;
    use std::sync::Mutex;

    type Records = Arc<Mutex<Vec<(AsyncLogRequest, Provider)>>>;

    fn collecting() -> (Arc<dyn LogSink>, Records) {
        let records: Records = Arc::default();
        let sink = {
            let records = records.clone();
            move |request: AsyncLogRequest, provider: Provider| {
                records.lock().unwrap().push((request, provider));
            }
        };
        (Arc::new(sink), records)
    }

    #[test]
    fn failure_is_logged_as_500_and_error_returned_unchanged() {
        let (sink, records) = collecting();
        let interceptor = LoggingInterceptor::new(sink);

        let err = interceptor
            .call(CallArgs::new().param("model", "gpt-4o"), |_| {
                Err::<SyncCallResult<RapidaError>, _>(RapidaError::TransportError(
                    "upstream slow".into(),
                ))
            })
            .unwrap_err();

        assert_eq!(err, RapidaError::TransportError("upstream slow".into()));
        let records = records.lock().unwrap();
        assert_eq!(records.len(), 1);
        let (record, provider) = &records[0];
        assert_eq!(*provider, Provider::OpenAi);
        assert_eq!(record.provider_response.status, 500);
        assert_eq!(
            record.provider_response.json["error"],
            "Transport error: upstream slow"
        );
        assert_eq!(record.provider_request.json, json!({"model": "gpt-4o"}));
    }

    #[test]
    fn value_is_tagged_and_logged() {
        let (sink, records) = collecting();
        let interceptor = LoggingInterceptor::new(sink).with_url("https://api.openai.com/v1/chat");

        let value = interceptor
            .call(
                CallArgs::new().param("user_id", "u-1").param("model", "gpt-4o"),
                |call| {
                    assert!(!call.params.contains_key("user_id"));
                    Ok::<_, RapidaError>(CallResult::Value(json!({"id": "chatcmpl-1"})))
                },
            )
            .unwrap()
            .into_value()
            .unwrap();

        assert_eq!(value[RAPIDA_META_FIELD][RAPIDA_USER_ID], "u-1");
        let records = records.lock().unwrap();
        let (record, _) = &records[0];
        assert_eq!(record.provider_response.status, 200);
        assert_eq!(record.provider_response.json, value);
        assert_eq!(record.provider_request.url, "https://api.openai.com/v1/chat");
        assert_eq!(record.provider_request.meta[RAPIDA_USER_ID], "u-1");
    }

    #[test]
    fn stream_aggregate_is_delivered_once_after_last_chunk() {
        let (sink, records) = collecting();
        let interceptor = LoggingInterceptor::new(sink);

        let result = interceptor
            .call(CallArgs::new(), |_| {
                let chunks = (0..3).map(|i| Ok::<_, RapidaError>(json!({"index": i})));
                Ok(CallResult::Stream(Box::new(chunks) as ChunkIter<RapidaError>))
            })
            .unwrap();
        let mut stream = result.into_stream().unwrap();

        for _ in 0..3 {
            stream.next().unwrap().unwrap();
            assert!(records.lock().unwrap().is_empty());
        }
        assert!(stream.next().is_none());
        assert!(stream.next().is_none());

        let records = records.lock().unwrap();
        assert_eq!(records.len(), 1);
        let data = &records[0].0.provider_response.json[STREAMED_DATA_FIELD];
        assert_eq!(data.as_array().unwrap().len(), 3);
        assert!(data[2].get(RAPIDA_META_FIELD).is_some());
    }

    #[test]
    fn failed_stream_never_delivers_the_aggregate() {
        let (sink, records) = collecting();
        let interceptor = LoggingInterceptor::new(sink);

        let result = interceptor
            .call(CallArgs::new(), |_| {
                let chunks = vec![
                    Ok(json!({"index": 0})),
                    Err(RapidaError::TransportError("reset".into())),
                    Ok(json!({"index": 2})),
                ];
                Ok(CallResult::Stream(Box::new(chunks.into_iter()) as ChunkIter<RapidaError>))
            })
            .unwrap();

        let items: Vec<_> = result.into_stream().unwrap().collect();

        assert_eq!(items.len(), 2);
        assert!(items[1].is_err());
        assert!(records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn async_failure_is_logged() {
        let (sink, records) = collecting();
        let interceptor = LoggingInterceptor::new(sink).with_provider(Provider::Anthropic);

        let err = interceptor
            .call_async(CallArgs::new(), |_| async {
                Err::<AsyncCallResult<RapidaError>, _>(RapidaError::HttpError(
                    "upstream slow".into(),
                ))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, RapidaError::HttpError(_)));
        let records = records.lock().unwrap();
        assert_eq!(records[0].1, Provider::Anthropic);
        assert_eq!(records[0].0.provider_response.status, 500);
    }

    #[tokio::test]
    async fn async_stream_logs_after_exhaustion() {
        let (sink, records) = collecting();
        let interceptor = LoggingInterceptor::new(sink);

        let result = interceptor
            .call_async(CallArgs::new(), |_| async {
                let chunks = futures::stream::iter((0..2).map(|i| Ok(json!({"index": i}))));
                Ok::<_, RapidaError>(CallResult::Stream(
                    Box::pin(chunks) as ChunkStream<RapidaError>
                ))
            })
            .await
            .unwrap();
        let mut stream = result.into_stream().unwrap();

        stream.next().await.unwrap().unwrap();
        stream.next().await.unwrap().unwrap();
        assert!(records.lock().unwrap().is_empty());
        assert!(stream.next().await.is_none());

        let records = records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].0.provider_response.json[STREAMED_DATA_FIELD][1]["index"],
            1
        );
    }

    #[test]
    fn registry_records_resource_path() {
        let (sink, records) = collecting();
        let client = EntryPointRegistry::<RapidaError>::new()
            .register_sync(ApiResource::Embedding, |_call: PreparedCall| {
                Ok(CallResult::Value(json!({"data": []})))
            })
            .instrument(LoggingInterceptor::new(sink));

        client.create(ApiResource::Embedding, CallArgs::new()).unwrap();

        assert_eq!(records.lock().unwrap()[0].0.provider_request.url, "/embeddings");
    }
}
