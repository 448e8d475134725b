//! Logging flow against a mock logging backend: interceptor, background sink
//! and async logger delivering records over HTTP.

use futures::StreamExt;
use mockito::Matcher;
use rapida::error::RapidaError;
use rapida::interceptor::{AsyncCallResult, CallArgs, CallResult, ChunkStream};
use rapida::logger::{AsyncLogger, BackgroundLogger, LoggingInterceptor, Provider};
use rapida::metadata::RequestMetadata;
use rapida::requester::Requester;
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn value_and_stream_records_reach_backend() {
    let mut server = mockito::Server::new_async().await;
    let value_log = server
        .mock("POST", "/anthropic/v1/log")
        .match_header("authorization", "Bearer rk-log")
        .match_body(Matcher::PartialJson(json!({
            "providerRequest": {
                "url": "/messages",
                "json": {"model": "claude-3-haiku"},
                "meta": {"Rapida-User-Id": "user-7"}
            },
            "providerResponse": {"status": 200, "json": {"id": "msg-1"}}
        })))
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;
    let stream_log = server
        .mock("POST", "/anthropic/v1/log")
        .match_body(Matcher::PartialJson(json!({
            "providerRequest": {"json": {"stream": true}},
            "providerResponse": {"status": 200}
        })))
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let logger = AsyncLogger::new(Requester::new(server.url(), Some("rk-log".into())));
    let (sink, worker) = BackgroundLogger::spawn(logger);
    let interceptor = LoggingInterceptor::new(Arc::new(sink))
        .with_provider(Provider::Anthropic)
        .with_url("/messages");

    let metadata = RequestMetadata::new().with_user_id("user-7");
    let value = interceptor
        .call_async(
            CallArgs::new().param("model", "claude-3-haiku").metadata(metadata),
            |_| async {
                Ok::<AsyncCallResult<RapidaError>, RapidaError>(CallResult::Value(
                    json!({"id": "msg-1"}),
                ))
            },
        )
        .await
        .unwrap()
        .into_value()
        .unwrap();
    assert_eq!(value["rapida_meta"]["Rapida-User-Id"], "user-7");

    let chunks: ChunkStream<RapidaError> =
        Box::pin(futures::stream::iter(vec![Ok(json!({"delta": "a"})), Ok(json!({"delta": "b"}))]));
    let stream = interceptor
        .call_async(CallArgs::new().param("stream", true), |_| async move {
            Ok::<_, RapidaError>(CallResult::Stream(chunks))
        })
        .await
        .unwrap()
        .into_stream()
        .unwrap();
    let pulled: Vec<_> = stream.collect().await;
    assert_eq!(pulled.len(), 2);

    drop(interceptor);
    worker.await.unwrap();

    value_log.assert_async().await;
    stream_log.assert_async().await;
}

#[tokio::test]
async fn backend_outage_does_not_fail_calls() {
    let mut server = mockito::Server::new_async().await;
    let log = server
        .mock("POST", "/oai/v1/log")
        .with_status(503)
        .expect(2)
        .create_async()
        .await;

    let (sink, worker) =
        BackgroundLogger::spawn(AsyncLogger::new(Requester::new(server.url(), None)));
    let interceptor = LoggingInterceptor::new(Arc::new(sink));

    for _ in 0..2 {
        let result = interceptor
            .call_async(CallArgs::new(), |_| async {
                Ok::<AsyncCallResult<RapidaError>, RapidaError>(CallResult::Value(
                    json!({"ok": true}),
                ))
            })
            .await;
        assert!(result.is_ok());
    }

    drop(interceptor);
    worker.await.unwrap();
    log.assert_async().await;
}
