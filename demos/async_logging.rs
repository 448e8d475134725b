//! Async Logging
//!
//! Calls go straight to the provider; a record of each exchange is posted to
//! the Rapida logging backend from a background task. The provider here is a
//! stand-in that answers locally, so only the log records leave the process.
//!
//! Run with:
//! ```bash
//! export RAPIDA_API_KEY="rk-..."
//! RUST_LOG=rapida=debug cargo run --example async_logging
//! ```

use futures::StreamExt;
use rapida::prelude::*;
use serde_json::json;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Stand-in for a provider's chat endpoint.
async fn fake_completion(call: PreparedCall) -> Result<AsyncCallResult<RapidaError>, RapidaError> {
    let model = call.params.get("model").cloned().unwrap_or_default();
    if call.params.get("stream").and_then(|v| v.as_bool()) == Some(true) {
        let chunks = ["Hel", "lo", "!"]
            .into_iter()
            .map(move |text| {
                Ok(json!({"model": model, "choices": [{"delta": {"content": text}}]}))
            });
        let stream: ChunkStream<RapidaError> = Box::pin(futures::stream::iter(chunks));
        return Ok(CallResult::Stream(stream));
    }
    Ok(CallResult::Value(json!({
        "id": "chatcmpl-demo",
        "model": model,
        "choices": [{"message": {"role": "assistant", "content": "Hello!"}}]
    })))
}

#[tokio::main]
async fn main() -> Result<(), RapidaError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "rapida=info".into()))
        .init();

    let config = RapidaConfig::from_env()?;
    let (sink, worker) = BackgroundLogger::spawn(AsyncLogger::from_config(&config));

    let interceptor = LoggingInterceptor::new(Arc::new(sink))
        .with_provider(Provider::OpenAi)
        .with_url("/chat/completions");

    let metadata = RequestMetadata::new()
        .with_property("demo", "async_logging")
        .with_user_id("user-42");
    let result = interceptor
        .call_async(
            CallArgs::new().param("model", "gpt-4o-mini").metadata(metadata.clone()),
            fake_completion,
        )
        .await?;
    if let Some(value) = result.into_value() {
        println!("value: {value}");
    }

    let result = interceptor
        .call_async(
            CallArgs::new()
                .param("model", "gpt-4o-mini")
                .param("stream", true)
                .metadata(metadata),
            fake_completion,
        )
        .await?;
    if let Some(mut chunks) = result.into_stream() {
        while let Some(chunk) = chunks.next().await {
            println!("chunk: {}", chunk?);
        }
    }

    // Dropping the last sink handle lets the worker drain its queue and stop.
    drop(interceptor);
    worker
        .await
        .map_err(|e| RapidaError::TransportError(format!("log worker failed: {e}")))?;
    println!("all records delivered");

    Ok(())
}
