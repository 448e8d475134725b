//! Proxy Round Trip
//!
//! Routes one chat completion through the Rapida proxy, prints the proxy's
//! response metadata and leaves a feedback rating on the result.
//!
//! Run with:
//! ```bash
//! export RAPIDA_API_KEY="rk-..."
//! export RAPIDA_PROXY_URL="https://oai.rapida.ai/v1"
//! export OPENAI_API_KEY="sk-..."
//! RUST_LOG=rapida=debug cargo run --example proxy_roundtrip
//! ```

use rapida::correlation::RAPIDA_FIELD;
use rapida::prelude::*;
use rapida::transport::ReqwestTransport;
use rapida::FeedbackClient;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const OPENAI_BASE: &str = "https://api.openai.com/v1";

#[tokio::main]
async fn main() -> Result<(), RapidaError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "rapida=info".into()))
        .init();

    let config = Arc::new(RapidaConfig::from_env()?);
    let openai_key = std::env::var("OPENAI_API_KEY")
        .map_err(|_| RapidaError::configuration("OPENAI_API_KEY is not set"))?;

    // Every response passing through this transport has its Rapida headers
    // filed under the request's correlation id.
    let store = Arc::new(CorrelationStore::default());
    let transport = Arc::new(ResponseHook::new(ReqwestTransport::default(), store.clone()));

    let interceptor =
        ProxyInterceptor::new(config.clone(), ProviderEndpoint::new(OPENAI_BASE)).with_store(store);
    let client = EntryPointRegistry::<RapidaError>::new()
        .register_async(ApiResource::ChatCompletion, move |call: PreparedCall| {
            let transport = transport.clone();
            async move {
                let request =
                    call.transport_request(OPENAI_BASE, ApiResource::ChatCompletion.path())?;
                let response = AsyncTransport::execute(&*transport, request).await?;
                if !response.is_success() {
                    return Err(RapidaError::api_error(
                        response.status,
                        String::from_utf8_lossy(&response.body).into_owned(),
                    ));
                }
                Ok::<AsyncCallResult<RapidaError>, RapidaError>(CallResult::Value(response.json()?))
            }
        })
        .instrument(interceptor);

    let metadata = RequestMetadata::new()
        .with_property("demo", "proxy_roundtrip")
        .with_cache(true)
        .with_retry(RetryProps::new().with_num(2));
    let result = client
        .acreate(
            ApiResource::ChatCompletion,
            CallArgs::new()
                .header("Authorization", format!("Bearer {openai_key}"))
                .param("model", "gpt-4o-mini")
                .param(
                    "messages",
                    serde_json::json!([{"role": "user", "content": "Say hello in one word."}]),
                )
                .metadata(metadata),
        )
        .await?;

    let value = result
        .into_value()
        .ok_or_else(|| RapidaError::validation("expected a single completion"))?;
    println!("completion: {}", value["choices"][0]["message"]["content"]);
    println!("rapida: {}", value[RAPIDA_FIELD]);

    let feedback = FeedbackClient::from_config(&config)?;
    feedback.log_feedback(&value, "helpful", true, Some("bool")).await?;
    println!("feedback recorded");

    Ok(())
}
