//! Async logging
//!
//! For setups that do not route traffic through the proxy: the call goes
//! straight to the provider and a record of the exchange is posted to Rapida
//! afterwards.
//!
//! - [`AsyncLogger`] posts one [`AsyncLogRequest`] to the log endpoint of a
//!   [`Provider`].
//! - [`LogSink`] is where interceptors hand records; [`BackgroundLogger`] is
//!   the sink that forwards them to an `AsyncLogger` off the call path.
//! - [`LoggingInterceptor`] wraps calls and produces the records.

mod interceptor;
mod records;
mod sink;

pub use interceptor::{LoggingInterceptor, RAPIDA_META_FIELD, STREAMED_DATA_FIELD};
pub use records::{
    AsyncLogRequest, Provider, ProviderRequest, ProviderResponse, Timing, UnixTimestamp,
};
pub use sink::{BackgroundLogger, LogSink};

use crate::config::{self, RapidaConfig};
use crate::error::RapidaError;
use crate::requester::Requester;
use reqwest::Method;
use serde_json::Value;

/// Posts log records to the Rapida logging backend.
#[derive(Debug, Clone)]
pub struct AsyncLogger {
    requester: Requester,
}

impl AsyncLogger {
    pub fn new(requester: Requester) -> Self {
        Self { requester }
    }

    pub fn from_config(config: &RapidaConfig) -> Self {
        Self::new(Requester::from_config(config))
    }

    /// Logger over the process-wide configuration.
    pub fn from_global() -> Self {
        Self::from_config(&config::global())
    }

    pub fn requester(&self) -> &Requester {
        &self.requester
    }

    /// Post `request` to the log endpoint for `provider`.
    pub async fn log(
        &self,
        request: &AsyncLogRequest,
        provider: Provider,
    ) -> Result<Value, RapidaError> {
        let url = provider.log_url(self.requester.base_url())?;
        tracing::debug!(
            target: "rapida::logger",
            %provider,
            status = request.provider_response.status,
            "posting async log record"
        );
        self.requester.send(Method::POST, url, request).await
    }

    /// Like [`log`](Self::log), with the provider given by its tag
    /// (`"openai"`, `"azure-openai"`, `"anthropic"`, `"custom-model"`).
    pub async fn log_tagged(
        &self,
        request: &AsyncLogRequest,
        provider: &str,
    ) -> Result<Value, RapidaError> {
        let provider: Provider = provider.parse()?;
        self.log(request, provider).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn record() -> AsyncLogRequest {
        AsyncLogRequest {
            provider_request: ProviderRequest {
                url: "/chat/completions".into(),
                json: json!({"model": "gpt-4o"}),
                meta: BTreeMap::new(),
            },
            provider_response: ProviderResponse::success(json!({"id": "chatcmpl-1"})),
            timing: Timing::from_millis(1_000, 2_500),
        }
    }

    #[tokio::test]
    async fn posts_to_provider_path_with_bearer() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/oai/v1/log")
            .match_header("authorization", "Bearer rk-log")
            .match_body(Matcher::PartialJson(json!({
                "providerResponse": {"status": 200},
                "timing": {"endTime": {"seconds": 2, "milliseconds": 500}}
            })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let logger = AsyncLogger::new(Requester::new(server.url(), Some("rk-log".into())));
        logger.log(&record(), Provider::OpenAi).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unknown_tag_fails_before_any_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", Matcher::Any).expect(0).create_async().await;

        let logger = AsyncLogger::new(Requester::new(server.url(), None));
        let err = logger.log_tagged(&record(), "cohere").await.unwrap_err();

        assert!(err.is_validation());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn upstream_failure_is_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/anthropic/v1/log")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let logger = AsyncLogger::new(Requester::new(server.url(), None));
        let err = logger.log_tagged(&record(), "anthropic").await.unwrap_err();

        assert_eq!(err.status_code(), Some(500));
    }
}
