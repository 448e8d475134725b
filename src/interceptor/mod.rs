//! Call Interceptor
//!
//! Wraps one invocation of a provider call. Before the call it:
//!
//! - folds caller metadata (pre-built or inline) into headers,
//! - mints the correlation id the response hook will see,
//! - points the call at the proxy when one is configured.
//!
//! After the call it hands the result to the [`ResultCorrelator`] and returns
//! a result of the same shape. Errors from the underlying call come back
//! unchanged.
//!
//! ```rust,no_run
//! use rapida::interceptor::{CallArgs, CallResult, ProviderEndpoint, ProxyInterceptor};
//! use rapida::error::RapidaError;
//!
//! let endpoint = ProviderEndpoint::new("https://api.openai.com/v1");
//! let interceptor = ProxyInterceptor::from_global(endpoint);
//! let args = CallArgs::new().param("model", "gpt-4o-mini").param("cache", true);
//!
//! let result = interceptor.call(args, |prepared| {
//!     // hand prepared.headers / prepared.params / prepared.base_url to the client
//!     Ok::<_, RapidaError>(CallResult::Value(serde_json::json!({"id": "chatcmpl-1"})))
//! });
//! ```

mod call;
mod endpoint;
mod registry;

pub use call::{
    AsyncCallResult, CallArgs, CallResult, ChunkIter, ChunkStream, PreparedCall, SyncCallResult,
};
pub use endpoint::{EndpointSwap, ProviderEndpoint};
pub use registry::{
    ApiResource, AsyncEntryPoint, EntryPointRegistry, InstrumentedClient, Intercept,
    SyncEntryPoint,
};

use crate::config::{self, EndpointRouting, RapidaConfig};
use crate::correlation::{CorrelationId, CorrelationStore};
use crate::correlator::ResultCorrelator;
use crate::error::RapidaError;
use crate::headers::{
    RAPIDA_AUTH, RAPIDA_OPENAI_API_BASE, RAPIDA_REQUEST_ID, bearer, find_header, set_header,
};
use crate::metadata::RequestMetadata;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// A prepared call plus the endpoint it must be swapped to, if any.
struct Routed {
    call: PreparedCall,
    swap_to: Option<String>,
}

/// Interceptor that routes calls through the Rapida proxy and correlates the
/// proxy's response metadata back onto results.
#[derive(Debug, Clone)]
pub struct ProxyInterceptor {
    config: Arc<RapidaConfig>,
    endpoint: ProviderEndpoint,
    correlator: ResultCorrelator,
}

impl ProxyInterceptor {
    pub fn new(config: Arc<RapidaConfig>, endpoint: ProviderEndpoint) -> Self {
        Self {
            config,
            endpoint,
            correlator: ResultCorrelator::global(),
        }
    }

    /// Interceptor over the process-wide configuration and store.
    pub fn from_global(endpoint: ProviderEndpoint) -> Self {
        Self::new(config::global(), endpoint)
    }

    /// Correlate against `store` instead of the global one. The response hook
    /// must write to the same store.
    pub fn with_store(mut self, store: Arc<CorrelationStore>) -> Self {
        self.correlator = ResultCorrelator::new(store);
        self
    }

    pub fn config(&self) -> &RapidaConfig {
        &self.config
    }

    pub fn endpoint(&self) -> &ProviderEndpoint {
        &self.endpoint
    }

    pub fn correlator(&self) -> &ResultCorrelator {
        &self.correlator
    }

    /// Merge headers, strip metadata from the params and resolve routing,
    /// without invoking anything.
    ///
    /// Under [`EndpointRouting::Swap`] the returned call has no `base_url`;
    /// the swap only happens inside [`call`](Self::call) /
    /// [`call_async`](Self::call_async).
    pub fn prepare(&self, args: CallArgs) -> Result<PreparedCall, RapidaError> {
        let Routed { mut call, swap_to } = self.route(args)?;
        if let Some(target) = swap_to {
            self.announce_upstream(&mut call.headers, &self.endpoint.get(), &target);
        }
        Ok(call)
    }

    fn route(&self, args: CallArgs) -> Result<Routed, RapidaError> {
        let CallArgs {
            mut headers,
            mut params,
            metadata,
        } = args;

        let inline = RequestMetadata::extract(&mut params)?;
        let metadata = metadata.unwrap_or(inline);

        if let Some(key) = self.config.api_key()
            && find_header(&headers, RAPIDA_AUTH).is_none()
        {
            headers.insert(RAPIDA_AUTH.to_string(), bearer(key));
        }

        let correlation_id = CorrelationId::new();
        set_header(&mut headers, RAPIDA_REQUEST_ID, correlation_id.to_string());

        for (name, value) in metadata.to_headers() {
            set_header(&mut headers, &name, value);
        }

        // Under Swap the API-base header is set once the swap lock is held.
        let mut base_url = None;
        let mut swap_to = None;
        if let Some(target) = self.config.effective_proxy_url() {
            match self.config.routing {
                EndpointRouting::PerCall => {
                    self.announce_upstream(&mut headers, &self.endpoint.get(), &target);
                    base_url = Some(target);
                }
                EndpointRouting::Swap => swap_to = Some(target),
            }
        }

        tracing::debug!(
            target: "rapida::interceptor",
            correlation_id = %correlation_id,
            routed = base_url.is_some() || swap_to.is_some(),
            header_count = headers.len(),
            "prepared call"
        );

        Ok(Routed {
            call: PreparedCall {
                correlation_id,
                headers,
                params,
                base_url,
            },
            swap_to,
        })
    }

    /// Tell the proxy which base URL the call would have hit without it,
    /// unless that base already is the proxy.
    fn announce_upstream(
        &self,
        headers: &mut HashMap<String, String>,
        upstream: &str,
        target: &str,
    ) {
        if self.config.proxy_url.as_deref() != Some(upstream) && upstream != target {
            set_header(headers, RAPIDA_OPENAI_API_BASE, upstream);
        }
    }

    /// Intercept a blocking call.
    ///
    /// Under [`EndpointRouting::Swap`] this blocks while another swap is in
    /// progress and must not be used from inside an async runtime worker.
    pub fn call<F, E>(&self, args: CallArgs, f: F) -> Result<SyncCallResult<E>, E>
    where
        F: FnOnce(PreparedCall) -> Result<SyncCallResult<E>, E>,
        E: From<RapidaError> + Send + 'static,
    {
        let Routed { mut call, swap_to } = self.route(args)?;
        let id = call.correlation_id;

        let result = match swap_to {
            Some(target) => {
                let swap = self.endpoint.swap_blocking(target.as_str());
                self.announce_upstream(&mut call.headers, swap.original(), &target);
                f(call)
            }
            None => f(call),
        };

        match result {
            Ok(result) => Ok(self.correlator.correlate(id, result)),
            Err(e) => {
                tracing::debug!(
                    target: "rapida::interceptor",
                    correlation_id = %id,
                    "underlying call failed"
                );
                Err(e)
            }
        }
    }

    /// Intercept an async call.
    ///
    /// Dropping the returned future before it completes restores a swapped
    /// endpoint just like an error does.
    pub async fn call_async<F, Fut, E>(
        &self,
        args: CallArgs,
        f: F,
    ) -> Result<AsyncCallResult<E>, E>
    where
        F: FnOnce(PreparedCall) -> Fut + Send,
        Fut: Future<Output = Result<AsyncCallResult<E>, E>> + Send,
        E: From<RapidaError> + Send + 'static,
    {
        let Routed { mut call, swap_to } = self.route(args)?;
        let id = call.correlation_id;

        let result = match swap_to {
            Some(target) => {
                let swap = self.endpoint.swap(target.as_str()).await;
                self.announce_upstream(&mut call.headers, swap.original(), &target);
                f(call).await
            }
            None => f(call).await,
        };

        match result {
            Ok(result) => Ok(self.correlator.correlate_async(id, result)),
            Err(e) => {
                tracing::debug!(
                    target: "rapida::interceptor",
                    correlation_id = %id,
                    "underlying call failed"
                );
                Err(e)
            }
        }
    }
}
