//! # Rapida - Request/Response Instrumentation for AI Provider Clients
//!
//! Rapida sits between application code and an AI provider client. It either
//! routes calls through the Rapida proxy and folds the proxy's response
//! metadata back onto results, or lets calls go straight to the provider and
//! posts a log record of each exchange afterwards.
//!
//! ## Pieces
//!
//! - **Metadata**: [`RequestMetadata`] turns caller intent (custom properties,
//!   cache, retry, rate-limit policy) into `Rapida-*` headers.
//! - **Interception**: [`ProxyInterceptor`] merges headers, mints a
//!   [`CorrelationId`], routes the call and correlates the result;
//!   [`LoggingInterceptor`] records the exchange instead.
//! - **Correlation**: the [`ResponseHook`] transport wrapper files response
//!   headers in a [`CorrelationStore`]; the [`ResultCorrelator`] attaches them
//!   to values and to every chunk of a stream.
//! - **Composition**: [`EntryPointRegistry`] instruments a set of provider
//!   entry points once, at start-up.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rapida::prelude::*;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), RapidaError> {
//! let config = RapidaConfig::builder()
//!     .api_key("rk-...")
//!     .proxy_url("https://oai.rapida.ai/v1")
//!     .try_build()?;
//! let interceptor = ProxyInterceptor::new(
//!     Arc::new(config),
//!     ProviderEndpoint::new("https://api.openai.com/v1"),
//! );
//!
//! let client = EntryPointRegistry::<RapidaError>::new()
//!     .register_sync(ApiResource::ChatCompletion, |call: PreparedCall| {
//!         // send call.params to call.base_url with call.headers
//!         Ok(CallResult::Value(serde_json::json!({"id": "chatcmpl-1"})))
//!     })
//!     .instrument(interceptor);
//!
//! let result = client.create(
//!     ApiResource::ChatCompletion,
//!     CallArgs::new().param("model", "gpt-4o-mini").param("cache", true),
//! )?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod correlation;
pub mod correlator;
pub mod error;
pub mod feedback;
pub mod headers;
pub mod interceptor;
pub mod logger;
pub mod metadata;
pub mod requester;
pub mod transport;

pub use config::{ApiType, EndpointRouting, RapidaConfig};
pub use correlation::{CorrelationId, CorrelationStore, EvictionPolicy, ResponseMetadata};
pub use correlator::ResultCorrelator;
pub use error::{RapidaError, Result};
pub use feedback::{DataType, FeedbackClient};
pub use interceptor::{
    ApiResource, CallArgs, CallResult, EntryPointRegistry, InstrumentedClient, PreparedCall,
    ProviderEndpoint, ProxyInterceptor,
};
pub use logger::{AsyncLogger, BackgroundLogger, LogSink, LoggingInterceptor, Provider};
pub use metadata::{RateLimitPolicy, RequestMetadata, RetryProps, RetrySetting};
pub use transport::{AsyncTransport, ResponseHook, StreamingResponse, Transport};

/// Common imports.
pub mod prelude {
    pub use crate::config::{ApiType, EndpointRouting, RapidaConfig};
    pub use crate::correlation::{CorrelationId, CorrelationStore, EvictionPolicy};
    pub use crate::error::RapidaError;
    pub use crate::interceptor::{
        ApiResource, AsyncCallResult, CallArgs, CallResult, ChunkIter, ChunkStream,
        EntryPointRegistry, Intercept, PreparedCall, ProviderEndpoint, ProxyInterceptor,
        SyncCallResult,
    };
    pub use crate::logger::{AsyncLogger, BackgroundLogger, LogSink, LoggingInterceptor, Provider};
    pub use crate::metadata::{RateLimitPolicy, RequestMetadata, RetryProps};
    pub use crate::transport::{AsyncTransport, ResponseHook, Transport};
}

// Interceptors and stores are shared across threads and tasks.
static_assertions::assert_impl_all!(CorrelationStore: Send, Sync);
static_assertions::assert_impl_all!(ProxyInterceptor: Send, Sync, Clone);
static_assertions::assert_impl_all!(LoggingInterceptor: Send, Sync, Clone);
static_assertions::assert_impl_all!(ProviderEndpoint: Send, Sync, Clone);
static_assertions::assert_impl_all!(ResponseHook<transport::ReqwestTransport>: Send, Sync);
static_assertions::assert_impl_all!(interceptor::EndpointSwap: Send);
static_assertions::assert_impl_all!(StreamingResponse: Send);
