//! Entry-point registry
//!
//! Provider client entry points are registered by name as plain function
//! references. [`EntryPointRegistry::instrument`] applies an interceptor to
//! all of them at once, at composition time; call sites then go through the
//! resulting [`InstrumentedClient`] and never see the wrapping.

use super::{AsyncCallResult, CallArgs, PreparedCall, ProxyInterceptor, SyncCallResult};
use crate::error::RapidaError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Provider API resources that can be instrumented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiResource {
    ChatCompletion,
    Completion,
    Edit,
    Embedding,
    Image,
    Moderation,
}

impl ApiResource {
    pub const ALL: [ApiResource; 6] = [
        Self::ChatCompletion,
        Self::Completion,
        Self::Edit,
        Self::Embedding,
        Self::Image,
        Self::Moderation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChatCompletion => "chat_completion",
            Self::Completion => "completion",
            Self::Edit => "edit",
            Self::Embedding => "embedding",
            Self::Image => "image",
            Self::Moderation => "moderation",
        }
    }

    /// Request path relative to the provider base URL.
    pub fn path(&self) -> &'static str {
        match self {
            Self::ChatCompletion => "/chat/completions",
            Self::Completion => "/completions",
            Self::Edit => "/edits",
            Self::Embedding => "/embeddings",
            Self::Image => "/images/generations",
            Self::Moderation => "/moderations",
        }
    }
}

impl fmt::Display for ApiResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Blocking entry point of a provider client.
pub type SyncEntryPoint<E> =
    Arc<dyn Fn(PreparedCall) -> Result<SyncCallResult<E>, E> + Send + Sync>;

/// Async entry point of a provider client.
pub type AsyncEntryPoint<E> =
    Arc<dyn Fn(PreparedCall) -> BoxFuture<'static, Result<AsyncCallResult<E>, E>> + Send + Sync>;

/// Something that can wrap an entry-point invocation.
#[async_trait]
pub trait Intercept<E: Send + 'static>: Send + Sync {
    fn intercept(
        &self,
        resource: ApiResource,
        args: CallArgs,
        entry: &SyncEntryPoint<E>,
    ) -> Result<SyncCallResult<E>, E>;

    async fn intercept_async(
        &self,
        resource: ApiResource,
        args: CallArgs,
        entry: AsyncEntryPoint<E>,
    ) -> Result<AsyncCallResult<E>, E>;
}

#[async_trait]
impl<E> Intercept<E> for ProxyInterceptor
where
    E: From<RapidaError> + Send + 'static,
{
    fn intercept(
        &self,
        _resource: ApiResource,
        args: CallArgs,
        entry: &SyncEntryPoint<E>,
    ) -> Result<SyncCallResult<E>, E> {
        self.call(args, |call| entry(call))
    }

    async fn intercept_async(
        &self,
        _resource: ApiResource,
        args: CallArgs,
        entry: AsyncEntryPoint<E>,
    ) -> Result<AsyncCallResult<E>, E> {
        self.call_async(args, move |call| entry(call)).await
    }
}

/// Named entry points of one provider client.
pub struct EntryPointRegistry<E> {
    sync: HashMap<ApiResource, SyncEntryPoint<E>>,
    asynchronous: HashMap<ApiResource, AsyncEntryPoint<E>>,
}

impl<E> Default for EntryPointRegistry<E> {
    fn default() -> Self {
        Self {
            sync: HashMap::new(),
            asynchronous: HashMap::new(),
        }
    }
}

impl<E> fmt::Debug for EntryPointRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryPointRegistry")
            .field("sync", &self.sync.keys().collect::<Vec<_>>())
            .field("async", &self.asynchronous.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<E: Send + 'static> EntryPointRegistry<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the blocking entry point for `resource`, replacing any earlier one.
    pub fn register_sync<F>(mut self, resource: ApiResource, entry: F) -> Self
    where
        F: Fn(PreparedCall) -> Result<SyncCallResult<E>, E> + Send + Sync + 'static,
    {
        self.sync.insert(resource, Arc::new(entry));
        self
    }

    /// Register the async entry point for `resource`, replacing any earlier one.
    pub fn register_async<F, Fut>(mut self, resource: ApiResource, entry: F) -> Self
    where
        F: Fn(PreparedCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<AsyncCallResult<E>, E>> + Send + 'static,
    {
        let entry: AsyncEntryPoint<E> = Arc::new(
            move |call: PreparedCall| -> BoxFuture<'static, Result<AsyncCallResult<E>, E>> {
                Box::pin(entry(call))
            },
        );
        self.asynchronous.insert(resource, entry);
        self
    }

    pub fn has_sync(&self, resource: ApiResource) -> bool {
        self.sync.contains_key(&resource)
    }

    pub fn has_async(&self, resource: ApiResource) -> bool {
        self.asynchronous.contains_key(&resource)
    }

    /// Wrap every registered entry point with `interceptor`.
    pub fn instrument<I: Intercept<E>>(self, interceptor: I) -> InstrumentedClient<E, I> {
        tracing::debug!(
            target: "rapida::registry",
            sync = self.sync.len(),
            asynchronous = self.asynchronous.len(),
            "instrumenting entry points"
        );
        InstrumentedClient {
            registry: self,
            interceptor,
        }
    }
}

/// Provider client whose entry points all run through one interceptor.
pub struct InstrumentedClient<E, I> {
    registry: EntryPointRegistry<E>,
    interceptor: I,
}

impl<E, I> InstrumentedClient<E, I>
where
    E: From<RapidaError> + Send + 'static,
    I: Intercept<E>,
{
    pub fn interceptor(&self) -> &I {
        &self.interceptor
    }

    /// Invoke the blocking entry point for `resource`.
    pub fn create(&self, resource: ApiResource, args: CallArgs) -> Result<SyncCallResult<E>, E> {
        let entry = self.registry.sync.get(&resource).ok_or_else(|| unregistered(resource))?;
        self.interceptor.intercept(resource, args, entry)
    }

    /// Invoke the async entry point for `resource`.
    pub async fn acreate(
        &self,
        resource: ApiResource,
        args: CallArgs,
    ) -> Result<AsyncCallResult<E>, E> {
        let entry = self
            .registry
            .asynchronous
            .get(&resource)
            .cloned()
            .ok_or_else(|| unregistered(resource))?;
        self.interceptor.intercept_async(resource, args, entry).await
    }
}

impl<E, I: fmt::Debug> fmt::Debug for InstrumentedClient<E, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentedClient")
            .field("registry", &self.registry)
            .field("interceptor", &self.interceptor)
            .finish()
    }
}

fn unregistered<E: From<RapidaError>>(resource: ApiResource) -> E {
    E::from(RapidaError::configuration(format!(
        "No entry point registered for '{resource}'"
    )))
}
