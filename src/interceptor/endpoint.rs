//! Provider endpoint
//!
//! The base URL a provider client reads when it builds a request. Under
//! [`EndpointRouting::Swap`](crate::config::EndpointRouting::Swap) the
//! interceptor points it at the proxy for the duration of one call; the
//! [`EndpointSwap`] guard puts the original back however the call ends.

use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug)]
struct EndpointInner {
    base_url: RwLock<String>,
    swap_lock: Arc<Mutex<()>>,
}

/// Shared, swappable provider base URL. Clones share state.
#[derive(Debug, Clone)]
pub struct ProviderEndpoint {
    inner: Arc<EndpointInner>,
}

impl ProviderEndpoint {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EndpointInner {
                base_url: RwLock::new(base_url.into()),
                swap_lock: Arc::new(Mutex::new(())),
            }),
        }
    }

    /// Current base URL.
    pub fn get(&self) -> String {
        self.inner
            .base_url
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the base URL, returning the previous one.
    ///
    /// Does not take the swap lock; use it for configuration changes, not for
    /// per-call routing.
    pub fn set(&self, base_url: impl Into<String>) -> String {
        let mut current = self
            .inner
            .base_url
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, base_url.into())
    }

    /// Point the endpoint at `target` until the returned guard drops.
    ///
    /// Blocks the current thread while another swap is active. Must not be
    /// called from within an async runtime worker.
    pub fn swap_blocking(&self, target: impl Into<String>) -> EndpointSwap {
        let permit = self.inner.swap_lock.clone().blocking_lock_owned();
        self.begin_swap(permit, target.into())
    }

    /// Point the endpoint at `target` until the returned guard drops.
    ///
    /// Waits while another swap is active. Dropping the future that holds the
    /// guard (cancellation) restores the endpoint too.
    pub async fn swap(&self, target: impl Into<String>) -> EndpointSwap {
        let permit = self.inner.swap_lock.clone().lock_owned().await;
        self.begin_swap(permit, target.into())
    }

    fn begin_swap(&self, permit: OwnedMutexGuard<()>, target: String) -> EndpointSwap {
        let original = self.set(target.clone());
        tracing::trace!(
            target: "rapida::endpoint",
            from = %original,
            to = %target,
            "endpoint swapped"
        );
        EndpointSwap {
            endpoint: self.clone(),
            original,
            _permit: permit,
        }
    }
}

/// Guard for an active endpoint swap.
///
/// Restores the original base URL before releasing the swap lock.
#[derive(Debug)]
#[must_use = "the endpoint is restored as soon as the guard is dropped"]
pub struct EndpointSwap {
    endpoint: ProviderEndpoint,
    original: String,
    _permit: OwnedMutexGuard<()>,
}

impl EndpointSwap {
    /// Base URL that will be restored.
    pub fn original(&self) -> &str {
        &self.original
    }
}

impl Drop for EndpointSwap {
    fn drop(&mut self) {
        let original = std::mem::take(&mut self.original);
        self.endpoint.set(original);
    }
}
