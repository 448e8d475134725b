use super::{AsyncLogRequest, AsyncLogger, Provider};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Destination for log records.
///
/// `submit` is synchronous and infallible so it can be called from blocking
/// call paths and from inside stream adapters. Delivery failures are the
/// sink's business and never reach the intercepted call.
pub trait LogSink: Send + Sync {
    fn submit(&self, request: AsyncLogRequest, provider: Provider);
}

impl<F> LogSink for F
where
    F: Fn(AsyncLogRequest, Provider) + Send + Sync,
{
    fn submit(&self, request: AsyncLogRequest, provider: Provider) {
        self(request, provider)
    }
}

/// Sink that hands records to a background task, which posts them with an
/// [`AsyncLogger`].
///
/// The worker runs until every clone of the sink is dropped and the queue is
/// drained.
#[derive(Debug, Clone)]
pub struct BackgroundLogger {
    tx: mpsc::UnboundedSender<(AsyncLogRequest, Provider)>,
}

impl BackgroundLogger {
    /// Spawn the worker on the current tokio runtime.
    ///
    /// Panics when called outside a runtime, like `tokio::spawn`.
    pub fn spawn(logger: AsyncLogger) -> (Self, JoinHandle<()>) {
        Self::spawn_on(logger, &tokio::runtime::Handle::current())
    }

    /// Spawn the worker on `handle`. Usable from threads outside the runtime.
    pub fn spawn_on(
        logger: AsyncLogger,
        handle: &tokio::runtime::Handle,
    ) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<(AsyncLogRequest, Provider)>();
        let worker = handle.spawn(async move {
            while let Some((request, provider)) = rx.recv().await {
                if let Err(e) = logger.log(&request, provider).await {
                    tracing::warn!(
                        target: "rapida::logger",
                        %provider,
                        error = %e,
                        "failed to deliver async log record"
                    );
                }
            }
            tracing::debug!(target: "rapida::logger", "background logger stopped");
        });
        (Self { tx }, worker)
    }
}

impl LogSink for BackgroundLogger {
    fn submit(&self, request: AsyncLogRequest, provider: Provider) {
        if self.tx.send((request, provider)).is_err() {
            tracing::warn!(
                target: "rapida::logger",
                %provider,
                "background logger is gone; dropping log record"
            );
        }
    }
}
