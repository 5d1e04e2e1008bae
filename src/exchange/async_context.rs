use super::core::{Completion, Exchange};
use crate::error::{ContainerError, Result};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Callbacks around an exchange's asynchronous lifecycle.
///
/// Listeners fire in registration order. `on_complete` fires exactly once per
/// exchange, after the response was written and before the connection is
/// released; `on_error` precedes it when the completion was caused by a
/// failure.
pub trait AsyncListener: Send + Sync {
    fn on_start_async(&self, _exchange: &Exchange) {}
    fn on_complete(&self, exchange: &Exchange);
    fn on_error(&self, _exchange: &Exchange, _error: &ContainerError) {}
}

impl<F> AsyncListener for F
where
    F: Fn(&Exchange) + Send + Sync,
{
    fn on_complete(&self, exchange: &Exchange) {
        self(exchange)
    }
}

/// Handle to a suspended exchange, returned by `start_async`.
///
/// `dispatch`, `dispatch_to` and `complete` are one-shot: once any of them
/// succeeded, every further call on this context fails with `IllegalState`.
/// Clones share the same context.
#[derive(Clone)]
pub struct AsyncContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    exchange: Exchange,
    generation: u64,
    wrapped: bool,
    started: Instant,
}

impl AsyncContext {
    pub(crate) fn new(exchange: Exchange, generation: u64, wrapped: bool) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                exchange,
                generation,
                wrapped,
                started: Instant::now(),
            }),
        }
    }

    #[must_use]
    pub fn exchange(&self) -> &Exchange {
        &self.inner.exchange
    }

    /// `false` when `start_async_with` was given a request or response wrapper.
    #[must_use]
    pub fn has_original_request_and_response(&self) -> bool {
        !self.inner.wrapped
    }

    /// Whether this context can still dispatch or complete.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.exchange.is_context_current(self.inner.generation)
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.inner.started.elapsed()
    }

    pub fn add_listener(&self, listener: Arc<dyn AsyncListener>) -> Result<()> {
        self.inner.exchange.add_listener(listener)
    }

    /// Re-run the pipeline against the original target (or the wrapper's
    /// target) on another coroutine. Returns immediately.
    pub fn dispatch(&self) -> Result<()> {
        self.inner.exchange.dispatch_from(self.inner.generation, None)
    }

    /// Re-run the pipeline against `path` (application-relative, may carry a
    /// query string) on another coroutine. Returns immediately.
    pub fn dispatch_to(&self, path: &str) -> Result<()> {
        self.inner.exchange.dispatch_from(self.inner.generation, Some(path))
    }

    /// Commit and flush the response, fire listeners, release the sink.
    pub fn complete(&self) -> Result<()> {
        self.inner
            .exchange
            .finalize(Completion::Context(self.inner.generation), None)
    }
}

impl fmt::Debug for AsyncContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncContext")
            .field("exchange", &self.inner.exchange.id())
            .field("generation", &self.inner.generation)
            .field("wrapped", &self.inner.wrapped)
            .finish()
    }
}
