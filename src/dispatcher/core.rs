use crate::error::ContainerError;
use crate::exchange::Exchange;
use crate::runtime_config::RuntimeConfig;
use may::coroutine;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;
use tracing::{debug, error, info, Span};

/// Pipeline runner and dispatch scheduler.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    runtime: RuntimeConfig,
    span: Span,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl Dispatcher {
    pub fn new(runtime: RuntimeConfig) -> Self {
        Self::with_span(runtime, Span::none())
    }

    pub fn with_span(runtime: RuntimeConfig, span: Span) -> Self {
        Self { runtime, span }
    }

    #[must_use]
    pub fn runtime(&self) -> RuntimeConfig {
        self.runtime
    }

    /// Run the dispatched pipeline for `exchange` on a new coroutine.
    ///
    /// Returns as soon as the coroutine is spawned. When spawning fails the
    /// exchange is terminated with an error response.
    pub(crate) fn schedule(&self, exchange: Exchange) {
        let id = exchange.id();
        let stack_size = self.runtime.stack_size;
        let task = exchange.clone();

        // SAFETY: may::coroutine::Builder::spawn() is marked unsafe by the may runtime.
        // The closure owns a clone of the exchange (Send + 'static) and does not
        // touch thread-local state, so it may run on any worker.
        let spawned = unsafe {
            coroutine::Builder::new()
                .name(format!("dispatch-{id}"))
                .stack_size(stack_size)
                .spawn(move || run_dispatched(&task))
        };

        if let Err(e) = spawned {
            error!(
                parent: &self.span,
                exchange_id = %id,
                error = %e,
                stack_size,
                "Failed to spawn dispatch coroutine - CRITICAL"
            );
            if exchange.begin_dispatch() {
                if let Err(err) = exchange.fail(ContainerError::Io(e), exchange.dispatch_count()) {
                    debug!(parent: &self.span, exchange_id = %id, error = %err, "Exchange already terminated");
                }
            }
        }
    }

    /// Route `exchange` by its current target and run the matched handler.
    ///
    /// Routing misses and handler failures are absorbed here and turned into
    /// error responses; nothing propagates to the caller. A handler that
    /// dispatched gives the exchange up to the dispatched pipeline: its return
    /// or failure no longer completes the exchange.
    pub fn service(exchange: &Exchange) {
        let epoch = exchange.dispatch_count();
        let target = exchange.current_target();
        let route = exchange.application().and_then(|app| app.route(&target));

        let Some(route) = route else {
            debug!(parent: exchange.span(), target = %target, "No handler mapped, answering 404");
            if let Err(e) = exchange.send_error(404) {
                debug!(parent: exchange.span(), error = %e, "Could not send 404");
            }
            finish(exchange, epoch);
            return;
        };

        exchange.set_mapping(route.servlet_path.clone(), route.path_info.clone());
        debug!(
            parent: exchange.span(),
            handler = %route.name,
            servlet_path = %route.servlet_path,
            path_info = ?route.path_info,
            "Handler execution start"
        );

        let started = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| route.handler.handle(exchange)));
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(ContainerError::Handler(e)),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(
                    parent: exchange.span(),
                    handler = %route.name,
                    panic_message = %message,
                    "Handler panicked - CRITICAL"
                );
                Some(ContainerError::Handler(anyhow::anyhow!(
                    "handler '{}' panicked: {message}",
                    route.name
                )))
            }
        };

        info!(
            parent: exchange.span(),
            handler = %route.name,
            execution_time_ms = started.elapsed().as_millis() as u64,
            failed = failure.is_some(),
            "Handler execution complete"
        );

        match failure {
            Some(err) => {
                if let Err(e) = exchange.fail(err, epoch) {
                    debug!(parent: exchange.span(), error = %e, "Exchange already terminated");
                }
            }
            None => finish(exchange, epoch),
        }
    }
}

fn run_dispatched(exchange: &Exchange) {
    if !exchange.begin_dispatch() {
        debug!(parent: exchange.span(), "Exchange terminated before dispatch began");
        return;
    }
    debug!(
        parent: exchange.span(),
        target = %exchange.current_target(),
        dispatch = exchange.dispatch_count(),
        stack_size = exchange.dispatcher().runtime().stack_size,
        "Dispatched pipeline start"
    );
    Dispatcher::service(exchange);
}

fn finish(exchange: &Exchange, epoch: u32) {
    if let Err(e) = exchange.finish_service(epoch) {
        debug!(parent: exchange.span(), error = %e, "Exchange already terminated");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic payload");
    }

    #[test]
    fn test_default_stack_size() {
        assert_eq!(Dispatcher::default().runtime(), RuntimeConfig::default());
    }
}
