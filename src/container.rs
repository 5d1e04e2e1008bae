//! # Container Module
//!
//! The container runtime: owns the deployed application units, routes an
//! inbound exchange to the unit with the longest matching context path and
//! runs its pipeline.
//!
//! The unit set is read on every request and changed only by deploy/undeploy.
//! Reads go through an [`ArcSwap`] snapshot and take no lock; writers
//! serialize on a mutex and publish a new snapshot.

use crate::dispatcher::Dispatcher;
use crate::error::{ContainerError, Result};
use crate::exchange::{Exchange, ExchangeRequest, ResponseSink};
use crate::runtime_config::RuntimeConfig;
use crate::webapp::{validate_context_path, WebApplication};
use arc_swap::ArcSwap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, info_span, Span};

pub struct Container {
    applications: ArcSwap<Vec<Arc<WebApplication>>>,
    deploy_lock: Mutex<()>,
    dispatcher: Dispatcher,
    span: Span,
}

impl Default for Container {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl Container {
    pub fn new(runtime: RuntimeConfig) -> Self {
        let span = info_span!("container");
        Self {
            applications: ArcSwap::from_pointee(Vec::new()),
            deploy_lock: Mutex::new(()),
            dispatcher: Dispatcher::with_span(runtime, span.clone()),
            span,
        }
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Initialize `app` and make it routable.
    ///
    /// Fails when the context path is invalid or already taken.
    pub fn deploy(&self, app: WebApplication) -> Result<Arc<WebApplication>> {
        validate_context_path(app.context_path())?;
        let _guard = self.deploy_lock.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.applications.load_full();
        if current.iter().any(|a| a.context_path() == app.context_path()) {
            return Err(ContainerError::Config(format!(
                "context path '{}' is already deployed",
                app.context_path()
            )));
        }
        app.initialize();
        let app = Arc::new(app);
        let mut next: Vec<Arc<WebApplication>> = current.iter().cloned().collect();
        next.push(Arc::clone(&app));
        next.sort_by(|a, b| b.context_path().len().cmp(&a.context_path().len()));
        self.applications.store(Arc::new(next));
        info!(
            parent: &self.span,
            context_path = %app.context_path(),
            degraded = app.is_degraded(),
            "Application deployed"
        );
        Ok(app)
    }

    /// Remove the unit at `context_path`. In-flight exchanges keep their unit
    /// alive until they finish.
    pub fn undeploy(&self, context_path: &str) -> Option<Arc<WebApplication>> {
        let _guard = self.deploy_lock.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.applications.load_full();
        let (removed, kept): (Vec<_>, Vec<_>) = current
            .iter()
            .cloned()
            .partition(|a| a.context_path() == context_path);
        let removed = removed.into_iter().next()?;
        self.applications.store(Arc::new(kept));
        info!(parent: &self.span, context_path = %context_path, "Application undeployed");
        Some(removed)
    }

    /// Deployed units, longest context path first.
    #[must_use]
    pub fn applications(&self) -> Vec<Arc<WebApplication>> {
        self.applications.load().iter().cloned().collect()
    }

    /// Unit whose context path owns `target`.
    #[must_use]
    pub fn resolve(&self, target: &str) -> Option<Arc<WebApplication>> {
        self.applications
            .load()
            .iter()
            .find(|app| owns(app.context_path(), target))
            .cloned()
    }

    /// Build an exchange for `request`, run the pipeline on the calling
    /// coroutine and return the exchange.
    ///
    /// The exchange is closed on return unless a handler started async
    /// processing; callers that must wait for the response use
    /// [`Exchange::wait_closed`].
    pub fn service(&self, request: ExchangeRequest, sink: impl ResponseSink + 'static) -> Exchange {
        self.service_boxed(request, Box::new(sink))
    }

    pub fn service_boxed(&self, request: ExchangeRequest, sink: Box<dyn ResponseSink>) -> Exchange {
        let app = self.resolve(&request.target);
        let mut builder = Exchange::builder(request)
            .boxed_sink(sink)
            .dispatcher(self.dispatcher.clone());
        match app {
            Some(app) => builder = builder.application(app),
            None => debug!(parent: &self.span, "No application owns the request target"),
        }
        let exchange = builder.build();
        Dispatcher::service(&exchange);
        exchange
    }
}

fn owns(context_path: &str, target: &str) -> bool {
    context_path.is_empty()
        || target == context_path
        || target
            .strip_prefix(context_path)
            .is_some_and(|rest| rest.starts_with('/'))
}
