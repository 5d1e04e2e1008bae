use super::mapping::{HandlerMappings, Pattern, RouteMatch};
use crate::error::{ContainerError, Result};
use crate::exchange::Exchange;
use crate::module::ModuleLoader;
use crate::resource::SharedResource;
use dashmap::DashMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Span};

/// Application code invoked for a mapped request.
///
/// Errors and panics are caught by the dispatcher and answered with a 500
/// when the response is still uncommitted.
pub trait Handler: Send + Sync {
    fn handle(&self, exchange: &Exchange) -> anyhow::Result<()>;
}

impl<F> Handler for F
where
    F: Fn(&Exchange) -> anyhow::Result<()> + Send + Sync,
{
    fn handle(&self, exchange: &Exchange) -> anyhow::Result<()> {
        self(exchange)
    }
}

/// Startup hook run once per application unit, before it serves requests.
pub trait Initializer: Send + Sync {
    fn name(&self) -> &str;
    fn on_startup(&self, app: &WebApplication) -> anyhow::Result<()>;
}

/// Check a context path: empty (root) or `/name` without a trailing slash.
pub fn validate_context_path(context_path: &str) -> Result<()> {
    if context_path.is_empty() {
        return Ok(());
    }
    if !context_path.starts_with('/') {
        return Err(ContainerError::Config(format!(
            "context path '{context_path}' must start with '/'"
        )));
    }
    if context_path.ends_with('/') {
        return Err(ContainerError::Config(format!(
            "context path '{context_path}' must not end with '/'"
        )));
    }
    Ok(())
}

/// A deployable application unit.
///
/// Configured mutably (handlers, mappings, extensions), then deployed into a
/// [`Container`](crate::container::Container) which shares it behind an
/// `Arc`. Attributes and the degraded flag stay mutable after deployment.
pub struct WebApplication {
    context_path: String,
    handlers: HashMap<String, Arc<dyn Handler>>,
    mappings: HandlerMappings,
    attributes: DashMap<String, String>,
    root: Option<SharedResource>,
    modules: Option<ModuleLoader>,
    async_supported: bool,
    initializers: Vec<Arc<dyn Initializer>>,
    initialized: AtomicBool,
    degraded: AtomicBool,
    span: Span,
}

impl WebApplication {
    /// New unit at `context_path`; `/` is treated as the root context `""`.
    pub fn new(context_path: impl Into<String>) -> Self {
        let mut context_path = context_path.into();
        if context_path == "/" {
            context_path.clear();
        }
        let span = info_span!("webapp", context_path = %context_path);
        Self {
            context_path,
            handlers: HashMap::new(),
            mappings: HandlerMappings::default(),
            attributes: DashMap::new(),
            root: None,
            modules: None,
            async_supported: false,
            initializers: Vec::new(),
            initialized: AtomicBool::new(false),
            degraded: AtomicBool::new(false),
            span,
        }
    }

    #[must_use]
    pub fn context_path(&self) -> &str {
        &self.context_path
    }

    #[must_use]
    pub fn span(&self) -> &Span {
        &self.span
    }

    #[must_use]
    pub fn is_async_supported(&self) -> bool {
        self.async_supported
    }

    pub fn set_async_supported(&mut self, supported: bool) {
        self.async_supported = supported;
    }

    #[must_use]
    pub fn with_async_supported(mut self, supported: bool) -> Self {
        self.async_supported = supported;
        self
    }

    #[must_use]
    pub fn root(&self) -> Option<&SharedResource> {
        self.root.as_ref()
    }

    pub fn set_root(&mut self, root: SharedResource) {
        self.root = Some(root);
    }

    #[must_use]
    pub fn module_loader(&self) -> Option<&ModuleLoader> {
        self.modules.as_ref()
    }

    pub fn set_module_loader(&mut self, loader: ModuleLoader) {
        self.modules = Some(loader);
    }

    /// Register a handler under `name` without mapping it.
    pub fn add_handler(&mut self, name: impl Into<String>, handler: impl Handler + 'static) {
        let name = name.into();
        debug!(parent: &self.span, handler = %name, "Handler registered");
        self.handlers.insert(name, Arc::new(handler));
    }

    /// Map a registered handler to a URL pattern (`/a`, `/a/*`, `*.ext`, `/`).
    pub fn add_mapping(&mut self, name: &str, pattern: &str) -> Result<()> {
        if !self.handlers.contains_key(name) {
            return Err(ContainerError::Config(format!(
                "cannot map unknown handler '{name}'"
            )));
        }
        let parsed = Pattern::parse(pattern)?;
        self.mappings.insert(parsed, name)?;
        debug!(parent: &self.span, handler = %name, pattern = %pattern, "Handler mapped");
        Ok(())
    }

    /// Register `handler` under `pattern` and map it there.
    pub fn mount(&mut self, pattern: &str, handler: impl Handler + 'static) -> Result<()> {
        let parsed = Pattern::parse(pattern)?;
        self.mappings.insert(parsed, pattern)?;
        self.handlers.insert(pattern.to_string(), Arc::new(handler));
        Ok(())
    }

    #[must_use]
    pub fn handler_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Map an application-relative target to its handler.
    #[must_use]
    pub fn route(&self, target: &str) -> Option<RouteMatch> {
        let (name, servlet_path, path_info) = self.mappings.lookup(target)?;
        let handler = self.handlers.get(name)?;
        Some(RouteMatch {
            name: name.to_string(),
            handler: Arc::clone(handler),
            servlet_path,
            path_info,
        })
    }

    pub fn add_initializer(&mut self, initializer: Arc<dyn Initializer>) {
        self.initializers.push(initializer);
    }

    #[must_use]
    pub fn initializer_names(&self) -> Vec<String> {
        self.initializers.iter().map(|i| i.name().to_string()).collect()
    }

    /// Run initializers once, in registration order.
    ///
    /// A failing initializer is logged and marks the unit degraded; the
    /// remaining ones still run. Later calls are no-ops.
    pub fn initialize(&self) {
        if self.initialized.swap(true, Ordering::AcqRel) {
            return;
        }
        for initializer in &self.initializers {
            match initializer.on_startup(self) {
                Ok(()) => debug!(parent: &self.span, initializer = %initializer.name(), "Initializer ran"),
                Err(e) => {
                    warn!(
                        parent: &self.span,
                        initializer = %initializer.name(),
                        error = %e,
                        "Initializer failed, application is degraded"
                    );
                    self.mark_degraded();
                }
            }
        }
        info!(
            parent: &self.span,
            handlers = self.handlers.len(),
            initializers = self.initializers.len(),
            degraded = self.is_degraded(),
            "Application initialized"
        );
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    pub fn mark_degraded(&self) {
        self.degraded.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<String> {
        self.attributes.get(name).map(|v| v.value().clone())
    }

    pub fn set_attribute(&self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn remove_attribute(&self, name: &str) -> Option<String> {
        self.attributes.remove(name).map(|(_, v)| v)
    }
}

impl fmt::Debug for WebApplication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebApplication")
            .field("context_path", &self.context_path)
            .field("handlers", &self.handler_names())
            .field("async_supported", &self.async_supported)
            .field("root", &self.root.as_ref().map(|r| r.location().to_string()))
            .field("degraded", &self.is_degraded())
            .finish_non_exhaustive()
    }
}
