use super::application::WebApplication;
use super::resources::ResourcesExtension;
use super::tempdir::TempDirExtension;
use crate::error::{ContainerError, Result};
use std::sync::Arc;
use tracing::{debug, warn};

/// Startup feature that configures an application unit before deployment.
pub trait Extension: Send + Sync {
    fn name(&self) -> &str;
    /// May register handlers, mappings and initializers into `app`.
    fn configure(&self, app: &mut WebApplication) -> anyhow::Result<()>;
}

/// Ordered list of extensions applied to every application unit.
#[derive(Clone, Default)]
pub struct ExtensionRegistry {
    extensions: Vec<Arc<dyn Extension>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in extension for a configuration name (`tempdir`, `resources`).
    #[must_use]
    pub fn by_name(name: &str) -> Option<Arc<dyn Extension>> {
        match name {
            "tempdir" => Some(Arc::new(TempDirExtension)),
            "resources" => Some(Arc::new(ResourcesExtension)),
            _ => None,
        }
    }

    /// Registry of built-in extensions, in the given order.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let mut registry = Self::new();
        for name in names {
            let name = name.as_ref();
            let extension = Self::by_name(name)
                .ok_or_else(|| ContainerError::Config(format!("unknown extension '{name}'")))?;
            registry.add(extension);
        }
        Ok(registry)
    }

    pub fn add(&mut self, extension: Arc<dyn Extension>) {
        self.extensions.push(extension);
    }

    #[must_use]
    pub fn with(mut self, extension: impl Extension + 'static) -> Self {
        self.extensions.push(Arc::new(extension));
        self
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.extensions.iter().map(|e| e.name()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Configure `app` with every extension in order.
    ///
    /// A failing extension is logged and marks the unit degraded; the
    /// remaining extensions still run and startup continues.
    pub fn configure_all(&self, app: &mut WebApplication) {
        for extension in &self.extensions {
            match extension.configure(app) {
                Ok(()) => debug!(parent: app.span(), extension = %extension.name(), "Extension configured"),
                Err(e) => {
                    warn!(
                        parent: app.span(),
                        extension = %extension.name(),
                        error = %e,
                        "Extension failed to configure, application is degraded"
                    );
                    app.mark_degraded();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Named(&'static str, bool, Arc<Mutex<Vec<&'static str>>>);

    impl Extension for Named {
        fn name(&self) -> &str {
            self.0
        }
        fn configure(&self, _app: &mut WebApplication) -> anyhow::Result<()> {
            self.2.lock().unwrap().push(self.0);
            if self.1 {
                anyhow::bail!("cannot configure");
            }
            Ok(())
        }
    }

    #[test]
    fn test_configure_order_and_degraded() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = ExtensionRegistry::new()
            .with(Named("a", false, Arc::clone(&log)))
            .with(Named("b", true, Arc::clone(&log)))
            .with(Named("c", false, Arc::clone(&log)));
        let mut app = WebApplication::new("/x");
        registry.configure_all(&mut app);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
        assert!(app.is_degraded());
    }

    #[test]
    fn test_from_names() {
        let registry = ExtensionRegistry::from_names(&["tempdir", "resources"]).unwrap();
        assert_eq!(registry.names(), vec!["tempdir", "resources"]);
        assert!(ExtensionRegistry::from_names(&["annotations"]).is_err());
    }
}
