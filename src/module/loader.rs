use super::descriptor::{ModuleDescriptor, DESCRIPTOR_ENTRY};
use super::reference::ModuleReference;
use crate::resource::{Resource, SharedResource};
use std::collections::HashSet;
use tracing::{debug, warn, Span};

/// Resolves module names against an ordered list of resource store roots.
///
/// Roots are scanned in declaration order and the first match wins. Absence is
/// a normal outcome (`None`), never an error. Stores that are unreachable or
/// carry a malformed descriptor are skipped with a log line.
///
/// The loader keeps no mutable state, so any number of loaders may resolve
/// against the same stores concurrently.
#[derive(Clone)]
pub struct ModuleLoader {
    roots: Vec<SharedResource>,
    span: Span,
}

impl ModuleLoader {
    pub fn new(roots: Vec<SharedResource>) -> Self {
        Self::with_span(roots, Span::none())
    }

    /// Construct a loader that logs under `span`.
    pub fn with_span(roots: Vec<SharedResource>, span: Span) -> Self {
        Self { roots, span }
    }

    #[must_use]
    pub fn roots(&self) -> &[SharedResource] {
        &self.roots
    }

    /// Resolve `name` to the first matching module, or `None`.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<ModuleReference> {
        let found = self.roots.iter().find_map(|root| {
            let descriptor = self.describe(root.as_ref())?;
            (descriptor.name == name).then(|| {
                ModuleReference::new(descriptor, root.location(), std::sync::Arc::clone(root))
            })
        });
        debug!(
            parent: &self.span,
            module = %name,
            found = found.is_some(),
            roots = self.roots.len(),
            "Module resolution"
        );
        found
    }

    /// Every module visible through the roots, in declaration order.
    ///
    /// When two roots declare the same name the first one shadows the other.
    #[must_use]
    pub fn modules(&self) -> Vec<ModuleReference> {
        let mut seen = HashSet::new();
        let mut modules = Vec::new();
        for root in &self.roots {
            let Some(descriptor) = self.describe(root.as_ref()) else {
                continue;
            };
            if !seen.insert(descriptor.name.clone()) {
                debug!(
                    parent: &self.span,
                    module = %descriptor.name,
                    location = %root.location(),
                    "Module shadowed by an earlier root"
                );
                continue;
            }
            modules.push(ModuleReference::new(
                descriptor,
                root.location(),
                std::sync::Arc::clone(root),
            ));
        }
        modules
    }

    fn describe(&self, root: &dyn Resource) -> Option<ModuleDescriptor> {
        if !root.is_reachable() {
            debug!(parent: &self.span, location = %root.location(), "Skipping unreachable module root");
            return None;
        }
        match root.read(DESCRIPTOR_ENTRY) {
            Ok(Some(bytes)) => {
                let text = String::from_utf8_lossy(&bytes);
                match ModuleDescriptor::parse(root.location(), &text) {
                    Ok(descriptor) => Some(descriptor),
                    Err(e) => {
                        warn!(parent: &self.span, error = %e, "Skipping module root with invalid descriptor");
                        None
                    }
                }
            }
            Ok(None) => ModuleDescriptor::automatic(root.location()),
            Err(e) => {
                warn!(
                    parent: &self.span,
                    location = %root.location(),
                    error = %e,
                    "Failed to read module descriptor"
                );
                None
            }
        }
    }
}
