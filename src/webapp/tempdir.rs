use super::application::{Initializer, WebApplication};
use super::extension::Extension;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tracing::info;

/// Attribute holding the unit's scratch directory path.
pub const TEMPDIR_ATTRIBUTE: &str = "brrtc.tempdir";

/// Gives each application unit a private scratch directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct TempDirExtension;

impl Extension for TempDirExtension {
    fn name(&self) -> &str {
        "tempdir"
    }

    fn configure(&self, app: &mut WebApplication) -> anyhow::Result<()> {
        app.add_initializer(Arc::new(TempDirInitializer::default()));
        Ok(())
    }
}

/// Creates the scratch directory at startup and keeps it until the unit is
/// dropped.
#[derive(Debug, Default)]
pub struct TempDirInitializer {
    dir: Mutex<Option<TempDir>>,
}

impl Initializer for TempDirInitializer {
    fn name(&self) -> &str {
        "tempdir"
    }

    fn on_startup(&self, app: &WebApplication) -> anyhow::Result<()> {
        let mut slot = self.dir.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            return Ok(());
        }
        let dir = tempfile::Builder::new().prefix("brrtc-webapp-").tempdir()?;
        let path = dir.path().display().to_string();
        app.set_attribute(TEMPDIR_ATTRIBUTE, path.clone());
        info!(parent: app.span(), tempdir = %path, "Temporary directory created");
        *slot = Some(dir);
        Ok(())
    }
}
