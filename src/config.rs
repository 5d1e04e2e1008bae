//! # Configuration Module
//!
//! Container configuration file (YAML, or JSON for `.json` paths) plus
//! environment overrides.
//!
//! ```yaml
//! http:
//!   bind: 0.0.0.0
//!   port: 8080
//! applications:
//!   - context_path: /docs
//!     root: ./site            # directory or .zip archive
//!     unpack: false           # extract an archive root into a temp dir
//!     modules: [./lib]        # ordered module roots
//!     async_supported: true
//!     extensions: [tempdir, resources]
//! ```
//!
//! ## Environment Variables
//!
//! - `BRRTC_BIND`: overrides `http.bind`
//! - `BRRTC_PORT`: overrides `http.port`

use crate::error::{ContainerError, Result};
use crate::module::ModuleLoader;
use crate::resource::{open_store, SharedResource, TempDirResource};
use crate::webapp::{validate_context_path, ExtensionRegistry, WebApplication};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info_span};

pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

/// One application unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ApplicationConfig {
    #[serde(default)]
    pub context_path: String,
    /// Directory or zip archive served as the unit's root store
    #[serde(default)]
    pub root: Option<PathBuf>,
    /// Extract the root into a temporary directory before serving it
    #[serde(default)]
    pub unpack: bool,
    /// Module roots, in resolution order
    #[serde(default)]
    pub modules: Vec<PathBuf>,
    #[serde(default)]
    pub async_supported: bool,
    /// Built-in extension names, applied in order
    #[serde(default)]
    pub extensions: Vec<String>,
}

impl ApplicationConfig {
    /// Unit rooted at `root` with the `resources` extension, as used by
    /// `serve --webapp CTX=PATH`.
    pub fn serving(context_path: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            context_path: context_path.into(),
            root: Some(root.into()),
            async_supported: true,
            extensions: vec!["resources".to_string()],
            ..Self::default()
        }
    }

    /// Build the unit: stores, module loader, then extensions.
    ///
    /// Store failures are fatal; extension failures only degrade the unit.
    pub fn build(&self) -> anyhow::Result<WebApplication> {
        let mut app = WebApplication::new(self.context_path.clone())
            .with_async_supported(self.async_supported);

        if let Some(root) = &self.root {
            let store = open_store(root)
                .with_context(|| format!("opening application root {}", root.display()))?;
            let store: SharedResource = if self.unpack {
                Arc::new(
                    TempDirResource::extract(store.as_ref())
                        .with_context(|| format!("unpacking {}", root.display()))?,
                )
            } else {
                store
            };
            debug!(parent: app.span(), root = %store.location(), "Application root opened");
            app.set_root(store);
        }

        if !self.modules.is_empty() {
            let roots = self
                .modules
                .iter()
                .map(|path| {
                    open_store(path).with_context(|| format!("opening module root {}", path.display()))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            let span = info_span!(parent: app.span(), "modules");
            app.set_module_loader(ModuleLoader::with_span(roots, span));
        }

        ExtensionRegistry::from_names(&self.extensions)?.configure_all(&mut app);
        Ok(app)
    }
}

/// Whole container configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ContainerConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub applications: Vec<ApplicationConfig>,
}

impl ContainerConfig {
    /// Load from a YAML file, or JSON when the path ends in `.json`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config = if path.extension().and_then(|e| e.to_str()) == Some("json") {
            serde_json::from_str(&content).map_err(|e| ContainerError::Config(e.to_string()))
        } else {
            Self::from_yaml_str(&content)
        }
        .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| ContainerError::Config(e.to_string()))
    }

    /// Apply `BRRTC_BIND` / `BRRTC_PORT`.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup` (same keys as [`apply_env`](Self::apply_env)).
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(bind) = lookup("BRRTC_BIND") {
            self.http.bind = bind;
        }
        if let Some(port) = lookup("BRRTC_PORT") {
            self.http.port = port
                .trim()
                .parse()
                .map_err(|_| ContainerError::Config(format!("BRRTC_PORT '{port}' is not a port")))?;
        }
        Ok(())
    }

    /// Reject invalid or duplicate context paths.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for app in &self.applications {
            let normalized = if app.context_path == "/" { "" } else { app.context_path.as_str() };
            validate_context_path(normalized)?;
            if !seen.insert(normalized) {
                return Err(ContainerError::Config(format!(
                    "context path '{}' is configured twice",
                    app.context_path
                )));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.http.bind, self.http.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
http:
  port: 9090
applications:
  - context_path: /docs
    async_supported: true
    extensions: [tempdir]
  - context_path: ""
"#;

    #[test]
    fn test_parse_with_defaults() {
        let config = ContainerConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.http.bind, DEFAULT_BIND);
        assert_eq!(config.http.port, 9090);
        assert_eq!(config.applications.len(), 2);
        assert!(config.applications[0].async_supported);
        assert_eq!(config.applications[0].extensions, vec!["tempdir"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ContainerConfig::default();
        config
            .apply_env_with(|key| match key {
                "BRRTC_BIND" => Some("127.0.0.1".to_string()),
                "BRRTC_PORT" => Some("3000".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.socket_addr(), "127.0.0.1:3000");
        assert!(config
            .apply_env_with(|key| (key == "BRRTC_PORT").then(|| "http".to_string()))
            .is_err());
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let mut config = ContainerConfig::default();
        config.applications.push(ApplicationConfig::serving("/a", "."));
        config.applications.push(ApplicationConfig::serving("/a", "."));
        assert!(config.validate().is_err());
        config.applications[1].context_path = "b".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_build_application() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>hi</h1>").unwrap();
        let mut config = ApplicationConfig::serving("/site", dir.path());
        config.extensions.push("tempdir".to_string());
        let app = config.build().unwrap();
        assert!(app.root().is_some());
        assert!(app.route("/index.html").is_some());
        assert_eq!(app.initializer_names(), vec!["tempdir"]);

        config.extensions.push("bogus".to_string());
        assert!(config.build().is_err());
    }
}
