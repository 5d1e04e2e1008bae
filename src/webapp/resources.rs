use super::application::{Handler, WebApplication};
use super::extension::Extension;
use crate::exchange::prelude::*;
use crate::exchange::Exchange;
use crate::resource::{content_type, normalize_path, SharedResource};
use anyhow::Context;
use http::Method;
use std::io::Write;
use tracing::debug;

/// Entry served for the unit's root path.
pub const WELCOME_FILE: &str = "index.html";

/// Serves GET/HEAD targets from a resource store.
///
/// Absent entries and traversal attempts answer 404. Directory listings are
/// not produced.
pub struct ResourceHandler {
    root: SharedResource,
}

impl ResourceHandler {
    pub fn new(root: SharedResource) -> Self {
        Self { root }
    }

    /// Store key for a request target; `None` for traversal attempts.
    fn map_path(target: &str) -> Option<String> {
        let decoded = urlencoding::decode(target).ok()?;
        if decoded.trim_matches('/').is_empty() {
            return Some(WELCOME_FILE.to_string());
        }
        normalize_path(&decoded)
    }
}

impl Handler for ResourceHandler {
    fn handle(&self, exchange: &Exchange) -> anyhow::Result<()> {
        let method = exchange.method();
        if method != Method::GET && method != Method::HEAD {
            exchange.send_error(405)?;
            return Ok(());
        }
        let target = exchange.target_path();
        let Some(path) = Self::map_path(&target) else {
            debug!(parent: exchange.span(), target = %target, "Rejected resource path");
            exchange.send_error(404)?;
            return Ok(());
        };
        let Some(bytes) = self
            .root
            .read(&path)
            .with_context(|| format!("reading '{path}' from {}", self.root.location()))?
        else {
            exchange.send_error(404)?;
            return Ok(());
        };

        exchange.set_content_type(content_type(&path))?;
        exchange.set_header("content-length", &bytes.len().to_string())?;
        if method == Method::HEAD {
            exchange.write_headers()?;
        } else {
            exchange.output_stream()?.write_all(&bytes)?;
        }
        Ok(())
    }
}

/// Maps a [`ResourceHandler`] over the unit's root store on the default
/// pattern.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResourcesExtension;

impl Extension for ResourcesExtension {
    fn name(&self) -> &str {
        "resources"
    }

    fn configure(&self, app: &mut WebApplication) -> anyhow::Result<()> {
        let root = app
            .root()
            .cloned()
            .context("application has no root resource to serve")?;
        app.mount("/", ResourceHandler::new(root))?;
        Ok(())
    }
}
