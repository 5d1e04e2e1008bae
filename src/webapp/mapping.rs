//! Servlet-style URL patterns.
//!
//! Precedence: exact > longest path prefix > extension > default.

use super::application::Handler;
use crate::error::{ContainerError, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A parsed mapping pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    /// `/a/b`
    Exact(String),
    /// `/a/*`, stored without the `/*` suffix (`/*` becomes an empty prefix)
    Prefix(String),
    /// `*.ext`, stored without the `*.`
    Extension(String),
    /// `/`
    Default,
}

impl Pattern {
    pub fn parse(pattern: &str) -> Result<Self> {
        if pattern == "/" {
            Ok(Pattern::Default)
        } else if let Some(ext) = pattern.strip_prefix("*.") {
            if ext.is_empty() || ext.contains('/') {
                return Err(invalid(pattern));
            }
            Ok(Pattern::Extension(ext.to_string()))
        } else if let Some(prefix) = pattern.strip_suffix("/*") {
            if !(prefix.is_empty() || prefix.starts_with('/')) || prefix.contains('*') {
                return Err(invalid(pattern));
            }
            Ok(Pattern::Prefix(prefix.to_string()))
        } else if pattern.starts_with('/') && !pattern.contains('*') {
            Ok(Pattern::Exact(pattern.to_string()))
        } else {
            Err(invalid(pattern))
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Exact(path) => f.write_str(path),
            Pattern::Prefix(prefix) => write!(f, "{prefix}/*"),
            Pattern::Extension(ext) => write!(f, "*.{ext}"),
            Pattern::Default => f.write_str("/"),
        }
    }
}

fn invalid(pattern: &str) -> ContainerError {
    ContainerError::Config(format!("invalid mapping pattern '{pattern}'"))
}

/// Result of mapping a target path to a handler.
#[derive(Clone)]
pub struct RouteMatch {
    /// Name the handler was registered under
    pub name: String,
    pub handler: Arc<dyn Handler>,
    pub servlet_path: String,
    pub path_info: Option<String>,
}

impl fmt::Debug for RouteMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteMatch")
            .field("name", &self.name)
            .field("servlet_path", &self.servlet_path)
            .field("path_info", &self.path_info)
            .finish_non_exhaustive()
    }
}

/// Pattern table of one application unit. Values are handler names.
#[derive(Debug, Default, Clone)]
pub(crate) struct HandlerMappings {
    exact: HashMap<String, String>,
    /// Longest prefix first.
    prefixes: Vec<(String, String)>,
    extensions: HashMap<String, String>,
    default: Option<String>,
}

impl HandlerMappings {
    pub(crate) fn insert(&mut self, pattern: Pattern, handler: &str) -> Result<()> {
        let duplicate = || ContainerError::Config(format!("pattern '{pattern}' is already mapped"));
        match &pattern {
            Pattern::Exact(path) => {
                if self.exact.contains_key(path) {
                    return Err(duplicate());
                }
                self.exact.insert(path.clone(), handler.to_string());
            }
            Pattern::Prefix(prefix) => {
                if self.prefixes.iter().any(|(p, _)| p == prefix) {
                    return Err(duplicate());
                }
                self.prefixes.push((prefix.clone(), handler.to_string()));
                self.prefixes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
            }
            Pattern::Extension(ext) => {
                if self.extensions.contains_key(ext) {
                    return Err(duplicate());
                }
                self.extensions.insert(ext.clone(), handler.to_string());
            }
            Pattern::Default => {
                if self.default.is_some() {
                    return Err(duplicate());
                }
                self.default = Some(handler.to_string());
            }
        }
        Ok(())
    }

    /// Handler name, servlet path and path info for `target`.
    pub(crate) fn lookup(&self, target: &str) -> Option<(&str, String, Option<String>)> {
        if let Some(name) = self.exact.get(target) {
            return Some((name, target.to_string(), None));
        }
        for (prefix, name) in &self.prefixes {
            if target == prefix {
                return Some((name, prefix.clone(), None));
            }
            if let Some(rest) = target.strip_prefix(prefix.as_str()) {
                if rest.starts_with('/') {
                    return Some((name, prefix.clone(), Some(rest.to_string())));
                }
            }
        }
        let last_segment = target.rsplit('/').next().unwrap_or(target);
        if let Some((_, ext)) = last_segment.rsplit_once('.') {
            if let Some(name) = self.extensions.get(ext) {
                return Some((name, target.to_string(), None));
            }
        }
        self.default
            .as_deref()
            .map(|name| (name, target.to_string(), None))
    }
}
