use crate::error::ContainerError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Entry holding an explicit module descriptor at the root of a resource store.
pub const DESCRIPTOR_ENTRY: &str = "module.toml";

/// Name and version metadata of a loadable code module.
///
/// Read from `module.toml`:
///
/// ```toml
/// name = "acme.billing"
/// version = "2.1.0"
/// requires = ["acme.core"]
///
/// [provides]
/// "acme.spi.Tax" = ["acme.billing.EuTax"]
/// ```
///
/// Stores without a descriptor become *automatic* modules named after their
/// location (see [`ModuleDescriptor::automatic`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub provides: BTreeMap<String, Vec<String>>,
    #[serde(skip)]
    automatic: bool,
}

impl ModuleDescriptor {
    pub fn new(name: impl Into<String>, version: Option<String>) -> Self {
        Self {
            name: name.into(),
            version,
            requires: Vec::new(),
            provides: BTreeMap::new(),
            automatic: false,
        }
    }

    /// Parse a `module.toml` read from `location`.
    pub fn parse(location: &str, text: &str) -> Result<Self, ContainerError> {
        let descriptor: ModuleDescriptor =
            toml::from_str(text).map_err(|e| ContainerError::ModuleDescriptor {
                location: location.to_string(),
                reason: e.to_string(),
            })?;
        if descriptor.name.trim().is_empty() {
            return Err(ContainerError::ModuleDescriptor {
                location: location.to_string(),
                reason: "module name is empty".to_string(),
            });
        }
        Ok(descriptor)
    }

    /// Derive a descriptor from a store location such as
    /// `zip:file:///opt/lib/commons-text-1.10.zip` (name `commons.text`,
    /// version `1.10`). Returns `None` when no usable name remains.
    #[must_use]
    pub fn automatic(location: &str) -> Option<Self> {
        let trimmed = location.trim_end_matches('/');
        let segment = trimmed
            .rsplit(['/', ':'])
            .next()
            .unwrap_or(trimmed);
        let stem = match segment.rsplit_once('.') {
            Some((stem, ext)) if matches!(ext, "zip" | "jar" | "war") => stem,
            _ => segment,
        };

        let (base, version) = split_version(stem);
        let name = base
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(".");
        if name.is_empty() {
            return None;
        }
        Some(Self {
            automatic: true,
            ..Self::new(name, version)
        })
    }

    /// Whether the descriptor was derived rather than read from `module.toml`.
    #[must_use]
    pub fn is_automatic(&self) -> bool {
        self.automatic
    }
}

/// Split `name-1.2.3` into (`name`, `Some("1.2.3")`).
fn split_version(stem: &str) -> (&str, Option<String>) {
    let bytes = stem.as_bytes();
    for (idx, window) in bytes.windows(2).enumerate() {
        if window[0] == b'-' && window[1].is_ascii_digit() {
            return (&stem[..idx], Some(stem[idx + 1..].to_string()));
        }
    }
    (stem, None)
}
