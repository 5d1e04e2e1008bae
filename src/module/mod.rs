//! # Module Module
//!
//! Resolves named code modules from abstract [`Resource`](crate::resource::Resource)
//! stores instead of the local filesystem.
//!
//! - [`ModuleLoader`] scans an ordered list of store roots and returns the
//!   first [`ModuleReference`] whose descriptor carries the requested name.
//! - [`ModuleReference::open`] yields an independent [`ModuleReader`] over the
//!   module's entries (code blobs, service descriptors). Each reader must be
//!   closed by its caller; dropping it closes it.
//!
//! ```rust
//! use brrtcontainer::module::ModuleLoader;
//! use brrtcontainer::resource::{MemoryResource, SharedResource};
//! use std::sync::Arc;
//!
//! let lib: SharedResource = Arc::new(
//!     MemoryResource::new("lib")
//!         .with_entry("module.toml", "name = \"acme.core\"")
//!         .with_entry("acme/Core.class", vec![0xCA, 0xFE]),
//! );
//! let loader = ModuleLoader::new(vec![lib]);
//!
//! let module = loader.resolve("acme.core").expect("module present");
//! let reader = module.open().unwrap();
//! assert_eq!(reader.read_entry("acme/Core.class").unwrap(), Some(vec![0xCA, 0xFE]));
//! assert!(loader.resolve("acme.missing").is_none());
//! ```

mod descriptor;
mod loader;
mod reference;

pub use descriptor::{ModuleDescriptor, DESCRIPTOR_ENTRY};
pub use loader::ModuleLoader;
pub use reference::{ModuleReader, ModuleReference};
