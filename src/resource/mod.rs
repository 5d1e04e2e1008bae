//! # Resource Module
//!
//! A [`Resource`] is a named-byte-blob store: given a path-like key it returns
//! the entry's bytes and metadata, or `None` when the key is absent. The
//! module loader and the default resource handler only ever talk to this
//! trait, so code and content can live in a directory, a zip archive, a
//! temp-directory extraction or plain memory.
//!
//! ## Stores
//!
//! | Store | Listing | Unreachable when |
//! |---|---|---|
//! | [`DirectoryResource`] | restartable, sorted | the directory is gone |
//! | [`MemoryResource`] | restartable snapshot | [`MemoryResource::close`] was called |
//! | [`ArchiveResource`] | restartable, central-directory order | closed or the archive file is gone |
//! | [`TempDirResource`] | restartable, sorted | never while the store is alive |
//!
//! ## Concurrency
//!
//! All stores are `Send + Sync` and tolerate concurrent `read`/`metadata`
//! calls from independent loaders. A store whose content changes while a
//! caller iterates [`Resource::entries`] (hot-reloadable content) is outside
//! the loader's contract; each store documents what a concurrent mutation
//! does to an in-progress listing.

mod archive;
mod directory;
mod memory;
mod temp;

pub use archive::ArchiveResource;
pub use directory::DirectoryResource;
pub use memory::MemoryResource;
pub use temp::TempDirResource;

use std::fmt;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

/// Metadata describing one entry of a [`Resource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMetadata {
    /// Entry size in bytes
    pub size: u64,
    /// Last-modified marker, when the store tracks one
    pub last_modified: Option<SystemTime>,
}

/// Whether [`Resource::entries`] may be called more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listing {
    /// Every call produces a fresh, complete listing
    Restartable,
    /// Only the first call succeeds; later calls fail with an I/O error
    SinglePass,
}

/// Named byte blob lookup.
pub trait Resource: Send + Sync {
    /// URI-like identifier of the store (e.g. `file:///srv/app/`).
    fn location(&self) -> &str;

    /// Whether the backing storage can still be read.
    fn is_reachable(&self) -> bool;

    /// Metadata for `path`, or `None` when absent.
    fn metadata(&self, path: &str) -> io::Result<Option<EntryMetadata>>;

    /// Full content of `path`, or `None` when absent.
    fn read(&self, path: &str) -> io::Result<Option<Vec<u8>>>;

    /// Entry names (files only, `/`-separated, no leading slash).
    fn entries(&self) -> io::Result<Vec<String>>;

    /// Listing behaviour of [`Resource::entries`].
    fn listing(&self) -> Listing {
        Listing::Restartable
    }

    /// Fails with `NotFound` when the store is no longer reachable.
    fn ensure_reachable(&self) -> io::Result<()> {
        if self.is_reachable() {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("resource '{}' is no longer reachable", self.location()),
            ))
        }
    }
}

impl fmt::Debug for dyn Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("location", &self.location())
            .finish()
    }
}

/// Shared handle to a resource store.
pub type SharedResource = Arc<dyn Resource>;

/// Normalize a path-like key into `a/b/c` form.
///
/// Leading slashes, empty segments and `.` are dropped. Returns `None` when the
/// key tries to escape the store (`..`) or names the root itself.
#[must_use]
pub fn normalize_path(path: &str) -> Option<String> {
    let mut parts = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => return None,
            s => parts.push(s),
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Open the store at `path`: a directory, or a zip archive file.
pub fn open_store(path: &Path) -> io::Result<SharedResource> {
    if path.is_dir() {
        Ok(Arc::new(DirectoryResource::new(path)))
    } else if path.is_file() {
        Ok(Arc::new(ArchiveResource::open(path)?))
    } else {
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no resource store at '{}'", path.display()),
        ))
    }
}

/// Guess a content type from an entry's extension.
#[must_use]
pub fn content_type(path: &str) -> &'static str {
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "txt" => "text/plain",
        "xml" => "application/xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "svg" => "image/svg+xml",
        "toml" => "application/toml",
        _ => "application/octet-stream",
    }
}
