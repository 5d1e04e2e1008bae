use super::{DirectoryResource, EntryMetadata, Resource};
use std::fs;
use std::io;
use std::path::Path;
use tempfile::TempDir;
use tracing::debug;

/// A resource store materialized into a fresh temporary directory.
///
/// Useful when a collaborator insists on real filesystem paths: the source
/// store (typically an [`ArchiveResource`](super::ArchiveResource)) is copied
/// once, then served as a [`DirectoryResource`]. The directory is deleted when
/// this store is dropped.
pub struct TempDirResource {
    dir: TempDir,
    inner: DirectoryResource,
}

impl TempDirResource {
    /// Copy every entry of `source` into a new temporary directory.
    pub fn extract(source: &dyn Resource) -> io::Result<Self> {
        source.ensure_reachable()?;
        let dir = tempfile::Builder::new().prefix("brrtc-").tempdir()?;
        let mut copied = 0usize;
        for name in source.entries()? {
            if let Some(bytes) = source.read(&name)? {
                let target = dir.path().join(&name);
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&target, bytes)?;
                copied += 1;
            }
        }
        debug!(
            source = %source.location(),
            target = %dir.path().display(),
            entries = copied,
            "Resource extracted to temp directory"
        );
        let inner = DirectoryResource::new(dir.path());
        Ok(Self { dir, inner })
    }

    /// Filesystem path of the extraction.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

impl Resource for TempDirResource {
    fn location(&self) -> &str {
        self.inner.location()
    }

    fn is_reachable(&self) -> bool {
        self.inner.is_reachable()
    }

    fn metadata(&self, path: &str) -> io::Result<Option<EntryMetadata>> {
        self.inner.metadata(path)
    }

    fn read(&self, path: &str) -> io::Result<Option<Vec<u8>>> {
        self.inner.read(path)
    }

    fn entries(&self) -> io::Result<Vec<String>> {
        self.inner.entries()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::MemoryResource;

    #[test]
    fn test_extract_memory_store() {
        let source = MemoryResource::new("src")
            .with_entry("index.html", "<h1>hi</h1>")
            .with_entry("css/site.css", "body{}");
        let extracted = TempDirResource::extract(&source).unwrap();
        assert!(extracted.path().join("css/site.css").is_file());
        assert_eq!(extracted.read("index.html").unwrap().unwrap(), b"<h1>hi</h1>");
        assert_eq!(extracted.entries().unwrap(), vec!["css/site.css", "index.html"]);

        let path = extracted.path().to_path_buf();
        drop(extracted);
        assert!(!path.exists());
    }
}
