use super::{normalize_path, EntryMetadata, Resource};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Resource store rooted at a directory on the local filesystem.
///
/// Listing walks the tree recursively and returns names sorted, so repeated
/// calls are deterministic. Files added or removed while a listing is being
/// built may or may not appear in it.
#[derive(Debug, Clone)]
pub struct DirectoryResource {
    root: PathBuf,
    location: String,
}

impl DirectoryResource {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        let root = root.into();
        let absolute = fs::canonicalize(&root).unwrap_or_else(|_| root.clone());
        let location = url::Url::from_directory_path(&absolute)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| absolute.display().to_string());
        Self { root, location }
    }

    /// Directory this store serves.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn map_path(&self, path: &str) -> Option<PathBuf> {
        normalize_path(path).map(|p| self.root.join(p))
    }

    fn walk(dir: &Path, prefix: &str, out: &mut Vec<String>) -> io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let rel = if prefix.is_empty() {
                name
            } else {
                format!("{prefix}/{name}")
            };
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                Self::walk(&entry.path(), &rel, out)?;
            } else {
                out.push(rel);
            }
        }
        Ok(())
    }
}

impl Resource for DirectoryResource {
    fn location(&self) -> &str {
        &self.location
    }

    fn is_reachable(&self) -> bool {
        self.root.is_dir()
    }

    fn metadata(&self, path: &str) -> io::Result<Option<EntryMetadata>> {
        let Some(file) = self.map_path(path) else {
            return Ok(None);
        };
        match fs::metadata(&file) {
            Ok(meta) if meta.is_file() => Ok(Some(EntryMetadata {
                size: meta.len(),
                last_modified: meta.modified().ok(),
            })),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn read(&self, path: &str) -> io::Result<Option<Vec<u8>>> {
        let Some(file) = self.map_path(path) else {
            return Ok(None);
        };
        if !file.is_file() {
            return Ok(None);
        }
        match fs::read(&file) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn entries(&self) -> io::Result<Vec<String>> {
        self.ensure_reachable()?;
        let mut out = Vec::new();
        Self::walk(&self.root, "", &mut out)?;
        out.sort();
        Ok(out)
    }
}
