use super::{normalize_path, EntryMetadata, Resource};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;
use zip::result::ZipError;
use zip::ZipArchive;

/// Resource store backed by a zip archive on disk.
///
/// Entry reads go through one mutex-guarded [`ZipArchive`] handle, so
/// concurrent readers serialize on the archive but never corrupt it. The
/// last-modified marker of every entry is the archive file's own mtime.
/// Listing follows the central directory and is restartable. Rewriting the
/// archive file while it is open is not detected.
pub struct ArchiveResource {
    path: PathBuf,
    location: String,
    archive: Mutex<Option<ZipArchive<File>>>,
}

impl ArchiveResource {
    /// Open the archive at `path`.
    pub fn open<P: Into<PathBuf>>(path: P) -> io::Result<Self> {
        let path = path.into();
        let file = File::open(&path)?;
        let archive = ZipArchive::new(file).map_err(zip_to_io)?;
        let absolute = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
        let location = url::Url::from_file_path(&absolute)
            .map(|u| format!("zip:{u}"))
            .unwrap_or_else(|_| format!("zip:{}", absolute.display()));
        Ok(Self {
            path,
            location,
            archive: Mutex::new(Some(archive)),
        })
    }

    /// Archive file this store reads.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drop the archive handle. The store becomes unreachable; closing twice is a no-op.
    pub fn close(&self) {
        self.guard().take();
    }

    fn guard(&self) -> MutexGuard<'_, Option<ZipArchive<File>>> {
        self.archive.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn with_archive<T>(
        &self,
        f: impl FnOnce(&mut ZipArchive<File>) -> io::Result<T>,
    ) -> io::Result<T> {
        let mut guard = self.guard();
        match guard.as_mut() {
            Some(archive) => f(archive),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("archive '{}' is closed", self.location),
            )),
        }
    }

    fn archive_mtime(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).and_then(|m| m.modified()).ok()
    }
}

impl Resource for ArchiveResource {
    fn location(&self) -> &str {
        &self.location
    }

    fn is_reachable(&self) -> bool {
        self.guard().is_some() && self.path.is_file()
    }

    fn metadata(&self, path: &str) -> io::Result<Option<EntryMetadata>> {
        let Some(name) = normalize_path(path) else {
            return Ok(None);
        };
        let size = self.with_archive(|archive| match archive.by_name(&name) {
            Ok(file) if !file.is_dir() => Ok(Some(file.size())),
            Ok(_) | Err(ZipError::FileNotFound) => Ok(None),
            Err(e) => Err(zip_to_io(e)),
        })?;
        Ok(size.map(|size| EntryMetadata {
            size,
            last_modified: self.archive_mtime(),
        }))
    }

    fn read(&self, path: &str) -> io::Result<Option<Vec<u8>>> {
        let Some(name) = normalize_path(path) else {
            return Ok(None);
        };
        self.with_archive(|archive| match archive.by_name(&name) {
            Ok(mut file) if !file.is_dir() => {
                let mut buf = Vec::with_capacity(preallocation(file.size()));
                file.read_to_end(&mut buf)?;
                Ok(Some(buf))
            }
            Ok(_) | Err(ZipError::FileNotFound) => Ok(None),
            Err(e) => Err(zip_to_io(e)),
        })
    }

    fn entries(&self) -> io::Result<Vec<String>> {
        self.ensure_reachable()?;
        self.with_archive(|archive| {
            Ok(archive
                .file_names()
                .filter(|name| !name.ends_with('/'))
                .map(str::to_string)
                .collect())
        })
    }
}

/// Upper bound on the buffer reserved up front for an entry. The declared
/// size comes from the archive header and is not trusted.
const MAX_PREALLOCATION: u64 = 1 << 20;

fn preallocation(declared: u64) -> usize {
    usize::try_from(declared.min(MAX_PREALLOCATION)).unwrap_or(0)
}

fn zip_to_io(e: ZipError) -> io::Error {
    match e {
        ZipError::Io(e) => e,
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}
