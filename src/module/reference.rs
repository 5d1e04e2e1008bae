use super::descriptor::ModuleDescriptor;
use crate::resource::{normalize_path, Listing, Resource, SharedResource};
use std::fmt;
use std::io;

/// A resolved module: its descriptor, declared location and backing store.
///
/// The reference holds the store handle for as long as it lives; readers
/// opened from it only borrow the store and cannot outlive the reference.
#[derive(Clone)]
pub struct ModuleReference {
    descriptor: ModuleDescriptor,
    location: String,
    resource: SharedResource,
}

impl ModuleReference {
    pub fn new(descriptor: ModuleDescriptor, location: impl Into<String>, resource: SharedResource) -> Self {
        Self {
            descriptor,
            location: location.into(),
            resource,
        }
    }

    #[must_use]
    pub fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    /// Declared location (URI-like) of the module.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    #[must_use]
    pub fn resource(&self) -> &dyn Resource {
        self.resource.as_ref()
    }

    /// Open an independent reader over the module's entries.
    ///
    /// # Errors
    ///
    /// `NotFound` when the backing store became unreachable after resolution
    /// (directory deleted, archive closed).
    pub fn open(&self) -> io::Result<ModuleReader<'_>> {
        self.resource.ensure_reachable()?;
        Ok(ModuleReader {
            resource: self.resource.as_ref(),
            location: &self.location,
            open: true,
            listed: false,
        })
    }
}

impl fmt::Debug for ModuleReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleReference")
            .field("descriptor", &self.descriptor)
            .field("location", &self.location)
            .finish()
    }
}

/// Stream adapter over a [`ModuleReference`]'s store.
///
/// Every operation fails with `BrokenPipe`-style errors once [`close`](Self::close)
/// was called; closing again is a no-op. Listing is restartable when the
/// store's [`Listing`] is restartable, otherwise only the first `list()` succeeds.
pub struct ModuleReader<'r> {
    resource: &'r dyn Resource,
    location: &'r str,
    open: bool,
    listed: bool,
}

impl<'r> ModuleReader<'r> {
    fn check_open(&self) -> io::Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                format!("module reader for '{}' is closed", self.location),
            ))
        }
    }

    /// Bytes of `name`, or `None` when the module has no such entry.
    pub fn read_entry(&self, name: &str) -> io::Result<Option<Vec<u8>>> {
        self.check_open()?;
        self.resource.read(name)
    }

    /// URI-like location of `name` (`<module location>!/<entry>`), or `None` when absent.
    pub fn find(&self, name: &str) -> io::Result<Option<String>> {
        self.check_open()?;
        let Some(entry) = normalize_path(name) else {
            return Ok(None);
        };
        Ok(self
            .resource
            .metadata(&entry)?
            .map(|_| format!("{}!/{}", self.location.trim_end_matches('/'), entry)))
    }

    /// Entry names of the module.
    pub fn list(&mut self) -> io::Result<Vec<String>> {
        self.check_open()?;
        if self.listed && self.resource.listing() == Listing::SinglePass {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("'{}' can only be listed once", self.location),
            ));
        }
        self.listed = true;
        self.resource.entries()
    }

    /// Provider names declared in `META-INF/services/<service>`.
    ///
    /// Blank lines and `#` comments are skipped.
    pub fn services(&self, service: &str) -> io::Result<Vec<String>> {
        let Some(bytes) = self.read_entry(&format!("META-INF/services/{service}"))? else {
            return Ok(Vec::new());
        };
        let text = String::from_utf8_lossy(&bytes);
        Ok(text
            .lines()
            .map(|line| line.split('#').next().unwrap_or("").trim())
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Release the reader.
    pub fn close(&mut self) {
        self.open = false;
    }
}

impl Drop for ModuleReader<'_> {
    fn drop(&mut self) {
        self.close();
    }
}
