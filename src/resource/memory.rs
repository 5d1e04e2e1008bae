use super::{normalize_path, EntryMetadata, Resource};
use dashmap::DashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

#[derive(Debug, Clone)]
struct MemoryEntry {
    data: Arc<[u8]>,
    modified: SystemTime,
}

/// In-memory resource store.
///
/// Entries may be added and removed concurrently with reads. A listing is a
/// snapshot taken at call time; later mutations are not reflected in it.
#[derive(Debug)]
pub struct MemoryResource {
    location: String,
    entries: DashMap<String, MemoryEntry>,
    closed: AtomicBool,
}

impl MemoryResource {
    pub fn new(name: &str) -> Self {
        Self {
            location: format!("memory:{name}"),
            entries: DashMap::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Builder-style [`MemoryResource::put`].
    #[must_use]
    pub fn with_entry(self, path: &str, data: impl Into<Vec<u8>>) -> Self {
        self.put(path, data);
        self
    }

    /// Insert or replace an entry. Keys that escape the store are ignored.
    pub fn put(&self, path: &str, data: impl Into<Vec<u8>>) {
        if let Some(key) = normalize_path(path) {
            let data: Vec<u8> = data.into();
            self.entries.insert(
                key,
                MemoryEntry {
                    data: Arc::from(data),
                    modified: SystemTime::now(),
                },
            );
        }
    }

    /// Remove an entry, returning whether it existed.
    pub fn remove(&self, path: &str) -> bool {
        normalize_path(path)
            .map(|key| self.entries.remove(&key).is_some())
            .unwrap_or(false)
    }

    /// Make the store unreachable. Subsequent reads fail.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn lookup(&self, path: &str) -> io::Result<Option<MemoryEntry>> {
        self.ensure_reachable()?;
        Ok(normalize_path(path).and_then(|key| self.entries.get(&key).map(|e| e.value().clone())))
    }
}

impl Resource for MemoryResource {
    fn location(&self) -> &str {
        &self.location
    }

    fn is_reachable(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    fn metadata(&self, path: &str) -> io::Result<Option<EntryMetadata>> {
        Ok(self.lookup(path)?.map(|e| EntryMetadata {
            size: e.data.len() as u64,
            last_modified: Some(e.modified),
        }))
    }

    fn read(&self, path: &str) -> io::Result<Option<Vec<u8>>> {
        Ok(self.lookup(path)?.map(|e| e.data.to_vec()))
    }

    fn entries(&self) -> io::Result<Vec<String>> {
        self.ensure_reachable()?;
        let mut names: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        names.sort();
        Ok(names)
    }
}
