//! Single-entry archive cache
//!
//! Switching between tracks of the same ZIP collection should not download
//! the collection again. Only the most recently fetched archive is kept.

use crate::locator::Origin;
use std::sync::Arc;

/// Cache holding at most one archive's raw bytes
#[derive(Debug, Default, Clone)]
pub struct ArchiveCache {
    entry: Option<(Origin, Arc<[u8]>)>,
}

impl ArchiveCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes for `origin` if it is the cached archive
    pub fn get(&self, origin: &Origin) -> Option<Arc<[u8]>> {
        match &self.entry {
            Some((key, data)) if key == origin => Some(Arc::clone(data)),
            _ => None,
        }
    }

    /// Cache `data` for `origin`, evicting whatever was cached before.
    pub fn insert(&mut self, origin: Origin, data: Arc<[u8]>) -> Arc<[u8]> {
        self.entry = Some((origin, Arc::clone(&data)));
        data
    }

    /// Return the cached bytes for `origin`, or fetch and cache them.
    ///
    /// A failed fetch leaves the cache untouched.
    pub fn get_or_fetch<F>(&mut self, origin: &Origin, fetch: F) -> crate::Result<Arc<[u8]>>
    where
        F: FnOnce() -> crate::Result<Vec<u8>>,
    {
        if let Some(data) = self.get(origin) {
            return Ok(data);
        }
        let data = fetch()?;
        Ok(self.insert(origin.clone(), data.into()))
    }

    /// Origin of the cached archive
    pub fn key(&self) -> Option<&Origin> {
        self.entry.as_ref().map(|(key, _)| key)
    }

    /// Drop the cached archive
    pub fn clear(&mut self) {
        self.entry = None;
    }

    /// True when nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entry.is_none()
    }
}
