//! In-memory progress store.

use std::collections::BTreeMap;
use std::sync::RwLock;

use skein_types::UploadProgress;
use tracing::{debug, warn};

use crate::error::MetaError;
use crate::traits::{ProgressStore, progress_key};

/// Process-local progress store backed by a `RwLock<BTreeMap>`.
///
/// Records are kept JSON-encoded, exactly as a persistent backend stores
/// them. Useful for tests and for callers that only need resume within one
/// process lifetime.
#[derive(Default)]
pub struct MemoryProgressStore {
    records: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryProgressStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a reference to the inner map (for testing purposes).
    #[cfg(test)]
    pub(crate) fn inner(&self) -> &RwLock<BTreeMap<String, Vec<u8>>> {
        &self.records
    }
}

impl ProgressStore for MemoryProgressStore {
    fn load(&self, project_id: &str) -> Result<Option<UploadProgress>, MetaError> {
        let map = self.records.read().expect("lock poisoned");
        match map.get(&progress_key(project_id)) {
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes)?)),
            None => Ok(None),
        }
    }

    fn save(&self, progress: &UploadProgress) -> Result<(), MetaError> {
        let value = serde_json::to_vec(progress)?;
        let mut map = self.records.write().expect("lock poisoned");
        map.insert(progress_key(&progress.project_id), value);
        debug!(
            project_id = %progress.project_id,
            completed = progress.completed(),
            "saved upload progress in memory"
        );
        Ok(())
    }

    fn clear(&self, project_id: &str) -> Result<(), MetaError> {
        let mut map = self.records.write().expect("lock poisoned");
        map.remove(&progress_key(project_id));
        Ok(())
    }

    fn list(&self) -> Result<Vec<UploadProgress>, MetaError> {
        let map = self.records.read().expect("lock poisoned");
        let mut records = Vec::with_capacity(map.len());
        for (key, bytes) in map.iter() {
            match serde_json::from_slice(bytes) {
                Ok(progress) => records.push(progress),
                Err(e) => warn!(key, %e, "skipping undecodable progress record"),
            }
        }
        Ok(records)
    }
}
