//! Resume checkpoints for uploads.
//!
//! The [`ProgressTracker`] wraps a [`ProgressStore`] with the rules the
//! upload path needs: a stale or unreadable checkpoint is discarded rather
//! than trusted, saves are best-effort, and only one upload per project id
//! may read and write the checkpoint at a time.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use skein_meta::ProgressStore;
use skein_types::{ChunkSetId, UploadProgress};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

/// Exclusive right to upload one project's document.
///
/// Obtained from [`ProgressTracker::lock`]; released on drop.
pub struct ProjectLock {
    project_id: String,
    _guard: OwnedMutexGuard<()>,
}

impl ProjectLock {
    pub fn project_id(&self) -> &str {
        &self.project_id
    }
}

/// Loads, gates and persists upload checkpoints.
pub struct ProgressTracker {
    store: Arc<dyn ProgressStore>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ProgressTracker {
    pub fn new(store: Arc<dyn ProgressStore>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// The underlying checkpoint store.
    pub fn store(&self) -> &Arc<dyn ProgressStore> {
        &self.store
    }

    /// Wait for exclusive access to `project_id`'s checkpoint.
    pub async fn lock(&self, project_id: &str) -> ProjectLock {
        let mutex = {
            let mut locks = self.locks.lock().expect("lock poisoned");
            // Drop entries nobody holds or waits on.
            locks.retain(|_, m| Arc::strong_count(m) > 1);
            locks
                .entry(project_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        ProjectLock {
            project_id: project_id.to_string(),
            _guard: mutex.lock_owned().await,
        }
    }

    /// Load the checkpoint for an upload, or start a fresh one.
    ///
    /// An existing record is reused only if it was made for the same
    /// encoded payload (`data_hash`) and chunk count and its chunk list is
    /// consistent. Anything else, including a failed load, starts a new
    /// chunk set.
    pub fn begin(&self, lock: &ProjectLock, data_hash: &str, total_chunks: u32) -> UploadProgress {
        let project_id = lock.project_id();
        match self.store.load(project_id) {
            Ok(Some(progress))
                if progress.data_hash == data_hash
                    && progress.total_chunks == total_chunks
                    && progress.is_consistent() =>
            {
                info!(
                    project_id,
                    chunk_set_id = %progress.chunk_set_id,
                    completed = progress.completed(),
                    total_chunks,
                    "resuming upload from checkpoint"
                );
                return progress;
            }
            Ok(Some(stale)) => {
                warn!(
                    project_id,
                    chunk_set_id = %stale.chunk_set_id,
                    stored_hash = %stale.data_hash,
                    stored_total = stale.total_chunks,
                    "discarding checkpoint made for different content"
                );
            }
            Ok(None) => {}
            Err(e) => {
                warn!(project_id, error = %e, "unreadable checkpoint, starting fresh");
            }
        }

        let progress =
            UploadProgress::new(project_id, ChunkSetId::generate(), total_chunks, data_hash);
        debug!(project_id, chunk_set_id = %progress.chunk_set_id, "started new chunk set");
        progress
    }

    /// Persist a checkpoint. Failures are logged and otherwise ignored.
    pub fn checkpoint(&self, progress: &UploadProgress) {
        if let Err(e) = self.store.save(progress) {
            warn!(
                project_id = %progress.project_id,
                completed = progress.completed(),
                error = %e,
                "failed to save upload checkpoint"
            );
        }
    }

    /// Drop the checkpoint once the document is fully stored.
    pub fn finish(&self, lock: &ProjectLock) {
        if let Err(e) = self.store.clear(lock.project_id()) {
            warn!(project_id = lock.project_id(), error = %e, "failed to clear upload checkpoint");
        }
    }
}
