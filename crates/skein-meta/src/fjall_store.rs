//! [`FjallProgressStore`]: progress records in a persistent Fjall keyspace.

use std::path::Path;

use fjall::{Database, Keyspace, KeyspaceCreateOptions};
use skein_types::UploadProgress;
use tracing::{debug, warn};

use crate::error::MetaError;
use crate::traits::{PROGRESS_KEY_PREFIX, ProgressStore, progress_key};

type Result<T> = std::result::Result<T, MetaError>;

/// Progress store backed by Fjall, so checkpoints survive process restarts.
pub struct FjallProgressStore {
    /// The underlying Fjall database handle.
    #[allow(dead_code)]
    db: Database,
    /// `upload-progress-<projectId>` → JSON-encoded progress.
    progress: Keyspace,
}

impl FjallProgressStore {
    /// Open a persistent store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::builder(path).open()?;
        Self::init_keyspaces(db)
    }

    /// Open a temporary store that is cleaned up on drop.
    ///
    /// Useful for tests.
    pub fn open_temporary() -> Result<Self> {
        let tmp = tempfile::tempdir().map_err(std::io::Error::other)?;
        let db = Database::builder(tmp.path()).temporary(true).open()?;
        Self::init_keyspaces(db)
    }

    fn init_keyspaces(db: Database) -> Result<Self> {
        let progress = db.keyspace("upload_progress", KeyspaceCreateOptions::default)?;
        Ok(Self { db, progress })
    }
}

impl ProgressStore for FjallProgressStore {
    fn load(&self, project_id: &str) -> Result<Option<UploadProgress>> {
        match self.progress.get(progress_key(project_id).as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn save(&self, progress: &UploadProgress) -> Result<()> {
        let key = progress_key(&progress.project_id);
        let value = serde_json::to_vec(progress)?;
        self.progress.insert(key.as_bytes(), value.as_slice())?;
        debug!(
            project_id = %progress.project_id,
            completed = progress.completed(),
            "saved upload progress"
        );
        Ok(())
    }

    fn clear(&self, project_id: &str) -> Result<()> {
        self.progress.remove(progress_key(project_id).as_bytes())?;
        debug!(project_id, "cleared upload progress");
        Ok(())
    }

    fn list(&self) -> Result<Vec<UploadProgress>> {
        let mut records = Vec::new();
        for guard in self.progress.prefix(PROGRESS_KEY_PREFIX.as_bytes()) {
            let (key, value) = guard.into_inner()?;
            match serde_json::from_slice(&value) {
                Ok(progress) => records.push(progress),
                Err(e) => warn!(
                    key = %String::from_utf8_lossy(&key),
                    %e,
                    "skipping undecodable progress record"
                ),
            }
        }
        Ok(records)
    }
}
