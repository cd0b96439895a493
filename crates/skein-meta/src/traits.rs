//! The progress store trait and its key scheme.

use skein_types::UploadProgress;

use crate::error::MetaError;

/// Prefix of every progress record key.
pub const PROGRESS_KEY_PREFIX: &str = "upload-progress-";

/// Storage key for a document's progress record.
pub fn progress_key(project_id: &str) -> String {
    format!("{PROGRESS_KEY_PREFIX}{project_id}")
}

/// Key-value persistence for upload checkpoints, keyed by project id.
///
/// Implementations are plain load/store; callers that need a single writer
/// per key must serialize access themselves.
pub trait ProgressStore: Send + Sync {
    /// Load the record for `project_id`, if any.
    ///
    /// A record that exists but cannot be decoded is reported as an error.
    fn load(&self, project_id: &str) -> Result<Option<UploadProgress>, MetaError>;

    /// Insert or replace the record for `progress.project_id`.
    fn save(&self, progress: &UploadProgress) -> Result<(), MetaError>;

    /// Remove the record for `project_id`. Missing records are not an error.
    fn clear(&self, project_id: &str) -> Result<(), MetaError>;

    /// Every decodable record, in key order.
    fn list(&self) -> Result<Vec<UploadProgress>, MetaError>;
}
