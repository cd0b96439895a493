//! Error types for the engine.

use skein_types::{BlobId, ChunkSetId};

/// Errors that can occur during upload or download.
///
/// Every error is fatal to the call that produced it. Use
/// [`EngineError::is_integrity`] to tell corrupt or incomplete stored data
/// apart from transport failures.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The storage client failed; surfaced unmodified.
    #[error("store error: {0}")]
    Store(#[from] skein_store::StoreError),

    /// Encoding, decoding or manifest validation failed.
    #[error("cas error: {0}")]
    Cas(#[from] skein_cas::CasError),

    /// Empty payloads must not take the chunked path.
    #[error("refusing to upload an empty payload")]
    EmptyPayload,

    /// The payload needs more chunks than a chunk index can address.
    #[error("payload needs {0} chunks, more than a chunk set can hold")]
    TooManyChunks(usize),

    /// The tag search did not find every chunk of a set.
    #[error("missing chunks for set {chunk_set_id}: found {found} of {expected}")]
    MissingChunks {
        /// Chunk set that was searched.
        chunk_set_id: ChunkSetId,
        /// Distinct chunk indices found.
        found: usize,
        /// Declared chunk count.
        expected: usize,
    },

    /// A chunk blob could not be fetched during reassembly.
    #[error("chunk {index} ({id}) is missing from the store")]
    ChunkMissing {
        /// Index of the chunk.
        index: usize,
        /// Blob id that was requested.
        id: BlobId,
    },

    /// A supplied chunk id list does not match the declared chunk count.
    #[error("chunk id list has {found} entries, expected {expected}")]
    ChunkCountMismatch {
        /// Declared chunk count.
        expected: u32,
        /// Number of ids supplied.
        found: usize,
    },

    /// No manifest blob exists under the given id.
    #[error("manifest not found: {0}")]
    ManifestNotFound(BlobId),

    /// The caller cancelled the transfer.
    #[error("transfer cancelled")]
    Cancelled,
}

impl EngineError {
    /// Whether the storage client failed. Repeating the call may succeed,
    /// and an upload resumes from its checkpoint when it does.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Store(_))
    }

    /// Whether the error means stored data is incomplete or corrupt, as
    /// opposed to a transport failure or a caller mistake.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            Self::Cas(_)
                | Self::MissingChunks { .. }
                | Self::ChunkMissing { .. }
                | Self::ChunkCountMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let store = EngineError::Store(skein_store::StoreError::Unavailable("down".into()));
        assert!(store.is_transient());
        assert!(!store.is_integrity());

        let missing = EngineError::MissingChunks {
            chunk_set_id: ChunkSetId::from("s"),
            found: 2,
            expected: 3,
        };
        assert!(missing.is_integrity());
        assert!(!missing.is_transient());

        assert!(!EngineError::Cancelled.is_integrity());
        assert!(!EngineError::Cancelled.is_transient());
    }
}
