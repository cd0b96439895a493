//! [`SkeinEngine`]: the document-transfer trait front ends depend on.
//!
//! Front ends (the CLI today) call this trait instead of the concrete
//! [`SkeinNode`](crate::SkeinNode), so a remote or mocked engine can stand
//! in without touching them.

use skein_types::{BlobId, ChunkSetId, Manifest};

use crate::document::{DocumentInfo, ManifestOptions};
use crate::error::EngineError;
use crate::hooks::TransferHooks;
use crate::node::StoredDocument;

/// Store and retrieve JSON documents as chunk sets.
///
/// - **put** stores a document, resuming a previous attempt when possible
/// - **get** reads a document through its manifest
/// - **head** reads only the manifest
/// - **fetch** reassembles a chunk set found through tag search
#[async_trait::async_trait]
pub trait SkeinEngine: Send + Sync {
    /// Upload a document and publish its manifest.
    async fn put_document(
        &self,
        payload: &str,
        doc: &DocumentInfo,
        options: &ManifestOptions,
        hooks: TransferHooks<'_>,
    ) -> Result<StoredDocument, EngineError>;

    /// Download the document a manifest points to.
    async fn get_document(
        &self,
        manifest_id: &BlobId,
        hooks: TransferHooks<'_>,
    ) -> Result<(String, Manifest), EngineError>;

    /// Read a manifest without fetching any chunk.
    async fn head_document(&self, manifest_id: &BlobId) -> Result<Manifest, EngineError>;

    /// Reassemble a chunk set without a manifest.
    async fn fetch_chunk_set(
        &self,
        chunk_set_id: &ChunkSetId,
        total_chunks: u32,
        hooks: TransferHooks<'_>,
    ) -> Result<String, EngineError>;
}
