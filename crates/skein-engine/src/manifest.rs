//! Publishing and fetching manifests.

use std::sync::Arc;

use bytes::Bytes;
use skein_cas::{build_manifest, deserialize_manifest, serialize_manifest};
use skein_store::BlobStore;
use skein_types::{BlobId, ChunkSetId, Manifest};
use tracing::{debug, info};

use crate::document::{DocumentInfo, ManifestOptions, manifest_tags};
use crate::error::EngineError;

/// Writes manifests for uploaded chunk sets and reads them back.
pub struct ManifestPublisher {
    store: Arc<dyn BlobStore>,
    app_name: String,
}

impl ManifestPublisher {
    pub fn new(store: Arc<dyn BlobStore>, app_name: impl Into<String>) -> Self {
        Self {
            store,
            app_name: app_name.into(),
        }
    }

    /// Build the manifest for a chunk set and store it as its own blob.
    ///
    /// `transaction_ids` must be in index order and hold exactly
    /// `total_chunks` ids; a mismatch fails before anything is stored.
    pub async fn publish(
        &self,
        doc: &DocumentInfo,
        chunk_set_id: &ChunkSetId,
        total_chunks: u32,
        transaction_ids: &[BlobId],
        options: &ManifestOptions,
    ) -> Result<BlobId, EngineError> {
        let manifest = build_manifest(
            &doc.project_id,
            &doc.project_name,
            chunk_set_id,
            total_chunks,
            transaction_ids,
        )?;
        let body = serialize_manifest(&manifest)?;
        let tags = manifest_tags(&self.app_name, doc, chunk_set_id, total_chunks, options);

        let id = self.store.put(Bytes::from(body), tags).await?;
        info!(
            project_id = %doc.project_id,
            %chunk_set_id,
            total_chunks,
            manifest_id = %id,
            "manifest published"
        );
        Ok(id)
    }

    /// Fetch and validate a manifest.
    pub async fn fetch(&self, manifest_id: &BlobId) -> Result<Manifest, EngineError> {
        let body = self
            .store
            .get(manifest_id)
            .await?
            .ok_or_else(|| EngineError::ManifestNotFound(manifest_id.clone()))?;
        let manifest = deserialize_manifest(&body)?;
        debug!(
            %manifest_id,
            chunk_set_id = %manifest.chunk_set_id,
            total_chunks = manifest.total_chunks,
            "fetched manifest"
        );
        Ok(manifest)
    }
}
