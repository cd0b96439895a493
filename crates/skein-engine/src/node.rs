//! [`SkeinNode`]: owns the store handles and runs the transfer pipeline.
//!
//! Write path: lock project, upload chunks (resuming from the checkpoint),
//! publish the manifest, clear the checkpoint. Read path: fetch manifest,
//! fetch chunks in batches, decode, verify.

use std::sync::Arc;

use skein_meta::ProgressStore;
use skein_store::BlobStore;
use skein_types::{BlobId, ChunkMetadata, ChunkSetId, Manifest, TransferConfig};
use tracing::info;

use crate::document::{DocumentInfo, ManifestOptions};
use crate::download::ChunkDownloader;
use crate::engine::SkeinEngine;
use crate::error::EngineError;
use crate::hooks::TransferHooks;
use crate::manifest::ManifestPublisher;
use crate::progress::ProgressTracker;
use crate::upload::ChunkUploader;

/// What a successful `put_document` produced.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub manifest_id: BlobId,
    pub chunk_set_id: ChunkSetId,
    pub total_chunks: u32,
    pub chunk_metadata: Vec<ChunkMetadata>,
    /// Chunks sent by this call.
    pub uploaded: usize,
    /// Chunks reused from an earlier, interrupted attempt.
    pub resumed: usize,
}

/// Ties the blob store, checkpoint store and transfer stages together.
pub struct SkeinNode {
    store: Arc<dyn BlobStore>,
    tracker: Arc<ProgressTracker>,
    uploader: ChunkUploader,
    publisher: ManifestPublisher,
    downloader: ChunkDownloader,
    config: TransferConfig,
}

impl SkeinNode {
    pub fn new(
        config: TransferConfig,
        store: Arc<dyn BlobStore>,
        progress: Arc<dyn ProgressStore>,
    ) -> Self {
        let tracker = Arc::new(ProgressTracker::new(progress));
        Self {
            uploader: ChunkUploader::new(store.clone(), tracker.clone(), &config),
            publisher: ManifestPublisher::new(store.clone(), config.app_name.clone()),
            downloader: ChunkDownloader::new(store.clone(), &config),
            store,
            tracker,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    pub fn tracker(&self) -> &Arc<ProgressTracker> {
        &self.tracker
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    pub fn uploader(&self) -> &ChunkUploader {
        &self.uploader
    }

    pub fn publisher(&self) -> &ManifestPublisher {
        &self.publisher
    }

    pub fn downloader(&self) -> &ChunkDownloader {
        &self.downloader
    }
}

#[async_trait::async_trait]
impl SkeinEngine for SkeinNode {
    async fn put_document(
        &self,
        payload: &str,
        doc: &DocumentInfo,
        options: &ManifestOptions,
        hooks: TransferHooks<'_>,
    ) -> Result<StoredDocument, EngineError> {
        let lock = self.tracker.lock(&doc.project_id).await;
        let outcome = self.uploader.upload(&lock, payload, doc, hooks).await?;
        let total_chunks = outcome.total_chunks();

        let manifest_id = self
            .publisher
            .publish(
                doc,
                &outcome.chunk_set_id,
                total_chunks,
                &outcome.transaction_ids,
                options,
            )
            .await?;
        self.tracker.finish(&lock);

        info!(
            project_id = %doc.project_id,
            %manifest_id,
            total_chunks,
            uploaded = outcome.uploaded,
            resumed = outcome.resumed,
            "document stored"
        );
        Ok(StoredDocument {
            manifest_id,
            chunk_set_id: outcome.chunk_set_id,
            total_chunks,
            chunk_metadata: outcome.chunk_metadata,
            uploaded: outcome.uploaded,
            resumed: outcome.resumed,
        })
    }

    async fn get_document(
        &self,
        manifest_id: &BlobId,
        hooks: TransferHooks<'_>,
    ) -> Result<(String, Manifest), EngineError> {
        let manifest = self.publisher.fetch(manifest_id).await?;
        let document = self
            .downloader
            .download(
                &manifest.chunk_set_id,
                manifest.total_chunks,
                Some(manifest.chunks.as_slice()),
                hooks,
            )
            .await?;
        Ok((document, manifest))
    }

    async fn head_document(&self, manifest_id: &BlobId) -> Result<Manifest, EngineError> {
        self.publisher.fetch(manifest_id).await
    }

    async fn fetch_chunk_set(
        &self,
        chunk_set_id: &ChunkSetId,
        total_chunks: u32,
        hooks: TransferHooks<'_>,
    ) -> Result<String, EngineError> {
        self.downloader
            .download(chunk_set_id, total_chunks, None, hooks)
            .await
    }
}
