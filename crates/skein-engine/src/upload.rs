//! Sequential, resumable chunk upload.

use std::sync::Arc;

use bytes::Bytes;
use skein_cas::{ChunkEnvelope, Chunker, encode_payload, rolling_hash};
use skein_store::BlobStore;
use skein_types::{BlobId, ChunkMetadata, ChunkSetId, TransferConfig};
use tracing::{debug, info};

use crate::document::{DocumentInfo, chunk_tags};
use crate::error::EngineError;
use crate::hooks::{ChunkProgress, TransferHooks};
use crate::progress::{ProgressTracker, ProjectLock};

/// Result of uploading every chunk of a document.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub chunk_set_id: ChunkSetId,
    /// Chunk blob ids in index order.
    pub transaction_ids: Vec<BlobId>,
    pub chunk_metadata: Vec<ChunkMetadata>,
    /// Chunks sent to the store by this call.
    pub uploaded: usize,
    /// Chunks taken from the checkpoint instead of re-sent.
    pub resumed: usize,
}

impl UploadOutcome {
    pub fn total_chunks(&self) -> u32 {
        // Bounded by the u32 check in `ChunkUploader::upload`.
        self.transaction_ids.len() as u32
    }
}

/// Uploads chunk envelopes one at a time, checkpointing after each.
pub struct ChunkUploader {
    store: Arc<dyn BlobStore>,
    tracker: Arc<ProgressTracker>,
    chunker: Chunker,
    app_name: String,
    hash_prefix_len: usize,
}

impl ChunkUploader {
    pub fn new(
        store: Arc<dyn BlobStore>,
        tracker: Arc<ProgressTracker>,
        config: &TransferConfig,
    ) -> Self {
        Self {
            store,
            tracker,
            chunker: Chunker::new(config.chunk_size),
            app_name: config.app_name.clone(),
            hash_prefix_len: config.hash_prefix_len,
        }
    }

    /// Upload `payload` as a chunk set.
    ///
    /// Chunks already recorded in a matching checkpoint are not re-sent;
    /// their stored ids are reused. Every newly stored chunk is checkpointed
    /// before the next one starts, so a failed call can simply be repeated.
    /// The checkpoint is left in place on return; the caller clears it once
    /// the manifest is stored.
    pub async fn upload(
        &self,
        lock: &ProjectLock,
        payload: &str,
        doc: &DocumentInfo,
        hooks: TransferHooks<'_>,
    ) -> Result<UploadOutcome, EngineError> {
        debug_assert_eq!(lock.project_id(), doc.project_id);
        if payload.is_empty() {
            return Err(EngineError::EmptyPayload);
        }

        let encoded = encode_payload(payload);
        let data_hash = rolling_hash(&encoded, self.hash_prefix_len);
        let segments = self.chunker.split_encoded(&encoded);
        let total_chunks =
            u32::try_from(segments.len()).map_err(|_| EngineError::TooManyChunks(segments.len()))?;

        let mut progress = self.tracker.begin(lock, &data_hash, total_chunks);
        let chunk_set_id = progress.chunk_set_id.clone();
        info!(
            project_id = %doc.project_id,
            %chunk_set_id,
            total_chunks,
            already_uploaded = progress.completed(),
            encoded_len = encoded.len(),
            "uploading chunk set"
        );

        let mut transaction_ids = Vec::with_capacity(segments.len());
        let mut chunk_metadata = Vec::with_capacity(segments.len());
        let mut uploaded = 0;
        let mut resumed = 0;

        for (index, data) in (0..total_chunks).zip(segments) {
            if hooks.is_cancelled() {
                info!(project_id = %doc.project_id, index, "upload cancelled");
                return Err(EngineError::Cancelled);
            }

            let (tx_id, was_resumed) = match progress.tx_id(index) {
                Some(id) => {
                    debug!(index, %id, "chunk already uploaded, skipping");
                    (id.clone(), true)
                }
                None => {
                    let envelope = ChunkEnvelope {
                        chunk_index: index,
                        total_chunks,
                        chunk_set_id: chunk_set_id.clone(),
                        project_id: doc.project_id.clone(),
                        project_name: doc.project_name.clone(),
                        data,
                    };
                    let tags = chunk_tags(&self.app_name, doc, &chunk_set_id, index, total_chunks);
                    let id = self.store.put(Bytes::from(envelope.to_bytes()?), tags).await?;
                    debug!(index, %id, "uploaded chunk");

                    progress.record(index, id.clone());
                    self.tracker.checkpoint(&progress);
                    (id, false)
                }
            };

            if was_resumed {
                resumed += 1;
            } else {
                uploaded += 1;
            }
            chunk_metadata.push(ChunkMetadata {
                chunk_id: tx_id.clone(),
                chunk_index: index,
                total_chunks,
                chunk_set_id: chunk_set_id.clone(),
                project_id: doc.project_id.clone(),
                root_tx_id: doc.root_tx_id.clone(),
            });
            transaction_ids.push(tx_id);

            hooks.chunk(ChunkProgress {
                current_chunk: index + 1,
                total_chunks,
                resumed: was_resumed,
            });
        }

        info!(
            project_id = %doc.project_id,
            %chunk_set_id,
            uploaded,
            resumed,
            "chunk set uploaded"
        );
        Ok(UploadOutcome {
            chunk_set_id,
            transaction_ids,
            chunk_metadata,
            uploaded,
            resumed,
        })
    }
}
