//! Batched, bounded chunk download and reassembly.

use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use skein_cas::{ChunkEncoding, decode_chunks, envelope_segment};
use skein_store::BlobStore;
use skein_types::{BlobId, ChunkSetId, Tag, TransferConfig, tag_value, tags};
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::hooks::{FetchProgress, TransferHooks};

/// Split `0..total` into consecutive ranges of at most `width` indices.
pub fn plan_batches(total: usize, width: usize) -> Vec<Range<usize>> {
    let width = width.max(1);
    (0..total)
        .step_by(width)
        .map(|start| start..(start + width).min(total))
        .collect()
}

/// Fetches a chunk set and decodes it back into the original document.
pub struct ChunkDownloader {
    store: Arc<dyn BlobStore>,
    batch_width: usize,
    batch_pause: Duration,
    legacy_chunk_len: usize,
}

impl ChunkDownloader {
    pub fn new(store: Arc<dyn BlobStore>, config: &TransferConfig) -> Self {
        Self {
            store,
            batch_width: config.batch_width.max(1),
            batch_pause: config.batch_pause,
            legacy_chunk_len: config.legacy_chunk_len,
        }
    }

    /// Download and decode a chunk set.
    ///
    /// With `chunk_ids` (from a manifest) the ids are used as given, position
    /// being the chunk index. Without them the chunks are discovered through
    /// the store's tag search. Either way the result is the complete
    /// document or an error, never a partial one.
    pub async fn download(
        &self,
        chunk_set_id: &ChunkSetId,
        total_chunks: u32,
        chunk_ids: Option<&[BlobId]>,
        hooks: TransferHooks<'_>,
    ) -> Result<String, EngineError> {
        let ids = match chunk_ids {
            Some(ids) if ids.len() != total_chunks as usize => {
                return Err(EngineError::ChunkCountMismatch {
                    expected: total_chunks,
                    found: ids.len(),
                });
            }
            Some(ids) => ids.to_vec(),
            None => self.discover(chunk_set_id, total_chunks as usize).await?,
        };

        info!(%chunk_set_id, total_chunks, batch_width = self.batch_width, "downloading chunk set");
        let segments = self.fetch_all(&ids, hooks).await?;
        let (document, encoding) = decode_chunks(&segments, self.legacy_chunk_len)?;

        if encoding == ChunkEncoding::Legacy {
            info!(%chunk_set_id, "chunk set uses the per-chunk legacy encoding");
        }
        info!(%chunk_set_id, decoded_len = document.len(), "chunk set reassembled");
        Ok(document)
    }

    /// Find the blob id of every chunk in a set through tag search.
    async fn discover(
        &self,
        chunk_set_id: &ChunkSetId,
        total: usize,
    ) -> Result<Vec<BlobId>, EngineError> {
        let filter = [
            Tag::new(tags::CHUNK_SET_ID, chunk_set_id.as_str()),
            Tag::new(tags::DATA_TYPE, tags::DATA_TYPE_CHUNK),
        ];
        let hits = self.store.search(&filter).await?;
        debug!(%chunk_set_id, hits = hits.len(), "searched for chunks");

        let mut slots: Vec<Option<BlobId>> = vec![None; total];
        for hit in hits {
            let Some(index) =
                tag_value(&hit.tags, tags::CHUNK_INDEX).and_then(|v| v.parse::<usize>().ok())
            else {
                warn!(id = %hit.id, "chunk without a usable index tag, ignoring");
                continue;
            };
            match slots.get_mut(index) {
                None => warn!(id = %hit.id, index, total, "chunk index out of range, ignoring"),
                // First result wins.
                Some(Some(kept)) => debug!(index, %kept, duplicate = %hit.id, "duplicate chunk"),
                Some(slot) => *slot = Some(hit.id),
            }
        }

        let found = slots.iter().filter(|s| s.is_some()).count();
        if found != total {
            warn!(%chunk_set_id, found, expected = total, "chunk set incomplete");
            return Err(EngineError::MissingChunks {
                chunk_set_id: chunk_set_id.clone(),
                found,
                expected: total,
            });
        }
        Ok(slots.into_iter().flatten().collect())
    }

    /// Fetch every chunk in fixed-width batches and return the segments in
    /// index order.
    async fn fetch_all(
        &self,
        ids: &[BlobId],
        hooks: TransferHooks<'_>,
    ) -> Result<Vec<String>, EngineError> {
        let total = ids.len();
        let total_chunks = total as u32;
        let mut slots: Vec<Option<String>> = vec![None; total];
        let mut landed = 0u32;
        let store = &self.store;

        for (batch, range) in plan_batches(total, self.batch_width).into_iter().enumerate() {
            if batch > 0 {
                self.pause(hooks).await;
            }
            if hooks.is_cancelled() {
                info!(batch, landed, "download cancelled");
                return Err(EngineError::Cancelled);
            }

            debug!(batch, start = range.start, end = range.end, "fetching batch");
            let mut in_flight: FuturesUnordered<_> = range
                .map(|index| async move { (index, store.get(&ids[index]).await) })
                .collect();

            while let Some((index, body)) = in_flight.next().await {
                let body = body?.ok_or_else(|| EngineError::ChunkMissing {
                    index,
                    id: ids[index].clone(),
                })?;
                slots[index] = Some(envelope_segment(&body)?);
                landed += 1;
                hooks.fetch(FetchProgress {
                    current_chunk: landed,
                    total_chunks,
                    batch: batch as u32,
                });
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, segment)| {
                segment.ok_or_else(|| EngineError::ChunkMissing {
                    index,
                    id: ids[index].clone(),
                })
            })
            .collect()
    }

    async fn pause(&self, hooks: TransferHooks<'_>) {
        if self.batch_pause.is_zero() {
            tokio::task::yield_now().await;
            return;
        }
        match hooks.cancel {
            Some(cancel) => {
                tokio::select! {
                    _ = tokio::time::sleep(self.batch_pause) => {}
                    _ = cancel.cancelled() => {}
                }
            }
            None => tokio::time::sleep(self.batch_pause).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_batches_23_by_5() {
        let sizes: Vec<usize> = plan_batches(23, 5).iter().map(|r| r.len()).collect();
        assert_eq!(sizes, vec![5, 5, 5, 5, 3]);
    }

    #[test]
    fn test_plan_batches_covers_every_index_once() {
        let flat: Vec<usize> = plan_batches(12, 4).into_iter().flatten().collect();
        assert_eq!(flat, (0..12).collect::<Vec<_>>());
    }

    #[test]
    fn test_plan_batches_edges() {
        assert!(plan_batches(0, 5).is_empty());
        assert_eq!(plan_batches(3, 5), vec![0..3]);
        assert_eq!(plan_batches(2, 0), vec![0..1, 1..2]);
    }
}
