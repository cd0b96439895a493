//! In-memory blob storage backend.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use skein_types::{BlobId, Tag};
use tracing::debug;

use crate::error::StoreError;
use crate::traits::{BlobRecord, BlobStore, derive_blob_id, matches_filter};

struct StoredBlob {
    data: Bytes,
    tags: Vec<Tag>,
    /// Upload order, so search results come back oldest first.
    seq: u64,
    /// Whether the search index has caught up with this blob.
    indexed: bool,
}

/// In-memory blob store backed by a `RwLock<HashMap>`.
///
/// Useful for tests and dry runs. Enforces an optional per-blob write
/// ceiling and lets tests hold blobs back from the search index to mimic
/// an eventually consistent backend.
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<BlobId, StoredBlob>>,
    next_seq: AtomicU64,
    max_blob_bytes: usize,
}

impl MemoryBlobStore {
    /// Create a store without a per-blob size limit.
    pub fn new() -> Self {
        Self::with_limit(usize::MAX)
    }

    /// Create a store that rejects blobs larger than `max_blob_bytes`.
    pub fn with_limit(max_blob_bytes: usize) -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
            max_blob_bytes,
        }
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.read().expect("lock poisoned").len()
    }

    /// Whether the store holds no blobs.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tags a blob was uploaded with.
    pub fn tags(&self, id: &BlobId) -> Option<Vec<Tag>> {
        let map = self.blobs.read().expect("lock poisoned");
        map.get(id).map(|b| b.tags.clone())
    }

    /// Hide a blob from [`BlobStore::search`] while keeping it fetchable.
    pub fn deindex(&self, id: &BlobId) {
        let mut map = self.blobs.write().expect("lock poisoned");
        if let Some(blob) = map.get_mut(id) {
            blob.indexed = false;
        }
    }

    /// Drop a blob entirely, as if it was never written.
    pub fn forget(&self, id: &BlobId) {
        let mut map = self.blobs.write().expect("lock poisoned");
        map.remove(id);
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, data: Bytes, tags: Vec<Tag>) -> Result<BlobId, StoreError> {
        if data.len() > self.max_blob_bytes {
            return Err(StoreError::TooLarge {
                size: data.len(),
                limit: self.max_blob_bytes,
            });
        }

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let id = derive_blob_id(&data, &tags, seq);

        debug!(%id, size = data.len(), "storing blob in memory");
        let mut map = self.blobs.write().expect("lock poisoned");
        map.insert(
            id.clone(),
            StoredBlob {
                data,
                tags,
                seq,
                indexed: true,
            },
        );
        Ok(id)
    }

    async fn get(&self, id: &BlobId) -> Result<Option<Bytes>, StoreError> {
        let map = self.blobs.read().expect("lock poisoned");
        Ok(map.get(id).map(|b| b.data.clone()))
    }

    async fn search(&self, filter: &[Tag]) -> Result<Vec<BlobRecord>, StoreError> {
        let map = self.blobs.read().expect("lock poisoned");
        let mut hits: Vec<(u64, BlobRecord)> = map
            .iter()
            .filter(|(_, b)| b.indexed && matches_filter(&b.tags, filter))
            .map(|(id, b)| {
                (
                    b.seq,
                    BlobRecord {
                        id: id.clone(),
                        tags: b.tags.clone(),
                    },
                )
            })
            .collect();
        hits.sort_by_key(|(seq, _)| *seq);
        Ok(hits.into_iter().map(|(_, record)| record).collect())
    }
}
