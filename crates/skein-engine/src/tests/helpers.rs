//! Shared test utilities for skein-engine tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use skein_cas::{ChunkEnvelope, split_legacy};
use skein_meta::{MemoryProgressStore, MetaError, ProgressStore};
use skein_store::{BlobRecord, BlobStore, MemoryBlobStore, StoreError};
use skein_types::{BlobId, ChunkSetId, Tag, TransferConfig, UploadProgress};

use crate::document::{DocumentInfo, chunk_tags};
use crate::node::SkeinNode;

/// Deterministic JSON document of exactly `len` ASCII characters (`len >= 11`).
pub fn test_json(len: usize) -> String {
    let mut body = String::with_capacity(len);
    let mut state: u32 = 0xDEAD_BEEF;
    while body.len() + 11 < len {
        state = state.wrapping_mul(1103515245).wrapping_add(12345);
        body.push(char::from(b'a' + ((state >> 16) % 26) as u8));
    }
    format!(r#"{{"data":"{body}"}}"#)
}

pub fn test_doc(project_id: &str) -> DocumentInfo {
    DocumentInfo::new(project_id, "Test Project", "tester")
}

/// Transfer config for tests: small chunks and no pause between batches.
pub fn test_config(chunk_size: usize) -> TransferConfig {
    TransferConfig {
        chunk_size,
        batch_pause: Duration::ZERO,
        ..TransferConfig::default()
    }
}

/// Blob store that counts calls, measures fetch concurrency and can be told
/// to fail a specific put.
pub struct CountingStore {
    pub inner: MemoryBlobStore,
    put_attempts: AtomicUsize,
    puts: AtomicUsize,
    gets: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fail_put_at: Mutex<Option<usize>>,
}

impl CountingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryBlobStore::new(),
            put_attempts: AtomicUsize::new(0),
            puts: AtomicUsize::new(0),
            gets: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            fail_put_at: Mutex::new(None),
        }
    }

    /// Fail the put whose 0-based attempt number is `attempt`.
    pub fn fail_put_at(&self, attempt: Option<usize>) {
        self.put_attempts.store(0, Ordering::SeqCst);
        *self.fail_put_at.lock().unwrap() = attempt;
    }

    /// Successful puts so far.
    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Highest number of gets that were running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl BlobStore for CountingStore {
    async fn put(&self, data: Bytes, tags: Vec<Tag>) -> Result<BlobId, StoreError> {
        let attempt = self.put_attempts.fetch_add(1, Ordering::SeqCst);
        if *self.fail_put_at.lock().unwrap() == Some(attempt) {
            return Err(StoreError::Unavailable("injected put failure".into()));
        }
        let id = self.inner.put(data, tags).await?;
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    async fn get(&self, id: &BlobId) -> Result<Option<Bytes>, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(2)).await;
        let result = self.inner.get(id).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn search(&self, filter: &[Tag]) -> Result<Vec<BlobRecord>, StoreError> {
        self.inner.search(filter).await
    }
}

/// Progress store whose saves always fail, like a full disk.
#[derive(Default)]
pub struct FailingProgressStore {
    pub save_attempts: AtomicUsize,
}

impl ProgressStore for FailingProgressStore {
    fn load(&self, _project_id: &str) -> Result<Option<UploadProgress>, MetaError> {
        Ok(None)
    }

    fn save(&self, _progress: &UploadProgress) -> Result<(), MetaError> {
        self.save_attempts.fetch_add(1, Ordering::SeqCst);
        Err(MetaError::Io(std::io::Error::other("quota exceeded")))
    }

    fn clear(&self, _project_id: &str) -> Result<(), MetaError> {
        Ok(())
    }

    fn list(&self) -> Result<Vec<UploadProgress>, MetaError> {
        Ok(Vec::new())
    }
}

/// A node over a [`CountingStore`] and an in-memory progress store.
pub fn test_node(chunk_size: usize) -> (SkeinNode, Arc<CountingStore>, Arc<MemoryProgressStore>) {
    let store = Arc::new(CountingStore::new());
    let progress = Arc::new(MemoryProgressStore::default());
    let node = SkeinNode::new(test_config(chunk_size), store.clone(), progress.clone());
    (node, store, progress)
}

/// Store `payload` the way old writers did: raw slices, each base64-encoded
/// on its own. Returns the chunk ids in index order.
pub async fn store_legacy_chunks(
    store: &dyn BlobStore,
    doc: &DocumentInfo,
    chunk_set_id: &ChunkSetId,
    payload: &str,
    raw_slice_len: usize,
) -> Vec<BlobId> {
    let segments = split_legacy(payload, raw_slice_len);
    let total = segments.len() as u32;
    let mut ids = Vec::new();
    for (index, data) in (0..total).zip(segments) {
        let envelope = ChunkEnvelope {
            chunk_index: index,
            total_chunks: total,
            chunk_set_id: chunk_set_id.clone(),
            project_id: doc.project_id.clone(),
            project_name: doc.project_name.clone(),
            data,
        };
        let tags = chunk_tags("skein", doc, chunk_set_id, index, total);
        let id = store
            .put(Bytes::from(envelope.to_bytes().unwrap()), tags)
            .await
            .unwrap();
        ids.push(id);
    }
    ids
}
