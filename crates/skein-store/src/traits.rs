//! Core trait and types for blob storage clients.

use bytes::Bytes;
use skein_types::{BlobId, Tag};

use crate::error::StoreError;

/// A search hit: a blob id together with all of its tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRecord {
    /// Id of the matching blob.
    pub id: BlobId,
    /// Every tag the blob was uploaded with.
    pub tags: Vec<Tag>,
}

/// Client for a write-once, id-addressed blob backend.
///
/// All implementations must be `Send + Sync` for use across async tasks.
/// Blobs are immutable: `put` always creates a new blob with a new id, even
/// for identical content.
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload a blob with descriptive tags and return the id it was stored under.
    async fn put(&self, data: Bytes, tags: Vec<Tag>) -> Result<BlobId, StoreError>;

    /// Fetch a blob by id. Returns `None` if the backend does not know it.
    async fn get(&self, id: &BlobId) -> Result<Option<Bytes>, StoreError>;

    /// Find blobs carrying every tag in `filter`.
    ///
    /// The index is eventually consistent: a blob that was just uploaded may
    /// not be returned yet.
    async fn search(&self, filter: &[Tag]) -> Result<Vec<BlobRecord>, StoreError>;
}

/// Whether `tags` contains every name/value pair in `filter`.
pub fn matches_filter(tags: &[Tag], filter: &[Tag]) -> bool {
    filter.iter().all(|wanted| tags.contains(wanted))
}

/// Derive a fresh blob id from the content, its tags and a nonce.
///
/// The nonce makes two uploads of identical content distinct blobs, the way a
/// transaction backend assigns each write its own id.
pub(crate) fn derive_blob_id(data: &[u8], tags: &[Tag], nonce: u64) -> BlobId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(data);
    for tag in tags {
        hasher.update(tag.name.as_bytes());
        hasher.update(&[0]);
        hasher.update(tag.value.as_bytes());
        hasher.update(&[0]);
    }
    hasher.update(&nonce.to_le_bytes());
    BlobId::new(hasher.finalize().to_hex().to_string())
}
