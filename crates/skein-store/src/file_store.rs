//! File-based blob storage backend.
//!
//! Stores each blob as two files in a 2-level fan-out directory structure:
//! `{base_dir}/{id[0..2]}/{id}.blob` for the body and
//! `{base_dir}/{id[0..2]}/{id}.tags.json` for its tag sidecar.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use serde_json::json;
use skein_types::{BlobId, Tag, now_millis};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::traits::{BlobRecord, BlobStore, derive_blob_id, matches_filter};

const BLOB_EXT: &str = "blob";
const TAGS_SUFFIX: &str = ".tags.json";

/// File-based blob store with a 2-level fan-out directory layout.
///
/// Writes are atomic: each file is written to a temporary path first and
/// then renamed into place. The body is renamed before the sidecar, so any
/// blob visible to [`BlobStore::search`] is also readable.
pub struct FileBlobStore {
    base_dir: PathBuf,
    nonce: AtomicU64,
}

impl FileBlobStore {
    /// Create a new file store rooted at the given directory.
    ///
    /// The directory is created if it does not exist.
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let base_dir = base_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self {
            base_dir,
            nonce: AtomicU64::new(now_millis()),
        })
    }

    /// Root directory of the store.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn fan_out_dir(&self, id: &BlobId) -> PathBuf {
        let hex = id.as_str();
        let prefix = hex.get(0..2).unwrap_or("__");
        self.base_dir.join(prefix)
    }

    fn blob_path(&self, id: &BlobId) -> PathBuf {
        self.fan_out_dir(id).join(format!("{id}.{BLOB_EXT}"))
    }

    fn tags_path(&self, id: &BlobId) -> PathBuf {
        self.fan_out_dir(id).join(format!("{id}{TAGS_SUFFIX}"))
    }
}

async fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    let tmp_path = path.with_extension("tmp");
    tokio::fs::write(&tmp_path, data).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

#[async_trait::async_trait]
impl BlobStore for FileBlobStore {
    async fn put(&self, data: Bytes, tags: Vec<Tag>) -> Result<BlobId, StoreError> {
        let nonce = self.nonce.fetch_add(1, Ordering::Relaxed);
        let id = derive_blob_id(&data, &tags, nonce);

        tokio::fs::create_dir_all(self.fan_out_dir(&id)).await?;

        let blob_path = self.blob_path(&id);
        write_atomic(&blob_path, &data).await?;

        let sidecar = json!({ "createdAt": now_millis(), "tags": tags });
        write_atomic(&self.tags_path(&id), &serde_json::to_vec(&sidecar)?).await?;

        debug!(%id, path = %blob_path.display(), size = data.len(), "stored blob to file");
        Ok(id)
    }

    async fn get(&self, id: &BlobId) -> Result<Option<Bytes>, StoreError> {
        match tokio::fs::read(self.blob_path(id)).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn search(&self, filter: &[Tag]) -> Result<Vec<BlobRecord>, StoreError> {
        let mut hits: Vec<(u64, BlobRecord)> = Vec::new();

        let mut level0 = tokio::fs::read_dir(&self.base_dir).await?;
        while let Some(dir) = level0.next_entry().await? {
            if !dir.file_type().await?.is_dir() {
                continue;
            }
            let mut files = tokio::fs::read_dir(dir.path()).await?;
            while let Some(entry) = files.next_entry().await? {
                let name = entry.file_name();
                let Some(id) = name.to_str().and_then(|n| n.strip_suffix(TAGS_SUFFIX)) else {
                    continue;
                };

                let raw = tokio::fs::read(entry.path()).await?;
                let sidecar: serde_json::Value = match serde_json::from_slice(&raw) {
                    Ok(v) => v,
                    Err(e) => {
                        warn!(id, %e, "skipping unreadable tag sidecar");
                        continue;
                    }
                };
                let tags: Vec<Tag> = match serde_json::from_value(sidecar["tags"].clone()) {
                    Ok(tags) => tags,
                    Err(e) => {
                        warn!(id, %e, "skipping sidecar with malformed tags");
                        continue;
                    }
                };
                if !matches_filter(&tags, filter) {
                    continue;
                }
                let created_at = sidecar["createdAt"].as_u64().unwrap_or_default();
                hits.push((
                    created_at,
                    BlobRecord {
                        id: BlobId::new(id),
                        tags,
                    },
                ));
            }
        }

        hits.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));
        Ok(hits.into_iter().map(|(_, record)| record).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_search_skips_sidecar_with_malformed_tags() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(dir.path()).unwrap();

        let good = store
            .put(Bytes::from_static(b"ok"), vec![Tag::new("A", "1")])
            .await
            .unwrap();
        let bad_dir = dir.path().join("zz");
        std::fs::create_dir_all(&bad_dir).unwrap();
        std::fs::write(
            bad_dir.join(format!("bad{TAGS_SUFFIX}")),
            br#"{"createdAt":1,"tags":"oops"}"#,
        )
        .unwrap();

        let hits = store.search(&[]).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, good);
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(dir.path()).unwrap();

        let id = store
            .put(Bytes::from_static(b"file blob"), vec![Tag::new("A", "1")])
            .await
            .unwrap();
        let got = store.get(&id).await.unwrap();
        assert_eq!(got, Some(Bytes::from_static(b"file blob")));
    }

    #[tokio::test]
    async fn test_fan_out_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(dir.path()).unwrap();

        let id = store.put(Bytes::from_static(b"x"), vec![]).await.unwrap();
        let hex = id.as_str();
        let expected = dir.path().join(&hex[0..2]).join(format!("{hex}.blob"));
        assert!(expected.exists(), "blob should be at {}", expected.display());
        assert!(
            dir.path()
                .join(&hex[0..2])
                .join(format!("{hex}.tags.json"))
                .exists()
        );
    }

    #[tokio::test]
    async fn test_get_nonexistent_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(dir.path()).unwrap();
        let got = store.get(&BlobId::from("ffff")).await.unwrap();
        assert_eq!(got, None);
    }

    #[tokio::test]
    async fn test_search_by_tags() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(dir.path()).unwrap();

        let wanted = store
            .put(
                Bytes::from_static(b"a"),
                vec![Tag::new("Set", "s1"), Tag::new("Index", "0")],
            )
            .await
            .unwrap();
        store
            .put(Bytes::from_static(b"b"), vec![Tag::new("Set", "s2")])
            .await
            .unwrap();

        let hits = store.search(&[Tag::new("Set", "s1")]).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, wanted);
        assert_eq!(hits[0].tags[1], Tag::new("Index", "0"));
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let store = FileBlobStore::new(dir.path()).unwrap();
            store
                .put(Bytes::from_static(b"durable"), vec![])
                .await
                .unwrap()
        };

        let reopened = FileBlobStore::new(dir.path()).unwrap();
        assert_eq!(
            reopened.get(&id).await.unwrap(),
            Some(Bytes::from_static(b"durable"))
        );
    }
}
