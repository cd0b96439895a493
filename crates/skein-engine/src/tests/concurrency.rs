//! Concurrent uploads and resume across node instances.

use std::sync::Arc;

use skein_meta::{FjallProgressStore, ProgressStore};
use skein_store::{BlobStore, FileBlobStore};

use super::helpers::{test_config, test_doc, test_json, test_node};
use crate::document::ManifestOptions;
use crate::engine::SkeinEngine;
use crate::error::EngineError;
use crate::hooks::{CancelToken, ChunkProgress, TransferHooks};
use crate::node::SkeinNode;

#[tokio::test]
async fn test_distinct_projects_upload_concurrently() {
    let (node, _, _) = test_node(100);
    let a = test_json(800);
    let b = test_json(1_200);
    let options = ManifestOptions::default();
    let doc_a = test_doc("a");
    let doc_b = test_doc("b");

    let (stored_a, stored_b) = tokio::join!(
        node.put_document(&a, &doc_a, &options, TransferHooks::default()),
        node.put_document(&b, &doc_b, &options, TransferHooks::default()),
    );
    let (stored_a, stored_b) = (stored_a.unwrap(), stored_b.unwrap());
    assert_ne!(stored_a.chunk_set_id, stored_b.chunk_set_id);

    let (doc, _) = node
        .get_document(&stored_a.manifest_id, TransferHooks::default())
        .await
        .unwrap();
    assert_eq!(doc, a);
    let (doc, _) = node
        .get_document(&stored_b.manifest_id, TransferHooks::default())
        .await
        .unwrap();
    assert_eq!(doc, b);
}

#[tokio::test]
async fn test_same_project_uploads_are_serialized() {
    let (node, store, _) = test_node(100);
    let payload = test_json(800);
    let options = ManifestOptions::default();
    let doc = test_doc("p1");

    let (first, second) = tokio::join!(
        node.put_document(&payload, &doc, &options, TransferHooks::default()),
        node.put_document(&payload, &doc, &options, TransferHooks::default()),
    );
    let (first, second) = (first.unwrap(), second.unwrap());

    // The second call starts after the first cleared its checkpoint, so it
    // writes a complete new set instead of interleaving with the first.
    assert_eq!(first.resumed + second.resumed, 0);
    assert_ne!(first.chunk_set_id, second.chunk_set_id);
    assert_eq!(store.puts(), 2 * (first.total_chunks as usize + 1));
}

#[tokio::test]
async fn test_resume_with_on_disk_stores() {
    let dir = tempfile::tempdir().unwrap();
    let blobs: Arc<dyn BlobStore> = Arc::new(FileBlobStore::new(dir.path().join("blobs")).unwrap());
    let progress = Arc::new(FjallProgressStore::open(dir.path().join("progress")).unwrap());
    let payload = test_json(1_000);
    let doc = test_doc("p1");

    {
        let node = SkeinNode::new(test_config(100), blobs.clone(), progress.clone());
        let token = CancelToken::new();
        let stop_after_five = |p: ChunkProgress| {
            if p.current_chunk == 5 {
                token.cancel();
            }
        };
        let err = node
            .put_document(
                &payload,
                &doc,
                &ManifestOptions::default(),
                TransferHooks {
                    on_chunk: Some(&stop_after_five),
                    cancel: Some(&token),
                    ..TransferHooks::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Cancelled));
    }

    let pending = progress.list().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].completed(), 5);

    let node = SkeinNode::new(test_config(100), blobs, progress.clone());
    let stored = node
        .put_document(&payload, &doc, &ManifestOptions::default(), TransferHooks::default())
        .await
        .unwrap();
    assert_eq!(stored.resumed, 5);
    assert_eq!(stored.chunk_set_id, pending[0].chunk_set_id);
    assert!(progress.list().unwrap().is_empty());

    let (document, _) = node
        .get_document(&stored.manifest_id, TransferHooks::default())
        .await
        .unwrap();
    assert_eq!(document, payload);
}
