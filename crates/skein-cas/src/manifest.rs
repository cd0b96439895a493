//! Manifest building and serialization.
//!
//! A [`Manifest`] lists, in index order, the blob id of every chunk in a
//! chunk set. It is uploaded as a small JSON document of its own and is the
//! entry point for reassembly: array position is the chunk index.

use skein_types::{BlobId, ChunkSetId, Manifest, now_millis};

use crate::error::CasError;

/// Build a [`Manifest`] for a fully uploaded chunk set.
///
/// `chunks` must be in index order and contain exactly `total_chunks` ids.
pub fn build_manifest(
    project_id: &str,
    project_name: &str,
    chunk_set_id: &ChunkSetId,
    total_chunks: u32,
    chunks: &[BlobId],
) -> Result<Manifest, CasError> {
    build_manifest_with_timestamp(
        project_id,
        project_name,
        chunk_set_id,
        total_chunks,
        chunks,
        now_millis(),
    )
}

/// Build a manifest with an explicit timestamp (for deterministic testing).
pub fn build_manifest_with_timestamp(
    project_id: &str,
    project_name: &str,
    chunk_set_id: &ChunkSetId,
    total_chunks: u32,
    chunks: &[BlobId],
    created_at: u64,
) -> Result<Manifest, CasError> {
    check_chunk_count(total_chunks, chunks.len())?;

    Ok(Manifest {
        project_id: project_id.to_string(),
        project_name: project_name.to_string(),
        chunk_set_id: chunk_set_id.clone(),
        total_chunks,
        chunks: chunks.to_vec(),
        created_at,
    })
}

/// Serialize a manifest to its JSON upload body.
pub fn serialize_manifest(manifest: &Manifest) -> Result<Vec<u8>, CasError> {
    Ok(serde_json::to_vec(manifest)?)
}

/// Deserialize a manifest from JSON.
///
/// Rejects manifests whose chunk list disagrees with `totalChunks`, since
/// reassembly trusts array position alone.
pub fn deserialize_manifest(bytes: &[u8]) -> Result<Manifest, CasError> {
    let manifest: Manifest = serde_json::from_slice(bytes)?;
    check_chunk_count(manifest.total_chunks, manifest.chunks.len())?;
    Ok(manifest)
}

fn check_chunk_count(expected: u32, found: usize) -> Result<(), CasError> {
    if found != expected as usize {
        return Err(CasError::ChunkCountMismatch { expected, found });
    }
    Ok(())
}
