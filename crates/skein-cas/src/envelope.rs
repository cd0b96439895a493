//! The JSON body a single chunk is uploaded as.

use serde::{Deserialize, Serialize};
use skein_types::ChunkSetId;

use crate::error::CasError;

/// One chunk segment wrapped with its structural metadata.
///
/// Readers only trust `data`; the chunk's position comes from the manifest
/// or from the blob's tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkEnvelope {
    /// Position of the chunk within its set.
    pub chunk_index: u32,
    /// Number of chunks in the set.
    pub total_chunks: u32,
    /// Chunk set the chunk belongs to.
    pub chunk_set_id: ChunkSetId,
    /// Logical document id.
    pub project_id: String,
    /// Human readable document name.
    pub project_name: String,
    /// The base64 segment.
    pub data: String,
}

impl ChunkEnvelope {
    /// Serialize the envelope to its upload body.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CasError> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[derive(Deserialize)]
struct SegmentOnly {
    data: String,
}

/// Extract the segment from a downloaded chunk body.
pub fn envelope_segment(body: &[u8]) -> Result<String, CasError> {
    let envelope: SegmentOnly = serde_json::from_slice(body)?;
    Ok(envelope.data)
}
