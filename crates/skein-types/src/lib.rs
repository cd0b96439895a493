//! Shared types and identifiers for Skein.
//!
//! This crate defines the core types used across the Skein workspace:
//! identifiers ([`BlobId`], [`ChunkSetId`]), the upload/download data model
//! ([`ChunkMetadata`], [`UploadProgress`], [`Manifest`]), the blob tag schema
//! ([`Tag`], [`tags`]), and transfer tuning ([`TransferConfig`]).

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ID types
// ---------------------------------------------------------------------------

macro_rules! define_string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

define_string_id!(
    /// Identifier the storage backend assigns to an uploaded blob
    /// (a transaction id on the immutable backend).
    BlobId
);

define_string_id!(
    /// Identifier shared by every chunk of one upload attempt.
    ChunkSetId
);

impl ChunkSetId {
    /// Generate a fresh random chunk-set id (UUIDv4, hyphenated).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

/// A descriptive name/value pair attached to an uploaded blob.
///
/// Tags are indexed by the backend and are the only thing the fallback
/// download path can search on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    /// Tag name (see [`tags`] for the schema).
    pub name: String,
    /// Tag value.
    pub value: String,
}

impl Tag {
    /// Create a tag from anything string-like.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Look up the value of the first tag named `name`.
pub fn tag_value<'a>(tags: &'a [Tag], name: &str) -> Option<&'a str> {
    tags.iter()
        .find(|t| t.name == name)
        .map(|t| t.value.as_str())
}

/// Tag names and well-known values emitted on chunks and manifests.
pub mod tags {
    pub const APP_NAME: &str = "App-Name";
    pub const DATA_TYPE: &str = "Data-Type";
    pub const CONTENT_TYPE: &str = "Content-Type";
    pub const PROJECT_ID: &str = "Project-Id";
    pub const PROJECT_NAME: &str = "Project-Name";
    pub const AUTHOR: &str = "Author";
    pub const CHUNK_SET_ID: &str = "Chunk-Set-Id";
    pub const CHUNK_INDEX: &str = "Chunk-Index";
    pub const TOTAL_CHUNKS: &str = "Total-Chunks";
    pub const CREATED_AT: &str = "Created-At";
    pub const FOLDER: &str = "Folder";
    pub const ROOT_TX_ID: &str = "Root-Tx-Id";
    pub const THUMBNAIL_ID: &str = "Thumbnail-Id";
    pub const CONTENT_KIND: &str = "Content-Kind";
    pub const OWNER: &str = "Owner";
    pub const OWNER_SIGNATURE: &str = "Owner-Signature";

    /// `Data-Type` value for a chunk blob.
    pub const DATA_TYPE_CHUNK: &str = "chunk";
    /// `Data-Type` value for a manifest blob.
    pub const DATA_TYPE_MANIFEST: &str = "manifest";
    /// `Content-Type` of every blob Skein writes.
    pub const JSON_CONTENT_TYPE: &str = "application/json";
}

// ---------------------------------------------------------------------------
// Core data structures
// ---------------------------------------------------------------------------

/// Per-chunk result of an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    /// Remote blob id of the chunk.
    pub chunk_id: BlobId,
    /// Position of the chunk within its set.
    pub chunk_index: u32,
    /// Number of chunks in the set.
    pub total_chunks: u32,
    /// Chunk set the chunk belongs to.
    pub chunk_set_id: ChunkSetId,
    /// Logical document the chunk belongs to.
    pub project_id: String,
    /// Back-reference to the first manifest of the logical document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_tx_id: Option<BlobId>,
}

/// One completed chunk recorded in an [`UploadProgress`] checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedChunk {
    /// Chunk index.
    pub index: u32,
    /// Blob id returned by the backend for that chunk.
    pub tx_id: BlobId,
}

/// Local resumability checkpoint for one document upload.
///
/// Indices in `uploaded_chunks` are unique and lie in `[0, total_chunks)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    /// Logical document the checkpoint belongs to.
    pub project_id: String,
    /// Chunk set being uploaded.
    pub chunk_set_id: ChunkSetId,
    /// Chunks already accepted by the backend.
    pub uploaded_chunks: Vec<UploadedChunk>,
    /// Number of chunks in the set.
    pub total_chunks: u32,
    /// Unix timestamp (milliseconds) when the upload started.
    pub started_at: u64,
    /// Rolling hash of the encoded payload the checkpoint was made for.
    pub data_hash: String,
}

impl UploadProgress {
    /// Start an empty checkpoint for a new chunk set.
    pub fn new(
        project_id: impl Into<String>,
        chunk_set_id: ChunkSetId,
        total_chunks: u32,
        data_hash: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            chunk_set_id,
            uploaded_chunks: Vec::new(),
            total_chunks,
            started_at: now_millis(),
            data_hash: data_hash.into(),
        }
    }

    /// Blob id recorded for `index`, if that chunk was already uploaded.
    pub fn tx_id(&self, index: u32) -> Option<&BlobId> {
        self.uploaded_chunks
            .iter()
            .find(|c| c.index == index)
            .map(|c| &c.tx_id)
    }

    /// Record a completed chunk. Re-recording an index replaces its id.
    pub fn record(&mut self, index: u32, tx_id: BlobId) {
        match self.uploaded_chunks.iter_mut().find(|c| c.index == index) {
            Some(existing) => existing.tx_id = tx_id,
            None => self.uploaded_chunks.push(UploadedChunk { index, tx_id }),
        }
    }

    /// Number of chunks already uploaded.
    pub fn completed(&self) -> usize {
        self.uploaded_chunks.len()
    }

    /// Check the index invariant: unique and within `[0, total_chunks)`.
    pub fn is_consistent(&self) -> bool {
        let mut seen = std::collections::HashSet::with_capacity(self.uploaded_chunks.len());
        self.uploaded_chunks
            .iter()
            .all(|c| c.index < self.total_chunks && seen.insert(c.index))
    }
}

/// Ordered index of the chunk blobs that make up one document.
///
/// Position in `chunks` is the chunk index; no embedded index is trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Logical document id.
    pub project_id: String,
    /// Human readable document name.
    pub project_name: String,
    /// Chunk set this manifest indexes.
    pub chunk_set_id: ChunkSetId,
    /// Number of chunks; always equal to `chunks.len()`.
    pub total_chunks: u32,
    /// Chunk blob ids in index order.
    pub chunks: Vec<BlobId>,
    /// Unix timestamp (milliseconds) when the manifest was built.
    pub created_at: u64,
}

/// Optional owner attestation carried on a manifest's tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipMetadata {
    /// Owner address or account id.
    pub owner: String,
    /// Detached signature produced by the owner, if any.
    pub signature: Option<String>,
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Base64 length of one legacy chunk: a 51,200-byte raw slice encoded alone.
pub const LEGACY_CHUNK_LEN: usize = 68_268;

/// Raw slice size used by the legacy encoder.
pub const LEGACY_RAW_SLICE_LEN: usize = 51_200;

/// Tuning for the chunked transfer pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Application marker written to the `App-Name` tag.
    pub app_name: String,
    /// Segment length in base64 characters.
    pub chunk_size: usize,
    /// First-chunk length that selects the legacy decoder.
    pub legacy_chunk_len: usize,
    /// Concurrent fetches per download batch.
    pub batch_width: usize,
    /// Pause between download batches.
    pub batch_pause: Duration,
    /// Number of base64 characters covered by the progress rolling hash.
    pub hash_prefix_len: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            app_name: "skein".to_string(),
            chunk_size: 51_200, // 50 KiB
            legacy_chunk_len: LEGACY_CHUNK_LEN,
            batch_width: 5,
            batch_pause: Duration::from_millis(50),
            hash_prefix_len: 10_000,
        }
    }
}

/// Current Unix time in milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
