//! Resumable chunked upload and batched download of JSON documents.
//!
//! The [`SkeinNode`] owns the blob store and checkpoint store and exposes
//! the put / get pipeline. Front ends depend on the [`SkeinEngine`] trait
//! rather than the concrete node.

pub mod document;
pub mod download;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod manifest;
pub mod node;
pub mod progress;
pub mod upload;

pub use document::{DocumentInfo, ManifestOptions, chunk_tags, manifest_tags};
pub use download::{ChunkDownloader, plan_batches};
pub use engine::SkeinEngine;
pub use error::EngineError;
pub use hooks::{CancelToken, ChunkProgress, FetchProgress, TransferHooks};
pub use manifest::ManifestPublisher;
pub use node::{SkeinNode, StoredDocument};
pub use progress::{ProgressTracker, ProjectLock};
pub use upload::{ChunkUploader, UploadOutcome};

#[cfg(test)]
mod tests;
