//! Blob storage client trait and backend implementations.
//!
//! This crate defines the [`BlobStore`] trait, the only surface the transfer
//! pipeline needs from an immutable, id-addressed blob backend:
//! put-with-tags, get-by-id, and an eventually consistent search by tags.
//!
//! - [`MemoryBlobStore`]: in-memory backend with a lagging search index.
//! - [`FileBlobStore`]: file-based backend with a 2-level fan-out layout.
//! - [`RefreshingClient`]: caller-owned wrapper that rebuilds its inner
//!   client once it gets too old.

mod error;
mod file_store;
mod memory_store;
mod refresh;
mod traits;

pub use error::StoreError;
pub use file_store::FileBlobStore;
pub use memory_store::MemoryBlobStore;
pub use refresh::{RefreshingClient, StoreFactory};
pub use traits::{BlobRecord, BlobStore, matches_filter};
