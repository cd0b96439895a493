//! Local upload-progress persistence.
//!
//! Progress records are a **local resumability optimisation**, never the
//! source of truth: the uploaded chunks are. Each record is the JSON-encoded
//! [`UploadProgress`](skein_types::UploadProgress) of one document, stored
//! under the key `upload-progress-<projectId>`.
//!
//! - [`MemoryProgressStore`]: process-local map.
//! - [`FjallProgressStore`]: persistent Fjall keyspace, survives restarts.

mod error;
mod fjall_store;
mod memory_store;
mod traits;

pub use error::MetaError;
pub use fjall_store::FjallProgressStore;
pub use memory_store::MemoryProgressStore;
pub use traits::{PROGRESS_KEY_PREFIX, ProgressStore, progress_key};
