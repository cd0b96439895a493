//! Progress callbacks and cancellation for transfers.

use std::sync::Arc;

use tokio::sync::watch;

/// Reported after every chunk of an upload, including skipped ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkProgress {
    /// 1-based number of the chunk just handled.
    pub current_chunk: u32,
    /// Chunks in the set.
    pub total_chunks: u32,
    /// The chunk was already uploaded by an earlier attempt.
    pub resumed: bool,
}

/// Reported every time a fetched chunk lands during a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchProgress {
    /// Chunks fetched so far; increases by one per report.
    pub current_chunk: u32,
    /// Chunks in the set.
    pub total_chunks: u32,
    /// 0-based batch the chunk was fetched in.
    pub batch: u32,
}

/// Cooperative cancellation flag shared between a caller and a transfer.
///
/// Uploads check it before each chunk and downloads between batches.
#[derive(Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancellation is requested.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // The sender lives as long as any clone of this token.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Optional observers for one transfer call.
#[derive(Default, Clone, Copy)]
pub struct TransferHooks<'a> {
    /// Called after each upload chunk.
    pub on_chunk: Option<&'a (dyn Fn(ChunkProgress) + Send + Sync)>,
    /// Called as each download chunk lands.
    pub on_fetch: Option<&'a (dyn Fn(FetchProgress) + Send + Sync)>,
    /// Cancellation flag.
    pub cancel: Option<&'a CancelToken>,
}

impl TransferHooks<'_> {
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(CancelToken::is_cancelled)
    }

    pub(crate) fn chunk(&self, progress: ChunkProgress) {
        if let Some(cb) = self.on_chunk {
            cb(progress);
        }
    }

    pub(crate) fn fetch(&self, progress: FetchProgress) {
        if let Some(cb) = self.on_fetch {
            cb(progress);
        }
    }
}
