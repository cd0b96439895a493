//! Caller-owned client wrapper that rebuilds its inner client when stale.
//!
//! Long-lived gateway clients tend to accumulate broken connections. Rather
//! than hiding a time-windowed client cache in module state, the owner
//! constructs a [`RefreshingClient`] explicitly and decides when to call
//! [`RefreshingClient::refresh_if_stale`].

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use bytes::Bytes;
use skein_types::{BlobId, Tag};
use tracing::info;

use crate::error::StoreError;
use crate::traits::{BlobRecord, BlobStore};

/// Builds a fresh inner client.
pub type StoreFactory = Box<dyn Fn() -> Result<Arc<dyn BlobStore>, StoreError> + Send + Sync>;

struct Slot {
    client: Arc<dyn BlobStore>,
    created: Instant,
}

/// A [`BlobStore`] that delegates to an inner client rebuilt on demand.
pub struct RefreshingClient {
    factory: StoreFactory,
    max_age: Duration,
    slot: RwLock<Slot>,
}

impl RefreshingClient {
    /// Build the first inner client right away.
    pub fn new(factory: StoreFactory, max_age: Duration) -> Result<Self, StoreError> {
        let client = factory()?;
        Ok(Self {
            factory,
            max_age,
            slot: RwLock::new(Slot {
                client,
                created: Instant::now(),
            }),
        })
    }

    /// Time since the inner client was built.
    pub fn age(&self) -> Duration {
        self.slot.read().expect("client lock poisoned").created.elapsed()
    }

    /// Whether the inner client is older than `max_age`.
    pub fn is_stale(&self) -> bool {
        self.age() >= self.max_age
    }

    /// Rebuild the inner client if it is stale. Returns `true` if rebuilt.
    pub fn refresh_if_stale(&self) -> Result<bool, StoreError> {
        if !self.is_stale() {
            return Ok(false);
        }
        self.refresh()?;
        Ok(true)
    }

    /// Rebuild the inner client unconditionally.
    ///
    /// On factory failure the previous client stays in place.
    pub fn refresh(&self) -> Result<(), StoreError> {
        let client = (self.factory)()?;
        let mut slot = self.slot.write().expect("client lock poisoned");
        info!(age_ms = slot.created.elapsed().as_millis() as u64, "refreshed storage client");
        *slot = Slot {
            client,
            created: Instant::now(),
        };
        Ok(())
    }

    /// The current inner client.
    pub fn current(&self) -> Arc<dyn BlobStore> {
        self.slot.read().expect("client lock poisoned").client.clone()
    }
}

#[async_trait::async_trait]
impl BlobStore for RefreshingClient {
    async fn put(&self, data: Bytes, tags: Vec<Tag>) -> Result<BlobId, StoreError> {
        self.current().put(data, tags).await
    }

    async fn get(&self, id: &BlobId) -> Result<Option<Bytes>, StoreError> {
        self.current().get(id).await
    }

    async fn search(&self, filter: &[Tag]) -> Result<Vec<BlobRecord>, StoreError> {
        self.current().search(filter).await
    }
}
