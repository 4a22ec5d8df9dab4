//! The active badge catalog.
//!
//! A catalog is loaded from the store once at startup and reused across
//! evaluation passes, so a pass over fifty badges does not reread the
//! catalog table fifty times. It is an explicit service object with the
//! store injected — tests can hold several independent catalogs — and the
//! cache refreshes on demand when the external authoring process changes
//! badge definitions.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::model::Badge;
use crate::storage::Storage;

/// Cached set of active badge definitions.
#[derive(Clone)]
pub struct BadgeCatalog {
    storage: Storage,
    badges: Arc<RwLock<Vec<Badge>>>,
}

impl BadgeCatalog {
    /// Create an empty catalog. Call [`initialize`](Self::initialize)
    /// before the first evaluation pass.
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            badges: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Load the active badges for the first time.
    pub async fn initialize(&self) -> anyhow::Result<usize> {
        self.refresh().await
    }

    /// Reload the active badges from the store, replacing the cache.
    ///
    /// Returns the number of badges now cached.
    pub async fn refresh(&self) -> anyhow::Result<usize> {
        let loaded = self.storage.load_active_badges().await?;
        let count = loaded.len();

        *self.badges.write().await = loaded;

        info!(badges = count, "Badge catalog loaded");
        Ok(count)
    }

    /// Snapshot of the cached active badges.
    pub async fn active(&self) -> Vec<Badge> {
        self.badges.read().await.clone()
    }
}
