//! Read-only user rankings.
//!
//! Each supported metric has a dedicated ranking query — ranking is a
//! different access pattern from per-user evaluation, so the queries live
//! side by side in the storage layer rather than being derived from the
//! metric provider. The leaderboard never awards badges.

use chrono::{DateTime, Utc};

use crate::error::EngineError;
use crate::metrics::{MetricSource, metric_source};
use crate::model::LeaderboardEntry;
use crate::storage::Storage;

/// Ranks users by a metric for display purposes.
#[derive(Clone)]
pub struct LeaderboardService {
    storage: Storage,
}

impl LeaderboardService {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Top `limit` users by `metric`, count descending.
    ///
    /// Ties are broken by earliest qualifying activity, then user id, so
    /// the ordering is stable across calls. Unlike criteria evaluation, an
    /// unknown metric here is a caller mistake and is rejected.
    pub async fn top_users(
        &self,
        metric: &str,
        limit: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<LeaderboardEntry>, EngineError> {
        match metric_source(metric) {
            None => Err(EngineError::UnknownMetric(metric.to_string())),
            Some(MetricSource::Events(kind)) => {
                Ok(self.storage.top_users_by_event(kind, limit).await?)
            }
            Some(MetricSource::AccountAge) => {
                Ok(self.storage.top_users_by_account_age(limit, now).await?)
            }
        }
    }
}
