//! Consecutive-period streak computation.
//!
//! A streak is the number of consecutive timeframe-sized buckets, counted
//! back from now, in which a metric had any activity. Counting stops at the
//! first bucket with zero activity: a user active every day for a month who
//! misses the current day has a streak of 0, regardless of the history
//! behind the gap.
//!
//! Streaks are recomputed from source activity on every call rather than
//! persisted incrementally. That trades query cost for correctness: there is
//! no stored streak state to drift, and repeated calls are always safe.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::metrics::{MetricSource, metric_source};
use crate::model::Timeframe;
use crate::storage::Storage;

/// How far back the streak scan looks, in buckets. A streak longer than
/// this reports the cap.
const MAX_STREAK_BUCKETS: u32 = 366;

/// Result of a streak check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakStatus {
    /// Consecutive active buckets ending at the current one.
    pub current_streak: i64,
    /// True when the current bucket has no activity.
    pub is_broken: bool,
}

impl StreakStatus {
    fn from_streak(current_streak: i64) -> Self {
        Self {
            current_streak,
            is_broken: current_streak == 0,
        }
    }
}

/// Computes consecutive-period streaks for streak-type criteria.
///
/// Performs no target comparison; the evaluator decides earned status.
#[derive(Clone)]
pub struct StreakTracker {
    storage: Storage,
}

impl StreakTracker {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Count the user's current streak for `metric` in buckets of
    /// `timeframe` length, anchored at `now`.
    ///
    /// Metrics without an event source (and unregistered names) have no
    /// per-period activity to count and report a streak of 0. An
    /// `all_time` timeframe has no finite bucket, so the streak degenerates
    /// to 1 when the metric has any recorded activity.
    pub async fn check(
        &self,
        user_id: &str,
        metric: &str,
        timeframe: Timeframe,
        now: DateTime<Utc>,
    ) -> anyhow::Result<StreakStatus> {
        let kind = match metric_source(metric) {
            Some(MetricSource::Events(kind)) => kind,
            Some(MetricSource::AccountAge) | None => {
                debug!(metric, "Metric has no event source, streak is 0");
                return Ok(StreakStatus::from_streak(0));
            }
        };

        let Some(bucket_seconds) = timeframe.window_seconds() else {
            let total = self
                .storage
                .count_events(user_id, kind, Timeframe::AllTime, now)
                .await?;
            return Ok(StreakStatus::from_streak(i64::from(total > 0)));
        };

        let totals = self
            .storage
            .bucket_totals(user_id, kind, bucket_seconds, MAX_STREAK_BUCKETS, now)
            .await?;

        let current_streak = totals.iter().take_while(|total| **total > 0).count() as i64;

        Ok(StreakStatus::from_streak(current_streak))
    }
}
