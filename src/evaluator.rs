//! Criteria evaluation.
//!
//! Turns one badge's criteria rule plus one user's metrics into a
//! [`Progress`] snapshot. Evaluation only reads; persisting the result is
//! the award coordinator's job, which keeps this layer trivially unit
//! testable against an in-memory store.

use chrono::{DateTime, Utc};

use crate::metrics::MetricProvider;
use crate::model::{Badge, Criteria, Progress, Timeframe};
use crate::storage::Storage;
use crate::streak::StreakTracker;

/// Evaluates badge criteria against computed user metrics.
#[derive(Clone)]
pub struct CriteriaEvaluator {
    metrics: MetricProvider,
    streaks: StreakTracker,
}

impl CriteriaEvaluator {
    pub fn new(storage: Storage) -> Self {
        Self {
            metrics: MetricProvider::new(storage.clone()),
            streaks: StreakTracker::new(storage),
        }
    }

    /// Compute the user's progress toward one badge, anchored at `now`.
    ///
    /// The match is exhaustive over [`Criteria`]: a new criteria kind does
    /// not compile until it is handled here.
    pub async fn evaluate(
        &self,
        badge: &Badge,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Progress> {
        match &badge.criteria {
            Criteria::Count {
                metric,
                target,
                timeframe,
            }
            | Criteria::Quality {
                metric,
                target,
                timeframe,
            }
            | Criteria::Time {
                metric,
                target,
                timeframe,
            } => {
                let current = self.metrics.calculate(user_id, metric, *timeframe, now).await?;
                Ok(Progress::from_counts(current, *target))
            }
            Criteria::Streak {
                metric,
                target,
                timeframe,
            } => {
                let status = self.streaks.check(user_id, metric, *timeframe, now).await?;
                Ok(Progress::from_counts(status.current_streak, *target))
            }
            Criteria::Date { metric, target } => {
                let current = self
                    .metrics
                    .calculate(user_id, metric, Timeframe::AllTime, now)
                    .await?;
                Ok(Progress::from_counts(current, *target))
            }
            Criteria::Combination { requirements } => {
                // Vacuously satisfied; authored combinations always have
                // requirements.
                if requirements.is_empty() {
                    return Ok(Progress::aggregate(100, true));
                }

                let mut ratio_sum = 0.0;
                let mut all_met = true;

                for requirement in requirements {
                    let value = self
                        .metrics
                        .calculate(user_id, &requirement.metric, requirement.timeframe, now)
                        .await?;

                    // A non-positive target is trivially satisfied rather
                    // than a division error.
                    let ratio = if requirement.target <= 0 {
                        1.0
                    } else {
                        (value as f64 / requirement.target as f64).min(1.0)
                    };
                    ratio_sum += ratio;

                    if requirement.target > 0 && value < requirement.target {
                        all_met = false;
                    }
                }

                let average_pct =
                    (ratio_sum / requirements.len() as f64 * 100.0).round() as i64;

                // Earned is the AND of the sub-requirements, not the
                // average: 99.6% rounds to 100 without being earned.
                Ok(Progress::aggregate(average_pct, all_met))
            }
        }
    }
}
