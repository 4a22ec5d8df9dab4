//! Recalculation orchestration.
//!
//! A per-user pass walks the active catalog, evaluates every badge, and
//! hands each result to the coordinator. Failure isolation is per badge: a
//! store error while computing one badge's metrics becomes an `error` entry
//! in the details and the pass keeps going, so the caller always gets a
//! structured summary rather than an all-or-nothing failure.
//!
//! The bulk pass applies the same policy one level up — a user whose whole
//! pass fails contributes nothing to the totals and the remaining users are
//! still processed. Users run sequentially; per-user passes are independent
//! and re-running any of them is safe.

use chrono::Utc;
use tracing::warn;

use crate::award::AwardCoordinator;
use crate::catalog::BadgeCatalog;
use crate::evaluator::CriteriaEvaluator;
use crate::model::{
    Badge, BadgeDetail, BulkRecalcSummary, Outcome, Progress, UserRecalcSummary,
};
use crate::notify::AwardNotifier;
use crate::storage::Storage;

/// Users processed by a bulk pass when the request does not say.
pub const DEFAULT_BULK_LIMIT: u32 = 100;

/// Orchestrates evaluation and awarding across the catalog.
#[derive(Clone)]
pub struct RecalculationService {
    storage: Storage,
    catalog: BadgeCatalog,
    evaluator: CriteriaEvaluator,
    coordinator: AwardCoordinator,
}

impl RecalculationService {
    pub fn new(storage: Storage, catalog: BadgeCatalog, notifier: Option<AwardNotifier>) -> Self {
        Self {
            evaluator: CriteriaEvaluator::new(storage.clone()),
            coordinator: AwardCoordinator::new(storage.clone(), notifier),
            catalog,
            storage,
        }
    }

    /// Run a full evaluation pass for one user.
    pub async fn recalculate_for_user(&self, user_id: &str) -> anyhow::Result<UserRecalcSummary> {
        self.run_user_pass(user_id, "user_recalculation").await
    }

    /// Run isolated per-user passes for up to `limit` users.
    pub async fn recalculate_all(&self, limit: u32) -> anyhow::Result<BulkRecalcSummary> {
        let user_ids = self.storage.list_user_ids(limit).await?;
        let users_processed = user_ids.len();
        let mut total_awarded = 0;

        for user_id in &user_ids {
            match self.run_user_pass(user_id, "bulk_recalculation").await {
                Ok(summary) => total_awarded += summary.awarded,
                Err(e) => {
                    warn!(
                        user_id = %user_id,
                        error = %e,
                        "User pass failed, continuing bulk recalculation"
                    );
                }
            }
        }

        Ok(BulkRecalcSummary {
            users_processed,
            total_awarded,
        })
    }

    async fn run_user_pass(&self, user_id: &str, context: &str) -> anyhow::Result<UserRecalcSummary> {
        let badges = self.catalog.active().await;

        let mut details = Vec::with_capacity(badges.len());
        let mut awarded = 0;

        for badge in &badges {
            match self.process_badge(user_id, badge, context).await {
                Ok((outcome, progress)) => {
                    if outcome == Outcome::Created {
                        awarded += 1;
                    }
                    details.push(BadgeDetail {
                        badge_id: badge.id.clone(),
                        name: badge.name.clone(),
                        outcome,
                        progress: Some(progress),
                    });
                }
                Err(e) => {
                    warn!(
                        user_id = %user_id,
                        badge_id = %badge.id,
                        error = %e,
                        "Badge evaluation failed, continuing pass"
                    );
                    details.push(BadgeDetail {
                        badge_id: badge.id.clone(),
                        name: badge.name.clone(),
                        outcome: Outcome::Error,
                        progress: None,
                    });
                }
            }
        }

        Ok(UserRecalcSummary {
            user_id: user_id.to_string(),
            checked: badges.len(),
            awarded,
            details,
        })
    }

    async fn process_badge(
        &self,
        user_id: &str,
        badge: &Badge,
        context: &str,
    ) -> anyhow::Result<(Outcome, Progress)> {
        let now = Utc::now();
        let progress = self.evaluator.evaluate(badge, user_id, now).await?;
        let outcome = self
            .coordinator
            .reconcile(user_id, badge, &progress, now, context)
            .await?;
        Ok((outcome, progress))
    }
}
