//! Metric computation for criteria evaluation.
//!
//! Every criteria rule ultimately asks "what is the value of metric M for
//! user U over timeframe T?". This module answers that through a registry of
//! metric descriptors: each supported name maps to a [`MetricSource`] saying
//! how the number is computed. Adding a metric is one new registry row; the
//! calculation path never changes.
//!
//! Unrecognized metric names evaluate to 0 instead of failing, so a badge
//! authored against a metric this build does not know about degrades to
//! "no progress" rather than poisoning a whole recalculation pass.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::model::Timeframe;
use crate::storage::Storage;

/// How a registered metric is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricSource {
    /// Sum of event weights of one activity kind over the rolling window.
    Events(&'static str),
    /// Whole days since the user's account was created. The timeframe
    /// parameter does not apply to an age and is ignored.
    AccountAge,
}

/// The supported metric set. One row per metric name.
const METRIC_REGISTRY: &[(&str, MetricSource)] = &[
    ("content_created", MetricSource::Events("content_created")),
    ("comments_posted", MetricSource::Events("comments_posted")),
    ("likes_received", MetricSource::Events("likes_received")),
    ("followers_gained", MetricSource::Events("followers_gained")),
    ("users_followed", MetricSource::Events("users_followed")),
    ("views_received", MetricSource::Events("views_received")),
    ("reports_submitted", MetricSource::Events("reports_submitted")),
    ("days_active", MetricSource::AccountAge),
];

/// Resolve a metric name to its source, if the name is registered.
pub fn metric_source(metric: &str) -> Option<MetricSource> {
    METRIC_REGISTRY
        .iter()
        .find(|(name, _)| *name == metric)
        .map(|(_, source)| *source)
}

/// Computes a single numeric value per (user, metric, timeframe).
///
/// Read-only: the provider never writes to the store.
#[derive(Clone)]
pub struct MetricProvider {
    storage: Storage,
    registry: HashMap<&'static str, MetricSource>,
}

impl MetricProvider {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            registry: METRIC_REGISTRY.iter().copied().collect(),
        }
    }

    /// Compute the value of `metric` for `user_id` over `timeframe`,
    /// anchored at `now`.
    pub async fn calculate(
        &self,
        user_id: &str,
        metric: &str,
        timeframe: Timeframe,
        now: DateTime<Utc>,
    ) -> anyhow::Result<i64> {
        match self.registry.get(metric) {
            None => {
                debug!(metric, "Unrecognized metric, evaluating to 0");
                Ok(0)
            }
            Some(MetricSource::Events(kind)) => {
                self.storage.count_events(user_id, kind, timeframe, now).await
            }
            Some(MetricSource::AccountAge) => {
                match self.storage.user_created_at(user_id).await? {
                    Some(created_at) => Ok((now - created_at).num_days().max(0)),
                    None => Ok(0),
                }
            }
        }
    }
}
