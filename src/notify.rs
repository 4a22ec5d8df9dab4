//! Award notification delivery.
//!
//! The notification collaborator is external: whatever service renders and
//! pushes "you earned a badge" messages is reached through a webhook here.
//! Delivery is strictly best-effort — a notification failure is logged and
//! swallowed, and never rolls back an award that was already committed.

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, warn};

use crate::model::Badge;

/// Client for the award-notification webhook.
#[derive(Clone)]
pub struct AwardNotifier {
    client: reqwest::Client,
    webhook_url: String,
}

impl AwardNotifier {
    pub fn new(webhook_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url: webhook_url.to_string(),
        }
    }

    /// Fire-and-forget notification that `user_id` earned `badge`.
    pub async fn notify(&self, user_id: &str, badge: &Badge, earned_at: DateTime<Utc>) {
        let payload = json!({
            "user_id": user_id,
            "badge_id": badge.id,
            "badge_name": badge.name,
            "rarity": badge.rarity,
            "earned_at": earned_at,
        });

        match self.client.post(&self.webhook_url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(user_id, badge_id = %badge.id, "Award notification delivered");
            }
            Ok(response) => {
                warn!(
                    user_id,
                    badge_id = %badge.id,
                    status = %response.status(),
                    "Award notification rejected by webhook"
                );
            }
            Err(e) => {
                warn!(
                    user_id,
                    badge_id = %badge.id,
                    error = %e,
                    "Failed to deliver award notification"
                );
            }
        }
    }
}
