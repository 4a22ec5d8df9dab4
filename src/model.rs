//! Data models for Accolade.
//!
//! The core vocabulary of the engine:
//!
//! - [`Badge`]: an authored achievement definition with a [`Criteria`] rule
//! - [`Award`]: the record that a user has satisfied a badge's criteria
//! - [`Progress`]: a current/target/percentage snapshot for one (user, badge)
//! - [`Timeframe`]: the rolling window a metric is computed over
//!
//! Badges are authored by an external process and are read-only here. Awards
//! are created exclusively by the award coordinator; `earned_at` is set once
//! and never changes, while the progress columns are refreshed on every
//! recalculation so displays stay current after earning.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Top-level grouping for a badge, used for catalog organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeCategory {
    /// Earned by producing content.
    Creator,
    /// Earned by participating in discussions.
    Community,
    /// Earned through follows and reach.
    Social,
    /// Earned by hitting milestones.
    Achievement,
    /// Manually curated or seasonal.
    Special,
}

impl BadgeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            BadgeCategory::Creator => "creator",
            BadgeCategory::Community => "community",
            BadgeCategory::Social => "social",
            BadgeCategory::Achievement => "achievement",
            BadgeCategory::Special => "special",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "creator" => Some(BadgeCategory::Creator),
            "community" => Some(BadgeCategory::Community),
            "social" => Some(BadgeCategory::Social),
            "achievement" => Some(BadgeCategory::Achievement),
            "special" => Some(BadgeCategory::Special),
            _ => None,
        }
    }
}

/// How rare a badge is. Ordered from most to least common, so rarities can
/// be compared directly (`Rare < Legendary`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeRarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
    Mythical,
}

impl BadgeRarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            BadgeRarity::Common => "common",
            BadgeRarity::Uncommon => "uncommon",
            BadgeRarity::Rare => "rare",
            BadgeRarity::Epic => "epic",
            BadgeRarity::Legendary => "legendary",
            BadgeRarity::Mythical => "mythical",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "common" => Some(BadgeRarity::Common),
            "uncommon" => Some(BadgeRarity::Uncommon),
            "rare" => Some(BadgeRarity::Rare),
            "epic" => Some(BadgeRarity::Epic),
            "legendary" => Some(BadgeRarity::Legendary),
            "mythical" => Some(BadgeRarity::Mythical),
            _ => None,
        }
    }
}

/// Badge tier, ordered lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
}

impl BadgeTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            BadgeTier::Bronze => "bronze",
            BadgeTier::Silver => "silver",
            BadgeTier::Gold => "gold",
            BadgeTier::Platinum => "platinum",
            BadgeTier::Diamond => "diamond",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "bronze" => Some(BadgeTier::Bronze),
            "silver" => Some(BadgeTier::Silver),
            "gold" => Some(BadgeTier::Gold),
            "platinum" => Some(BadgeTier::Platinum),
            "diamond" => Some(BadgeTier::Diamond),
            _ => None,
        }
    }
}

/// The rolling time window a metric is computed over.
///
/// Window boundaries are computed from wall-clock time at evaluation time and
/// are never stored, so a repeated evaluation of a "weekly" metric naturally
/// rolls forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    /// Unbounded; all recorded activity counts.
    #[default]
    AllTime,
    /// Last 24 hours.
    Daily,
    /// Last 7 days.
    Weekly,
    /// Last 30 days.
    Monthly,
    /// Last 365 days.
    Yearly,
}

impl Timeframe {
    /// Window length in seconds, or `None` for an unbounded window.
    pub fn window_seconds(&self) -> Option<i64> {
        match self {
            Timeframe::AllTime => None,
            Timeframe::Daily => Some(24 * 3600),
            Timeframe::Weekly => Some(7 * 24 * 3600),
            Timeframe::Monthly => Some(30 * 24 * 3600),
            Timeframe::Yearly => Some(365 * 24 * 3600),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::AllTime => "all_time",
            Timeframe::Daily => "daily",
            Timeframe::Weekly => "weekly",
            Timeframe::Monthly => "monthly",
            Timeframe::Yearly => "yearly",
        }
    }
}

/// One sub-requirement of a combination criteria.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub metric: String,
    pub target: i64,
    #[serde(default)]
    pub timeframe: Timeframe,
}

/// The rule that determines when a badge is earned.
///
/// Exactly one variant is active per badge. The variant tag is part of the
/// authored JSON (`{"type": "count", ...}`), so adding a new criteria kind is
/// a compile-checked change: every consumer matches exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Criteria {
    /// A raw activity count must reach the target.
    Count {
        metric: String,
        target: i64,
        #[serde(default)]
        timeframe: Timeframe,
    },
    /// Same evaluation as `count`; authored separately for badges that gate
    /// on received-quality metrics (likes, views).
    Quality {
        metric: String,
        target: i64,
        #[serde(default)]
        timeframe: Timeframe,
    },
    /// Same evaluation as `count`, over time-spent style metrics.
    Time {
        metric: String,
        target: i64,
        #[serde(default)]
        timeframe: Timeframe,
    },
    /// The metric must have activity in `target` consecutive
    /// timeframe-sized periods, counted back from now.
    Streak {
        metric: String,
        target: i64,
        #[serde(default)]
        timeframe: Timeframe,
    },
    /// Threshold against a date-derived metric (e.g. days since join).
    Date { metric: String, target: i64 },
    /// Every sub-requirement must independently meet its own target.
    Combination { requirements: Vec<Requirement> },
}

/// An authored achievement definition. Read-only to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Badge {
    /// Stable slug identifier, e.g. `"first-pitch"`.
    pub id: String,
    pub name: String,
    pub category: BadgeCategory,
    pub rarity: BadgeRarity,
    pub tier: BadgeTier,
    /// Display asset reference; opaque to the engine.
    pub icon: String,
    #[serde(default)]
    pub color: Option<String>,
    pub criteria: Criteria,
    /// Inactive badges are excluded from evaluation passes.
    pub is_active: bool,
}

/// A current/target/percentage snapshot of how close a user is to a badge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub current: i64,
    pub target: i64,
    /// Always `min(current / target, 1) * 100`, clamped to [0, 100] even
    /// when `current` keeps climbing past the target after earning.
    pub percentage: f64,
    pub is_earned: bool,
}

impl Progress {
    /// Progress for a plain threshold criteria: earned iff the count
    /// reached the target.
    pub fn from_counts(current: i64, target: i64) -> Self {
        Self {
            current,
            target,
            percentage: percentage_of(current, target),
            is_earned: current >= target,
        }
    }

    /// Progress for a combination criteria, expressed as an aggregate
    /// percentage (target is always 100). Earned status is decided by the
    /// caller since a rounded average can reach 100 without every
    /// sub-requirement being met.
    pub fn aggregate(average_pct: i64, is_earned: bool) -> Self {
        Self {
            current: average_pct,
            target: 100,
            percentage: average_pct.clamp(0, 100) as f64,
            is_earned,
        }
    }
}

/// Completion percentage, capped at 100. A non-positive target counts as
/// trivially complete.
fn percentage_of(current: i64, target: i64) -> f64 {
    if target <= 0 {
        return 100.0;
    }
    (current as f64 / target as f64).clamp(0.0, 1.0) * 100.0
}

/// The record that a user has earned a badge.
///
/// At most one award exists per (user, badge) pair; the storage layer
/// enforces this with a unique index. `earned_at` is immutable once set.
#[derive(Debug, Clone, Serialize)]
pub struct Award {
    pub id: i64,
    pub user_id: String,
    pub badge_id: String,
    pub earned_at: DateTime<Utc>,
    pub current: i64,
    pub target: i64,
    pub percentage: f64,
    /// What triggered the award, e.g. `"user_recalculation"`.
    pub context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_content: Option<String>,
}

/// Request body for POST /events.
///
/// The timestamp is assigned server-side when the event is recorded.
#[derive(Debug, Clone, Deserialize)]
pub struct EventRequest {
    pub user_id: String,
    /// Activity kind, e.g. `"content_created"`. Kinds the metric registry
    /// does not know about are stored but never counted.
    pub kind: String,
    /// Optional weight for batched ingestion (defaults to 1).
    #[serde(default = "default_weight")]
    pub weight: i32,
}

fn default_weight() -> i32 {
    1
}

/// Whether a recalculation covers one user or fans out over many.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecalcScope {
    User,
    All,
}

/// Request body for POST /recalculate.
#[derive(Debug, Clone, Deserialize)]
pub struct RecalcRequest {
    pub scope: RecalcScope,
    /// Required when `scope` is `user`.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Maximum users to process when `scope` is `all`.
    #[serde(default)]
    pub limit: Option<u32>,
}

/// What the coordinator did for one (user, badge) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Criteria newly satisfied; an award was written.
    Created,
    /// An award already existed; its progress was refreshed.
    Updated,
    /// Criteria not yet satisfied; nothing written.
    Skipped,
    /// Evaluating or reconciling this badge failed; the pass continued.
    Error,
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Created => "created",
            Outcome::Updated => "updated",
            Outcome::Skipped => "skipped",
            Outcome::Error => "error",
        }
    }
}

/// One per-badge entry in a recalculation summary.
#[derive(Debug, Clone, Serialize)]
pub struct BadgeDetail {
    pub badge_id: String,
    pub name: String,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
}

/// Result of a single user's recalculation pass.
#[derive(Debug, Clone, Serialize)]
pub struct UserRecalcSummary {
    pub user_id: String,
    /// Number of active badges evaluated.
    pub checked: usize,
    /// Number of awards newly created in this pass.
    pub awarded: usize,
    pub details: Vec<BadgeDetail>,
}

/// Result of a bulk recalculation pass.
#[derive(Debug, Clone, Serialize)]
pub struct BulkRecalcSummary {
    /// Users attempted, including any whose pass failed.
    pub users_processed: usize,
    pub total_awarded: usize,
}

/// Response body for POST /recalculate.
#[derive(Debug, Clone, Serialize)]
pub struct RecalcResponse {
    pub ok: bool,
    pub scope: RecalcScope,
    pub result: RecalcResult,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RecalcResult {
    User(UserRecalcSummary),
    Bulk(BulkRecalcSummary),
}

/// Query parameters for GET /leaderboard.
#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub metric: String,
    #[serde(default = "default_leaderboard_limit")]
    pub limit: u32,
}

fn default_leaderboard_limit() -> u32 {
    10
}

/// One ranked entry in a leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub count: i64,
}

/// Response body for GET /leaderboard.
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardResponse {
    pub metric: String,
    pub entries: Vec<LeaderboardEntry>,
}

/// Query parameters for GET /awards.
#[derive(Debug, Deserialize)]
pub struct AwardsQuery {
    pub user_id: String,
}

/// Response body for GET /awards.
#[derive(Debug, Clone, Serialize)]
pub struct AwardsResponse {
    pub user_id: String,
    pub awards: Vec<Award>,
}

/// Response body for POST /badges/refresh.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshResponse {
    pub ok: bool,
    /// Number of active badges now cached.
    pub badges: usize,
}
