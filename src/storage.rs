//! SQLite storage layer for Accolade.
//!
//! Owns the schema and every query the engine issues:
//!
//! - `users`: account-creation timestamps, the source of `days_active`
//! - `activity_events`: one row per activity, `(user_id, kind, ts, weight)`
//! - `badges`: the authored catalog, criteria serialized as JSON
//! - `user_badges`: awards, one row per earned (user, badge) pair
//!
//! All timestamps are unix seconds and all windows are computed from a
//! caller-supplied reference time, so repeated evaluation of a rolling
//! window naturally moves forward with the clock.
//!
//! The unique index on `user_badges (user_id, badge_id)` is what makes
//! at-most-one-award hold even under concurrent recalculation: award
//! creation goes through `INSERT ... ON CONFLICT DO NOTHING`, so of two
//! racing passes exactly one insert applies.

use chrono::{DateTime, TimeZone, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::warn;

use crate::model::{
    Award, Badge, BadgeCategory, BadgeRarity, BadgeTier, LeaderboardEntry, Progress, Timeframe,
};

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    /// Create a new storage instance and initialize the schema.
    ///
    /// # Arguments
    ///
    /// * `database_url` - SQLite connection string (e.g., "sqlite:accolade.db" or "sqlite::memory:")
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        let storage = Self { pool };
        storage.initialize_schema().await?;

        Ok(storage)
    }

    /// Create the database schema if it doesn't exist.
    async fn initialize_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS activity_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                ts INTEGER NOT NULL,
                weight INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Index for the per-user metric window queries
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_activity_events_user_kind_ts
            ON activity_events(user_id, kind, ts)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS badges (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                category TEXT NOT NULL,
                rarity TEXT NOT NULL,
                tier TEXT NOT NULL,
                icon TEXT NOT NULL,
                color TEXT,
                criteria TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_badges (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                badge_id TEXT NOT NULL,
                earned_at INTEGER NOT NULL,
                progress_current INTEGER NOT NULL,
                progress_target INTEGER NOT NULL,
                progress_percentage REAL NOT NULL,
                context TEXT NOT NULL,
                related_content TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // The at-most-one-award invariant lives here, not in application
        // logic: racing creates collapse to a single row.
        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_user_badges_user_badge
            ON user_badges(user_id, badge_id)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Record a user if not already known, stamping account creation at `now`.
    ///
    /// Idempotent: an existing row keeps its original `created_at`.
    pub async fn ensure_user(&self, user_id: &str, now: DateTime<Utc>) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, created_at)
            VALUES (?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(now.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get a user's account-creation timestamp, or None for unknown users.
    pub async fn user_created_at(&self, user_id: &str) -> anyhow::Result<Option<DateTime<Utc>>> {
        let row = sqlx::query(
            r#"
            SELECT created_at FROM users WHERE id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| {
            let ts: i64 = r.get("created_at");
            Utc.timestamp_opt(ts, 0).unwrap()
        }))
    }

    /// List up to `limit` user ids for a bulk pass, oldest accounts first.
    pub async fn list_user_ids(&self, limit: u32) -> anyhow::Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT id FROM users ORDER BY created_at ASC, id ASC LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|r| r.get("id")).collect())
    }

    /// Insert a single activity event.
    pub async fn insert_event(
        &self,
        user_id: &str,
        kind: &str,
        ts: DateTime<Utc>,
        weight: i32,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO activity_events (user_id, kind, ts, weight)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(kind)
        .bind(ts.timestamp())
        .bind(weight)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Sum event weights for a user and kind within a rolling window
    /// anchored at `now`. An all-time timeframe is unbounded.
    pub async fn count_events(
        &self,
        user_id: &str,
        kind: &str,
        timeframe: Timeframe,
        now: DateTime<Utc>,
    ) -> anyhow::Result<i64> {
        let now_ts = now.timestamp();
        let start_ts = match timeframe.window_seconds() {
            Some(window) => now_ts - window,
            None => 0,
        };

        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(weight), 0) as total
            FROM activity_events
            WHERE user_id = ? AND kind = ? AND ts > ? AND ts <= ?
            "#,
        )
        .bind(user_id)
        .bind(kind)
        .bind(start_ts)
        .bind(now_ts)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("total"))
    }

    /// Per-bucket event totals for a user and kind, most recent bucket
    /// first. Bucket 0 covers `(now - bucket_seconds, now]`.
    ///
    /// Buckets with no activity come back as 0, so the caller can scan for
    /// the first inactive bucket.
    pub async fn bucket_totals(
        &self,
        user_id: &str,
        kind: &str,
        bucket_seconds: i64,
        num_buckets: u32,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Vec<i64>> {
        let now_ts = now.timestamp();
        let start_ts = now_ts - bucket_seconds * i64::from(num_buckets);

        // Bin events into buckets counted back from `now` in SQL, then fill
        // the gaps on the way out.
        let rows = sqlx::query(
            r#"
            SELECT ((? - ts) / ?) AS bucket_idx, SUM(weight) AS total
            FROM activity_events
            WHERE user_id = ? AND kind = ? AND ts > ? AND ts <= ?
            GROUP BY bucket_idx
            "#,
        )
        .bind(now_ts)
        .bind(bucket_seconds)
        .bind(user_id)
        .bind(kind)
        .bind(start_ts)
        .bind(now_ts)
        .fetch_all(&self.pool)
        .await?;

        let mut totals = vec![0i64; num_buckets as usize];
        for row in rows {
            let idx: i64 = row.get("bucket_idx");
            if let Ok(idx) = usize::try_from(idx) {
                if idx < totals.len() {
                    totals[idx] = row.get("total");
                }
            }
        }

        Ok(totals)
    }

    /// Insert or replace a badge definition.
    ///
    /// Badge authoring happens in an external process; this is the write
    /// half of the store interface it goes through.
    pub async fn insert_badge(&self, badge: &Badge) -> anyhow::Result<()> {
        let criteria = serde_json::to_string(&badge.criteria)?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO badges (id, name, category, rarity, tier, icon, color, criteria, is_active)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&badge.id)
        .bind(&badge.name)
        .bind(badge.category.as_str())
        .bind(badge.rarity.as_str())
        .bind(badge.tier.as_str())
        .bind(&badge.icon)
        .bind(&badge.color)
        .bind(criteria)
        .bind(badge.is_active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Load all active badge definitions.
    ///
    /// Rows whose criteria or enum columns fail to parse are skipped with a
    /// warning, so one malformed authored document cannot poison a pass.
    pub async fn load_active_badges(&self) -> anyhow::Result<Vec<Badge>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, category, rarity, tier, icon, color, criteria, is_active
            FROM badges
            WHERE is_active = 1
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut badges = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.get("id");
            match badge_from_row(&row) {
                Ok(badge) => badges.push(badge),
                Err(e) => {
                    warn!(badge_id = %id, error = %e, "Skipping unparseable badge definition");
                }
            }
        }

        Ok(badges)
    }

    /// Look up the award for a (user, badge) pair, if one exists.
    pub async fn find_award(
        &self,
        user_id: &str,
        badge_id: &str,
    ) -> anyhow::Result<Option<Award>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, badge_id, earned_at,
                   progress_current, progress_target, progress_percentage,
                   context, related_content
            FROM user_badges
            WHERE user_id = ? AND badge_id = ?
            "#,
        )
        .bind(user_id)
        .bind(badge_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| award_from_row(&r)))
    }

    /// Create an award unless one already exists for the pair.
    ///
    /// Returns true when this call created the row. A false return means a
    /// concurrent pass (or an earlier one) already earned the badge; the
    /// unique index guarantees a single row either way.
    pub async fn insert_award_if_absent(
        &self,
        user_id: &str,
        badge_id: &str,
        progress: &Progress,
        context: &str,
        related_content: Option<&str>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_badges
                (user_id, badge_id, earned_at,
                 progress_current, progress_target, progress_percentage,
                 context, related_content)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, badge_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(badge_id)
        .bind(now.timestamp())
        .bind(progress.current)
        .bind(progress.target)
        .bind(progress.percentage)
        .bind(context)
        .bind(related_content)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Refresh the progress columns of an existing award. `earned_at` is
    /// deliberately not part of the statement.
    pub async fn update_award_progress(
        &self,
        user_id: &str,
        badge_id: &str,
        progress: &Progress,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE user_badges
            SET progress_current = ?, progress_target = ?, progress_percentage = ?
            WHERE user_id = ? AND badge_id = ?
            "#,
        )
        .bind(progress.current)
        .bind(progress.target)
        .bind(progress.percentage)
        .bind(user_id)
        .bind(badge_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All awards held by a user, most recently earned first.
    pub async fn list_awards(&self, user_id: &str) -> anyhow::Result<Vec<Award>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, badge_id, earned_at,
                   progress_current, progress_target, progress_percentage,
                   context, related_content
            FROM user_badges
            WHERE user_id = ?
            ORDER BY earned_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(award_from_row).collect())
    }

    /// Rank users by total event weight for one kind, count descending.
    ///
    /// Ties go to whoever recorded their first qualifying event earliest,
    /// then to the lexically smaller user id, so the ordering is stable
    /// across calls.
    pub async fn top_users_by_event(
        &self,
        kind: &str,
        limit: u32,
    ) -> anyhow::Result<Vec<LeaderboardEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, COALESCE(SUM(weight), 0) AS total, MIN(ts) AS first_ts
            FROM activity_events
            WHERE kind = ?
            GROUP BY user_id
            ORDER BY total DESC, first_ts ASC, user_id ASC
            LIMIT ?
            "#,
        )
        .bind(kind)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| LeaderboardEntry {
                user_id: r.get("user_id"),
                count: r.get("total"),
            })
            .collect())
    }

    /// Rank users by account age in days, oldest first.
    pub async fn top_users_by_account_age(
        &self,
        limit: u32,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Vec<LeaderboardEntry>> {
        let now_ts = now.timestamp();

        let rows = sqlx::query(
            r#"
            SELECT id, created_at FROM users ORDER BY created_at ASC, id ASC LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| {
                let created_at: i64 = r.get("created_at");
                LeaderboardEntry {
                    user_id: r.get("id"),
                    count: ((now_ts - created_at) / 86_400).max(0),
                }
            })
            .collect())
    }

    /// Run a raw statement, for tests that need to break the store out from
    /// under a service.
    #[cfg(test)]
    pub(crate) async fn exec_raw(&self, sql: &str) -> anyhow::Result<()> {
        sqlx::query(sql).execute(&self.pool).await?;
        Ok(())
    }
}

/// Map a badges row to a Badge, failing on unknown enum values or
/// unparseable criteria JSON.
fn badge_from_row(row: &sqlx::sqlite::SqliteRow) -> anyhow::Result<Badge> {
    let category: String = row.get("category");
    let rarity: String = row.get("rarity");
    let tier: String = row.get("tier");
    let criteria: String = row.get("criteria");

    Ok(Badge {
        id: row.get("id"),
        name: row.get("name"),
        category: BadgeCategory::parse_str(&category)
            .ok_or_else(|| anyhow::anyhow!("unknown category: {category}"))?,
        rarity: BadgeRarity::parse_str(&rarity)
            .ok_or_else(|| anyhow::anyhow!("unknown rarity: {rarity}"))?,
        tier: BadgeTier::parse_str(&tier)
            .ok_or_else(|| anyhow::anyhow!("unknown tier: {tier}"))?,
        icon: row.get("icon"),
        color: row.get("color"),
        criteria: serde_json::from_str(&criteria)?,
        is_active: row.get("is_active"),
    })
}

fn award_from_row(row: &sqlx::sqlite::SqliteRow) -> Award {
    let earned_at: i64 = row.get("earned_at");

    Award {
        id: row.get("id"),
        user_id: row.get("user_id"),
        badge_id: row.get("badge_id"),
        earned_at: Utc.timestamp_opt(earned_at, 0).unwrap(),
        current: row.get("progress_current"),
        target: row.get("progress_target"),
        percentage: row.get("progress_percentage"),
        context: row.get("context"),
        related_content: row.get("related_content"),
    }
}
