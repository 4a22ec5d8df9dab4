//! HTTP API handlers for Accolade.
//!
//! The trigger surface of the engine:
//!
//! - **POST /recalculate**: run an evaluation pass for one user or fan out
//!   over many. Always answers with a structured summary; partial failures
//!   inside a pass are reported per badge, not as a failed request.
//! - **POST /events**: record an activity event with a server-assigned
//!   timestamp.
//! - **GET /leaderboard**: read-only ranking by metric.
//! - **GET /badges**, **POST /badges/refresh**: the cached catalog and its
//!   reload hook (badge authoring itself happens elsewhere).
//! - **GET /awards**: a user's award records, for programmatic consumers
//!   and operator debugging.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::catalog::BadgeCatalog;
use crate::error::EngineError;
use crate::leaderboard::LeaderboardService;
use crate::model::{
    AwardsQuery, AwardsResponse, Badge, EventRequest, LeaderboardQuery, LeaderboardResponse,
    RecalcRequest, RecalcResponse, RecalcResult, RecalcScope, RefreshResponse,
};
use crate::recalc::{DEFAULT_BULK_LIMIT, RecalculationService};
use crate::storage::Storage;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub storage: Storage,
    pub catalog: BadgeCatalog,
    pub recalc: RecalculationService,
    pub leaderboard: LeaderboardService,
}

type ErrorResponse = (StatusCode, Json<serde_json::Value>);

/// Map an engine error to a status code plus `{ ok: false, error }` body.
fn reject(error: &EngineError) -> ErrorResponse {
    let status = if error.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    (status, Json(json!({ "ok": false, "error": error.to_string() })))
}

/// POST /events - Record an activity event.
///
/// The timestamp is assigned server-side. The first event for a user also
/// registers the account, stamping its creation time.
///
/// # Request Body
///
/// ```json
/// {
///     "user_id": "u-42",
///     "kind": "content_created",
///     "weight": 1
/// }
/// ```
///
/// Weight is optional and defaults to 1.
///
/// # Response
///
/// Returns `202 Accepted` on success.
#[instrument(skip(state), fields(user_id = %request.user_id, kind = %request.kind))]
pub async fn post_event(
    State(state): State<AppState>,
    Json(request): Json<EventRequest>,
) -> impl IntoResponse {
    let now = Utc::now();

    let result = async {
        state.storage.ensure_user(&request.user_id, now).await?;
        state
            .storage
            .insert_event(&request.user_id, &request.kind, now, request.weight)
            .await
    }
    .await;

    match result {
        Ok(()) => {
            info!(weight = request.weight, "Activity event recorded");
            StatusCode::ACCEPTED
        }
        Err(e) => {
            warn!(error = %e, "Failed to record activity event");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// POST /recalculate - Run a badge recalculation pass.
///
/// # Request Body
///
/// ```json
/// { "scope": "user", "user_id": "u-42" }
/// { "scope": "all", "limit": 50 }
/// ```
///
/// # Response
///
/// For `scope=user`: `{ "ok": true, "scope": "user", "result": { "user_id",
/// "checked", "awarded", "details": [...] } }` where each detail carries
/// `{ badge_id, name, outcome, progress? }`.
///
/// For `scope=all`: `{ "ok": true, "scope": "all", "result":
/// { "users_processed", "total_awarded" } }`.
///
/// Missing `user_id` when `scope=user` is rejected with 400 before any
/// evaluation runs.
#[instrument(skip(state, request), fields(scope = ?request.scope))]
pub async fn post_recalculate(
    State(state): State<AppState>,
    Json(request): Json<RecalcRequest>,
) -> Result<Json<RecalcResponse>, ErrorResponse> {
    match request.scope {
        RecalcScope::User => {
            let Some(user_id) = request.user_id.as_deref() else {
                warn!("Recalculation rejected, no user_id for user scope");
                return Err(reject(&EngineError::MissingUserId));
            };

            match state.recalc.recalculate_for_user(user_id).await {
                Ok(summary) => {
                    info!(
                        user_id = %user_id,
                        checked = summary.checked,
                        awarded = summary.awarded,
                        "User recalculated"
                    );
                    Ok(Json(RecalcResponse {
                        ok: true,
                        scope: RecalcScope::User,
                        result: RecalcResult::User(summary),
                    }))
                }
                Err(e) => {
                    warn!(user_id = %user_id, error = %e, "User recalculation failed");
                    Err(reject(&EngineError::Store(e)))
                }
            }
        }
        RecalcScope::All => {
            let limit = request.limit.unwrap_or(DEFAULT_BULK_LIMIT);

            match state.recalc.recalculate_all(limit).await {
                Ok(summary) => {
                    info!(
                        users_processed = summary.users_processed,
                        total_awarded = summary.total_awarded,
                        "Bulk recalculation finished"
                    );
                    Ok(Json(RecalcResponse {
                        ok: true,
                        scope: RecalcScope::All,
                        result: RecalcResult::Bulk(summary),
                    }))
                }
                Err(e) => {
                    warn!(limit, error = %e, "Bulk recalculation failed");
                    Err(reject(&EngineError::Store(e)))
                }
            }
        }
    }
}

/// GET /leaderboard - Rank users by a metric.
///
/// # Query Parameters
///
/// - `metric` (required): one of the supported metric names
/// - `limit` (optional): maximum entries (default: 10)
///
/// # Response
///
/// ```json
/// {
///     "metric": "followers_gained",
///     "entries": [ { "user_id": "u-7", "count": 120 }, ... ]
/// }
/// ```
///
/// An unknown metric is rejected with 400.
#[instrument(skip(state))]
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, ErrorResponse> {
    match state
        .leaderboard
        .top_users(&query.metric, query.limit, Utc::now())
        .await
    {
        Ok(entries) => {
            info!(
                metric = %query.metric,
                entry_count = entries.len(),
                "Leaderboard queried"
            );
            Ok(Json(LeaderboardResponse {
                metric: query.metric,
                entries,
            }))
        }
        Err(e) => {
            warn!(metric = %query.metric, error = %e, "Leaderboard query failed");
            Err(reject(&e))
        }
    }
}

/// GET /badges - List the cached active badge catalog.
#[instrument(skip(state))]
pub async fn get_badges(State(state): State<AppState>) -> Json<Vec<Badge>> {
    Json(state.catalog.active().await)
}

/// POST /badges/refresh - Reload the catalog from the store.
///
/// Badge authoring happens in an external process; operators hit this after
/// publishing changes so running passes pick them up.
#[instrument(skip(state))]
pub async fn post_refresh_catalog(
    State(state): State<AppState>,
) -> Result<Json<RefreshResponse>, ErrorResponse> {
    match state.catalog.refresh().await {
        Ok(badges) => {
            info!(badges, "Badge catalog refreshed");
            Ok(Json(RefreshResponse { ok: true, badges }))
        }
        Err(e) => {
            warn!(error = %e, "Catalog refresh failed");
            Err(reject(&EngineError::Store(e)))
        }
    }
}

/// GET /awards - List a user's award records.
///
/// # Query Parameters
///
/// - `user_id` (required): the user to look up
#[instrument(skip(state))]
pub async fn get_awards(
    State(state): State<AppState>,
    Query(query): Query<AwardsQuery>,
) -> Result<Json<AwardsResponse>, ErrorResponse> {
    match state.storage.list_awards(&query.user_id).await {
        Ok(awards) => {
            info!(
                user_id = %query.user_id,
                award_count = awards.len(),
                "Awards queried"
            );
            Ok(Json(AwardsResponse {
                user_id: query.user_id,
                awards,
            }))
        }
        Err(e) => {
            warn!(user_id = %query.user_id, error = %e, "Awards query failed");
            Err(reject(&EngineError::Store(e)))
        }
    }
}

/// GET /health - Simple health check endpoint.
pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}
