//! Integration tests for Accolade API endpoints.
//!
//! These tests verify the full request/response cycle through the HTTP API:
//! event ingestion, recalculation passes, awarding idempotency, and the
//! read-only surfaces.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::{Router, routing::get, routing::post};
use axum_test::TestServer;
use serde_json::json;
use tower::ServiceExt;

use accolade::api::{
    AppState, get_awards, get_badges, get_leaderboard, health_check, post_event,
    post_recalculate, post_refresh_catalog,
};
use accolade::catalog::BadgeCatalog;
use accolade::leaderboard::LeaderboardService;
use accolade::model::{Badge, BadgeCategory, BadgeRarity, BadgeTier, Criteria, Timeframe};
use accolade::recalc::RecalculationService;
use accolade::storage::Storage;

fn count_badge(id: &str, name: &str, metric: &str, target: i64) -> Badge {
    Badge {
        id: id.to_string(),
        name: name.to_string(),
        category: BadgeCategory::Creator,
        rarity: BadgeRarity::Common,
        tier: BadgeTier::Bronze,
        icon: "trophy".to_string(),
        color: None,
        criteria: Criteria::Count {
            metric: metric.to_string(),
            target,
            timeframe: Timeframe::AllTime,
        },
        is_active: true,
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/recalculate", post(post_recalculate))
        .route("/events", post(post_event))
        .route("/leaderboard", get(get_leaderboard))
        .route("/badges", get(get_badges))
        .route("/badges/refresh", post(post_refresh_catalog))
        .route("/awards", get(get_awards))
        .route("/health", get(health_check))
        .with_state(state)
}

async fn create_state(badges: &[Badge]) -> (AppState, Storage) {
    let storage = Storage::new("sqlite::memory:").await.unwrap();
    for badge in badges {
        storage.insert_badge(badge).await.unwrap();
    }

    let catalog = BadgeCatalog::new(storage.clone());
    catalog.initialize().await.unwrap();

    let state = AppState {
        recalc: RecalculationService::new(storage.clone(), catalog.clone(), None),
        leaderboard: LeaderboardService::new(storage.clone()),
        catalog,
        storage: storage.clone(),
    };

    (state, storage)
}

async fn create_test_server(badges: &[Badge]) -> (TestServer, Storage) {
    let (state, storage) = create_state(badges).await;
    (TestServer::new(router(state)).unwrap(), storage)
}

#[tokio::test]
async fn test_health_endpoint() {
    let (server, _storage) = create_test_server(&[]).await;

    let response = server.get("/health").await;

    response.assert_status_ok();
}

#[tokio::test]
async fn test_post_event() {
    let (server, _storage) = create_test_server(&[]).await;

    let response = server
        .post("/events")
        .json(&json!({
            "user_id": "u-1",
            "kind": "content_created",
            "weight": 2
        }))
        .await;

    response.assert_status(StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_post_event_default_weight() {
    let (server, _storage) = create_test_server(&[]).await;

    let response = server
        .post("/events")
        .json(&json!({
            "user_id": "u-1",
            "kind": "content_created"
        }))
        .await;

    response.assert_status(StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_recalculate_requires_user_id_for_user_scope() {
    let (state, _storage) = create_state(&[]).await;

    let response = router(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/recalculate")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"scope":"user"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_first_badge_awarded_through_api() {
    let badge = count_badge("first-pitch", "First Pitch", "content_created", 1);
    let (server, _storage) = create_test_server(&[badge]).await;

    // No activity yet: evaluated but not awarded.
    let response = server
        .post("/recalculate")
        .json(&json!({ "scope": "user", "user_id": "u-1" }))
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["ok"], true);
    assert_eq!(body["result"]["checked"], 1);
    assert_eq!(body["result"]["awarded"], 0);
    assert_eq!(body["result"]["details"][0]["outcome"], "skipped");
    assert_eq!(body["result"]["details"][0]["progress"]["percentage"], 0.0);

    // Create one piece of content, then recalculate again.
    server
        .post("/events")
        .json(&json!({ "user_id": "u-1", "kind": "content_created" }))
        .await
        .assert_status(StatusCode::ACCEPTED);

    let response = server
        .post("/recalculate")
        .json(&json!({ "scope": "user", "user_id": "u-1" }))
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["result"]["awarded"], 1);
    assert_eq!(body["result"]["details"][0]["outcome"], "created");
    assert_eq!(body["result"]["details"][0]["progress"]["percentage"], 100.0);
}

#[tokio::test]
async fn test_repeat_recalculation_is_idempotent() {
    let badge = count_badge("first-pitch", "First Pitch", "content_created", 1);
    let (server, _storage) = create_test_server(&[badge]).await;

    server
        .post("/events")
        .json(&json!({ "user_id": "u-1", "kind": "content_created" }))
        .await
        .assert_status(StatusCode::ACCEPTED);

    server
        .post("/recalculate")
        .json(&json!({ "scope": "user", "user_id": "u-1" }))
        .await
        .assert_status_ok();

    let awards: serde_json::Value = server.get("/awards?user_id=u-1").await.json();
    assert_eq!(awards["awards"].as_array().unwrap().len(), 1);
    let earned_at = awards["awards"][0]["earned_at"].clone();

    // A second pass refreshes progress but never re-awards.
    let response = server
        .post("/recalculate")
        .json(&json!({ "scope": "user", "user_id": "u-1" }))
        .await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["result"]["awarded"], 0);
    assert_eq!(body["result"]["details"][0]["outcome"], "updated");

    let awards: serde_json::Value = server.get("/awards?user_id=u-1").await.json();
    assert_eq!(awards["awards"].as_array().unwrap().len(), 1);
    assert_eq!(awards["awards"][0]["earned_at"], earned_at);
}

#[tokio::test]
async fn test_bulk_recalculation() {
    let badge = count_badge("first-pitch", "First Pitch", "content_created", 1);
    let (server, _storage) = create_test_server(&[badge]).await;

    // Two users qualify, one does not.
    for (user, kind) in [
        ("u-1", "content_created"),
        ("u-2", "comments_posted"),
        ("u-3", "content_created"),
    ] {
        server
            .post("/events")
            .json(&json!({ "user_id": user, "kind": kind }))
            .await
            .assert_status(StatusCode::ACCEPTED);
    }

    let response = server
        .post("/recalculate")
        .json(&json!({ "scope": "all", "limit": 50 }))
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["ok"], true);
    assert_eq!(body["scope"], "all");
    assert_eq!(body["result"]["users_processed"], 3);
    assert_eq!(body["result"]["total_awarded"], 2);
}

#[tokio::test]
async fn test_leaderboard_sorted_and_truncated() {
    let (server, _storage) = create_test_server(&[]).await;

    for (user, count) in [("u-1", 4), ("u-2", 1), ("u-3", 3), ("u-4", 2), ("u-5", 5)] {
        for _ in 0..count {
            server
                .post("/events")
                .json(&json!({ "user_id": user, "kind": "followers_gained" }))
                .await
                .assert_status(StatusCode::ACCEPTED);
        }
    }

    let response = server.get("/leaderboard?metric=followers_gained&limit=3").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["metric"], "followers_gained");

    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0]["user_id"], "u-5");
    assert_eq!(entries[0]["count"], 5);
    assert_eq!(entries[1]["count"], 4);
    assert_eq!(entries[2]["count"], 3);
}

#[tokio::test]
async fn test_leaderboard_unknown_metric_rejected() {
    let (server, _storage) = create_test_server(&[]).await;

    let response = server.get("/leaderboard?metric=karma_points").await;

    response.assert_status(StatusCode::BAD_REQUEST);

    let body: serde_json::Value = response.json();
    assert_eq!(body["ok"], false);
}

#[tokio::test]
async fn test_badges_listing_and_refresh() {
    let badge = count_badge("first-pitch", "First Pitch", "content_created", 1);
    let (server, storage) = create_test_server(&[badge]).await;

    let body: serde_json::Value = server.get("/badges").await.json();
    assert_eq!(body.as_array().unwrap().len(), 1);

    // The external authoring process publishes a new badge; the catalog
    // serves the cached set until it is refreshed.
    storage
        .insert_badge(&count_badge("prolific", "Prolific", "content_created", 10))
        .await
        .unwrap();

    let body: serde_json::Value = server.get("/badges").await.json();
    assert_eq!(body.as_array().unwrap().len(), 1);

    let response = server.post("/badges/refresh").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["badges"], 2);

    let body: serde_json::Value = server.get("/badges").await.json();
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_full_workflow() {
    let badges = [
        count_badge("first-pitch", "First Pitch", "content_created", 1),
        count_badge("conversationalist", "Conversationalist", "comments_posted", 3),
    ];
    let (server, _storage) = create_test_server(&badges).await;

    // 1. Health check
    server.get("/health").await.assert_status_ok();

    // 2. A user creates content and comments a few times
    server
        .post("/events")
        .json(&json!({ "user_id": "u-1", "kind": "content_created" }))
        .await
        .assert_status(StatusCode::ACCEPTED);
    for _ in 0..3 {
        server
            .post("/events")
            .json(&json!({ "user_id": "u-1", "kind": "comments_posted" }))
            .await
            .assert_status(StatusCode::ACCEPTED);
    }

    // 3. One pass awards both badges
    let response = server
        .post("/recalculate")
        .json(&json!({ "scope": "user", "user_id": "u-1" }))
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["result"]["checked"], 2);
    assert_eq!(body["result"]["awarded"], 2);

    // 4. The award records are visible and stable
    let awards: serde_json::Value = server.get("/awards?user_id=u-1").await.json();
    assert_eq!(awards["awards"].as_array().unwrap().len(), 2);
}
