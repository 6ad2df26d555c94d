//! API integration tests driving the full HTTP surface end to end against a
//! real Postgres instance, covering the concrete scenarios of §8: capacity
//! enforcement, cancel-frees-a-spot, reactivation, forbidden cancel, and the
//! owner scheduling-conflict window. Clock pinned to `T0 = 2030-01-01T00:00:00Z`
//! per the spec's scenario convention so every test is deterministic.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::ConnectInfo,
    http::{Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};
use tower::util::ServiceExt;
use uuid::Uuid;

use registry_engine::api::{self, AppState};
use registry_engine::domain::FixedClock;
use registry_engine::store::Store;
use registry_engine::Config;

mod common;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
}

fn build_app(pool: sqlx::PgPool, clock: Arc<FixedClock>) -> Router {
    let store = Store::new(pool);
    let config = Arc::new(Config::from_env().expect("test env must provide DATABASE_URL"));
    let state = AppState::new(store, clock, config);
    api::create_router(state)
}

fn local_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 0))
}

fn authed_request(method: &str, uri: &str, key: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .extension(ConnectInfo(local_addr()));

    if let Some(key) = key {
        builder = builder.header("Authorization", format!("Bearer {}", key));
    }

    let payload = if body.is_null() {
        Body::empty()
    } else {
        Body::from(serde_json::to_vec(&body).unwrap())
    };

    builder.body(payload).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn create_event(
    app: &Router,
    owner_key: &str,
    title: &str,
    date_time: DateTime<Utc>,
    capacity: i32,
) -> (StatusCode, Value) {
    let req = authed_request(
        "POST",
        "/api/events",
        Some(owner_key),
        json!({
            "title": title,
            "description": "An event",
            "date_time": date_time.to_rfc3339(),
            "location": "Main Hall",
            "capacity": capacity,
        }),
    );
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

async fn register(app: &Router, user_key: &str, event_id: Uuid) -> (StatusCode, Value) {
    let req = authed_request(
        "POST",
        &format!("/api/events/{}/register", event_id),
        Some(user_key),
        Value::Null,
    );
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

async fn cancel(app: &Router, actor_key: &str, event_id: Uuid, target_user_id: Uuid) -> (StatusCode, Value) {
    let req = authed_request(
        "DELETE",
        &format!("/api/events/{}/register/{}", event_id, target_user_id),
        Some(actor_key),
        Value::Null,
    );
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

async fn get_event(app: &Router, viewer_key: Option<&str>, event_id: Uuid) -> (StatusCode, Value) {
    let req = authed_request("GET", &format!("/api/events/{}", event_id), viewer_key, Value::Null);
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

async fn get_stats(app: &Router, event_id: Uuid) -> (StatusCode, Value) {
    let req = authed_request("GET", &format!("/api/events/{}/stats", event_id), None, Value::Null);
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

async fn delete_event(app: &Router, owner_key: &str, event_id: Uuid) -> (StatusCode, Value) {
    let req = authed_request(
        "DELETE",
        &format!("/api/events/{}", event_id),
        Some(owner_key),
        Value::Null,
    );
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

#[tokio::test]
async fn test_happy_path_create_register_full() {
    let pool = common::setup_test_db().await;
    let clock = Arc::new(FixedClock::new(t0()));
    let app = build_app(pool.clone(), clock);

    let (owner_id, owner_key) = common::seed_principal(&pool, "Owner A", "owner-a@example.com").await;
    let _ = owner_id;
    let (_, b_key) = common::seed_principal(&pool, "User B", "b@example.com").await;
    let (_, c_key) = common::seed_principal(&pool, "User C", "c@example.com").await;
    let (_, d_key) = common::seed_principal(&pool, "User D", "d@example.com").await;
    let (_, f_key) = common::seed_principal(&pool, "User F", "f@example.com").await;

    let (status, created) = create_event(&app, &owner_key, "Launch Party", t0() + Duration::days(14), 3).await;
    assert_eq!(status, StatusCode::CREATED);
    let event_id: Uuid = created["data"]["id"].as_str().unwrap().parse().unwrap();

    for key in [&b_key, &c_key, &d_key] {
        let (status, _) = register(&app, key, event_id).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = register(&app, &f_key, event_id).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("capacity"));

    let (status, stats) = get_stats(&app, event_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["data"]["confirmed_count"], 3);
    assert_eq!(stats["data"]["registration_rate_percentage"], 100.0);
}

#[tokio::test]
async fn test_cancel_frees_a_spot() {
    let pool = common::setup_test_db().await;
    let clock = Arc::new(FixedClock::new(t0()));
    let app = build_app(pool.clone(), clock);

    let (_, owner_key) = common::seed_principal(&pool, "Owner", "owner@example.com").await;
    let (b_id, b_key) = common::seed_principal(&pool, "User B", "b2@example.com").await;
    let (_, f_key) = common::seed_principal(&pool, "User F", "f2@example.com").await;

    let (_, created) = create_event(&app, &owner_key, "Small Gathering", t0() + Duration::days(14), 1).await;
    let event_id: Uuid = created["data"]["id"].as_str().unwrap().parse().unwrap();

    let (status, _) = register(&app, &b_key, event_id).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = cancel(&app, &b_key, event_id, b_id).await;
    assert_eq!(status, StatusCode::OK);

    let (status, view) = get_event(&app, Some(&b_key), event_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["data"]["available_spots"], 1);
    assert_eq!(view["data"]["is_full"], false);

    let (status, _) = register(&app, &f_key, event_id).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_reactivation_after_cancel() {
    let pool = common::setup_test_db().await;
    let clock = Arc::new(FixedClock::new(t0()));
    let app = build_app(pool.clone(), clock);

    let (_, owner_key) = common::seed_principal(&pool, "Owner", "owner3@example.com").await;
    let (b_id, b_key) = common::seed_principal(&pool, "User B", "b3@example.com").await;

    let (_, created) = create_event(&app, &owner_key, "Workshop G", t0() + Duration::days(7), 5).await;
    let event_id: Uuid = created["data"]["id"].as_str().unwrap().parse().unwrap();

    let (status, _) = register(&app, &b_key, event_id).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = cancel(&app, &b_key, event_id, b_id).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = register(&app, &b_key, event_id).await;
    assert_eq!(status, StatusCode::OK, "reactivation should succeed: {body:?}");
    assert_eq!(body["message"], "reactivated");

    let (_, stats) = get_stats(&app, event_id).await;
    assert_eq!(stats["data"]["confirmed_count"], 1);
}

#[tokio::test]
async fn test_forbidden_cancel_of_another_users_registration() {
    let pool = common::setup_test_db().await;
    let clock = Arc::new(FixedClock::new(t0()));
    let app = build_app(pool.clone(), clock);

    let (_, owner_key) = common::seed_principal(&pool, "Owner", "owner4@example.com").await;
    let (b_id, b_key) = common::seed_principal(&pool, "User B", "b4@example.com").await;
    let (_, c_key) = common::seed_principal(&pool, "User C", "c4@example.com").await;

    let (_, created) = create_event(&app, &owner_key, "Forbidden Cancel Event", t0() + Duration::days(14), 10).await;
    let event_id: Uuid = created["data"]["id"].as_str().unwrap().parse().unwrap();

    let (status, _) = register(&app, &b_key, event_id).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = cancel(&app, &c_key, event_id, b_id).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("only cancel your own"));

    let (status, view) = get_event(&app, Some(&b_key), event_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["data"]["user_permissions"]["is_registered"], true);
}

#[tokio::test]
async fn test_scheduling_conflict_within_one_hour_window() {
    let pool = common::setup_test_db().await;
    let clock = Arc::new(FixedClock::new(t0()));
    let app = build_app(pool.clone(), clock);

    let (_, owner_key) = common::seed_principal(&pool, "Owner A", "owner5@example.com").await;
    let (_, other_owner_key) = common::seed_principal(&pool, "Owner Z", "ownerz@example.com").await;

    let first_slot = t0() + Duration::days(14) + Duration::hours(9);
    let (status, _) = create_event(&app, &owner_key, "Morning Session", first_slot, 10).await;
    assert_eq!(status, StatusCode::CREATED);

    let conflicting_slot = first_slot + Duration::minutes(30);
    let (status, body) = create_event(&app, &owner_key, "Overlapping Session", conflicting_slot, 10).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["message"].as_str().unwrap().contains("within"));

    let (status, _) = create_event(&app, &other_owner_key, "Unrelated Session", first_slot, 10).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_registering_for_a_past_event_is_rejected() {
    let pool = common::setup_test_db().await;
    let clock = Arc::new(FixedClock::new(t0()));
    let app = build_app(pool.clone(), clock.clone());

    let (_, owner_key) = common::seed_principal(&pool, "Owner", "owner6@example.com").await;
    let (_, b_key) = common::seed_principal(&pool, "User B", "b6@example.com").await;

    let (_, created) = create_event(&app, &owner_key, "Soon Event", t0() + Duration::hours(2), 5).await;
    let event_id: Uuid = created["data"]["id"].as_str().unwrap().parse().unwrap();

    // Advance the clock past the event's start; Register must now see it as past.
    clock.advance(Duration::hours(3));

    let (status, body) = register(&app, &b_key, event_id).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().to_lowercase().contains("started"));
}

#[tokio::test]
async fn test_unauthenticated_register_is_rejected() {
    let pool = common::setup_test_db().await;
    let clock = Arc::new(FixedClock::new(t0()));
    let app = build_app(pool.clone(), clock);

    let (_, owner_key) = common::seed_principal(&pool, "Owner", "owner7@example.com").await;
    let (_, created) = create_event(&app, &owner_key, "Needs Auth", t0() + Duration::days(5), 5).await;
    let event_id: Uuid = created["data"]["id"].as_str().unwrap().parse().unwrap();

    let req = authed_request(
        "POST",
        &format!("/api/events/{}/register", event_id),
        None,
        Value::Null,
    );
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_concurrent_registrations_respect_capacity() {
    let pool = common::setup_test_db().await;
    let clock = Arc::new(FixedClock::new(t0()));
    let app = build_app(pool.clone(), clock);

    let (_, owner_key) = common::seed_principal(&pool, "Owner", "owner8@example.com").await;
    let (_, created) = create_event(&app, &owner_key, "Capacity Three", t0() + Duration::days(14), 3).await;
    let event_id: Uuid = created["data"]["id"].as_str().unwrap().parse().unwrap();

    let mut keys = Vec::with_capacity(10);
    for i in 0..10 {
        let (_, key) = common::seed_principal(&pool, &format!("Attendee {i}"), &format!("attendee{i}@example.com")).await;
        keys.push(key);
    }

    let mut handles = Vec::with_capacity(10);
    for key in keys {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            let req = authed_request(
                "POST",
                &format!("/api/events/{}/register", event_id),
                Some(&key),
                Value::Null,
            );
            app.oneshot(req).await.unwrap().status()
        }));
    }

    let mut success_count = 0;
    let mut failure_count = 0;
    for handle in handles {
        match handle.await.unwrap() {
            StatusCode::CREATED => success_count += 1,
            StatusCode::BAD_REQUEST => failure_count += 1,
            other => panic!("unexpected status {other}"),
        }
    }

    assert_eq!(success_count, 3);
    assert_eq!(failure_count, 7);

    let (_, stats) = get_stats(&app, event_id).await;
    assert_eq!(stats["data"]["confirmed_count"], 3);
}

#[tokio::test]
async fn test_soft_deleted_event_hides_from_get_event_and_stats() {
    let pool = common::setup_test_db().await;
    let clock = Arc::new(FixedClock::new(t0()));
    let app = build_app(pool.clone(), clock);

    let (_, owner_key) = common::seed_principal(&pool, "Owner", "owner9@example.com").await;
    let (_, b_key) = common::seed_principal(&pool, "User B", "b9@example.com").await;

    let (_, created) = create_event(&app, &owner_key, "Doomed Event", t0() + Duration::days(14), 5).await;
    let event_id: Uuid = created["data"]["id"].as_str().unwrap().parse().unwrap();

    let (status, _) = register(&app, &b_key, event_id).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = delete_event(&app, &owner_key, event_id).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get_event(&app, Some(&b_key), event_id).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get_stats(&app, event_id).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
