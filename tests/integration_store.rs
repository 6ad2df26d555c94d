//! Integration tests for the `Store` layer against a real Postgres instance.
//!
//! Exercises row locking, the bounds-checked counter bump, and the
//! uniqueness/foreign-key constraints the storage layer enforces as
//! defense-in-depth (§4.1) independent of the Registration Engine that
//! normally sits in front of it.

use chrono::{Duration, Utc};
use registry_engine::store::{RegistrationStatus, Store};

mod common;

#[tokio::test]
async fn test_insert_and_find_event() {
    let pool = common::setup_test_db().await;
    let store = Store::new(pool.clone());
    let owner = common::seed_user(&pool, "Owner", "owner@example.com").await;

    let mut tx = store.begin().await.unwrap();
    let created = store
        .insert_event(
            &mut tx,
            "Rust Meetup",
            Some("Monthly meetup"),
            Utc::now() + Duration::days(10),
            Some("Remote"),
            10,
            owner,
        )
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(created.current_registrations, 0);
    assert!(created.is_active);

    let mut tx = store.begin().await.unwrap();
    let found = store.find_event_tx(&mut tx, created.id).await.unwrap().unwrap();
    tx.commit().await.unwrap();
    assert_eq!(found.id, created.id);
    assert_eq!(found.capacity, 10);
}

#[tokio::test]
async fn test_lock_event_for_update_returns_none_for_missing_event() {
    let pool = common::setup_test_db().await;
    let store = Store::new(pool.clone());

    let mut tx = store.begin().await.unwrap();
    let missing = store
        .lock_event_for_update(&mut tx, uuid::Uuid::new_v4())
        .await
        .unwrap();
    tx.rollback().await.unwrap();

    assert!(missing.is_none());
}

#[tokio::test]
async fn test_bump_event_counter_respects_capacity_bound() {
    let pool = common::setup_test_db().await;
    let store = Store::new(pool.clone());
    let owner = common::seed_user(&pool, "Owner", "owner2@example.com").await;

    let mut tx = store.begin().await.unwrap();
    let event = store
        .insert_event(&mut tx, "Small Event", None, Utc::now() + Duration::days(5), None, 1, owner)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let bumped = store.bump_event_counter(&mut tx, event.id, 1).await.unwrap();
    assert_eq!(bumped.current_registrations, 1);
    tx.commit().await.unwrap();

    // A second +1 would push current_registrations above capacity=1 and
    // must fail rather than silently overshoot.
    let mut tx = store.begin().await.unwrap();
    let overflow = store.bump_event_counter(&mut tx, event.id, 1).await;
    assert!(overflow.is_err());
    tx.rollback().await.unwrap();
}

#[tokio::test]
async fn test_bump_event_counter_rejects_negative_underflow() {
    let pool = common::setup_test_db().await;
    let store = Store::new(pool.clone());
    let owner = common::seed_user(&pool, "Owner", "owner3@example.com").await;

    let mut tx = store.begin().await.unwrap();
    let event = store
        .insert_event(&mut tx, "Empty Event", None, Utc::now() + Duration::days(5), None, 5, owner)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let underflow = store.bump_event_counter(&mut tx, event.id, -1).await;
    assert!(underflow.is_err());
    tx.rollback().await.unwrap();
}

#[tokio::test]
async fn test_registration_uniqueness_per_user_event_pair() {
    let pool = common::setup_test_db().await;
    let store = Store::new(pool.clone());
    let owner = common::seed_user(&pool, "Owner", "owner4@example.com").await;
    let attendee = common::seed_user(&pool, "Attendee", "attendee@example.com").await;

    let mut tx = store.begin().await.unwrap();
    let event = store
        .insert_event(&mut tx, "Conference", None, Utc::now() + Duration::days(20), None, 100, owner)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    store
        .insert_registration(&mut tx, attendee, event.id, RegistrationStatus::Confirmed, Utc::now())
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let duplicate = store
        .insert_registration(&mut tx, attendee, event.id, RegistrationStatus::Confirmed, Utc::now())
        .await;
    tx.rollback().await.unwrap();

    assert!(matches!(
        duplicate,
        Err(registry_engine::store::StoreError::UniqueViolation)
    ));
}

#[tokio::test]
async fn test_registration_status_round_trips_through_cancellation() {
    let pool = common::setup_test_db().await;
    let store = Store::new(pool.clone());
    let owner = common::seed_user(&pool, "Owner", "owner5@example.com").await;
    let attendee = common::seed_user(&pool, "Attendee", "attendee2@example.com").await;

    let mut tx = store.begin().await.unwrap();
    let event = store
        .insert_event(&mut tx, "Workshop", None, Utc::now() + Duration::days(3), None, 20, owner)
        .await
        .unwrap();
    let reg_id = store
        .insert_registration(&mut tx, attendee, event.id, RegistrationStatus::Confirmed, Utc::now())
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    store
        .update_registration_status(&mut tx, reg_id, RegistrationStatus::Cancelled, Utc::now())
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let reg = store.find_registration(&mut tx, attendee, event.id).await.unwrap().unwrap();
    tx.rollback().await.unwrap();

    assert_eq!(reg.status, RegistrationStatus::Cancelled);
}

#[tokio::test]
async fn test_find_owner_event_in_window_detects_overlap() {
    let pool = common::setup_test_db().await;
    let store = Store::new(pool.clone());
    let owner = common::seed_user(&pool, "Owner", "owner6@example.com").await;

    let anchor = Utc::now() + Duration::days(14);

    let mut tx = store.begin().await.unwrap();
    store
        .insert_event(&mut tx, "Existing Event", None, anchor, None, 10, owner)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let conflict = store
        .find_owner_event_in_window(
            &mut tx,
            owner,
            anchor - Duration::hours(1),
            anchor + Duration::hours(1),
            None,
        )
        .await
        .unwrap();
    tx.rollback().await.unwrap();

    assert!(conflict.is_some());
}
