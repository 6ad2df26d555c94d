//! Common test utilities
//!
//! Seeds a fresh schema snapshot for each test run against a real Postgres
//! instance reachable via `DATABASE_URL`. Mirrors the teacher's
//! `setup_test_db` shape (truncate, then seed the fixtures a test needs)
//! but seeds users/events/registrations/api_keys instead of
//! users/accounts/event-sourcing rows.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use registry_engine::identity::hash_key;

/// Connect to the test database and truncate every table this crate owns.
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    sqlx::query("TRUNCATE TABLE registrations, events, api_keys, rate_limit_buckets, users CASCADE")
        .execute(&pool)
        .await
        .expect("Failed to clean up DB");

    pool
}

/// Insert a user row directly; user account management is out of this
/// crate's scope (§1 Non-goals), so tests seed identities straight into the
/// store rather than going through an HTTP endpoint.
pub async fn seed_user(pool: &PgPool, name: &str, email: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO users (id, name, email, password_hash, is_active, created_at, updated_at)
        VALUES ($1, $2, $3, 'test_hash', true, NOW(), NOW())
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(email)
    .execute(pool)
    .await
    .expect("Failed to seed user");

    id
}

/// Issue a raw bearer credential for `principal_id`, seeding the
/// corresponding `api_keys` row with the given permission set. Returns the
/// raw key string to present as `Authorization: Bearer <key>`.
pub async fn seed_api_key(pool: &PgPool, principal_id: Uuid, permissions: &[&str]) -> String {
    let raw_key = format!("evt_test_{}", Uuid::new_v4().simple());
    let key_hash = hash_key(&raw_key);
    let key_prefix = raw_key[..8].to_string();

    sqlx::query(
        r#"
        INSERT INTO api_keys (
            id, name, key_prefix, key_hash, principal_id, permissions,
            rate_limit_per_minute, is_active, created_at, last_used_at
        )
        VALUES ($1, 'test key', $2, $3, $4, $5, 1000, true, NOW(), NULL)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&key_prefix)
    .bind(&key_hash)
    .bind(principal_id)
    .bind(permissions.iter().map(|s| s.to_string()).collect::<Vec<_>>())
    .execute(pool)
    .await
    .expect("Failed to seed API key");

    raw_key
}

/// Seed a user plus a non-elevated API key bound to it in one step, the
/// shape almost every test needs.
pub async fn seed_principal(pool: &PgPool, name: &str, email: &str) -> (Uuid, String) {
    let user_id = seed_user(pool, name, email).await;
    let key = seed_api_key(pool, user_id, &["events:write"]).await;
    (user_id, key)
}
