//! Store
//!
//! Transactional repository over the `users`, `events`, `registrations`
//! schema. Exposes a read transaction (snapshot) and a write transaction
//! (row-locking) the same way the teacher's `EventStore` wraps `PgPool`
//! transactions, but mutates rows directly instead of appending events.

pub mod error;
pub mod models;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

pub use error::StoreError;
pub use models::{ApiKeyRow, EventRow, RegistrationRow, RegistrationStatus, UserRow};

/// A write transaction: row locks taken inside it are held until commit or
/// rollback, giving the per-event serializer of the registration engine.
pub type Tx<'c> = Transaction<'c, Postgres>;

#[derive(Debug, Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Begin a transaction. Callers choose read vs. write semantics by
    /// whether they follow up with `lock_event_for_update` (write) or plain
    /// `SELECT`s (read, a consistent snapshot under Postgres MVCC).
    pub async fn begin(&self) -> Result<Tx<'_>, StoreError> {
        Ok(self.pool.begin().await?)
    }

    // ---------------------------------------------------------------
    // Event row access
    // ---------------------------------------------------------------

    /// Lock the event row for update. All registration mutations for a
    /// given event acquire this lock first, so they are totally ordered by
    /// the order in which they acquire it.
    pub async fn lock_event_for_update(
        &self,
        tx: &mut Tx<'_>,
        event_id: Uuid,
    ) -> Result<Option<EventRow>, StoreError> {
        let row = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT id, title, description, date_time, location, capacity,
                   current_registrations, created_by, is_active, created_at, updated_at
            FROM events
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(event_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(row)
    }

    pub async fn find_event_tx(
        &self,
        tx: &mut Tx<'_>,
        event_id: Uuid,
    ) -> Result<Option<EventRow>, StoreError> {
        let row = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT id, title, description, date_time, location, capacity,
                   current_registrations, created_by, is_active, created_at, updated_at
            FROM events
            WHERE id = $1
            "#,
        )
        .bind(event_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(row)
    }

    pub async fn insert_event(
        &self,
        tx: &mut Tx<'_>,
        title: &str,
        description: Option<&str>,
        date_time: DateTime<Utc>,
        location: Option<&str>,
        capacity: i32,
        created_by: Uuid,
    ) -> Result<EventRow, StoreError> {
        let row = sqlx::query_as::<_, EventRow>(
            r#"
            INSERT INTO events (
                id, title, description, date_time, location, capacity,
                current_registrations, created_by, is_active, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, 0, $7, true, NOW(), NOW())
            RETURNING id, title, description, date_time, location, capacity,
                      current_registrations, created_by, is_active, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(title)
        .bind(description)
        .bind(date_time)
        .bind(location)
        .bind(capacity)
        .bind(created_by)
        .fetch_one(&mut **tx)
        .await?;

        Ok(row)
    }

    /// Any active event owned by `owner_id` whose `date_time` falls within
    /// `[from, to]` (inclusive), used by the scheduling-conflict check.
    pub async fn find_owner_event_in_window(
        &self,
        tx: &mut Tx<'_>,
        owner_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        exclude_event_id: Option<Uuid>,
    ) -> Result<Option<EventRow>, StoreError> {
        let row = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT id, title, description, date_time, location, capacity,
                   current_registrations, created_by, is_active, created_at, updated_at
            FROM events
            WHERE created_by = $1
              AND is_active = true
              AND date_time BETWEEN $2 AND $3
              AND ($4::uuid IS NULL OR id != $4)
            LIMIT 1
            "#,
        )
        .bind(owner_id)
        .bind(from)
        .bind(to)
        .bind(exclude_event_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(row)
    }

    pub async fn update_event_fields(
        &self,
        tx: &mut Tx<'_>,
        event_id: Uuid,
        title: Option<&str>,
        description: Option<Option<&str>>,
        location: Option<Option<&str>>,
        date_time: Option<DateTime<Utc>>,
        capacity: Option<i32>,
    ) -> Result<EventRow, StoreError> {
        if let Some(title) = title {
            sqlx::query("UPDATE events SET title = $2, updated_at = NOW() WHERE id = $1")
                .bind(event_id)
                .bind(title)
                .execute(&mut **tx)
                .await?;
        }
        if let Some(description) = description {
            sqlx::query("UPDATE events SET description = $2, updated_at = NOW() WHERE id = $1")
                .bind(event_id)
                .bind(description)
                .execute(&mut **tx)
                .await?;
        }
        if let Some(location) = location {
            sqlx::query("UPDATE events SET location = $2, updated_at = NOW() WHERE id = $1")
                .bind(event_id)
                .bind(location)
                .execute(&mut **tx)
                .await?;
        }
        if let Some(date_time) = date_time {
            sqlx::query("UPDATE events SET date_time = $2, updated_at = NOW() WHERE id = $1")
                .bind(event_id)
                .bind(date_time)
                .execute(&mut **tx)
                .await?;
        }
        if let Some(capacity) = capacity {
            let result = sqlx::query(
                r#"
                UPDATE events SET capacity = $2, updated_at = NOW()
                WHERE id = $1 AND current_registrations <= $2
                "#,
            )
            .bind(event_id)
            .bind(capacity)
            .execute(&mut **tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(StoreError::CounterOutOfBounds);
            }
        }

        self.find_event_tx(tx, event_id)
            .await?
            .ok_or(StoreError::EventNotFound)
    }

    pub async fn delete_event(&self, tx: &mut Tx<'_>, event_id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(event_id)
            .execute(&mut **tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::EventNotFound);
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // User row access
    // ---------------------------------------------------------------

    pub async fn find_user(&self, tx: &mut Tx<'_>, user_id: Uuid) -> Result<Option<UserRow>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, name, email, password_hash, is_active, created_at, updated_at
            FROM users WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(row)
    }

    pub async fn find_user_pool(&self, user_id: Uuid) -> Result<Option<UserRow>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, name, email, password_hash, is_active, created_at, updated_at
            FROM users WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    // ---------------------------------------------------------------
    // Registration row access
    // ---------------------------------------------------------------

    pub async fn find_registration(
        &self,
        tx: &mut Tx<'_>,
        user_id: Uuid,
        event_id: Uuid,
    ) -> Result<Option<RegistrationRow>, StoreError> {
        let row = sqlx::query_as::<_, RegistrationRow>(
            r#"
            SELECT id, user_id, event_id, registered_at, status
            FROM registrations
            WHERE user_id = $1 AND event_id = $2
            "#,
        )
        .bind(user_id)
        .bind(event_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(row)
    }

    pub async fn insert_registration(
        &self,
        tx: &mut Tx<'_>,
        user_id: Uuid,
        event_id: Uuid,
        status: RegistrationStatus,
        registered_at: DateTime<Utc>,
    ) -> Result<Uuid, StoreError> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO registrations (id, user_id, event_id, registered_at, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(event_id)
        .bind(registered_at)
        .bind(status)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => StoreError::UniqueViolation,
            _ => StoreError::from(e),
        })?;

        Ok(id)
    }

    pub async fn update_registration_status(
        &self,
        tx: &mut Tx<'_>,
        id: Uuid,
        status: RegistrationStatus,
        registered_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE registrations
            SET status = $2, registered_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(registered_at)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::RegistrationNotFound);
        }
        Ok(())
    }

    /// Bounds-checked counter bump: fails if the result would leave
    /// `current_registrations` outside `[0, capacity]`. The `CHECK`
    /// constraint on the column is defense-in-depth for the same rule.
    pub async fn bump_event_counter(
        &self,
        tx: &mut Tx<'_>,
        event_id: Uuid,
        delta: i32,
    ) -> Result<EventRow, StoreError> {
        debug_assert!(delta == 1 || delta == -1);

        let row = sqlx::query_as::<_, EventRow>(
            r#"
            UPDATE events
            SET current_registrations = current_registrations + $2, updated_at = NOW()
            WHERE id = $1
              AND current_registrations + $2 >= 0
              AND current_registrations + $2 <= capacity
            RETURNING id, title, description, date_time, location, capacity,
                      current_registrations, created_by, is_active, created_at, updated_at
            "#,
        )
        .bind(event_id)
        .bind(delta)
        .fetch_optional(&mut **tx)
        .await?;

        row.ok_or(StoreError::CounterOutOfBounds)
    }

    /// Counts confirmed registrations for an event directly, used by the
    /// counter-reconciliation background job and by statistics.
    pub async fn count_confirmed(&self, event_id: Uuid) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM registrations WHERE event_id = $1 AND status = 'confirmed'",
        )
        .bind(event_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Read an event's registrations inside the caller's transaction, so a
    /// GetEvent/Statistics snapshot sees them at the same instant as the
    /// event row (§4.5, §5).
    pub async fn registrations_for_event_tx(
        &self,
        tx: &mut Tx<'_>,
        event_id: Uuid,
    ) -> Result<Vec<RegistrationRow>, StoreError> {
        let rows = sqlx::query_as::<_, RegistrationRow>(
            r#"
            SELECT id, user_id, event_id, registered_at, status
            FROM registrations
            WHERE event_id = $1
            ORDER BY registered_at ASC
            "#,
        )
        .bind(event_id)
        .fetch_all(&mut **tx)
        .await?;

        Ok(rows)
    }

    /// Attendee identities for a confirmed registration list, visible to
    /// the owner or a confirmed attendee (§4.4 GetEvent visibility rule).
    /// Read inside the caller's transaction for the same reason as
    /// `registrations_for_event_tx`.
    pub async fn confirmed_attendees_tx(
        &self,
        tx: &mut Tx<'_>,
        event_id: Uuid,
    ) -> Result<Vec<(Uuid, String, String, DateTime<Utc>)>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT u.id, u.name, u.email, r.registered_at
            FROM registrations r
            JOIN users u ON u.id = r.user_id
            WHERE r.event_id = $1 AND r.status = 'confirmed'
            ORDER BY r.registered_at ASC
            "#,
        )
        .bind(event_id)
        .fetch_all(&mut **tx)
        .await?
        .into_iter()
        .map(|row| {
            (
                row.get::<Uuid, _>(0),
                row.get::<String, _>(1),
                row.get::<String, _>(2),
                row.get::<DateTime<Utc>, _>(3),
            )
        })
        .collect();

        Ok(rows)
    }

    // ---------------------------------------------------------------
    // Identity adapter support
    // ---------------------------------------------------------------

    pub async fn find_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKeyRow>, StoreError> {
        let row = sqlx::query_as::<_, ApiKeyRow>(
            r#"
            SELECT id, name, key_prefix, key_hash, principal_id, permissions,
                   rate_limit_per_minute, is_active, created_at, last_used_at
            FROM api_keys
            WHERE key_hash = $1
            "#,
        )
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn touch_api_key(&self, api_key_id: Uuid) -> Result<(), StoreError> {
        sqlx::query("UPDATE api_keys SET last_used_at = NOW() WHERE id = $1")
            .bind(api_key_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
