//! Row types for the `users`, `events`, `registrations` tables.
//!
//! These are plain data carriers returned by the `Store`; they do not carry
//! a live connection or any behavior beyond field access, so their identity
//! never has to survive past the transaction that produced them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRow {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub date_time: DateTime<Utc>,
    pub location: Option<String>,
    pub capacity: i32,
    pub current_registrations: i32,
    pub created_by: Uuid,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EventRow {
    pub fn is_full(&self) -> bool {
        self.current_registrations >= self.capacity
    }

    pub fn is_past(&self, now: DateTime<Utc>) -> bool {
        self.date_time <= now
    }
}

/// Status of a registration row. `Waitlist` and `Pending` are reserved: the
/// schema and this enum carry them, but no code path in the registration
/// engine produces them (no waitlist policy is defined).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum RegistrationStatus {
    Confirmed,
    Cancelled,
    Waitlist,
    Pending,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Waitlist => "waitlist",
            Self::Pending => "pending",
        }
    }
}

impl std::fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RegistrationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub registered_at: DateTime<Utc>,
    pub status: RegistrationStatus,
}

/// An API key backing the identity adapter. Not part of the core business
/// invariants; exists purely to resolve a bearer credential to a principal.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiKeyRow {
    pub id: Uuid,
    pub name: String,
    pub key_prefix: String,
    pub key_hash: String,
    pub principal_id: Uuid,
    pub permissions: Vec<String>,
    pub rate_limit_per_minute: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl ApiKeyRow {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission || p == "admin")
    }
}
