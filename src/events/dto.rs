//! Data transfer types for the Event Service: drafts, views, filters, pages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::EventRow;

/// Validated input to `EventService::create_event`. Construction goes
/// through `EventDraft::validate`, which turns raw strings/numbers into the
/// primitive newtypes (`Title`, `Description`, `Location`, `Capacity`,
/// `EventWindow`) before anything touches the store.
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub title: String,
    pub description: Option<String>,
    pub date_time: DateTime<Utc>,
    pub location: Option<String>,
    pub capacity: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserPermissions {
    pub can_edit: bool,
    pub is_registered: bool,
    pub can_register: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AttendeeView {
    Full(Vec<AttendeeDetail>),
    CountOnly { count: i64 },
}

#[derive(Debug, Clone, Serialize)]
pub struct AttendeeDetail {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub registered_at: DateTime<Utc>,
}

/// An event plus the viewer-dependent derived fields of §4.4 GetEvent.
#[derive(Debug, Clone, Serialize)]
pub struct EventView {
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

    pub available_spots: i32,
    pub is_full: bool,
    pub time_until_event_seconds: i64,
    pub has_started: bool,
    pub user_permissions: UserPermissions,
    pub registered_users: AttendeeView,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventSummary {
    pub id: Uuid,
    pub title: String,
    pub date_time: DateTime<Utc>,
    pub location: Option<String>,
    pub capacity: i32,
    pub current_registrations: i32,
    pub available_spots: i32,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<&EventRow> for EventSummary {
    fn from(row: &EventRow) -> Self {
        Self {
            id: row.id,
            title: row.title.clone(),
            date_time: row.date_time,
            location: row.location.clone(),
            capacity: row.capacity,
            current_registrations: row.current_registrations,
            available_spots: row.capacity - row.current_registrations,
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    DateTime,
    Title,
    Capacity,
    CurrentRegistrations,
    CreatedAt,
}

impl Default for SortBy {
    fn default() -> Self {
        Self::DateTime
    }
}

impl SortBy {
    pub fn column(self) -> &'static str {
        match self {
            Self::DateTime => "date_time",
            Self::Title => "title",
            Self::Capacity => "capacity",
            Self::CurrentRegistrations => "current_registrations",
            Self::CreatedAt => "created_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl Default for SortOrder {
    fn default() -> Self {
        Self::Asc
    }
}

impl SortOrder {
    pub fn sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventFilter {
    pub search: Option<String>,
    pub location: Option<String>,
    pub min_capacity: Option<i32>,
    pub max_capacity: Option<i32>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sort_by: SortBy,
    #[serde(default)]
    pub sort_order: SortOrder,
}

#[derive(Debug, Clone)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    /// Clamp to the contract of §4.4: 1-based page, limit in [1, 100].
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(10).clamp(1, 100);
        Self { page, limit }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

#[derive(Debug, Clone)]
pub struct EventUpdate {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub location: Option<Option<String>>,
    pub date_time: Option<DateTime<Utc>>,
    pub capacity: Option<i32>,
}
