//! Response types for `StatsService::get_stats`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct CapacityUtilization {
    pub used: i32,
    pub available: i32,
    pub percentage_full: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HourlyBucket {
    pub hour: DateTime<Utc>,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentRegistration {
    pub name: String,
    pub registered_at: DateTime<Utc>,
}

/// Counts and percentage-of-total for one registration status.
#[derive(Debug, Clone, Serialize)]
pub struct StatusBreakdown {
    pub count: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub event_id: Uuid,
    pub capacity: i32,
    pub confirmed_count: i64,
    pub cancelled_count: i64,
    pub waitlist_count: i64,
    pub pending_count: i64,
    pub total_count: i64,
    pub confirmed: StatusBreakdown,
    pub cancelled: StatusBreakdown,
    pub waitlist: StatusBreakdown,
    pub pending: StatusBreakdown,
    pub registration_rate_percentage: f64,
    pub first_registration: Option<DateTime<Utc>>,
    pub latest_registration: Option<DateTime<Utc>>,
    pub average_registration_delay_hours: Option<f64>,
    pub capacity_utilization: CapacityUtilization,
    pub time_until_event_seconds: i64,
    pub is_event_soon: bool,
    pub hourly_timeline: Vec<HourlyBucket>,
    pub recent_registrations: Vec<RecentRegistration>,
}
