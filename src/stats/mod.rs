//! Statistics Service
//!
//! Computes a single read-consistent snapshot of an event's registration
//! activity. Everything here is derived, read-only arithmetic over rows the
//! `Store` already exposes; nothing here mutates state, so it needs no lock
//! and no retry loop, unlike the registration engine.

pub mod dto;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Clock, DomainError};
use crate::error::AppError;
use crate::store::{RegistrationStatus, Store};

pub use dto::{CapacityUtilization, HourlyBucket, RecentRegistration, StatsSnapshot, StatusBreakdown};

pub struct StatsService {
    store: Store,
    clock: Arc<dyn Clock>,
}

impl StatsService {
    pub fn new(store: Store, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn get_stats(&self, event_id: Uuid) -> Result<StatsSnapshot, AppError> {
        let mut tx = self.store.begin().await?;

        let event = self
            .store
            .find_event_tx(&mut tx, event_id)
            .await?
            .filter(|e| e.is_active)
            .ok_or_else(|| DomainError::EventNotFound(event_id.to_string()))?;

        let registrations = self.store.registrations_for_event_tx(&mut tx, event_id).await?;
        let now = self.clock.now();

        let confirmed: Vec<_> = registrations
            .iter()
            .filter(|r| r.status == RegistrationStatus::Confirmed)
            .collect();
        let cancelled_count = count_status(&registrations, RegistrationStatus::Cancelled);
        let waitlist_count = count_status(&registrations, RegistrationStatus::Waitlist);
        let pending_count = count_status(&registrations, RegistrationStatus::Pending);
        let confirmed_count = confirmed.len() as i64;
        let total_count = registrations.len() as i64;

        let pct = |count: i64| -> f64 {
            if total_count > 0 {
                round2(count as f64 / total_count as f64 * 100.0)
            } else {
                0.0
            }
        };

        let registration_rate_percentage = if event.capacity > 0 {
            round2(event.current_registrations as f64 / event.capacity as f64 * 100.0)
        } else {
            0.0
        };

        let first_registration = confirmed.iter().map(|r| r.registered_at).min();
        let latest_registration = confirmed.iter().map(|r| r.registered_at).max();

        let average_registration_delay_hours = average_delay_hours(&confirmed, event.created_at);

        let capacity_utilization = CapacityUtilization {
            used: event.current_registrations,
            available: event.capacity - event.current_registrations,
            percentage_full: registration_rate_percentage,
        };

        let time_until_event_seconds = (event.date_time - now).num_seconds();
        let is_event_soon = time_until_event_seconds > 0 && time_until_event_seconds < 24 * 3600;

        let hourly_timeline = hourly_timeline(&confirmed);

        let attendees = self.store.confirmed_attendees_tx(&mut tx, event_id).await?;
        tx.commit().await?;

        let mut recent: Vec<_> = attendees;
        recent.sort_by(|a, b| b.3.cmp(&a.3));
        let recent_registrations = recent
            .into_iter()
            .take(10)
            .map(|(_id, name, _email, registered_at)| RecentRegistration { name, registered_at })
            .collect();

        Ok(StatsSnapshot {
            event_id,
            capacity: event.capacity,
            confirmed_count,
            cancelled_count,
            waitlist_count,
            pending_count,
            total_count,
            confirmed: StatusBreakdown { count: confirmed_count, percentage: pct(confirmed_count) },
            cancelled: StatusBreakdown { count: cancelled_count, percentage: pct(cancelled_count) },
            waitlist: StatusBreakdown { count: waitlist_count, percentage: pct(waitlist_count) },
            pending: StatusBreakdown { count: pending_count, percentage: pct(pending_count) },
            registration_rate_percentage,
            first_registration,
            latest_registration,
            average_registration_delay_hours,
            capacity_utilization,
            time_until_event_seconds,
            is_event_soon,
            hourly_timeline,
            recent_registrations,
        })
    }
}

fn count_status(registrations: &[crate::store::RegistrationRow], status: RegistrationStatus) -> i64 {
    registrations.iter().filter(|r| r.status == status).count() as i64
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn average_delay_hours(
    confirmed: &[&crate::store::RegistrationRow],
    event_created_at: DateTime<Utc>,
) -> Option<f64> {
    if confirmed.is_empty() {
        return None;
    }
    let total_hours: f64 = confirmed
        .iter()
        .map(|r| (r.registered_at - event_created_at).num_seconds() as f64 / 3600.0)
        .sum();
    Some(round2(total_hours / confirmed.len() as f64))
}

/// Bucket confirmed registrations by the hour they landed in, sorted
/// chronologically. Hours with zero registrations are omitted rather than
/// padded, since the event's registration window length is unbounded.
fn hourly_timeline(confirmed: &[&crate::store::RegistrationRow]) -> Vec<HourlyBucket> {
    use chrono::Timelike;
    use std::collections::BTreeMap;

    let mut buckets: BTreeMap<DateTime<Utc>, i64> = BTreeMap::new();
    for r in confirmed {
        let hour = r
            .registered_at
            .with_minute(0)
            .and_then(|d| d.with_second(0))
            .and_then(|d| d.with_nanosecond(0))
            .unwrap_or(r.registered_at);
        *buckets.entry(hour).or_insert(0) += 1;
    }

    buckets
        .into_iter()
        .map(|(hour, count)| HourlyBucket { hour, count })
        .collect()
}
