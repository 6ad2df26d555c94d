//! Event Service
//!
//! Creation, retrieval, listing, and mutation of events. Owns the
//! scheduling-conflict policy and the dynamic filter/pagination query
//! building, grounded on the teacher's `api/routes.rs` dynamic-update-query
//! pattern (`update_api_key`) generalized into `update_event`.

pub mod dto;

use std::sync::Arc;

use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::config::Config;
use crate::domain::{Capacity, Clock, DomainError, EventWindow, Location, Title};
use crate::error::AppError;
use crate::store::{EventRow, Store};

pub use dto::{
    AttendeeDetail, AttendeeView, EventDraft, EventFilter, EventSummary, EventUpdate, EventView,
    Page, PageRequest, SortBy, SortOrder, UserPermissions,
};

pub struct EventService {
    store: Store,
    clock: Arc<dyn Clock>,
    config: Arc<Config>,
}

impl EventService {
    pub fn new(store: Store, clock: Arc<dyn Clock>, config: Arc<Config>) -> Self {
        Self { store, clock, config }
    }

    /// Validate and persist a new event. `current_registrations` starts at
    /// zero; capacity/date-time/charset validation happens before anything
    /// touches the store, scheduling-conflict detection happens inside the
    /// same transaction as the insert so a concurrent create by the same
    /// owner cannot race past it.
    pub async fn create_event(&self, owner_id: Uuid, draft: EventDraft) -> Result<EventRow, AppError> {
        let now = self.clock.now();

        let title = Title::new(draft.title)?;
        let description = draft
            .description
            .map(crate::domain::Description::new)
            .transpose()?;
        let location = draft.location.map(Location::new).transpose()?;
        let capacity = Capacity::new(
            draft.capacity,
            self.config.min_capacity,
            self.config.max_capacity,
        )?;
        let window = EventWindow::new(
            draft.date_time,
            now,
            self.config.min_event_offset(),
            self.config.max_event_offset(),
        )?;

        let mut tx = self.store.begin().await?;

        let conflict_half = self.config.scheduling_conflict_window();
        let conflict = self
            .store
            .find_owner_event_in_window(
                &mut tx,
                owner_id,
                window.value() - conflict_half,
                window.value() + conflict_half,
                None,
            )
            .await?;

        if conflict.is_some() {
            return Err(DomainError::SchedulingConflict {
                window_minutes: self.config.scheduling_conflict_window_minutes,
            }
            .into());
        }

        let event = self
            .store
            .insert_event(
                &mut tx,
                title.as_str(),
                description.as_ref().map(|d| d.as_str()),
                window.value(),
                location.as_ref().map(|l| l.as_str()),
                capacity.value(),
                owner_id,
            )
            .await?;

        tx.commit().await?;
        Ok(event)
    }

    /// Fetch an event plus the derived, viewer-dependent fields of §4.4.
    pub async fn get_event(&self, event_id: Uuid, viewer: Option<Uuid>) -> Result<EventView, AppError> {
        let mut tx = self.store.begin().await?;

        let event = self
            .store
            .find_event_tx(&mut tx, event_id)
            .await?
            .filter(|e| e.is_active)
            .ok_or_else(|| DomainError::EventNotFound(event_id.to_string()))?;

        let now = self.clock.now();
        let is_owner = viewer == Some(event.created_by);

        let viewer_registration = match viewer {
            Some(uid) => self.store.find_registration(&mut tx, uid, event_id).await?,
            None => None,
        };
        let is_registered = viewer_registration
            .as_ref()
            .map(|r| r.status == crate::store::RegistrationStatus::Confirmed)
            .unwrap_or(false);

        let can_register = viewer.is_some() && !is_owner && !is_registered && !event.is_past(now) && !event.is_full();

        let registered_users = if is_owner || is_registered {
            let attendees = self.store.confirmed_attendees_tx(&mut tx, event_id).await?;
            AttendeeView::Full(
                attendees
                    .into_iter()
                    .map(|(id, name, email, registered_at)| AttendeeDetail {
                        id,
                        name,
                        email,
                        registered_at,
                    })
                    .collect(),
            )
        } else {
            AttendeeView::CountOnly {
                count: event.current_registrations as i64,
            }
        };

        tx.commit().await?;

        Ok(EventView {
            available_spots: event.capacity - event.current_registrations,
            is_full: event.is_full(),
            time_until_event_seconds: (event.date_time - now).num_seconds(),
            has_started: event.is_past(now),
            user_permissions: UserPermissions {
                can_edit: is_owner,
                is_registered,
                can_register,
            },
            registered_users,
            id: event.id,
            title: event.title,
            description: event.description,
            date_time: event.date_time,
            location: event.location,
            capacity: event.capacity,
            current_registrations: event.current_registrations,
            created_by: event.created_by,
            is_active: event.is_active,
            created_at: event.created_at,
            updated_at: event.updated_at,
        })
    }

    /// Paginated, filtered listing of active, future events.
    pub async fn list_upcoming(
        &self,
        filter: EventFilter,
        page_request: PageRequest,
    ) -> Result<Page<EventSummary>, AppError> {
        if let (Some(from), Some(to)) = (filter.date_from, filter.date_to) {
            if to <= from {
                return Err(AppError::InvalidRequest(
                    "date_to must be after date_from".to_string(),
                ));
            }
        }

        let now = self.clock.now();
        let pool = self.store.pool();

        let mut count_qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM events WHERE is_active = true AND date_time > ");
        count_qb.push_bind(now);
        push_filter(&mut count_qb, &filter);
        let total: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT id, title, description, date_time, location, capacity, current_registrations, \
             created_by, is_active, created_at, updated_at FROM events WHERE is_active = true AND date_time > ",
        );
        qb.push_bind(now);
        push_filter(&mut qb, &filter);
        qb.push(format!(
            " ORDER BY {} {}, location ASC NULLS LAST",
            filter.sort_by.column(),
            filter.sort_order.sql()
        ));
        qb.push(" LIMIT ");
        qb.push_bind(page_request.limit);
        qb.push(" OFFSET ");
        qb.push_bind(page_request.offset());

        let rows: Vec<EventRow> = qb
            .build_query_as()
            .fetch_all(pool)
            .await?;

        let items = rows.iter().map(EventSummary::from).collect();
        let has_next = page_request.offset() + page_request.limit < total;
        let has_prev = page_request.page > 1;

        Ok(Page {
            items,
            page: page_request.page,
            limit: page_request.limit,
            total,
            has_next,
            has_prev,
        })
    }

    pub async fn update_event(
        &self,
        actor_id: Uuid,
        event_id: Uuid,
        update: EventUpdate,
    ) -> Result<EventRow, AppError> {
        let mut tx = self.store.begin().await?;
        let now = self.clock.now();

        let event = self
            .store
            .find_event_tx(&mut tx, event_id)
            .await?
            .filter(|e| e.is_active)
            .ok_or_else(|| DomainError::EventNotFound(event_id.to_string()))?;

        if event.created_by != actor_id {
            return Err(DomainError::ForbiddenEventEdit.into());
        }

        let title = update.title.as_deref().map(Title::new).transpose()?;
        let capacity = update
            .capacity
            .map(|c| Capacity::new(c, self.config.min_capacity, self.config.max_capacity))
            .transpose()?;

        if let Some(cap) = capacity {
            if cap.value() < event.current_registrations {
                return Err(DomainError::CapacityBelowCurrent {
                    current_registrations: event.current_registrations,
                }
                .into());
            }
        }

        let date_time = match update.date_time {
            Some(_) if event.is_past(now) => {
                return Err(DomainError::InvalidInput(
                    "date_time is immutable once the event has started".to_string(),
                )
                .into());
            }
            Some(dt) => {
                let window = EventWindow::new(
                    dt,
                    now,
                    self.config.min_event_offset(),
                    self.config.max_event_offset(),
                )?;
                Some(window.value())
            }
            None => None,
        };

        let updated = self
            .store
            .update_event_fields(
                &mut tx,
                event_id,
                title.as_ref().map(|t| t.as_str()),
                update
                    .description
                    .as_ref()
                    .map(|d| d.as_deref()),
                update.location.as_ref().map(|l| l.as_deref()),
                date_time,
                capacity.map(|c| c.value()),
            )
            .await
            .map_err(|e| match e {
                crate::store::StoreError::CounterOutOfBounds => DomainError::CapacityBelowCurrent {
                    current_registrations: event.current_registrations,
                }
                .into(),
                other => AppError::from(other),
            })?;

        tx.commit().await?;
        Ok(updated)
    }

    pub async fn delete_event(&self, actor_id: Uuid, event_id: Uuid) -> Result<(), AppError> {
        let mut tx = self.store.begin().await?;

        let event = self
            .store
            .find_event_tx(&mut tx, event_id)
            .await?
            .ok_or_else(|| DomainError::EventNotFound(event_id.to_string()))?;

        if event.created_by != actor_id {
            return Err(DomainError::ForbiddenEventEdit.into());
        }

        self.store.delete_event(&mut tx, event_id).await?;
        tx.commit().await?;
        Ok(())
    }
}

fn push_filter(qb: &mut QueryBuilder<Postgres>, filter: &EventFilter) {
    if let Some(ref search) = filter.search {
        let pattern = format!("%{}%", search);
        qb.push(" AND (title ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR description ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR location ILIKE ");
        qb.push_bind(pattern);
        qb.push(")");
    }
    if let Some(ref location) = filter.location {
        qb.push(" AND location ILIKE ");
        qb.push_bind(format!("%{}%", location));
    }
    if let Some(min_capacity) = filter.min_capacity {
        qb.push(" AND capacity >= ");
        qb.push_bind(min_capacity);
    }
    if let Some(max_capacity) = filter.max_capacity {
        qb.push(" AND capacity <= ");
        qb.push_bind(max_capacity);
    }
    if let Some(date_from) = filter.date_from {
        qb.push(" AND date_time >= ");
        qb.push_bind(date_from);
    }
    if let Some(date_to) = filter.date_to {
        qb.push(" AND date_time <= ");
        qb.push_bind(date_to);
    }
}
