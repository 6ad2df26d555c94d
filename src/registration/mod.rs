//! Registration Engine
//!
//! The critical section of this crate: validates and mutates (event,
//! registration) pairs under a per-event serializer so that capacity is
//! never checked against stale data. Grounded on the overall shape of the
//! teacher's `TransferHandler::execute` (authorize, load/lock the contested
//! resource, mutate, persist atomically, translate storage errors) and on
//! `EventStore::append_atomic`'s retry-with-backoff loop.

pub mod outcome;

use std::time::Duration;

use uuid::Uuid;

use crate::domain::{Clock, OperationContext};
use crate::error::AppError;
use crate::store::{RegistrationStatus, Store, StoreError};

pub use outcome::{CancelOutcome, RegisterOutcome};

const MAX_RETRIES: u32 = 3;

pub struct RegistrationEngine {
    store: Store,
    clock: std::sync::Arc<dyn Clock>,
}

impl RegistrationEngine {
    pub fn new(store: Store, clock: std::sync::Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Register `user_id` for `event_id`, retrying transient storage faults
    /// with exponential backoff before surfacing them.
    pub async fn register(&self, user_id: Uuid, event_id: Uuid) -> Result<RegisterOutcome, AppError> {
        for attempt in 0..MAX_RETRIES {
            match self.try_register(user_id, event_id).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_retryable() && attempt + 1 < MAX_RETRIES => {
                    backoff(attempt).await;
                    continue;
                }
                Err(e) => return Err(map_store_error(e)),
            }
        }

        Err(AppError::Transient)
    }

    async fn try_register(&self, user_id: Uuid, event_id: Uuid) -> Result<RegisterOutcome, StoreError> {
        let mut tx = self.store.begin().await?;
        let now = self.clock.now();

        let event = match self.store.lock_event_for_update(&mut tx, event_id).await? {
            Some(e) if e.is_active => e,
            _ => return Ok(RegisterOutcome::EventNotFound),
        };

        if self.store.find_user(&mut tx, user_id).await?.is_none() {
            return Ok(RegisterOutcome::UserNotFound);
        }

        if event.is_past(now) {
            return Ok(RegisterOutcome::EventPast);
        }

        let existing = self.store.find_registration(&mut tx, user_id, event_id).await?;

        let outcome = match existing {
            Some(reg) if reg.status == RegistrationStatus::Confirmed => RegisterOutcome::AlreadyRegistered,
            Some(reg)
                if matches!(
                    reg.status,
                    RegistrationStatus::Waitlist | RegistrationStatus::Pending
                ) =>
            {
                RegisterOutcome::AlreadyRegistered
            }
            Some(reg) if reg.status == RegistrationStatus::Cancelled => {
                if event.is_full() {
                    RegisterOutcome::EventFull
                } else {
                    self.store
                        .update_registration_status(&mut tx, reg.id, RegistrationStatus::Confirmed, now)
                        .await?;
                    self.store.bump_event_counter(&mut tx, event_id, 1).await?;
                    RegisterOutcome::Reactivated(reg.id)
                }
            }
            Some(_) => unreachable!("RegistrationStatus is exhaustively matched above"),
            None => {
                if event.is_full() {
                    RegisterOutcome::EventFull
                } else {
                    let id = self
                        .store
                        .insert_registration(&mut tx, user_id, event_id, RegistrationStatus::Confirmed, now)
                        .await?;
                    self.store.bump_event_counter(&mut tx, event_id, 1).await?;
                    RegisterOutcome::Created(id)
                }
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    /// Cancel `target_user_id`'s registration for `event_id`, acting as
    /// `context`. Authorization: the actor must equal the target unless the
    /// context carries the elevated capability.
    pub async fn cancel(
        &self,
        context: &OperationContext,
        target_user_id: Uuid,
        event_id: Uuid,
    ) -> Result<CancelOutcome, AppError> {
        if !context.may_act_as(target_user_id) {
            return Ok(CancelOutcome::Forbidden);
        }

        for attempt in 0..MAX_RETRIES {
            match self.try_cancel(target_user_id, event_id).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_retryable() && attempt + 1 < MAX_RETRIES => {
                    backoff(attempt).await;
                    continue;
                }
                Err(e) => return Err(map_store_error(e)),
            }
        }

        Err(AppError::Transient)
    }

    async fn try_cancel(&self, target_user_id: Uuid, event_id: Uuid) -> Result<CancelOutcome, StoreError> {
        let mut tx = self.store.begin().await?;
        let now = self.clock.now();

        let event = match self.store.lock_event_for_update(&mut tx, event_id).await? {
            Some(e) if e.is_active => e,
            _ => return Ok(CancelOutcome::EventNotFound),
        };

        if event.is_past(now) {
            return Ok(CancelOutcome::EventPast);
        }

        let registration = self.store.find_registration(&mut tx, target_user_id, event_id).await?;

        let outcome = match registration {
            Some(reg) if reg.status == RegistrationStatus::Confirmed => {
                self.store
                    .update_registration_status(&mut tx, reg.id, RegistrationStatus::Cancelled, reg.registered_at)
                    .await?;
                self.store.bump_event_counter(&mut tx, event_id, -1).await?;
                CancelOutcome::Cancelled
            }
            _ => CancelOutcome::NotRegistered,
        };

        tx.commit().await?;
        Ok(outcome)
    }

    /// Admin facility: register each (user, event) pair in the batch
    /// independently. Each call acquires and releases the per-event lock on
    /// its own rather than holding it across the whole batch, since holding
    /// it across unrelated users would defeat the purpose of a per-event
    /// (not per-batch) serializer.
    pub async fn batch_register(
        &self,
        event_id: Uuid,
        user_ids: &[Uuid],
    ) -> Vec<(Uuid, Result<RegisterOutcome, AppError>)> {
        let mut results = Vec::with_capacity(user_ids.len());
        for &user_id in user_ids {
            let outcome = self.register(user_id, event_id).await;
            results.push((user_id, outcome));
        }
        results
    }
}

async fn backoff(attempt: u32) {
    tokio::time::sleep(Duration::from_millis(50 * (attempt as u64 + 1))).await;
}

fn map_store_error(e: StoreError) -> AppError {
    match e {
        StoreError::EventNotFound => AppError::NotFound("event not found".into()),
        StoreError::UserNotFound => AppError::NotFound("user not found".into()),
        StoreError::RegistrationNotFound => AppError::NotFound("registration not found".into()),
        StoreError::CounterOutOfBounds => AppError::BusinessRule("event has reached capacity".into()),
        StoreError::UniqueViolation => AppError::Conflict("already registered for this event".into()),
        StoreError::MaxRetriesExceeded { .. } => AppError::Transient,
        StoreError::Database(e) => AppError::Database(e),
    }
}
