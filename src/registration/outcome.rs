//! Outcome types for the registration engine's two operations.
//!
//! Re-architects the source's dynamic `{success, message, data}` envelope
//! into discrete result types per operation; the HTTP edge (api::routes)
//! is the only place that renders these into the response envelope.

use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    Created(Uuid),
    Reactivated(Uuid),
    AlreadyRegistered,
    EventFull,
    EventPast,
    EventNotFound,
    UserNotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    NotRegistered,
    EventPast,
    Forbidden,
    EventNotFound,
}
