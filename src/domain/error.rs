//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure. These represent
//! business rule violations and invariant failures; they are independent of
//! the web/infrastructure layer and are wrapped into `AppError` at the edge.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Event does not exist, or exists but is inactive.
    #[error("Event not found: {0}")]
    EventNotFound(String),

    /// User does not exist.
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Registration does not exist for the (user, event) pair.
    #[error("Registration not found")]
    RegistrationNotFound,

    /// Event has already reached capacity.
    #[error("Event has reached capacity")]
    EventFull,

    /// Event's `date_time` is not strictly in the future.
    #[error("Event has already started or finished")]
    EventPast,

    /// A confirmed registration already exists for this (user, event) pair.
    #[error("User is already registered for this event")]
    AlreadyRegistered,

    /// Actor attempted to cancel a registration that is not theirs, without
    /// holding the elevated capability.
    #[error("You may only cancel your own registration")]
    ForbiddenCancel,

    /// Actor attempted to modify an event they do not own, without holding
    /// the elevated capability.
    #[error("You may only modify events you own")]
    ForbiddenEventEdit,

    /// Candidate event falls within the owner's scheduling-conflict window.
    #[error("Event conflicts with another event you own within {window_minutes} minutes")]
    SchedulingConflict { window_minutes: i64 },

    /// A field failed validation (length, charset, range).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Capacity would be reduced below the current confirmed registration count.
    #[error("Cannot reduce capacity below {current_registrations} confirmed registrations")]
    CapacityBelowCurrent { current_registrations: i32 },

    /// Aggregate/row version conflict (used only by the retry classifier,
    /// surfaces to clients as a transient error rather than a business one).
    #[error("Concurrent modification detected, retry")]
    ConcurrencyConflict,
}

impl DomainError {
    /// Client-caused errors (4xx, not retryable by the engine itself).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::EventFull
                | Self::EventPast
                | Self::AlreadyRegistered
                | Self::ForbiddenCancel
                | Self::ForbiddenEventEdit
                | Self::SchedulingConflict { .. }
                | Self::InvalidInput(_)
                | Self::CapacityBelowCurrent { .. }
                | Self::RegistrationNotFound
                | Self::EventNotFound(_)
                | Self::UserNotFound(_)
        )
    }

    /// Conflicts where a retry at a higher layer (not the caller) may help.
    pub fn is_conflict_error(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_full_is_client_error() {
        let err = DomainError::EventFull;
        assert!(err.is_client_error());
        assert!(!err.is_conflict_error());
    }

    #[test]
    fn test_scheduling_conflict_message() {
        let err = DomainError::SchedulingConflict { window_minutes: 60 };
        assert!(err.to_string().contains("60 minutes"));
    }

    #[test]
    fn test_concurrency_conflict_is_conflict_error() {
        let err = DomainError::ConcurrencyConflict;
        assert!(!err.is_client_error());
        assert!(err.is_conflict_error());
    }

    #[test]
    fn test_capacity_below_current_message() {
        let err = DomainError::CapacityBelowCurrent {
            current_registrations: 5,
        };
        assert!(err.to_string().contains('5'));
    }
}
