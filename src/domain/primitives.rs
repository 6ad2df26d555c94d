//! Validated domain primitives
//!
//! Smart constructors for the small set of values the registration engine
//! and event service must never see in an invalid state. Each type validates
//! at construction and carries its own exhaustive, per-rule test suite.

use std::fmt;

use chrono::{DateTime, Duration, Utc};

const MAX_TITLE_LEN: usize = 500;
const MAX_DESCRIPTION_LEN: usize = 10_000;
const MAX_LOCATION_LEN: usize = 500;

/// A non-empty, bounded, charset-restricted event title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Title(String);

impl Title {
    pub fn new(raw: impl Into<String>) -> Result<Self, PrimitiveError> {
        let raw = raw.into();
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Err(PrimitiveError::new("title", "must not be empty"));
        }
        if trimmed.chars().count() > MAX_TITLE_LEN {
            return Err(PrimitiveError::new(
                "title",
                format!("must be at most {} characters", MAX_TITLE_LEN),
            ));
        }
        if !trimmed.chars().all(is_allowed_title_char) {
            return Err(PrimitiveError::new(
                "title",
                "contains characters outside the allowed set",
            ));
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_allowed_title_char(c: char) -> bool {
    c.is_alphanumeric() || c.is_whitespace() || "-_.,!?()".contains(c)
}

impl fmt::Display for Title {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An optional free-text description, bounded in length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Description(String);

impl Description {
    pub fn new(raw: impl Into<String>) -> Result<Self, PrimitiveError> {
        let raw = raw.into();
        if raw.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(PrimitiveError::new(
                "description",
                format!("must be at most {} characters", MAX_DESCRIPTION_LEN),
            ));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// An optional event location, bounded in length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location(String);

impl Location {
    pub fn new(raw: impl Into<String>) -> Result<Self, PrimitiveError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PrimitiveError::new("location", "must not be empty"));
        }
        if trimmed.chars().count() > MAX_LOCATION_LEN {
            return Err(PrimitiveError::new(
                "location",
                format!("must be at most {} characters", MAX_LOCATION_LEN),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A capacity bounded to a configured `[min, max]` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Capacity(i32);

impl Capacity {
    pub fn new(value: i32, min: i32, max: i32) -> Result<Self, PrimitiveError> {
        if value < min || value > max {
            return Err(PrimitiveError::new(
                "capacity",
                format!("must be between {} and {}", min, max),
            ));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> i32 {
        self.0
    }
}

/// An event `date_time` that has been checked to lie strictly within the
/// configured lead-time window relative to `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventWindow(DateTime<Utc>);

impl EventWindow {
    /// Validate `date_time` lies strictly between `now + min_offset` and
    /// `now + max_offset`.
    pub fn new(
        date_time: DateTime<Utc>,
        now: DateTime<Utc>,
        min_offset: Duration,
        max_offset: Duration,
    ) -> Result<Self, PrimitiveError> {
        let earliest = now + min_offset;
        let latest = now + max_offset;

        if date_time <= earliest {
            return Err(PrimitiveError::new(
                "date_time",
                format!("must be at least {} from now", format_duration(min_offset)),
            ));
        }
        if date_time >= latest {
            return Err(PrimitiveError::new(
                "date_time",
                format!("must be at most {} from now", format_duration(max_offset)),
            ));
        }

        Ok(Self(date_time))
    }

    pub fn value(self) -> DateTime<Utc> {
        self.0
    }
}

fn format_duration(d: Duration) -> String {
    if d.num_days() >= 1 && d.num_hours() % 24 == 0 {
        format!("{} days", d.num_days())
    } else {
        format!("{} minutes", d.num_minutes())
    }
}

/// A single validation failure on a named field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {reason}")]
pub struct PrimitiveError {
    pub field: String,
    pub reason: String,
}

impl PrimitiveError {
    fn new(field: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<PrimitiveError> for crate::domain::DomainError {
    fn from(e: PrimitiveError) -> Self {
        crate::domain::DomainError::InvalidInput(e.to_string())
    }
}
