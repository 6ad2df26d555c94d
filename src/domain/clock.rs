//! Clock
//!
//! Injectable source of "now". Every time-based rule in the registration
//! engine and event service goes through this trait instead of calling
//! `Utc::now()` directly, so tests can pin time the same way fixtures elsewhere
//! in this crate pin identifiers rather than generating them live.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed clock for deterministic tests. Stores the pinned instant as
/// microseconds since the epoch so the clock itself stays `Send + Sync`
/// without a `Mutex`, and so it can be advanced from a shared reference.
#[derive(Debug)]
pub struct FixedClock {
    micros: AtomicI64,
}

impl FixedClock {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self {
            micros: AtomicI64::new(instant.timestamp_micros()),
        }
    }

    /// Advance the pinned instant by `duration`.
    pub fn advance(&self, duration: chrono::Duration) {
        self.micros
            .fetch_add(duration.num_microseconds().unwrap_or(0), Ordering::SeqCst);
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        self.micros.store(instant.timestamp_micros(), Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_micros(self.micros.load(Ordering::SeqCst))
            .expect("pinned instant must be representable")
    }
}
