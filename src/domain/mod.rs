//! Domain module
//!
//! Core domain types and business logic, independent of the HTTP and
//! storage layers.

pub mod clock;
pub mod context;
pub mod error;
pub mod primitives;

pub use clock::{Clock, FixedClock, SystemClock};
pub use context::OperationContext;
pub use error::DomainError;
pub use primitives::{Capacity, Description, EventWindow, Location, PrimitiveError, Title};
