//! Shared type definitions for the Marsim time kernel.
//!
//! This crate holds the value types every other crate agrees on: the
//! simulated timestamp, identifiers, enums and small data structs. It has no
//! behaviour beyond pure arithmetic on those values.
//!
//! # Modules
//!
//! - [`time`] -- [`MarsTime`] and the [`MarsTimeSource`] trait
//! - [`ids`] -- Type-safe UUID wrappers for entity identifiers
//! - [`enums`] -- Building categories, activity states, history classification
//! - [`structs`] -- Coordinates and venues

pub mod enums;
pub mod ids;
pub mod structs;
pub mod time;

// Re-export all public types at crate root for convenience.
pub use enums::{
    ActivityState, BuildingCategory, HistoricalEventCategory, HistoricalEventType, TaskScope,
};
pub use ids::{ActivityId, BuildingId, EventId, SettlementId};
pub use structs::{Coordinates, Venue};
pub use time::{
    HALF_SOL, MILLISECONDS_PER_MILLISOL, MILLISOLS_PER_SOL, MarsTime, MarsTimeSource,
    SECONDS_PER_MILLISOL,
};
