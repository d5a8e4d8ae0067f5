//! Historical event log for the Marsim time kernel.
//!
//! Producers across the simulation report notable occurrences (malfunctions,
//! medical emergencies, mission milestones, group activities) to a single
//! [`HistoricalEventManager`]. The manager filters noise, suppresses exact
//! duplicates, stamps each accepted event with the current simulated time
//! and keeps the most recent records in a bounded buffer. Observers receive
//! every accepted record through [`HistoricalEventListener`].

pub mod config;
pub mod error;
pub mod event;
pub mod manager;

pub use config::HistoryConfig;
pub use error::HistoryListenerError;
pub use event::{HistoricalEvent, HistoricalRecord};
pub use manager::{HistoricalEventListener, HistoricalEventManager, RegisterOutcome};
