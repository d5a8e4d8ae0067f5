//! Simulated-time kernel for the Marsim settlement simulation.
//!
//! This crate owns the master clock and everything that is scheduled
//! against Mars time:
//!
//! - [`clock`] -- [`MasterClock`]: pulses, pause, time ratio and listeners.
//! - [`config`] -- Configuration loading from `marsim-config.yaml` into
//!   strongly-typed structs.
//! - [`driver`] -- [`run_clock`], the real-time loop that paces the clock.
//! - [`scheduler`] -- [`FutureEventQueue`] and the
//!   [`ScheduledEventHandler`] contract.
//! - [`activity`] -- [`GroupActivity`], the recurring group-activity state
//!   machine.
//! - [`settlement`] -- [`Settlement`], the domain that hosts a queue and its
//!   activities.
//! - [`wall`] -- Real-time sources for the clock.
//!
//! [`MasterClock`]: clock::MasterClock
//! [`run_clock`]: driver::run_clock
//! [`FutureEventQueue`]: scheduler::FutureEventQueue
//! [`ScheduledEventHandler`]: scheduler::ScheduledEventHandler
//! [`GroupActivity`]: activity::GroupActivity
//! [`Settlement`]: settlement::Settlement

pub mod activity;
pub mod clock;
pub mod config;
pub mod driver;
pub mod scheduler;
pub mod settlement;
pub mod wall;
