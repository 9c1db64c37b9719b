//! Simulation core for the Corridor transit simulation.
//!
//! This crate owns everything temporal and stochastic: the simulated
//! clock, the demand generator, the fleet launch scheduler, the shared
//! simulation state, and the two interchangeable execution engines.
//!
//! # The two engines
//!
//! - [`realtime`] runs one tokio task per vehicle plus one demand generator
//!   task, pacing simulated time against the wall clock at a live-tunable
//!   rate and emitting the observable event stream.
//! - [`fastforward`] replays the same rules through a time-ordered event
//!   queue with no sleeping at all, for offline batch evaluation.
//!
//! Both consume the same demand, exchange, and scheduling logic from this
//! crate, and given the same seed and configuration they reach the same
//! terminal counters.
//!
//! # Modules
//!
//! - [`clock`] -- monotone simulated clock and duration helpers
//! - [`config`] -- YAML configuration tree and the period multiplier table
//! - [`control`] -- lock-free live controls (speed, arrival rate, stop)
//! - [`demand`] -- stochastic passenger generation
//! - [`schedule`] -- direction assignment, headways, launch offsets
//! - [`state`] -- shared simulation state, dwell rule, completion predicate
//! - [`reposition`] -- post-completion layover target selection
//! - [`realtime`] -- the concurrent, speed-scalable engine
//! - [`fastforward`] -- the event-queue batch engine
//! - [`report`] -- run summary, console and CSV reports

pub mod clock;
pub mod config;
pub mod control;
pub mod demand;
pub mod fastforward;
pub mod realtime;
pub mod report;
pub mod reposition;
pub mod schedule;
pub mod state;

pub use clock::SimClock;
pub use config::{ConfigError, CorridorConfig, period_multiplier};
pub use control::ControlState;
pub use demand::DemandProfile;
pub use report::Summary;
pub use state::{SimParams, SimState};
