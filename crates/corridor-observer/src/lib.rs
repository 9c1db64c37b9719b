//! Observer API server for the Corridor transit simulation.
//!
//! This crate is the boundary layer between running simulations and the
//! outside world. It provides an Axum HTTP server that exposes:
//!
//! - **`GET /api/route`** -- the loaded route topology
//! - **`GET /api/stream`** -- starts a real-time run and streams its
//!   event sequence as Server-Sent Events
//! - **`POST /api/control`** -- retunes a live run's speed and arrival
//!   multipliers, addressed by run id
//!
//! # Architecture
//!
//! Each SSE connection owns one simulation run. The handler mints a run
//! id, registers the run's [`ControlState`](corridor_core::ControlState)
//! in the [`RunRegistry`](state::RunRegistry), spawns the real-time
//! engine, and adapts its event channel into the SSE body. Dropping the
//! stream (client disconnect) raises the run's stop signal and
//! deregisters it, so abandoned runs never linger.
//!
//! The registry is the only piece of state the control endpoint touches;
//! the simulation core knows nothing about HTTP.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;

// Re-export primary types for convenience.
pub use error::ObserverError;
pub use router::build_router;
pub use server::{ServerError, start_server};
pub use state::{AppState, RunRegistry};
