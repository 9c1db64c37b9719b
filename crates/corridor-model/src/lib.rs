//! Route, stop, passenger, and vehicle data model for the Corridor
//! transit simulation.
//!
//! The model is deliberately passive: it owns no clock and no tasks. Stops
//! hold directional FIFO queues, vehicles hold bounded manifests, and the
//! capacity-constrained transfer between the two (the boarding exchange)
//! lives on [`Stop::board_onto`](stop::Stop::board_onto). Everything
//! temporal -- when a vehicle arrives, how long it dwells -- is decided by
//! the engines in `corridor-core`.
//!
//! # Modules
//!
//! - [`passenger`] -- a single trip request and its lifecycle timestamps
//! - [`stop`] -- a corridor stop with directional queues and the boarding exchange
//! - [`vehicle`] -- a vehicle, its type, and alighting logic
//! - [`route`] -- the ordered stop sequence with distance helpers
//! - [`fleet`] -- fleet construction from type/quantity declarations
//! - [`loader`] -- serde loaders for route and fleet definition files

pub mod error;
pub mod fleet;
pub mod loader;
pub mod passenger;
pub mod route;
pub mod stop;
pub mod vehicle;

pub use error::ModelError;
pub use fleet::{FleetQuantity, build_fleet, default_fleet};
pub use loader::{load_fleet_file, load_fleet_str, load_route_file, load_route_str};
pub use passenger::Passenger;
pub use route::Route;
pub use stop::{BoardingOutcome, Stop};
pub use vehicle::{Vehicle, VehicleType};
