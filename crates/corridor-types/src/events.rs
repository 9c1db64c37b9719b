//! Output event stream emitted by a simulation run.
//!
//! The real-time engine pushes [`SimEvent`] values over a channel as the
//! run progresses; the presentation layer (SSE stream, dashboards) consumes
//! them without ever touching simulation internals. Every counter carried
//! by an event is cumulative and non-decreasing, except that the final
//! generated count in [`SimEvent::Done`] is clamped to the configured
//! passenger cap.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{Direction, MovePhase};
use crate::ids::{StopId, VehicleId};

/// A single event in the observable output stream of a run.
///
/// Variants map one-to-one onto the wire event kinds; [`SimEvent::kind`]
/// returns the wire name used as the SSE `event:` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimEvent {
    /// Start of a run: initial clock value, run id, and seeded counters.
    Init {
        /// Simulated start time.
        time: DateTime<Utc>,
        /// Identifier external control requests use to reach this run.
        run_id: String,
        /// Passengers generated so far (initial seeding).
        generated: u64,
        /// Outbound share of the generated count.
        outbound_generated: u64,
        /// Inbound share of the generated count.
        inbound_generated: u64,
        /// Current arrival-rate multiplier.
        arrival_factor: f64,
    },

    /// Queue lengths and running counters for one stop.
    StopUpdate {
        /// The stop this update describes.
        stop_id: StopId,
        /// Passengers waiting in the outbound queue.
        outbound_queue: usize,
        /// Passengers waiting in the inbound queue.
        inbound_queue: usize,
        /// Passengers generated so far.
        generated: u64,
        /// Outbound share of the generated count.
        outbound_generated: u64,
        /// Inbound share of the generated count.
        inbound_generated: u64,
    },

    /// A vehicle entering service at its launch offset.
    BusAdd {
        /// The vehicle entering service.
        vehicle_id: VehicleId,
        /// Its initial travel direction.
        direction: Direction,
        /// Its average speed in km/h.
        avg_speed_kmh: f64,
        /// Its passenger capacity.
        capacity: usize,
    },

    /// A vehicle arriving at a stop.
    Arrive {
        /// The arriving vehicle.
        vehicle_id: VehicleId,
        /// Its current travel direction.
        direction: Direction,
        /// The stop it arrived at.
        stop_id: StopId,
        /// Simulated arrival time.
        time: DateTime<Utc>,
        /// Passengers onboard after arrival (before alighting).
        onboard: usize,
        /// Passengers generated so far.
        generated: u64,
        /// Outbound share of the generated count.
        outbound_generated: u64,
        /// Inbound share of the generated count.
        inbound_generated: u64,
    },

    /// Passengers leaving a vehicle at a stop.
    Alight {
        /// The vehicle passengers alighted from.
        vehicle_id: VehicleId,
        /// Its current travel direction.
        direction: Direction,
        /// The stop where alighting happened.
        stop_id: StopId,
        /// Number of passengers who alighted in this pass.
        alighted: usize,
        /// Passengers remaining onboard.
        onboard: usize,
        /// Passengers served so far across the run.
        served: u64,
        /// Passengers generated so far.
        generated: u64,
        /// Whether this was the forced alighting at a terminus.
        terminal: bool,
    },

    /// Passengers boarding a vehicle at a stop.
    Board {
        /// The vehicle passengers boarded.
        vehicle_id: VehicleId,
        /// Its current travel direction.
        direction: Direction,
        /// The stop where boarding happened.
        stop_id: StopId,
        /// Number of passengers who boarded in this pass.
        boarded: usize,
        /// Passengers onboard after boarding.
        onboard: usize,
        /// Outbound queue length left at the stop.
        stop_outbound: usize,
        /// Inbound queue length left at the stop.
        stop_inbound: usize,
        /// Passengers generated so far.
        generated: u64,
        /// Passengers served so far.
        served: u64,
        /// Running average wait in minutes across all boardings.
        avg_wait_min: f64,
    },

    /// An in-transit position update between two stops.
    Move {
        /// The moving vehicle.
        vehicle_id: VehicleId,
        /// Its current travel direction.
        direction: Direction,
        /// Interpolated latitude.
        lat: f64,
        /// Interpolated longitude.
        lng: f64,
        /// Fraction of the leg completed, in `(0, 1]`.
        fraction: f64,
        /// The stop the vehicle departed.
        from: StopId,
        /// The stop the vehicle is heading to.
        to: StopId,
        /// Whether this is normal travel or a reposition leg.
        phase: MovePhase,
    },

    /// A vehicle parked at a layover stop; its traversal is over.
    Layover {
        /// The vehicle now laying over.
        vehicle_id: VehicleId,
        /// The layover stop it parked at.
        stop_id: StopId,
    },

    /// Start of the reposition phase after completion.
    RepositionStart {
        /// Number of vehicles to reposition.
        vehicles: usize,
        /// Indices of layover-eligible stops along the route.
        layover_indices: Vec<usize>,
    },

    /// Reposition target chosen for one vehicle.
    RepositionBus {
        /// The vehicle being repositioned.
        vehicle_id: VehicleId,
        /// Route index the vehicle repositions from.
        from_index: usize,
        /// Route index of the chosen layover stop.
        target_index: usize,
        /// Stop id the vehicle repositions from.
        current_stop_id: StopId,
        /// Whether the target was found ahead in the travel direction
        /// (`false` means the nearest-overall fallback was used).
        ahead: bool,
    },

    /// End of the reposition phase.
    RepositionComplete {
        /// Wall-clock milliseconds the phase took.
        elapsed_ms: i64,
    },

    /// Final summary for the run.
    Done {
        /// Whether the run reached its completion condition.
        completed: bool,
        /// Total passengers generated (clamped to the cap).
        generated: u64,
        /// Outbound share of the generated count.
        outbound_generated: u64,
        /// Inbound share of the generated count.
        inbound_generated: u64,
        /// Total passengers served.
        served: u64,
        /// Final average wait in minutes.
        avg_wait_min: f64,
        /// Kilometres traveled per vehicle.
        vehicle_distance_km: BTreeMap<VehicleId, f64>,
    },
}

impl SimEvent {
    /// The wire name of this event kind (used as the SSE `event:` field).
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::StopUpdate { .. } => "stop_update",
            Self::BusAdd { .. } => "bus_add",
            Self::Arrive { .. } => "arrive",
            Self::Alight { .. } => "alight",
            Self::Board { .. } => "board",
            Self::Move { .. } => "move",
            Self::Layover { .. } => "layover",
            Self::RepositionStart { .. } => "reposition_start",
            Self::RepositionBus { .. } => "reposition_bus",
            Self::RepositionComplete { .. } => "reposition_complete",
            Self::Done { .. } => "done",
        }
    }
}
