//! A corridor stop: directional FIFO queues and the boarding exchange.
//!
//! Each stop keeps one queue per travel direction. Insertion order is
//! arrival order, and every boarding pass preserves the relative order of
//! passengers it leaves behind -- the exchange is a single forward scan,
//! never a reorder.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;

use corridor_types::{Direction, StopId};

use crate::passenger::Passenger;
use crate::vehicle::Vehicle;

/// Result of one boarding pass at a stop.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoardingOutcome {
    /// Number of passengers moved into the vehicle manifest.
    pub boarded: usize,
    /// Sum of the boarded passengers' wait durations, in minutes.
    pub wait_minutes_sum: f64,
}

/// A stop along the corridor.
///
/// Topology (position, distances, layover eligibility) is immutable once
/// the route is loaded; queues and counters mutate throughout a run.
#[derive(Debug, Clone)]
pub struct Stop {
    /// Stop identifier from the route definition.
    pub id: StopId,
    /// Human-readable stop name.
    pub name: String,
    /// Latitude of the stop.
    pub lat: f64,
    /// Longitude of the stop.
    pub lng: f64,
    /// Distance to the next stop along the route, in km (0 for the last stop).
    pub distance_to_next_km: f64,
    /// Cumulative distance from the route start, in km.
    pub cumulative_km: f64,
    /// Whether vehicles may idle here off the main road between duties.
    pub allow_layover: bool,

    outbound_queue: VecDeque<Passenger>,
    inbound_queue: VecDeque<Passenger>,

    /// Passengers that ever arrived at this stop.
    pub total_arrivals: u64,
    /// Passengers that boarded a vehicle here.
    pub total_boarded: u64,
    /// Passengers that left the queue here (boarded).
    pub total_departures: u64,
}

impl Stop {
    /// Create a stop with empty queues and zeroed counters.
    pub const fn new(
        id: StopId,
        name: String,
        lat: f64,
        lng: f64,
        distance_to_next_km: f64,
        allow_layover: bool,
    ) -> Self {
        Self {
            id,
            name,
            lat,
            lng,
            distance_to_next_km,
            cumulative_km: 0.0,
            allow_layover,
            outbound_queue: VecDeque::new(),
            inbound_queue: VecDeque::new(),
            total_arrivals: 0,
            total_boarded: 0,
            total_departures: 0,
        }
    }

    /// The queue serving the given travel direction.
    pub const fn queue(&self, direction: Direction) -> &VecDeque<Passenger> {
        match direction {
            Direction::Outbound => &self.outbound_queue,
            Direction::Inbound => &self.inbound_queue,
        }
    }

    /// Number of passengers waiting in the given direction.
    pub fn queue_len(&self, direction: Direction) -> usize {
        self.queue(direction).len()
    }

    /// Total passengers waiting at this stop, both directions.
    pub fn queued_total(&self) -> usize {
        self.outbound_queue.len().saturating_add(self.inbound_queue.len())
    }

    /// Add a passenger to the queue matching its direction.
    pub fn enqueue(&mut self, passenger: Passenger) {
        self.total_arrivals = self.total_arrivals.saturating_add(1);
        match passenger.direction {
            Direction::Outbound => self.outbound_queue.push_back(passenger),
            Direction::Inbound => self.inbound_queue.push_back(passenger),
        }
    }

    /// Board waiting passengers onto `vehicle` from the queue matching its
    /// direction.
    ///
    /// A full vehicle leaves the queue untouched. Otherwise the queue is
    /// scanned once in FIFO order: a passenger is eligible if it waits at
    /// this stop, travels in the vehicle's direction, and has not yet
    /// boarded. Eligible passengers move into the manifest until remaining
    /// capacity reaches zero; everyone else is retained in their original
    /// relative order.
    pub fn board_onto(&mut self, vehicle: &mut Vehicle, now: DateTime<Utc>) -> BoardingOutcome {
        let mut outcome = BoardingOutcome::default();
        if vehicle.remaining_capacity() == 0 {
            return outcome;
        }

        let queue = match vehicle.direction {
            Direction::Outbound => &mut self.outbound_queue,
            Direction::Inbound => &mut self.inbound_queue,
        };

        let mut kept = VecDeque::with_capacity(queue.len());
        while let Some(mut passenger) = queue.pop_front() {
            let eligible = vehicle.remaining_capacity() > 0
                && passenger.origin == self.id
                && passenger.direction == vehicle.direction
                && !passenger.has_boarded();
            if eligible {
                passenger.mark_boarded(now);
                outcome.wait_minutes_sum += passenger.wait_minutes.unwrap_or(0.0);
                outcome.boarded = outcome.boarded.saturating_add(1);
                self.total_boarded = self.total_boarded.saturating_add(1);
                self.total_departures = self.total_departures.saturating_add(1);
                vehicle.receive(passenger);
            } else {
                kept.push_back(passenger);
            }
        }
        *queue = kept;
        outcome
    }
}
