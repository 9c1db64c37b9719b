//! A vehicle, its type, and alighting logic.
//!
//! Vehicles are created once from the fleet configuration and persist for
//! the whole run. The manifest is bounded by the type capacity; the
//! boarding exchange on [`Stop`](crate::stop::Stop) is the only writer, and
//! it checks [`Vehicle::remaining_capacity`] before every admission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use corridor_types::{Direction, StopId, VehicleId, VehicleTypeId};

use crate::passenger::Passenger;

/// A category of vehicles with cost and capacity attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleType {
    /// Type identifier from the fleet definition.
    pub id: VehicleTypeId,
    /// Human-readable type name (e.g. "Standard 12m").
    pub name: String,
    /// Maximum passengers onboard at once.
    pub capacity: usize,
    /// Operating cost per km traveled.
    pub cost_per_km: f64,
}

/// An individual vehicle in operation.
#[derive(Debug, Clone)]
pub struct Vehicle {
    /// Vehicle identifier, unique within the fleet.
    pub id: VehicleId,
    /// The capacity/cost class of this vehicle.
    pub vehicle_type: VehicleType,
    /// The stop the vehicle is currently at (or last departed).
    pub current_stop: StopId,
    /// Current travel direction; flips at each terminus.
    pub direction: Direction,
    /// Average speed in km/h, fixed for the run.
    pub avg_speed_kmh: f64,
    /// Passengers boarded over the whole run.
    pub total_boarded: u64,
    /// Passengers alighted over the whole run.
    pub total_alighted: u64,

    onboard: Vec<Passenger>,
}

impl Vehicle {
    /// Create an empty vehicle at `start_stop` heading in `direction`.
    pub const fn new(
        id: VehicleId,
        vehicle_type: VehicleType,
        start_stop: StopId,
        direction: Direction,
        avg_speed_kmh: f64,
    ) -> Self {
        Self {
            id,
            vehicle_type,
            current_stop: start_stop,
            direction,
            avg_speed_kmh,
            total_boarded: 0,
            total_alighted: 0,
            onboard: Vec::new(),
        }
    }

    /// The type capacity of this vehicle.
    pub const fn capacity(&self) -> usize {
        self.vehicle_type.capacity
    }

    /// Passengers currently onboard.
    pub fn onboard_count(&self) -> usize {
        self.onboard.len()
    }

    /// How many more passengers can board.
    pub fn remaining_capacity(&self) -> usize {
        self.vehicle_type.capacity.saturating_sub(self.onboard.len())
    }

    /// Fraction of seats occupied, in `[0, 1]`.
    pub fn occupancy_ratio(&self) -> f64 {
        if self.vehicle_type.capacity == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let ratio = self.onboard.len() as f64 / self.vehicle_type.capacity as f64;
        ratio
    }

    /// Move an already-boarded passenger into the manifest.
    ///
    /// Called by the boarding exchange after a capacity check; the manifest
    /// therefore never exceeds the type capacity.
    pub(crate) fn receive(&mut self, passenger: Passenger) {
        self.total_boarded = self.total_boarded.saturating_add(1);
        self.onboard.push(passenger);
    }

    /// Remove and return every onboard passenger whose destination is the
    /// vehicle's current stop, marking them arrived.
    ///
    /// The relative order of the remaining manifest is preserved.
    pub fn alight_here(&mut self, now: DateTime<Utc>) -> Vec<Passenger> {
        let stop = self.current_stop;
        let mut alighted = Vec::new();
        let mut kept = Vec::with_capacity(self.onboard.len());
        for mut passenger in self.onboard.drain(..) {
            if passenger.destination == stop && passenger.is_onboard() {
                passenger.mark_arrived(now);
                alighted.push(passenger);
            } else {
                kept.push(passenger);
            }
        }
        self.onboard = kept;
        self.total_alighted = self.total_alighted.saturating_add(alighted.len() as u64);
        alighted
    }

    /// Forced alighting at a terminus: everyone still onboard leaves.
    ///
    /// Passengers whose destination was never matched are undeliverable at
    /// this point; they are marked arrived and not re-injected.
    pub fn alight_all(&mut self, now: DateTime<Utc>) -> Vec<Passenger> {
        let mut alighted: Vec<Passenger> = self.onboard.drain(..).collect();
        for passenger in &mut alighted {
            passenger.mark_arrived(now);
        }
        self.total_alighted = self.total_alighted.saturating_add(alighted.len() as u64);
        alighted
    }

    /// Read-only view of the manifest.
    pub fn onboard(&self) -> &[Passenger] {
        &self.onboard
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use corridor_types::PassengerId;

    use super::*;

    fn standard() -> VehicleType {
        VehicleType {
            id: VehicleTypeId(1),
            name: String::from("Standard"),
            capacity: 4,
            cost_per_km: 1.75,
        }
    }

    fn boarded_passenger(id: u64, destination: StopId) -> Passenger {
        let mut p = Passenger::new(
            PassengerId(id),
            StopId(1),
            destination,
            Direction::Outbound,
            Utc::now(),
        );
        p.mark_boarded(Utc::now());
        p
    }

    #[test]
    fn alighting_removes_only_matching_destinations() {
        let mut v = Vehicle::new(VehicleId(1), standard(), StopId(2), Direction::Outbound, 28.0);
        v.receive(boarded_passenger(1, StopId(2)));
        v.receive(boarded_passenger(2, StopId(3)));
        v.receive(boarded_passenger(3, StopId(2)));

        let alighted = v.alight_here(Utc::now());
        assert_eq!(alighted.len(), 2);
        assert_eq!(v.onboard_count(), 1);
        assert_eq!(v.total_alighted, 2);
        // Remaining manifest order preserved.
        assert_eq!(v.onboard().first().unwrap().id, PassengerId(2));
    }

    #[test]
    fn forced_alight_empties_the_manifest() {
        let mut v = Vehicle::new(VehicleId(1), standard(), StopId(5), Direction::Outbound, 28.0);
        v.receive(boarded_passenger(1, StopId(7)));
        v.receive(boarded_passenger(2, StopId(9)));

        let alighted = v.alight_all(Utc::now());
        assert_eq!(alighted.len(), 2);
        assert!(alighted.iter().all(Passenger::completed));
        assert_eq!(v.onboard_count(), 0);
    }

    #[test]
    fn remaining_capacity_bottoms_out_at_zero() {
        let mut v = Vehicle::new(VehicleId(1), standard(), StopId(1), Direction::Outbound, 28.0);
        for i in 0..4 {
            v.receive(boarded_passenger(i, StopId(2)));
        }
        assert_eq!(v.remaining_capacity(), 0);
        assert_eq!(v.onboard_count(), v.capacity());
    }
}
