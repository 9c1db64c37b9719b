//! Fleet construction from type/quantity declarations.
//!
//! The fleet definition declares vehicle types (capacity, cost) and how
//! many of each to deploy. Each concrete vehicle gets a randomized average
//! speed drawn from a truncated normal around a type-specific mean, and a
//! provisional starting direction; the launch scheduler reassigns
//! directions with the period's bias before the run starts.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use corridor_types::{Direction, StopId, VehicleId, VehicleTypeId};

use crate::vehicle::{Vehicle, VehicleType};

/// How many vehicles of a given type to deploy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FleetQuantity {
    /// The vehicle type to deploy.
    pub type_id: VehicleTypeId,
    /// Number of vehicles of that type.
    pub quantity: u32,
}

/// Speed bounds for the truncated normal draw, in km/h.
const SPEED_MIN_KMH: f64 = 15.0;
const SPEED_MAX_KMH: f64 = 45.0;

/// A plausible average speed (km/h) for a vehicle type.
///
/// Truncated normal around a type-specific mean: articulated/high-capacity
/// vehicles run a little slower. Rounded to one decimal.
fn sample_speed_kmh<R: Rng + ?Sized>(rng: &mut R, vehicle_type: &VehicleType) -> f64 {
    let (mut mean, mut std_dev) = (28.0, 3.5);
    if vehicle_type.capacity >= 120 {
        mean = 25.0;
        std_dev = 3.0;
    } else if vehicle_type.capacity <= 70 {
        mean = 28.0;
        std_dev = 4.0;
    }
    let name = vehicle_type.name.to_lowercase();
    if name.contains("articulated") {
        mean = 25.0;
        std_dev = 3.0;
    } else if name.contains("standard") {
        mean = 28.0;
        std_dev = 4.0;
    }

    let v = standard_normal(rng).mul_add(std_dev, mean);
    let clamped = v.clamp(SPEED_MIN_KMH, SPEED_MAX_KMH);
    (clamped * 10.0).round() / 10.0
}

/// Draw one standard normal variate via the Box-Muller transform.
fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u1: f64 = rng.random::<f64>().max(1e-12);
    let u2: f64 = rng.random();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

/// Create concrete vehicles according to fleet quantities.
///
/// Vehicle ids are assigned sequentially from 1. Types missing from the
/// `types` table and non-positive quantities are skipped. Each vehicle
/// starts at the terminus matching a provisionally coin-flipped direction.
pub fn build_fleet<R: Rng + ?Sized>(
    types: &BTreeMap<VehicleTypeId, VehicleType>,
    quantities: &[FleetQuantity],
    first_stop: StopId,
    last_stop: StopId,
    rng: &mut R,
) -> Vec<Vehicle> {
    let mut fleet = Vec::new();
    let mut next_id: u32 = 1;
    for item in quantities {
        let Some(vehicle_type) = types.get(&item.type_id) else {
            continue;
        };
        for _ in 0..item.quantity {
            let direction = if rng.random_bool(0.5) {
                Direction::Inbound
            } else {
                Direction::Outbound
            };
            let start = match direction {
                Direction::Outbound => first_stop,
                Direction::Inbound => last_stop,
            };
            let speed = sample_speed_kmh(rng, vehicle_type);
            fleet.push(Vehicle::new(
                VehicleId(next_id),
                vehicle_type.clone(),
                start,
                direction,
                speed,
            ));
            next_id = next_id.saturating_add(1);
        }
    }
    fleet
}

/// Fallback fleet: one standard vehicle per direction.
///
/// Used when the fleet definition is missing, unparsable, or resolves to
/// zero vehicles.
pub fn default_fleet(first_stop: StopId, last_stop: StopId) -> Vec<Vehicle> {
    let standard = VehicleType {
        id: VehicleTypeId(1),
        name: String::from("Standard 12m"),
        capacity: 70,
        cost_per_km: 1.75,
    };
    vec![
        Vehicle::new(
            VehicleId(1),
            standard.clone(),
            first_stop,
            Direction::Outbound,
            28.0,
        ),
        Vehicle::new(VehicleId(2), standard, last_stop, Direction::Inbound, 28.0),
    ]
}
