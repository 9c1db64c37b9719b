//! Fleet launch scheduling: direction assignment, headways, and offsets.
//!
//! The fleet is partitioned by initial direction (the same biased coin as
//! passenger generation, from a dedicated RNG stream so demand sampling is
//! unaffected). Within each direction group the launch offsets are spread
//! one headway apart with a small jitter, so vehicles enter service
//! staggered and roughly evenly spaced without being perfectly
//! synchronized.

use chrono::TimeDelta;
use rand::Rng;

use corridor_model::{Route, Vehicle};
use corridor_types::Direction;

use crate::clock::minutes;
use crate::demand::DemandProfile;

/// Lower clamp of the headway, in minutes.
pub const HEADWAY_MIN_MINUTES: f64 = 0.5;
/// Upper clamp of the headway, in minutes.
pub const HEADWAY_MAX_MINUTES: f64 = 15.0;
/// Fallback average speed when a group reports no usable speed, km/h.
const FALLBACK_SPEED_KMH: f64 = 25.0;

/// One entry of the launch plan: which fleet slot launches when.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchSlot {
    /// Index of the vehicle in the fleet vector.
    pub fleet_index: usize,
    /// Simulated offset from the run start at which the vehicle launches.
    pub offset: TimeDelta,
}

/// Target headway for a direction group.
///
/// Trip duration is `route_km / v̄` hours; the headway is the trip time
/// divided across the group, clamped to `[0.5, 15]` minutes.
pub fn headway_minutes(route_km: f64, avg_speed_kmh: f64, group_size: usize) -> f64 {
    if group_size == 0 {
        return HEADWAY_MAX_MINUTES;
    }
    let speed = if avg_speed_kmh > 0.0 {
        avg_speed_kmh
    } else {
        FALLBACK_SPEED_KMH
    };
    let trip_minutes = route_km / speed * 60.0;
    #[allow(clippy::cast_precision_loss)]
    let raw = trip_minutes / group_size as f64;
    raw.clamp(HEADWAY_MIN_MINUTES, HEADWAY_MAX_MINUTES)
}

/// Assign each vehicle an initial direction by the period's biased coin
/// and park it at the matching terminus.
pub fn assign_directions<R: Rng + ?Sized>(
    fleet: &mut [Vehicle],
    route: &Route,
    profile: &DemandProfile,
    rng: &mut R,
) {
    let p_outbound = profile.p_outbound();
    let (Some(first), Some(last)) = (route.first_stop_id(), route.last_stop_id()) else {
        return;
    };
    for vehicle in fleet {
        if rng.random::<f64>() <= p_outbound {
            vehicle.direction = Direction::Outbound;
            vehicle.current_stop = first;
        } else {
            vehicle.direction = Direction::Inbound;
            vehicle.current_stop = last;
        }
    }
}

/// Build the launch plan: per-direction groups, staggered offsets with
/// jitter uniform in `[-0.2H, +0.2H]`, clamped non-negative.
///
/// Outbound slots come first, then inbound, mirroring the order the
/// direction groups are scheduled.
pub fn build_launch_plan<R: Rng + ?Sized>(
    fleet: &[Vehicle],
    route_km: f64,
    rng: &mut R,
) -> Vec<LaunchSlot> {
    let outbound: Vec<usize> = fleet
        .iter()
        .enumerate()
        .filter(|(_, v)| v.direction.is_outbound())
        .map(|(i, _)| i)
        .collect();
    let inbound: Vec<usize> = fleet
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.direction.is_outbound())
        .map(|(i, _)| i)
        .collect();

    let mut plan = group_slots(fleet, &outbound, route_km, rng);
    plan.extend(group_slots(fleet, &inbound, route_km, rng));
    plan
}

fn group_slots<R: Rng + ?Sized>(
    fleet: &[Vehicle],
    group: &[usize],
    route_km: f64,
    rng: &mut R,
) -> Vec<LaunchSlot> {
    if group.is_empty() {
        return Vec::new();
    }
    let speed_sum: f64 = group
        .iter()
        .filter_map(|&i| fleet.get(i))
        .map(|v| v.avg_speed_kmh)
        .sum();
    #[allow(clippy::cast_precision_loss)]
    let avg_speed = speed_sum / group.len() as f64;
    let headway = headway_minutes(route_km, avg_speed, group.len());

    group
        .iter()
        .enumerate()
        .map(|(position, &fleet_index)| {
            #[allow(clippy::cast_precision_loss)]
            let base = position as f64 * headway;
            let jitter = rng.random::<f64>().mul_add(0.4, -0.2) * headway;
            let offset_min = (base + jitter).max(0.0);
            LaunchSlot {
                fleet_index,
                offset: minutes(offset_min),
            }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use corridor_model::{Stop, VehicleType};
    use corridor_types::{StopId, VehicleId, VehicleTypeId};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::demand::DemandProfile;

    fn route_of(n: u32) -> Route {
        let stops = (1..=n)
            .map(|i| Stop::new(StopId(i), format!("S{i}"), 0.0, 0.0, 1.0, false))
            .collect();
        Route::new(String::from("t"), stops, None).unwrap()
    }

    fn fleet_of(n: u32, speed: f64) -> Vec<Vehicle> {
        let vt = VehicleType {
            id: VehicleTypeId(1),
            name: String::from("Standard"),
            capacity: 60,
            cost_per_km: 1.0,
        };
        (1..=n)
            .map(|i| Vehicle::new(VehicleId(i), vt.clone(), StopId(1), Direction::Outbound, speed))
            .collect()
    }

    fn neutral_profile() -> DemandProfile {
        DemandProfile {
            favored_outbound: false,
            favored_inbound: false,
            direction_bias: 1.4,
            spatial_gradient: 0.8,
            baseline_demand: 0.3,
        }
    }

    #[test]
    fn headway_clamps_to_upper_bound() {
        // 20 km at 25 km/h -> 48 min trip; 48/3 = 16 min, clamped to 15.
        let h = headway_minutes(20.0, 25.0, 3);
        assert!((h - 15.0).abs() < 1e-9);
    }

    #[test]
    fn headway_clamps_to_lower_bound() {
        // A short route with a big group would go below 0.5 min.
        let h = headway_minutes(1.0, 30.0, 40);
        assert!((h - 0.5).abs() < 1e-9);
    }

    #[test]
    fn headway_falls_back_on_zero_speed() {
        // 10 km at fallback 25 km/h -> 24 min trip, /2 = 12 min.
        let h = headway_minutes(10.0, 0.0, 2);
        assert!((h - 12.0).abs() < 1e-9);
    }

    #[test]
    fn direction_assignment_parks_at_matching_terminus() {
        let route = route_of(5);
        let mut fleet = fleet_of(30, 28.0);
        let mut rng = StdRng::seed_from_u64(11);
        assign_directions(&mut fleet, &route, &neutral_profile(), &mut rng);
        for vehicle in &fleet {
            match vehicle.direction {
                Direction::Outbound => assert_eq!(vehicle.current_stop, StopId(1)),
                Direction::Inbound => assert_eq!(vehicle.current_stop, StopId(5)),
            }
        }
        // Unbiased coin: both directions occur in a group of 30.
        assert!(fleet.iter().any(|v| v.direction.is_outbound()));
        assert!(fleet.iter().any(|v| !v.direction.is_outbound()));
    }

    #[test]
    fn launch_offsets_are_non_negative_and_roughly_spaced() {
        let mut fleet = fleet_of(4, 25.0);
        let route = route_of(5);
        let mut rng = StdRng::seed_from_u64(3);
        assign_directions(&mut fleet, &route, &neutral_profile(), &mut rng);
        let plan = build_launch_plan(&fleet, 20.0, &mut rng);
        assert_eq!(plan.len(), 4);
        for slot in &plan {
            assert!(slot.offset >= TimeDelta::zero());
        }
        // Every fleet slot appears exactly once.
        let mut indices: Vec<usize> = plan.iter().map(|s| s.fleet_index).collect();
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn jitter_stays_within_a_fifth_of_the_headway() {
        let fleet = fleet_of(3, 25.0);
        let mut rng = StdRng::seed_from_u64(5);
        // All outbound (constructed that way), route 20 km -> headway 15.
        let plan = build_launch_plan(&fleet, 20.0, &mut rng);
        for (i, slot) in plan.iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let base = i as f64 * 15.0;
            let offset_min = crate::clock::delta_minutes(slot.offset);
            assert!(offset_min >= (base - 3.0).max(0.0) - 1e-9);
            assert!(offset_min <= base + 3.0 + 1e-9);
        }
    }
}
