//! The event-queue fast-forward engine.
//!
//! A time-ordered priority queue of "vehicle reaches stop index at T"
//! events drives the whole run: processing an event advances the simulated
//! clock directly to `T`, generates any demand due in the elapsed interval
//! (on the same fixed 1-second grid as the real-time engine), performs the
//! alight/board/dwell sequence, and pushes the vehicle's next event. No
//! real sleeping happens anywhere.
//!
//! This strategy exists for offline batch evaluation: given the same seed
//! and configuration it reaches the same terminal counters as the
//! real-time engine, in a fraction of the wall-clock time.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use chrono::{DateTime, TimeDelta, Utc};

use corridor_model::{Route, Vehicle};

use crate::clock::{delta_minutes, millis};
use crate::control::{ARRIVAL_MAX, ARRIVAL_MIN};
use crate::demand::{self, DemandProfile};
use crate::report::Summary;
use crate::reposition;
use crate::schedule;
use crate::state::{
    PRE_BOARD_PAUSE_MS, SimParams, SimState, TERMINAL_PAUSE_MS, dwell_duration, travel_leg,
};

/// Simulated duration of one demand generation step, ms. Must match the
/// real-time generator's step for seed-for-seed agreement.
const GENERATION_STEP_MS: i64 = 1_000;

/// Errors that can stop a batch run before it starts.
#[derive(Debug, thiserror::Error)]
pub enum FastForwardError {
    /// The fast-forward engine only terminates through the completion
    /// predicate, which is undefined for unbounded runs.
    #[error("fast-forward runs require a passenger cap > 0")]
    CapRequired,
}

/// One queued vehicle arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FfEvent {
    t: DateTime<Utc>,
    seq: u64,
    fleet_index: usize,
    stop_idx: usize,
}

impl Ord for FfEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        self.t.cmp(&other.t).then(self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for FfEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Lazy demand advance on the fixed generation grid.
struct GridGenerator {
    gen_now: DateTime<Utc>,
    step: TimeDelta,
    arrival_factor: f64,
}

impl GridGenerator {
    /// Generate all demand due up to `t`.
    ///
    /// Steps the grid one simulated second at a time; each complete step
    /// draws one Poisson count and spawns that batch stamped at the step
    /// boundary. Once the cap is reached no further draws happen, matching
    /// the real-time generator's exit.
    fn advance_to(
        &mut self,
        state: &mut SimState,
        profile: &DemandProfile,
        params: &SimParams,
        t: DateTime<Utc>,
    ) {
        if state.cap > 0 && state.counters.generated >= state.cap {
            return;
        }
        while self.gen_now + self.step <= t {
            self.gen_now += self.step;
            let mean = demand::step_mean(params, self.arrival_factor, delta_minutes(self.step));
            let drawn = demand::poisson(&mut state.demand_rng, mean);
            let count = drawn.min(state.remaining_under_cap());
            if count > 0 {
                let _ = demand::generate_batch(state, profile, count, self.gen_now);
            }
            if state.cap > 0 && state.counters.generated >= state.cap {
                return;
            }
        }
    }
}

/// Execute one complete batch run and return its summary.
///
/// # Errors
///
/// Returns [`FastForwardError::CapRequired`] when no passenger cap is
/// configured; everything else is handled by clamping or no-op.
pub fn run(
    route: Route,
    mut fleet: Vec<Vehicle>,
    params: &SimParams,
    arrival_factor: f64,
) -> Result<Summary, FastForwardError> {
    if params.passenger_cap == 0 {
        return Err(FastForwardError::CapRequired);
    }

    let profile = DemandProfile::from_params(params);
    let mut schedule_rng = params.schedule_rng();
    schedule::assign_directions(&mut fleet, &route, &profile, &mut schedule_rng);
    let plan = schedule::build_launch_plan(&fleet, route.total_distance_km(), &mut schedule_rng);

    let mut state = SimState::new(route, fleet, params);
    let seed_target = params.seed_target();
    if seed_target > 0 {
        let _ = demand::seed_initial(&mut state, &profile, seed_target);
    }

    let mut generator = GridGenerator {
        gen_now: params.start,
        step: millis(GENERATION_STEP_MS),
        arrival_factor: if arrival_factor.is_finite() {
            arrival_factor.clamp(ARRIVAL_MIN, ARRIVAL_MAX)
        } else {
            1.0
        },
    };

    let mut heap: BinaryHeap<Reverse<FfEvent>> = BinaryHeap::new();
    let mut seq: u64 = 0;
    for slot in plan {
        let Some(vehicle) = state.fleet.get(slot.fleet_index) else {
            continue;
        };
        let stop_idx = state
            .route
            .index_of(vehicle.current_stop)
            .unwrap_or_else(|| state.route.start_index(vehicle.direction));
        heap.push(Reverse(FfEvent {
            t: params.start + slot.offset,
            seq,
            fleet_index: slot.fleet_index,
            stop_idx,
        }));
        seq = seq.saturating_add(1);
    }

    // Event loop: each iteration is one stop visit.
    while let Some(Reverse(event)) = heap.pop() {
        generator.advance_to(&mut state, &profile, params, event.t);
        let mut local_now = event.t;
        let _ = state.clock.advance_to(local_now);

        // Arrive and alight.
        let Some(stop_id) = state.route.stop(event.stop_idx).map(|s| s.id) else {
            continue;
        };
        let Some(vehicle) = state.fleet.get_mut(event.fleet_index) else {
            continue;
        };
        vehicle.current_stop = stop_id;
        let alighted = vehicle.alight_here(local_now);
        state.record_served(alighted.len());

        // Pre-board pause.
        local_now += millis(PRE_BOARD_PAUSE_MS);
        generator.advance_to(&mut state, &profile, params, local_now);
        let _ = state.clock.advance_to(local_now);

        // Board.
        let state_ref = &mut state;
        let boarded = {
            let SimState { route, fleet, .. } = state_ref;
            let (Some(stop), Some(vehicle)) =
                (route.stop_mut(event.stop_idx), fleet.get_mut(event.fleet_index))
            else {
                continue;
            };
            stop.board_onto(vehicle, local_now)
        };
        state.record_boarding(&boarded);
        if state.is_done() {
            break;
        }

        // Dwell.
        let dwell = dwell_duration(boarded.boarded, alighted.len());
        local_now += dwell;
        generator.advance_to(&mut state, &profile, params, local_now);
        let _ = state.clock.advance_to(local_now);
        if state.is_done() {
            break;
        }

        let Some(vehicle) = state.fleet.get(event.fleet_index) else {
            continue;
        };
        let direction = vehicle.direction;
        let speed = vehicle.avg_speed_kmh;
        let vehicle_id = vehicle.id;

        match state.route.next_index(event.stop_idx, direction) {
            None => {
                // Terminus: forced alighting, terminal dwell, flip, requeue.
                if let Some(vehicle) = state.fleet.get_mut(event.fleet_index) {
                    let forced = vehicle.alight_all(local_now);
                    state.record_served(forced.len());
                }
                if state.is_done() {
                    break;
                }
                local_now += millis(TERMINAL_PAUSE_MS);
                generator.advance_to(&mut state, &profile, params, local_now);
                let _ = state.clock.advance_to(local_now);
                if state.is_done() {
                    break;
                }
                if let Some(vehicle) = state.fleet.get_mut(event.fleet_index) {
                    vehicle.direction = vehicle.direction.reverse();
                }
                heap.push(Reverse(FfEvent {
                    t: local_now,
                    seq,
                    fleet_index: event.fleet_index,
                    stop_idx: event.stop_idx,
                }));
                seq = seq.saturating_add(1);
            }
            Some(next_idx) => {
                // Travel, advancing demand through every sub-step.
                let dist = state.route.segment_km(event.stop_idx, direction);
                let (steps, step_ms) = travel_leg(dist, speed);
                for _ in 0..steps {
                    local_now += millis(step_ms);
                    generator.advance_to(&mut state, &profile, params, local_now);
                    let _ = state.clock.advance_to(local_now);
                }
                state.add_distance(vehicle_id, dist);
                let next_id = state.route.stop(next_idx).map(|s| s.id);
                if let (Some(vehicle), Some(next_id)) =
                    (state.fleet.get_mut(event.fleet_index), next_id)
                {
                    vehicle.current_stop = next_id;
                }
                heap.push(Reverse(FfEvent {
                    t: local_now,
                    seq,
                    fleet_index: event.fleet_index,
                    stop_idx: next_idx,
                }));
                seq = seq.saturating_add(1);
            }
        }
    }

    reposition_all(&mut state);

    Ok(Summary::from_state(&state, state.is_done()))
}

/// Move every vehicle to its layover target, sequentially.
///
/// Distance accrues gradually per sub-step exactly like the real-time
/// reposition phase, so per-vehicle totals agree between engines.
fn reposition_all(state: &mut SimState) {
    for fleet_index in 0..state.fleet.len() {
        let Some((vehicle_id, current_index, direction, speed)) = state
            .fleet
            .get(fleet_index)
            .and_then(|v| {
                state
                    .route
                    .index_of(v.current_stop)
                    .map(|i| (v.id, i, v.direction, v.avg_speed_kmh))
            })
        else {
            continue;
        };
        let Some(target) = reposition::select_target(&state.route, current_index, direction)
        else {
            continue;
        };
        if target.index == current_index {
            continue;
        }

        let mut idx = current_index;
        let mut now = state.clock.now();
        while idx != target.index {
            let next = if target.index > idx {
                idx.saturating_add(1)
            } else {
                idx.saturating_sub(1)
            };
            let dist = state.route.km_between(idx, next);
            let (steps, step_ms) = travel_leg(dist, speed);
            #[allow(clippy::cast_precision_loss)]
            let km_per_step = dist / steps as f64;
            for _ in 0..steps {
                now += millis(step_ms);
                let _ = state.clock.advance_to(now);
                state.add_distance(vehicle_id, km_per_step);
            }
            idx = next;
        }
        let target_id = state.route.stop(target.index).map(|s| s.id);
        if let (Some(vehicle), Some(target_id)) = (state.fleet.get_mut(fleet_index), target_id) {
            vehicle.current_stop = target_id;
        }
    }
}
