//! The concurrent, speed-scalable real-time engine.
//!
//! One tokio task per vehicle plus one demand generator task cooperate
//! over the shared [`SimState`] behind a single mutex. Every simulated
//! wait happens in chunks of at most 500 ms of simulated time; each
//! chunk's real sleep re-reads the live speed multiplier, so an operator
//! can retune the run without restarting it. The lock is only ever held
//! for the duration of a mutation, never across a sleep.
//!
//! Checkpoints: the external stop signal is observed at every stop
//! boundary and every travel sub-step; the completion predicate is
//! checked at stop boundaries only, so an in-flight leg always finishes
//! and its distance is credited -- exactly like the fast-forward engine.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, info};

use corridor_model::{Route, Vehicle};
use corridor_types::{MovePhase, SimEvent, VehicleId};

use crate::clock::{delta_minutes, millis};
use crate::control::ControlState;
use crate::demand::{self, DemandProfile};
use crate::report::Summary;
use crate::reposition;
use crate::schedule::{self, LaunchSlot};
use crate::state::{
    PRE_BOARD_PAUSE_MS, SimParams, SimState, TERMINAL_PAUSE_MS, dwell_duration, travel_leg,
};

/// Real seconds per simulated second at speed multiplier 1.
const SIM_SEC_TO_REAL: f64 = 0.2;
/// Largest slice of simulated time slept before re-reading the controls, ms.
const CHUNK_SIM_MS: i64 = 500;
/// Simulated duration of one demand generation step, ms.
const GENERATION_STEP_MS: i64 = 1_000;

/// Everything a run's tasks share.
struct EngineCtx {
    state: Mutex<SimState>,
    events: mpsc::UnboundedSender<SimEvent>,
    control: Arc<ControlState>,
    params: SimParams,
    profile: DemandProfile,
}

impl EngineCtx {
    /// Push an event to the output stream; a dropped consumer is fine.
    fn emit(&self, event: SimEvent) {
        let _ = self.events.send(event);
    }

    fn traces(&self, vehicle: VehicleId) -> bool {
        self.params.trace_vehicle == Some(vehicle)
    }
}

/// Wait for `sim` of simulated time, in chunks.
///
/// Each chunk's real sleep is `chunk × 0.2 / speed`, with the speed
/// multiplier read fresh at the chunk boundary. Returns `false` when the
/// external stop signal cut the wait short.
async fn wait_sim(control: &ControlState, sim: TimeDelta) -> bool {
    let mut remaining_ms = sim.num_milliseconds();
    while remaining_ms > 0 {
        let chunk_ms = remaining_ms.min(CHUNK_SIM_MS);
        let speed = control.speed();
        #[allow(clippy::cast_precision_loss)]
        let real_secs = chunk_ms as f64 * SIM_SEC_TO_REAL / speed / 1_000.0;
        tokio::select! {
            () = control.cancelled() => return false,
            () = tokio::time::sleep(Duration::from_secs_f64(real_secs)) => {}
        }
        remaining_ms = remaining_ms.saturating_sub(chunk_ms);
    }
    true
}

/// Drive one complete real-time run.
///
/// Emits the observable event stream over `events` while running, and
/// returns the final [`Summary`] once every vehicle has parked (or the
/// stop signal emptied the task set). The caller typically spawns this
/// and consumes the events.
pub async fn run(
    route: Route,
    mut fleet: Vec<Vehicle>,
    params: SimParams,
    control: Arc<ControlState>,
    events: mpsc::UnboundedSender<SimEvent>,
) -> Summary {
    let profile = DemandProfile::from_params(&params);
    let mut schedule_rng = params.schedule_rng();
    schedule::assign_directions(&mut fleet, &route, &profile, &mut schedule_rng);
    let plan = schedule::build_launch_plan(&fleet, route.total_distance_km(), &mut schedule_rng);

    let mut state = SimState::new(route, fleet, &params);

    // Initial seeding so the first stops are not empty.
    let seed_target = params.seed_target();
    if seed_target > 0 {
        let seeded = demand::seed_initial(&mut state, &profile, seed_target);
        debug!(seeded, "initial passengers seeded");
    }

    let ctx = Arc::new(EngineCtx {
        events,
        control,
        params,
        profile,
        state: Mutex::new(state),
    });

    {
        let state = ctx.state.lock().await;
        for stop in state.route.stops() {
            ctx.emit(stop_update_event(&state, stop.id));
        }
        ctx.emit(SimEvent::Init {
            time: state.clock.now(),
            run_id: ctx.params.run_id.to_string(),
            generated: state.counters.generated,
            outbound_generated: state.counters.outbound_generated,
            inbound_generated: state.counters.inbound_generated,
            arrival_factor: ctx.control.arrival_factor(),
        });
    }

    let mut tasks = JoinSet::new();
    tasks.spawn(generator_task(Arc::clone(&ctx)));
    for slot in plan {
        tasks.spawn(vehicle_task(Arc::clone(&ctx), slot));
    }
    while tasks.join_next().await.is_some() {}

    if ctx.params.passenger_cap > 0 {
        reposition_phase(&ctx).await;
    }

    let state = ctx.state.lock().await;
    let summary = Summary::from_state(&state, state.is_done());
    ctx.emit(SimEvent::Done {
        completed: summary.completed,
        generated: summary.generated,
        outbound_generated: summary.outbound_generated,
        inbound_generated: summary.inbound_generated,
        served: summary.served,
        avg_wait_min: summary.avg_wait_min,
        vehicle_distance_km: summary.vehicle_distance_km.clone(),
    });
    info!(
        generated = summary.generated,
        served = summary.served,
        completed = summary.completed,
        "real-time run finished"
    );
    summary
}

/// Snapshot a stop's queues and the global counters into an event.
fn stop_update_event(state: &SimState, stop_id: corridor_types::StopId) -> SimEvent {
    let (outbound_queue, inbound_queue) = state.route.stop_by_id(stop_id).map_or((0, 0), |s| {
        (
            s.queue_len(corridor_types::Direction::Outbound),
            s.queue_len(corridor_types::Direction::Inbound),
        )
    });
    SimEvent::StopUpdate {
        stop_id,
        outbound_queue,
        inbound_queue,
        generated: state.counters.generated,
        outbound_generated: state.counters.outbound_generated,
        inbound_generated: state.counters.inbound_generated,
    }
}

/// Demand generator task: one Poisson batch per simulated second.
///
/// Exits when the cap is reached or the stop signal is raised; with no
/// cap it runs for the life of the simulation.
async fn generator_task(ctx: Arc<EngineCtx>) {
    let step = millis(GENERATION_STEP_MS);
    let mut gen_now = ctx.params.start;
    loop {
        {
            let state = ctx.state.lock().await;
            if state.cap > 0 && state.counters.generated >= state.cap {
                return;
            }
        }
        if !wait_sim(&ctx.control, step).await {
            return;
        }
        gen_now += step;

        let mut state = ctx.state.lock().await;
        if state.cap > 0 && state.counters.generated >= state.cap {
            return;
        }
        let arrival_factor = ctx.control.arrival_factor();
        let mean = demand::step_mean(&ctx.params, arrival_factor, delta_minutes(step));
        let drawn = demand::poisson(&mut state.demand_rng, mean);
        let count = drawn.min(state.remaining_under_cap());
        let _ = state.clock.advance_to(gen_now);
        if count > 0 {
            let updated = demand::generate_batch(&mut state, &ctx.profile, count, gen_now);
            for stop_id in updated {
                ctx.emit(stop_update_event(&state, stop_id));
            }
        }
    }
}

/// Per-vehicle traversal task: launch offset, then the unbounded
/// arrive/alight/board/dwell/travel loop with direction flips at the
/// termini.
async fn vehicle_task(ctx: Arc<EngineCtx>, slot: LaunchSlot) {
    if !wait_sim(&ctx.control, slot.offset).await {
        return;
    }
    let mut local_now = ctx.params.start + slot.offset;

    // Enter service.
    let Some(intro) = ({
        let state = ctx.state.lock().await;
        state.fleet.get(slot.fleet_index).map(|v| {
            let stop = state.route.stop_by_id(v.current_stop);
            (
                v.id,
                v.direction,
                v.avg_speed_kmh,
                v.capacity(),
                v.current_stop,
                stop.map_or(0.0, |s| s.lat),
                stop.map_or(0.0, |s| s.lng),
            )
        })
    }) else {
        return;
    };
    let (vehicle_id, direction, avg_speed_kmh, capacity, start_stop, lat, lng) = intro;
    ctx.emit(SimEvent::BusAdd {
        vehicle_id,
        direction,
        avg_speed_kmh,
        capacity,
    });
    ctx.emit(SimEvent::Move {
        vehicle_id,
        direction,
        lat,
        lng,
        fraction: 0.0,
        from: start_stop,
        to: start_stop,
        phase: MovePhase::Travel,
    });

    loop {
        if ctx.control.is_stop_requested() {
            return;
        }
        let (direction, mut idx) = {
            let state = ctx.state.lock().await;
            let Some(v) = state.fleet.get(slot.fleet_index) else {
                return;
            };
            (v.direction, state.route.start_index(v.direction))
        };

        // One full traversal in the current direction.
        loop {
            if ctx.control.is_stop_requested() {
                return;
            }
            let Some(outcome) = visit_stop(&ctx, slot.fleet_index, idx, &mut local_now).await
            else {
                return;
            };
            if outcome.done {
                return;
            }
            match outcome.next_index {
                Some(next) => {
                    if !travel_to(&ctx, slot.fleet_index, idx, next, &mut local_now).await {
                        return;
                    }
                    idx = next;
                }
                None => break,
            }
        }

        // Terminus: forced alighting, terminal dwell, direction flip.
        if !turn_around(&ctx, slot.fleet_index, direction, &mut local_now).await {
            return;
        }
    }
}

/// What happened at one stop visit.
struct VisitOutcome {
    next_index: Option<usize>,
    done: bool,
}

/// Arrive at `idx`: alight, pre-board pause, board, dwell.
///
/// Returns `None` when the stop signal interrupted the visit.
async fn visit_stop(
    ctx: &Arc<EngineCtx>,
    fleet_index: usize,
    idx: usize,
    local_now: &mut DateTime<Utc>,
) -> Option<VisitOutcome> {
    // Arrive and alight.
    let alighted_count = {
        let mut state = ctx.state.lock().await;
        let stop_id = state.route.stop(idx)?.id;
        let counters = state.counters;
        let vehicle = state.fleet.get_mut(fleet_index)?;
        vehicle.current_stop = stop_id;
        let vehicle_id = vehicle.id;
        let direction = vehicle.direction;
        let onboard_at_arrival = vehicle.onboard_count();
        let alighted = vehicle.alight_here(*local_now);
        let onboard = vehicle.onboard_count();
        state.record_served(alighted.len());

        ctx.emit(SimEvent::Arrive {
            vehicle_id,
            direction,
            stop_id,
            time: *local_now,
            onboard: onboard_at_arrival,
            generated: counters.generated,
            outbound_generated: counters.outbound_generated,
            inbound_generated: counters.inbound_generated,
        });
        if ctx.traces(vehicle_id) {
            let dist = state.distance_km.get(&vehicle_id).copied().unwrap_or(0.0);
            info!(vehicle = %vehicle_id, stop_idx = idx, stop = %stop_id, dist_km = dist, "vehicle at stop");
        }
        if !alighted.is_empty() {
            ctx.emit(SimEvent::Alight {
                vehicle_id,
                direction,
                stop_id,
                alighted: alighted.len(),
                onboard,
                served: state.counters.served,
                generated: state.counters.generated,
                terminal: false,
            });
        }
        let _ = state.clock.advance_to(*local_now);
        alighted.len()
    };

    // Visible separation between alighting and boarding.
    if !wait_sim(&ctx.control, millis(PRE_BOARD_PAUSE_MS)).await {
        return None;
    }
    *local_now += millis(PRE_BOARD_PAUSE_MS);

    // Board and dwell.
    let (dwell, done_after_board, next_index) = {
        let mut state = ctx.state.lock().await;
        let state_ref = &mut *state;
        let (Some(stop), Some(vehicle)) = (
            state_ref.route.stop_mut(idx),
            state_ref.fleet.get_mut(fleet_index),
        ) else {
            return None;
        };
        let outcome = stop.board_onto(vehicle, *local_now);
        let vehicle_id = vehicle.id;
        let direction = vehicle.direction;
        let onboard = vehicle.onboard_count();
        let stop_id = stop.id;
        let stop_outbound = stop.queue_len(corridor_types::Direction::Outbound);
        let stop_inbound = stop.queue_len(corridor_types::Direction::Inbound);
        state.record_boarding(&outcome);
        if outcome.boarded > 0 {
            ctx.emit(SimEvent::Board {
                vehicle_id,
                direction,
                stop_id,
                boarded: outcome.boarded,
                onboard,
                stop_outbound,
                stop_inbound,
                generated: state.counters.generated,
                served: state.counters.served,
                avg_wait_min: state.counters.avg_wait_min(),
            });
        }
        ctx.emit(stop_update_event(&state, stop_id));
        let _ = state.clock.advance_to(*local_now);
        let dwell = dwell_duration(outcome.boarded, alighted_count);
        let next_index = state.route.next_index(idx, direction);
        (dwell, state.is_done(), next_index)
    };
    if done_after_board {
        return Some(VisitOutcome {
            next_index: None,
            done: true,
        });
    }

    if !wait_sim(&ctx.control, dwell).await {
        return None;
    }
    *local_now += dwell;

    let done = {
        let mut state = ctx.state.lock().await;
        let _ = state.clock.advance_to(*local_now);
        state.is_done()
    };
    Some(VisitOutcome {
        next_index,
        done,
    })
}

/// Travel one leg, emitting interpolated position updates per sub-step.
///
/// Only the external stop signal interrupts a leg; a completed leg
/// credits its full distance and advances the vehicle.
async fn travel_to(
    ctx: &Arc<EngineCtx>,
    fleet_index: usize,
    from_idx: usize,
    to_idx: usize,
    local_now: &mut DateTime<Utc>,
) -> bool {
    let Some((vehicle_id, direction, leg)) = ({
        let state = ctx.state.lock().await;
        let vehicle = state.fleet.get(fleet_index);
        let from = state.route.stop(from_idx);
        let to = state.route.stop(to_idx);
        match (vehicle, from, to) {
            (Some(v), Some(f), Some(t)) => {
                let dist = state.route.segment_km(from_idx, v.direction);
                Some((
                    v.id,
                    v.direction,
                    LegGeometry {
                        from: f.id,
                        to: t.id,
                        from_lat: f.lat,
                        from_lng: f.lng,
                        to_lat: t.lat,
                        to_lng: t.lng,
                        dist_km: dist,
                        speed_kmh: v.avg_speed_kmh,
                    },
                ))
            }
            _ => None,
        }
    }) else {
        return false;
    };

    let (steps, step_ms) = travel_leg(leg.dist_km, leg.speed_kmh);
    for step in 1..=steps {
        #[allow(clippy::cast_precision_loss)]
        let fraction = step as f64 / steps as f64;
        ctx.emit(SimEvent::Move {
            vehicle_id,
            direction,
            lat: leg.from_lat + (leg.to_lat - leg.from_lat) * fraction,
            lng: leg.from_lng + (leg.to_lng - leg.from_lng) * fraction,
            fraction,
            from: leg.from,
            to: leg.to,
            phase: MovePhase::Travel,
        });
        if !wait_sim(&ctx.control, millis(step_ms)).await {
            return false;
        }
        *local_now += millis(step_ms);
        let mut state = ctx.state.lock().await;
        let _ = state.clock.advance_to(*local_now);
    }

    let mut state = ctx.state.lock().await;
    state.add_distance(vehicle_id, leg.dist_km);
    if let Some(vehicle) = state.fleet.get_mut(fleet_index) {
        vehicle.current_stop = leg.to;
    }
    true
}

/// Static geometry of one leg, captured under the lock.
struct LegGeometry {
    from: corridor_types::StopId,
    to: corridor_types::StopId,
    from_lat: f64,
    from_lng: f64,
    to_lat: f64,
    to_lng: f64,
    dist_km: f64,
    speed_kmh: f64,
}

/// Terminus handling: forced alight, terminal dwell, direction flip.
///
/// Returns `false` when the task should exit (stop signal or completion).
async fn turn_around(
    ctx: &Arc<EngineCtx>,
    fleet_index: usize,
    direction: corridor_types::Direction,
    local_now: &mut DateTime<Utc>,
) -> bool {
    let done = {
        let mut state = ctx.state.lock().await;
        let Some(vehicle) = state.fleet.get_mut(fleet_index) else {
            return false;
        };
        let vehicle_id = vehicle.id;
        let stop_id = vehicle.current_stop;
        let forced = vehicle.alight_all(*local_now);
        let onboard = vehicle.onboard_count();
        state.record_served(forced.len());
        if !forced.is_empty() {
            ctx.emit(SimEvent::Alight {
                vehicle_id,
                direction,
                stop_id,
                alighted: forced.len(),
                onboard,
                served: state.counters.served,
                generated: state.counters.generated,
                terminal: true,
            });
        }
        let _ = state.clock.advance_to(*local_now);
        state.is_done()
    };
    if done {
        return false;
    }

    if !wait_sim(&ctx.control, millis(TERMINAL_PAUSE_MS)).await {
        return false;
    }
    *local_now += millis(TERMINAL_PAUSE_MS);

    let mut state = ctx.state.lock().await;
    let _ = state.clock.advance_to(*local_now);
    if state.is_done() {
        return false;
    }
    if let Some(vehicle) = state.fleet.get_mut(fleet_index) {
        vehicle.direction = vehicle.direction.reverse();
    }
    true
}

/// Move every vehicle to its nearest layover stop, concurrently.
async fn reposition_phase(ctx: &Arc<EngineCtx>) {
    let started = Instant::now();
    let (vehicles, layover_indices) = {
        let state = ctx.state.lock().await;
        (state.fleet.len(), state.route.layover_indices())
    };
    ctx.emit(SimEvent::RepositionStart {
        vehicles,
        layover_indices,
    });

    let mut tasks = JoinSet::new();
    for fleet_index in 0..vehicles {
        tasks.spawn(reposition_task(Arc::clone(ctx), fleet_index));
    }
    while tasks.join_next().await.is_some() {}

    #[allow(clippy::cast_possible_truncation)]
    let elapsed_ms = started.elapsed().as_millis() as i64;
    ctx.emit(SimEvent::RepositionComplete { elapsed_ms });
}

/// Drive one vehicle to its layover target.
async fn reposition_task(ctx: Arc<EngineCtx>, fleet_index: usize) {
    let Some((vehicle_id, current_index, target, current_stop)) = ({
        let state = ctx.state.lock().await;
        state.fleet.get(fleet_index).and_then(|v| {
            let current_index = state.route.index_of(v.current_stop)?;
            let target = reposition::select_target(&state.route, current_index, v.direction)?;
            Some((v.id, current_index, target, v.current_stop))
        })
    }) else {
        return;
    };
    ctx.emit(SimEvent::RepositionBus {
        vehicle_id,
        from_index: current_index,
        target_index: target.index,
        current_stop_id: current_stop,
        ahead: target.ahead,
    });

    if target.index == current_index {
        ctx.emit(SimEvent::Layover {
            vehicle_id,
            stop_id: current_stop,
        });
        if ctx.traces(vehicle_id) {
            info!(vehicle = %vehicle_id, stop_idx = current_index, "layover");
        }
        return;
    }

    let mut local_now = {
        let state = ctx.state.lock().await;
        state.clock.now()
    };
    let mut idx = current_index;
    while idx != target.index {
        let next = if target.index > idx {
            idx.saturating_add(1)
        } else {
            idx.saturating_sub(1)
        };
        if !reposition_leg(&ctx, fleet_index, vehicle_id, idx, next, &mut local_now).await {
            return;
        }
        idx = next;
    }

    let stop_id = {
        let state = ctx.state.lock().await;
        state.route.stop(target.index).map(|s| s.id)
    };
    if let Some(stop_id) = stop_id {
        ctx.emit(SimEvent::Layover {
            vehicle_id,
            stop_id,
        });
        if ctx.traces(vehicle_id) {
            info!(vehicle = %vehicle_id, stop_idx = target.index, "layover");
        }
    }
}

/// One reposition leg with gradual distance accrual.
async fn reposition_leg(
    ctx: &Arc<EngineCtx>,
    fleet_index: usize,
    vehicle_id: VehicleId,
    from_idx: usize,
    to_idx: usize,
    local_now: &mut DateTime<Utc>,
) -> bool {
    let Some((direction, leg)) = ({
        let state = ctx.state.lock().await;
        let vehicle = state.fleet.get(fleet_index);
        let from = state.route.stop(from_idx);
        let to = state.route.stop(to_idx);
        match (vehicle, from, to) {
            (Some(v), Some(f), Some(t)) => Some((
                v.direction,
                LegGeometry {
                    from: f.id,
                    to: t.id,
                    from_lat: f.lat,
                    from_lng: f.lng,
                    to_lat: t.lat,
                    to_lng: t.lng,
                    dist_km: state.route.km_between(from_idx, to_idx),
                    speed_kmh: v.avg_speed_kmh,
                },
            )),
            _ => None,
        }
    }) else {
        return false;
    };

    let (steps, step_ms) = travel_leg(leg.dist_km, leg.speed_kmh);
    #[allow(clippy::cast_precision_loss)]
    let km_per_step = leg.dist_km / steps as f64;
    for step in 1..=steps {
        #[allow(clippy::cast_precision_loss)]
        let fraction = step as f64 / steps as f64;
        ctx.emit(SimEvent::Move {
            vehicle_id,
            direction,
            lat: leg.from_lat + (leg.to_lat - leg.from_lat) * fraction,
            lng: leg.from_lng + (leg.to_lng - leg.from_lng) * fraction,
            fraction,
            from: leg.from,
            to: leg.to,
            phase: MovePhase::Reposition,
        });
        if !wait_sim(&ctx.control, millis(step_ms)).await {
            return false;
        }
        *local_now += millis(step_ms);
        let mut state = ctx.state.lock().await;
        let _ = state.clock.advance_to(*local_now);
        state.add_distance(vehicle_id, km_per_step);
    }

    let mut state = ctx.state.lock().await;
    if let Some(vehicle) = state.fleet.get_mut(fleet_index) {
        vehicle.current_stop = leg.to;
    }
    true
}
