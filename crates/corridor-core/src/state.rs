//! Shared simulation state, the dwell rule, and the completion predicate.
//!
//! One [`SimState`] exists per run. In the real-time engine it sits behind
//! a single `tokio::sync::Mutex` shared by every vehicle task and the
//! generator task; the lock is held only for the duration of a mutation,
//! never across a simulated wait. The fast-forward engine owns its state
//! outright and needs no lock at all.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;

use corridor_model::{Route, Vehicle};
use corridor_model::stop::BoardingOutcome;
use corridor_types::{PassengerId, RunId, VehicleId};

use crate::clock::{SimClock, millis};

/// Simulated pause between alighting and boarding at a stop, in ms.
pub const PRE_BOARD_PAUSE_MS: i64 = 650;
/// Simulated dwell at a terminus before the direction flip, in ms.
pub const TERMINAL_PAUSE_MS: i64 = 3_000;
/// Size of one travel sub-step, in simulated ms.
pub const TRAVEL_STEP_MS: i64 = 800;
/// Fraction of the passenger cap generated before the run's live events.
pub const INITIAL_SEED_FRACTION: f64 = 0.05;
/// Stream separator for the scheduler's dedicated RNG.
const SCHEDULE_SEED_XOR: u64 = 0x539f_0a17;

/// Static parameters of one run, shared verbatim by both engines.
#[derive(Debug, Clone)]
pub struct SimParams {
    /// Identifier external control requests use to reach this run.
    pub run_id: RunId,
    /// Random seed; every stochastic stream derives from it.
    pub seed: u64,
    /// Coarse time-of-day period selecting the demand multiplier.
    pub period_id: u8,
    /// Total passengers to generate (0 = unbounded).
    pub passenger_cap: u64,
    /// Whether the morning peak favors the outbound direction.
    pub morning_peak_outbound: bool,
    /// Directional bias factor toward the favored direction.
    pub direction_bias: f64,
    /// Spatial gradient strength in `[0, 1]`.
    pub spatial_gradient: f64,
    /// Baseline demand fraction in `[0, 1]`.
    pub baseline_demand: f64,
    /// Expected arrivals per minute for the corridor, before multipliers.
    pub base_rate_per_min: f64,
    /// Vehicle to emit trace logs for, if any.
    pub trace_vehicle: Option<VehicleId>,
    /// Simulated start instant of the run.
    pub start: DateTime<Utc>,
}

impl SimParams {
    /// The RNG stream for demand sampling.
    pub fn demand_rng(&self) -> StdRng {
        StdRng::seed_from_u64(self.seed)
    }

    /// The dedicated RNG stream for launch scheduling decisions.
    pub fn schedule_rng(&self) -> StdRng {
        StdRng::seed_from_u64(self.seed ^ SCHEDULE_SEED_XOR)
    }

    /// Number of passengers seeded before live generation starts.
    pub fn seed_target(&self) -> u64 {
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let target = (self.passenger_cap as f64 * INITIAL_SEED_FRACTION) as u64;
        target
    }
}

/// Global run counters. All cumulative, all non-decreasing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Counters {
    /// Passengers generated so far.
    pub generated: u64,
    /// Outbound share of the generated count.
    pub outbound_generated: u64,
    /// Inbound share of the generated count.
    pub inbound_generated: u64,
    /// Passengers that alighted (served) so far.
    pub served: u64,
    /// Sum of boarded passengers' waits, in minutes.
    pub wait_sum_min: f64,
    /// Number of boardings contributing to the wait sum.
    pub wait_count: u64,
}

impl Counters {
    /// Running average wait in minutes (0 before the first boarding).
    pub fn avg_wait_min(&self) -> f64 {
        if self.wait_count == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let count = self.wait_count as f64;
        self.wait_sum_min / count
    }
}

/// Mutable simulation state shared by all tasks of a run.
#[derive(Debug)]
pub struct SimState {
    /// The corridor route with its live stop queues.
    pub route: Route,
    /// Every vehicle in the fleet, indexed by fleet position.
    pub fleet: Vec<Vehicle>,
    /// The monotone simulated clock.
    pub clock: SimClock,
    /// Global run counters.
    pub counters: Counters,
    /// Kilometres traveled per vehicle.
    pub distance_km: BTreeMap<VehicleId, f64>,
    /// RNG stream for demand sampling (direction, origin, destination,
    /// Poisson counts, seed backdates).
    pub demand_rng: StdRng,
    /// Passenger cap (0 = unbounded).
    pub cap: u64,

    passenger_seq: u64,
}

impl SimState {
    /// Assemble the state for a run.
    pub fn new(route: Route, fleet: Vec<Vehicle>, params: &SimParams) -> Self {
        Self {
            route,
            fleet,
            clock: SimClock::new(params.start),
            counters: Counters::default(),
            distance_km: BTreeMap::new(),
            demand_rng: params.demand_rng(),
            cap: params.passenger_cap,
            passenger_seq: 0,
        }
    }

    /// Mint the next sequential passenger id.
    pub fn next_passenger_id(&mut self) -> PassengerId {
        self.passenger_seq = self.passenger_seq.saturating_add(1);
        PassengerId(self.passenger_seq)
    }

    /// Passengers currently inside the system: onboard any vehicle or
    /// queued at any stop.
    pub fn in_system(&self) -> usize {
        let onboard: usize = self.fleet.iter().map(Vehicle::onboard_count).sum();
        onboard.saturating_add(self.route.queued_total())
    }

    /// The completion predicate.
    ///
    /// Defined only for capped runs: true once the generated count reached
    /// the cap and the system is fully drained. An unbounded run (cap 0)
    /// never completes; it only stops on the external signal.
    pub fn is_done(&self) -> bool {
        self.cap > 0 && self.counters.generated >= self.cap && self.in_system() == 0
    }

    /// Passengers still allowed under the cap (`u64::MAX` when unbounded).
    pub const fn remaining_under_cap(&self) -> u64 {
        if self.cap == 0 {
            u64::MAX
        } else {
            self.cap.saturating_sub(self.counters.generated)
        }
    }

    /// Credit traveled distance to a vehicle.
    pub fn add_distance(&mut self, vehicle: VehicleId, km: f64) {
        *self.distance_km.entry(vehicle).or_insert(0.0) += km;
    }

    /// Fold one boarding pass into the wait aggregates and served stats.
    ///
    /// Boardings with a zero wait sum leave the aggregates untouched (the
    /// running average only reflects boardings that actually waited).
    pub fn record_boarding(&mut self, outcome: &BoardingOutcome) {
        if outcome.wait_minutes_sum > 0.0 {
            self.counters.wait_sum_min += outcome.wait_minutes_sum;
            self.counters.wait_count = self
                .counters
                .wait_count
                .saturating_add(outcome.boarded as u64);
        }
    }

    /// Count alighted passengers as served.
    pub fn record_served(&mut self, alighted: usize) {
        self.counters.served = self.counters.served.saturating_add(alighted as u64);
    }

    /// Generated count clamped to the cap, for finalization.
    pub const fn generated_clamped(&self) -> u64 {
        if self.cap > 0 && self.counters.generated > self.cap {
            self.cap
        } else {
            self.counters.generated
        }
    }
}

/// Dwell time for a stop visit: `1200ms + 300ms × (boarded + alighted)`,
/// capped at 4 seconds.
pub fn dwell_duration(boarded: usize, alighted: usize) -> TimeDelta {
    let moved = boarded.saturating_add(alighted) as i64;
    let ms = 300_i64.saturating_mul(moved).saturating_add(1_200).min(4_000);
    millis(ms)
}

/// Subdivide one travel leg into fixed-size sub-steps.
///
/// The leg takes `dist / speed` of simulated time; it is cut into
/// [`TRAVEL_STEP_MS`]-sized steps (at least one), dropping millisecond
/// remainders the way integer division does. Both engines use this same
/// subdivision, so their travel timing is identical.
///
/// Returns `(steps, step_ms)`.
pub fn travel_leg(dist_km: f64, speed_kmh: f64) -> (i64, i64) {
    let travel_minutes = if speed_kmh > 0.0 {
        dist_km.max(0.0) / speed_kmh * 60.0
    } else {
        0.0
    };
    #[allow(clippy::cast_possible_truncation)]
    let total_ms = (travel_minutes * 60_000.0).round() as i64;
    let steps = (total_ms / TRAVEL_STEP_MS).max(1);
    (steps, total_ms / steps)
}
