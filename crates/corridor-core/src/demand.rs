//! Stochastic passenger generation.
//!
//! Demand has three layers of shape: a period multiplier (coarse
//! time-of-day scale), a directional bias (a biased coin favoring the
//! peak direction), and a spatial gradient (origin probability tapering
//! from the favored terminus toward the far end). Counts per generation
//! step are Poisson; direction, origin, and destination are sampled per
//! passenger from the run's dedicated demand RNG stream.
//!
//! Both engines call the same functions here in the same order, which is
//! what makes a seed reproduce the exact same passenger population in
//! either one.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rand::Rng;

use corridor_model::Passenger;
use corridor_types::{Direction, StopId};

use crate::clock::minutes;
use crate::config::period_multiplier;
use crate::state::{SimParams, SimState};

/// Mean threshold above which the Poisson draw switches to a rounded
/// normal approximation.
const NORMAL_APPROX_THRESHOLD: f64 = 30.0;

/// Demand shape for one run: favored directions, bias, and gradient.
#[derive(Debug, Clone, Copy)]
pub struct DemandProfile {
    /// Whether the outbound direction is favored this period.
    pub favored_outbound: bool,
    /// Whether the inbound direction is favored this period.
    pub favored_inbound: bool,
    /// Directional bias factor `b >= 1`.
    pub direction_bias: f64,
    /// Spatial gradient strength `g` in `[0, 1]`.
    pub spatial_gradient: f64,
    /// Baseline demand fraction `f` in `[0, 1]`.
    pub baseline_demand: f64,
}

/// Favored directions for a period.
///
/// Period 2 (morning peak) favors outbound iff the morning peak points
/// outbound; period 5 (evening peak) favors the opposite; every other
/// period favors neither.
pub const fn favored_directions(period_id: u8, morning_peak_outbound: bool) -> (bool, bool) {
    let favored_outbound = (period_id == 2 && morning_peak_outbound)
        || (period_id == 5 && !morning_peak_outbound);
    let favored_inbound = (period_id == 2 && !morning_peak_outbound)
        || (period_id == 5 && morning_peak_outbound);
    (favored_outbound, favored_inbound)
}

impl DemandProfile {
    /// Derive the profile from run parameters.
    pub const fn from_params(params: &SimParams) -> Self {
        let (favored_outbound, favored_inbound) =
            favored_directions(params.period_id, params.morning_peak_outbound);
        Self {
            favored_outbound,
            favored_inbound,
            direction_bias: params.direction_bias,
            spatial_gradient: params.spatial_gradient,
            baseline_demand: params.baseline_demand,
        }
    }

    /// Probability that a generated passenger travels outbound.
    pub fn p_outbound(&self) -> f64 {
        if self.favored_outbound {
            self.direction_bias / (self.direction_bias + 1.0)
        } else if self.favored_inbound {
            1.0 / (self.direction_bias + 1.0)
        } else {
            0.5
        }
    }

    /// Origin weight for outbound candidate index `i` of `n` stops.
    ///
    /// The taper is 1 at the outbound origin terminus (index 0) and decays
    /// linearly to 0 at the far end. Unfavored directions get the flat
    /// `1/b` downscale; a degenerate route gets a constant weight.
    pub fn weight_outbound(&self, i: usize, n: usize) -> f64 {
        if self.spatial_gradient <= 0.0 {
            return 1.0;
        }
        if !self.favored_outbound {
            return 1.0 / self.direction_bias;
        }
        if n <= 1 {
            return 1.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let norm = (1.0 - i as f64 / (n - 1) as f64).clamp(0.0, 1.0);
        self.baseline_demand.clamp(0.0, 1.0) + self.spatial_gradient * norm
    }

    /// Origin weight for inbound candidate index `i` of `n` stops,
    /// computed symmetrically with the mirrored index (taper anchored at
    /// the last stop).
    pub fn weight_inbound(&self, i: usize, n: usize) -> f64 {
        if self.spatial_gradient <= 0.0 {
            return 1.0;
        }
        if !self.favored_inbound {
            return 1.0 / self.direction_bias;
        }
        if n <= 1 {
            return 1.0;
        }
        let mirrored = n.saturating_sub(1).saturating_sub(i);
        #[allow(clippy::cast_precision_loss)]
        let norm = (1.0 - mirrored as f64 / (n - 1) as f64).clamp(0.0, 1.0);
        self.baseline_demand.clamp(0.0, 1.0) + self.spatial_gradient * norm
    }
}

/// Expected arrivals for one generation step.
///
/// `base_rate × period_multiplier × arrival_factor × Δminutes`.
pub fn step_mean(params: &SimParams, arrival_factor: f64, step_minutes: f64) -> f64 {
    params.base_rate_per_min * period_multiplier(params.period_id) * arrival_factor * step_minutes
}

/// Draw a Poisson-distributed count with the given mean.
///
/// Knuth's product method for moderate means; for `mean > 30` a rounded
/// normal approximation (floored at zero) is used instead -- a deliberate
/// accuracy/performance trade-off for peak loads.
pub fn poisson<R: Rng + ?Sized>(rng: &mut R, mean: f64) -> u64 {
    if mean <= 0.0 {
        return 0;
    }
    if mean > NORMAL_APPROX_THRESHOLD {
        let value = standard_normal(rng).mul_add(mean.sqrt(), mean).round();
        if value < 0.0 {
            return 0;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let count = value as u64;
        return count;
    }
    let limit = (-mean).exp();
    let mut k: u64 = 0;
    let mut p = 1.0;
    while p > limit {
        k = k.saturating_add(1);
        p *= rng.random::<f64>();
    }
    k.saturating_sub(1)
}

/// One standard normal variate via the Box-Muller transform.
fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u1: f64 = rng.random::<f64>().max(1e-12);
    let u2: f64 = rng.random();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

/// Draw a travel direction from the biased coin.
fn sample_direction<R: Rng + ?Sized>(rng: &mut R, profile: &DemandProfile) -> Direction {
    if rng.random::<f64>() >= profile.p_outbound() {
        Direction::Inbound
    } else {
        Direction::Outbound
    }
}

/// Draw an (origin, destination) index pair for the given direction.
///
/// Origin by weighted sampling over the non-terminal candidates of that
/// direction; destination uniform among strictly-downstream stops.
/// Returns `None` on a route too short to travel.
fn sample_origin_dest<R: Rng + ?Sized>(
    rng: &mut R,
    profile: &DemandProfile,
    n: usize,
    direction: Direction,
) -> Option<(usize, usize)> {
    if n < 2 {
        return None;
    }
    match direction {
        Direction::Outbound => {
            let weights: Vec<f64> = (0..n.saturating_sub(1))
                .map(|i| profile.weight_outbound(i, n))
                .collect();
            let origin = pick_weighted(rng, &weights, 0);
            let span = n.saturating_sub(origin).saturating_sub(1);
            let dest = origin
                .saturating_add(1)
                .saturating_add(rng.random_range(0..span.max(1)));
            Some((origin, dest))
        }
        Direction::Inbound => {
            let weights: Vec<f64> = (1..n).map(|i| profile.weight_inbound(i, n)).collect();
            let origin = pick_weighted(rng, &weights, 0).saturating_add(1);
            let dest = rng.random_range(0..origin.max(1));
            Some((origin, dest))
        }
    }
}

/// Weighted index draw over `weights`, falling back to `default_index`
/// when floating-point residue leaves the cursor past the last bucket.
fn pick_weighted<R: Rng + ?Sized>(rng: &mut R, weights: &[f64], default_index: usize) -> usize {
    let sum: f64 = weights.iter().sum();
    let r = rng.random::<f64>() * sum;
    let mut cumulative = 0.0;
    for (i, w) in weights.iter().enumerate() {
        cumulative += w;
        if r <= cumulative {
            return i;
        }
    }
    default_index
}

/// Create one passenger and enqueue it at its origin stop.
fn spawn_passenger(
    state: &mut SimState,
    direction: Direction,
    origin_idx: usize,
    dest_idx: usize,
    arrived_at: DateTime<Utc>,
) -> Option<StopId> {
    let origin_id = state.route.stop(origin_idx)?.id;
    let dest_id = state.route.stop(dest_idx)?.id;
    let id = state.next_passenger_id();
    let passenger = Passenger::new(id, origin_id, dest_id, direction, arrived_at);
    state.route.stop_mut(origin_idx)?.enqueue(passenger);
    state.counters.generated = state.counters.generated.saturating_add(1);
    match direction {
        Direction::Outbound => {
            state.counters.outbound_generated = state.counters.outbound_generated.saturating_add(1);
        }
        Direction::Inbound => {
            state.counters.inbound_generated = state.counters.inbound_generated.saturating_add(1);
        }
    }
    Some(origin_id)
}

/// Populate a small number of initial passengers before streaming starts,
/// so the first stops are not empty. Arrival timestamps are backdated by
/// up to 2 minutes to simulate pre-existing waiting.
///
/// Returns how many passengers were seeded.
pub fn seed_initial(state: &mut SimState, profile: &DemandProfile, seed_target: u64) -> u64 {
    let start = state.clock.start();
    let mut seeded: u64 = 0;
    while state.counters.generated < seed_target && state.remaining_under_cap() > 0 {
        let direction = sample_direction(&mut state.demand_rng, profile);
        let n = state.route.len();
        let Some((origin_idx, dest_idx)) =
            sample_origin_dest(&mut state.demand_rng, profile, n, direction)
        else {
            break;
        };
        let backdate_min = state.demand_rng.random::<f64>() * 2.0;
        let arrived_at = start - minutes(backdate_min);
        if spawn_passenger(state, direction, origin_idx, dest_idx, arrived_at).is_none() {
            break;
        }
        seeded = seeded.saturating_add(1);
    }
    seeded
}

/// Generate up to `count` passengers stamped at `now`.
///
/// Stops at the cap. Returns the set of stops whose queues changed.
pub fn generate_batch(
    state: &mut SimState,
    profile: &DemandProfile,
    count: u64,
    now: DateTime<Utc>,
) -> BTreeSet<StopId> {
    let mut updated = BTreeSet::new();
    for _ in 0..count {
        if state.remaining_under_cap() == 0 {
            break;
        }
        let direction = sample_direction(&mut state.demand_rng, profile);
        let n = state.route.len();
        let Some((origin_idx, dest_idx)) =
            sample_origin_dest(&mut state.demand_rng, profile, n, direction)
        else {
            break;
        };
        match spawn_passenger(state, direction, origin_idx, dest_idx, now) {
            Some(stop_id) => {
                let _ = updated.insert(stop_id);
            }
            None => break,
        }
    }
    updated
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use corridor_model::{Route, Stop, Vehicle, VehicleType};
    use corridor_types::{RunId, StopId, VehicleId, VehicleTypeId};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn params(cap: u64, period_id: u8) -> SimParams {
        SimParams {
            run_id: RunId::new(),
            seed: 1234,
            period_id,
            passenger_cap: cap,
            morning_peak_outbound: true,
            direction_bias: 1.4,
            spatial_gradient: 0.8,
            baseline_demand: 0.3,
            base_rate_per_min: 1.2,
            trace_vehicle: None,
            start: Utc::now(),
        }
    }

    fn route_of(n: u32) -> Route {
        let stops = (1..=n)
            .map(|i| Stop::new(StopId(i), format!("S{i}"), 0.0, 0.0, 1.0, false))
            .collect();
        Route::new(String::from("t"), stops, None).unwrap()
    }

    fn state_with(n: u32, cap: u64, period_id: u8) -> SimState {
        let vt = VehicleType {
            id: VehicleTypeId(1),
            name: String::from("Standard"),
            capacity: 60,
            cost_per_km: 1.0,
        };
        let fleet = vec![Vehicle::new(
            VehicleId(1),
            vt,
            StopId(1),
            Direction::Outbound,
            28.0,
        )];
        SimState::new(route_of(n), fleet, &params(cap, period_id))
    }

    #[test]
    fn morning_peak_favors_outbound() {
        assert_eq!(favored_directions(2, true), (true, false));
        assert_eq!(favored_directions(2, false), (false, true));
        assert_eq!(favored_directions(5, true), (false, true));
        assert_eq!(favored_directions(4, true), (false, false));
    }

    #[test]
    fn outbound_fraction_converges_to_bias_share() {
        let profile = DemandProfile::from_params(&params(0, 2));
        let mut rng = StdRng::seed_from_u64(7);
        let total = 40_000;
        let mut outbound = 0_u64;
        for _ in 0..total {
            if sample_direction(&mut rng, &profile).is_outbound() {
                outbound = outbound.saturating_add(1);
            }
        }
        #[allow(clippy::cast_precision_loss)]
        let fraction = outbound as f64 / f64::from(total);
        // b / (b + 1) = 1.4 / 2.4
        assert!((fraction - 1.4 / 2.4).abs() < 0.01, "fraction {fraction}");
    }

    #[test]
    fn favored_weights_taper_away_from_the_terminus() {
        let profile = DemandProfile::from_params(&params(0, 2));
        let n = 10;
        let w0 = profile.weight_outbound(0, n);
        let w5 = profile.weight_outbound(5, n);
        let w8 = profile.weight_outbound(8, n);
        assert!(w0 > w5 && w5 > w8);
        // Taper is 1 at the favored terminus: f + g.
        assert!((w0 - 1.1).abs() < 1e-9);
        // Inbound mirror anchors at the far end.
        assert!((profile.weight_inbound(n - 1, n) - 1.1).abs() < 1e-9);
    }

    #[test]
    fn unfavored_direction_gets_flat_downscale() {
        let profile = DemandProfile::from_params(&params(0, 2));
        assert!((profile.weight_inbound(3, 10) - 1.0 / 1.4).abs() < 1e-9);
    }

    #[test]
    fn destinations_are_strictly_downstream() {
        let mut state = state_with(8, 0, 2);
        let profile = DemandProfile::from_params(&params(0, 2));
        let _ = generate_batch(&mut state, &profile, 500, Utc::now());
        for stop in state.route.stops() {
            for p in stop.queue(Direction::Outbound) {
                let o = state.route.index_of(p.origin).unwrap();
                let d = state.route.index_of(p.destination).unwrap();
                assert!(d > o, "outbound dest {d} not past origin {o}");
            }
            for p in stop.queue(Direction::Inbound) {
                let o = state.route.index_of(p.origin).unwrap();
                let d = state.route.index_of(p.destination).unwrap();
                assert!(d < o, "inbound dest {d} not before origin {o}");
            }
        }
    }

    #[test]
    fn batch_respects_the_cap() {
        let mut state = state_with(5, 7, 2);
        let profile = DemandProfile::from_params(&params(7, 2));
        let _ = generate_batch(&mut state, &profile, 50, Utc::now());
        assert_eq!(state.counters.generated, 7);
        assert_eq!(
            state.counters.outbound_generated + state.counters.inbound_generated,
            7
        );
    }

    #[test]
    fn single_stop_route_generates_nothing() {
        let mut state = state_with(1, 0, 2);
        let profile = DemandProfile::from_params(&params(0, 2));
        let updated = generate_batch(&mut state, &profile, 10, Utc::now());
        assert!(updated.is_empty());
        assert_eq!(state.counters.generated, 0);
    }

    #[test]
    fn seeding_backdates_arrivals() {
        let mut state = state_with(6, 100, 2);
        let profile = DemandProfile::from_params(&params(100, 2));
        let seeded = seed_initial(&mut state, &profile, 5);
        assert_eq!(seeded, 5);
        let start = state.clock.start();
        for stop in state.route.stops() {
            for p in stop
                .queue(Direction::Outbound)
                .iter()
                .chain(stop.queue(Direction::Inbound))
            {
                assert!(p.arrived_at <= start);
                assert!(start.signed_duration_since(p.arrived_at) <= minutes(2.0));
            }
        }
    }

    #[test]
    fn poisson_small_mean_matches_expectation() {
        let mut rng = StdRng::seed_from_u64(42);
        let rounds = 20_000_u32;
        let mut total = 0_u64;
        for _ in 0..rounds {
            total = total.saturating_add(poisson(&mut rng, 5.0));
        }
        #[allow(clippy::cast_precision_loss)]
        let mean = total as f64 / f64::from(rounds);
        assert!((mean - 5.0).abs() < 0.1, "empirical mean {mean}");
    }

    #[test]
    fn poisson_large_mean_uses_normal_approximation() {
        let mut rng = StdRng::seed_from_u64(42);
        let rounds = 5_000_u32;
        let mut total = 0_u64;
        for _ in 0..rounds {
            total = total.saturating_add(poisson(&mut rng, 80.0));
        }
        #[allow(clippy::cast_precision_loss)]
        let mean = total as f64 / f64::from(rounds);
        assert!((mean - 80.0).abs() < 1.0, "empirical mean {mean}");
    }

    #[test]
    fn poisson_zero_mean_is_zero() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(poisson(&mut rng, 0.0), 0);
        assert_eq!(poisson(&mut rng, -3.0), 0);
    }

    #[test]
    fn identical_seeds_generate_identical_populations() {
        let profile = DemandProfile::from_params(&params(50, 2));
        let now = Utc::now();
        let mut a = state_with(8, 50, 2);
        let mut b = state_with(8, 50, 2);
        let _ = generate_batch(&mut a, &profile, 50, now);
        let _ = generate_batch(&mut b, &profile, 50, now);
        let snapshot = |state: &SimState| -> Vec<(u32, u32, u64)> {
            state
                .route
                .stops()
                .iter()
                .flat_map(|s| {
                    s.queue(Direction::Outbound)
                        .iter()
                        .chain(s.queue(Direction::Inbound))
                        .map(|p| {
                            (
                                p.origin.into_inner(),
                                p.destination.into_inner(),
                                p.id.into_inner(),
                            )
                        })
                })
                .collect()
        };
        assert_eq!(snapshot(&a), snapshot(&b));
    }
}
