//! Live run controls: speed, arrival rate, and the stop signal.
//!
//! Many vehicle tasks read the speed multiplier at every timing chunk, and
//! an external control request may rewrite it at any moment. The values
//! live in bit-cast atomic cells so the hot read path never takes a lock,
//! and never blocks the simulation's own mutex.
//!
//! The stop signal is an atomic flag paired with a [`Notify`]: raising it
//! both marks the flag and wakes every in-flight simulated wait, so
//! cancellation is observed at the next checkpoint rather than after the
//! current sleep completes.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::Notify;

/// Lower bound of the speed multiplier.
pub const SPEED_MIN: f64 = 0.1;
/// Upper bound of the speed multiplier.
pub const SPEED_MAX: f64 = 10.0;
/// Lower bound of the arrival-rate multiplier.
pub const ARRIVAL_MIN: f64 = 0.1;
/// Upper bound of the arrival-rate multiplier.
pub const ARRIVAL_MAX: f64 = 50.0;

/// Shared live control state for one run.
///
/// Wrapped in `Arc` and shared between the run's tasks and the boundary
/// layer's control endpoint.
#[derive(Debug)]
pub struct ControlState {
    /// Current speed multiplier, stored as `f64` bits.
    speed_bits: AtomicU64,

    /// Current arrival-rate multiplier, stored as `f64` bits.
    arrival_bits: AtomicU64,

    /// Whether an external stop has been requested.
    stop_requested: AtomicBool,

    /// Wakes sleeping tasks when a stop is requested.
    stop_notify: Notify,
}

impl ControlState {
    /// Create a control state with clamped initial values.
    pub fn new(speed: f64, arrival_factor: f64) -> Self {
        Self {
            speed_bits: AtomicU64::new(clamp_speed(speed).to_bits()),
            arrival_bits: AtomicU64::new(clamp_arrival(arrival_factor).to_bits()),
            stop_requested: AtomicBool::new(false),
            stop_notify: Notify::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Speed multiplier
    // -----------------------------------------------------------------------

    /// Current speed multiplier, always within `[SPEED_MIN, SPEED_MAX]`.
    pub fn speed(&self) -> f64 {
        f64::from_bits(self.speed_bits.load(Ordering::Acquire))
    }

    /// Set the speed multiplier. Out-of-range and non-finite values are
    /// clamped, never rejected. Returns the value actually stored.
    pub fn set_speed(&self, speed: f64) -> f64 {
        let clamped = clamp_speed(speed);
        self.speed_bits.store(clamped.to_bits(), Ordering::Release);
        clamped
    }

    // -----------------------------------------------------------------------
    // Arrival-rate multiplier
    // -----------------------------------------------------------------------

    /// Current arrival-rate multiplier, within `[ARRIVAL_MIN, ARRIVAL_MAX]`.
    pub fn arrival_factor(&self) -> f64 {
        f64::from_bits(self.arrival_bits.load(Ordering::Acquire))
    }

    /// Set the arrival-rate multiplier, clamped. Returns the stored value.
    pub fn set_arrival_factor(&self, factor: f64) -> f64 {
        let clamped = clamp_arrival(factor);
        self.arrival_bits.store(clamped.to_bits(), Ordering::Release);
        clamped
    }

    // -----------------------------------------------------------------------
    // Stop signal
    // -----------------------------------------------------------------------

    /// Raise the external stop signal and wake every sleeping task.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        self.stop_notify.notify_waiters();
    }

    /// Whether an external stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Resolve once a stop has been requested.
    ///
    /// The notified future is registered before the flag check, so a stop
    /// raised between the check and the await is not missed.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.stop_notify.notified();
            if self.is_stop_requested() {
                return;
            }
            notified.await;
        }
    }
}

fn clamp_speed(speed: f64) -> f64 {
    if speed.is_finite() {
        speed.clamp(SPEED_MIN, SPEED_MAX)
    } else {
        1.0
    }
}

fn clamp_arrival(factor: f64) -> f64 {
    if factor.is_finite() {
        factor.clamp(ARRIVAL_MIN, ARRIVAL_MAX)
    } else {
        1.0
    }
}
