//! A single trip request and its lifecycle timestamps.
//!
//! A passenger is created by the demand generator, enqueued at its origin
//! stop, mutated exactly once at boarding and exactly once at alighting,
//! and never revisited afterwards. The destination is always strictly
//! downstream of the origin in the passenger's direction -- the generator
//! guarantees it, the exchange relies on it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use corridor_types::{Direction, PassengerId, StopId};

/// A passenger riding (or waiting to ride) the corridor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passenger {
    /// Sequentially assigned identifier.
    pub id: PassengerId,
    /// The stop this passenger waits at.
    pub origin: StopId,
    /// The stop this passenger travels to; strictly downstream of
    /// `origin` in `direction`.
    pub destination: StopId,
    /// Travel direction, fixed at creation.
    pub direction: Direction,
    /// When the passenger arrived at the origin stop intending to travel.
    pub arrived_at: DateTime<Utc>,
    /// When the passenger boarded a vehicle, if it has.
    pub boarded_at: Option<DateTime<Utc>>,
    /// Time spent waiting at the origin stop, in minutes, floored at zero.
    pub wait_minutes: Option<f64>,
    /// When the passenger alighted at its destination, if it has.
    pub arrived_dest_at: Option<DateTime<Utc>>,
}

impl Passenger {
    /// Create a passenger waiting at `origin` since `arrived_at`.
    pub const fn new(
        id: PassengerId,
        origin: StopId,
        destination: StopId,
        direction: Direction,
        arrived_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            origin,
            destination,
            direction,
            arrived_at,
            boarded_at: None,
            wait_minutes: None,
            arrived_dest_at: None,
        }
    }

    /// Record the boarding instant and derive the wait duration.
    ///
    /// The wait is `boarding - arrival` in minutes, floored at zero (seeded
    /// passengers can carry backdated arrival times). Boarding passes skip
    /// passengers that already carry a boarding time, so this is called at
    /// most once per passenger.
    pub fn mark_boarded(&mut self, ts: DateTime<Utc>) {
        self.boarded_at = Some(ts);
        let elapsed_ms = ts.signed_duration_since(self.arrived_at).num_milliseconds();
        #[allow(clippy::cast_precision_loss)]
        let minutes = (elapsed_ms.max(0) as f64) / 60_000.0;
        self.wait_minutes = Some(minutes);
    }

    /// Record arrival at the destination stop.
    pub const fn mark_arrived(&mut self, ts: DateTime<Utc>) {
        self.arrived_dest_at = Some(ts);
    }

    /// Whether the passenger has boarded a vehicle.
    pub const fn has_boarded(&self) -> bool {
        self.boarded_at.is_some()
    }

    /// Whether the passenger is currently riding a vehicle.
    pub const fn is_onboard(&self) -> bool {
        self.boarded_at.is_some() && self.arrived_dest_at.is_none()
    }

    /// Whether the journey has finished.
    pub const fn completed(&self) -> bool {
        self.arrived_dest_at.is_some()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    fn passenger(arrived_at: DateTime<Utc>) -> Passenger {
        Passenger::new(
            PassengerId(1),
            StopId(10),
            StopId(12),
            Direction::Outbound,
            arrived_at,
        )
    }

    #[test]
    fn boarding_computes_wait_in_minutes() {
        let arrival = Utc::now();
        let mut p = passenger(arrival);
        p.mark_boarded(arrival + TimeDelta::minutes(3));
        assert!((p.wait_minutes.unwrap() - 3.0).abs() < 1e-9);
        assert!(p.is_onboard());
        assert!(!p.completed());
    }

    #[test]
    fn wait_is_floored_at_zero() {
        // A passenger whose arrival was stamped after the boarding instant
        // (clock skew during seeding) must not report a negative wait.
        let arrival = Utc::now();
        let mut p = passenger(arrival);
        p.mark_boarded(arrival - TimeDelta::seconds(30));
        assert_eq!(p.wait_minutes.unwrap(), 0.0);
    }

    #[test]
    fn arrival_completes_the_journey() {
        let arrival = Utc::now();
        let mut p = passenger(arrival);
        p.mark_boarded(arrival + TimeDelta::minutes(1));
        p.mark_arrived(arrival + TimeDelta::minutes(9));
        assert!(p.completed());
        assert!(!p.is_onboard());
    }
}
