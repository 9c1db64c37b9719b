//! The ordered stop sequence a corridor route serves.
//!
//! Topology is fixed once loaded: the stop order, inter-stop distances, and
//! cumulative distances never change during a run. The first and last stop
//! are always layover-eligible termini regardless of per-stop flags.

use corridor_types::{Direction, StopId};

use crate::error::ModelError;
use crate::stop::Stop;

/// An ordered, fixed-length sequence of stops.
#[derive(Debug, Clone)]
pub struct Route {
    /// Human-readable route name.
    pub name: String,
    total_distance_km: f64,
    stops: Vec<Stop>,
}

impl Route {
    /// Build a route from loaded stops.
    ///
    /// Cumulative distances are derived from the per-stop segment
    /// distances. When `declared_total_km` is absent or non-positive the
    /// total falls back to the segment sum.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::EmptyRoute`] if `stops` is empty.
    pub fn new(
        name: String,
        mut stops: Vec<Stop>,
        declared_total_km: Option<f64>,
    ) -> Result<Self, ModelError> {
        if stops.is_empty() {
            return Err(ModelError::EmptyRoute);
        }
        let mut cumulative = 0.0;
        for stop in &mut stops {
            stop.cumulative_km = cumulative;
            cumulative += stop.distance_to_next_km;
        }
        let segment_sum: f64 = stops
            .iter()
            .map(|s| s.distance_to_next_km)
            .sum();
        let total_distance_km = match declared_total_km {
            Some(total) if total > 0.0 => total,
            _ => segment_sum,
        };
        Ok(Self {
            name,
            total_distance_km,
            stops,
        })
    }

    /// Number of stops on the route.
    pub fn len(&self) -> usize {
        self.stops.len()
    }

    /// Whether the route has no stops (never true for a loaded route).
    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    /// Total route distance in km.
    pub const fn total_distance_km(&self) -> f64 {
        self.total_distance_km
    }

    /// All stops in route order.
    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    /// Mutable access to all stops (queue mutation during a run).
    pub fn stops_mut(&mut self) -> &mut [Stop] {
        &mut self.stops
    }

    /// The stop at `index`, if it exists.
    pub fn stop(&self, index: usize) -> Option<&Stop> {
        self.stops.get(index)
    }

    /// Mutable access to the stop at `index`.
    pub fn stop_mut(&mut self, index: usize) -> Option<&mut Stop> {
        self.stops.get_mut(index)
    }

    /// The route index of the stop with the given id.
    pub fn index_of(&self, id: StopId) -> Option<usize> {
        self.stops.iter().position(|s| s.id == id)
    }

    /// The stop with the given id.
    pub fn stop_by_id(&self, id: StopId) -> Option<&Stop> {
        self.stops.iter().find(|s| s.id == id)
    }

    /// Mutable access to the stop with the given id.
    pub fn stop_by_id_mut(&mut self, id: StopId) -> Option<&mut Stop> {
        self.stops.iter_mut().find(|s| s.id == id)
    }

    /// Id of the first stop.
    pub fn first_stop_id(&self) -> Option<StopId> {
        self.stops.first().map(|s| s.id)
    }

    /// Id of the last stop.
    pub fn last_stop_id(&self) -> Option<StopId> {
        self.stops.last().map(|s| s.id)
    }

    /// Route index a vehicle starts from in the given direction
    /// (0 outbound, last index inbound).
    pub fn start_index(&self, direction: Direction) -> usize {
        match direction {
            Direction::Outbound => 0,
            Direction::Inbound => self.stops.len().saturating_sub(1),
        }
    }

    /// The next route index when traveling in `direction`, or `None` at
    /// the terminus.
    pub fn next_index(&self, index: usize, direction: Direction) -> Option<usize> {
        match direction {
            Direction::Outbound => {
                let next = index.checked_add(1)?;
                (next < self.stops.len()).then_some(next)
            }
            Direction::Inbound => index.checked_sub(1),
        }
    }

    /// Whether `index` is the terminus for travel in `direction`.
    pub fn is_terminus(&self, index: usize, direction: Direction) -> bool {
        self.next_index(index, direction).is_none()
    }

    /// Distance in km of the segment departing `index` in `direction`.
    ///
    /// Outbound this is the stop's own `distance_to_next_km`; inbound it is
    /// the previous stop's segment, traversed backwards.
    pub fn segment_km(&self, index: usize, direction: Direction) -> f64 {
        let segment_index = match direction {
            Direction::Outbound => Some(index),
            Direction::Inbound => index.checked_sub(1),
        };
        segment_index
            .and_then(|i| self.stops.get(i))
            .map_or(0.0, |s| s.distance_to_next_km)
    }

    /// Path distance in km between two route indices, along the corridor.
    pub fn km_between(&self, from: usize, to: usize) -> f64 {
        let (lo, hi) = if from <= to { (from, to) } else { (to, from) };
        self.stops
            .get(lo..hi)
            .map_or(0.0, |segment| segment.iter().map(|s| s.distance_to_next_km).sum())
    }

    /// Indices of layover-eligible stops, in route order.
    ///
    /// Per-stop `allow_layover` flags are honored; the two endpoints are
    /// always included.
    pub fn layover_indices(&self) -> Vec<usize> {
        let last = self.stops.len().saturating_sub(1);
        self.stops
            .iter()
            .enumerate()
            .filter(|(i, s)| *i == 0 || *i == last || s.allow_layover)
            .map(|(i, _)| i)
            .collect()
    }

    /// Total passengers queued across all stops, both directions.
    pub fn queued_total(&self) -> usize {
        self.stops.iter().map(Stop::queued_total).sum()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn route_of(n: u32) -> Route {
        let stops = (0..n)
            .map(|i| {
                let dist = if i + 1 == n { 0.0 } else { 1.5 };
                Stop::new(StopId(i + 1), format!("Stop {}", i + 1), 0.0, 0.0, dist, false)
            })
            .collect();
        Route::new(String::from("Test Corridor"), stops, None).unwrap()
    }

    #[test]
    fn cumulative_distances_accumulate() {
        let route = route_of(4);
        let cums: Vec<f64> = route.stops().iter().map(|s| s.cumulative_km).collect();
        assert_eq!(cums, vec![0.0, 1.5, 3.0, 4.5]);
        assert!((route.total_distance_km() - 4.5).abs() < 1e-9);
    }

    #[test]
    fn declared_total_wins_when_positive() {
        let stops = vec![Stop::new(StopId(1), String::from("Only"), 0.0, 0.0, 0.0, false)];
        let route = Route::new(String::from("r"), stops, Some(12.0)).unwrap();
        assert!((route.total_distance_km() - 12.0).abs() < 1e-9);
    }

    #[test]
    fn empty_route_is_rejected() {
        let err = Route::new(String::from("r"), Vec::new(), None);
        assert!(matches!(err, Err(ModelError::EmptyRoute)));
    }

    #[test]
    fn next_index_respects_direction_and_termini() {
        let route = route_of(3);
        assert_eq!(route.next_index(0, Direction::Outbound), Some(1));
        assert_eq!(route.next_index(2, Direction::Outbound), None);
        assert_eq!(route.next_index(2, Direction::Inbound), Some(1));
        assert_eq!(route.next_index(0, Direction::Inbound), None);
        assert!(route.is_terminus(2, Direction::Outbound));
        assert!(route.is_terminus(0, Direction::Inbound));
    }

    #[test]
    fn km_between_is_symmetric() {
        let route = route_of(5);
        assert!((route.km_between(1, 4) - 4.5).abs() < 1e-9);
        assert!((route.km_between(4, 1) - 4.5).abs() < 1e-9);
        assert_eq!(route.km_between(2, 2), 0.0);
    }

    #[test]
    fn endpoints_are_always_layover_eligible() {
        let mut stops: Vec<Stop> = (0..4)
            .map(|i| Stop::new(StopId(i + 1), format!("S{i}"), 0.0, 0.0, 1.0, false))
            .collect();
        if let Some(s) = stops.get_mut(2) {
            s.allow_layover = true;
        }
        let route = Route::new(String::from("r"), stops, None).unwrap();
        assert_eq!(route.layover_indices(), vec![0, 2, 3]);
    }
}
