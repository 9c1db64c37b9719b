//! Post-completion layover target selection.
//!
//! Once a capped run drains, each vehicle moves to the nearest
//! layover-eligible stop reachable by continuing in its current direction
//! of travel, measured by path distance along the corridor. When nothing
//! eligible lies ahead, the nearest eligible stop overall is used instead
//! (the route endpoints are always eligible, so a target always exists).

use corridor_model::Route;
use corridor_types::Direction;

/// A chosen reposition target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepositionTarget {
    /// Route index of the chosen layover stop.
    pub index: usize,
    /// Whether the target lies ahead in the vehicle's travel direction
    /// (`false` means the nearest-overall fallback fired).
    pub ahead: bool,
}

/// Pick the layover target for a vehicle at `current_index` heading in
/// `direction`.
///
/// Returns `None` only for an index outside the route.
pub fn select_target(
    route: &Route,
    current_index: usize,
    direction: Direction,
) -> Option<RepositionTarget> {
    if current_index >= route.len() {
        return None;
    }
    let candidates = route.layover_indices();

    let ahead_of = |candidate: usize| match direction {
        Direction::Outbound => candidate > current_index,
        Direction::Inbound => candidate < current_index,
    };

    let nearest = |pool: &[usize]| -> Option<usize> {
        pool.iter()
            .copied()
            .map(|i| (i, route.km_between(current_index, i)))
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i)
    };

    let ahead_pool: Vec<usize> = candidates.iter().copied().filter(|&i| ahead_of(i)).collect();
    if let Some(index) = nearest(&ahead_pool) {
        return Some(RepositionTarget { index, ahead: true });
    }
    nearest(&candidates).map(|index| RepositionTarget {
        index,
        ahead: false,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use corridor_model::Stop;
    use corridor_types::StopId;

    use super::*;

    /// 6 stops, 1 km apart, with an extra layover flag at index 3.
    fn route_with_midpoint_layover() -> Route {
        let mut stops: Vec<Stop> = (1..=6)
            .map(|i| Stop::new(StopId(i), format!("S{i}"), 0.0, 0.0, 1.0, false))
            .collect();
        if let Some(s) = stops.get_mut(3) {
            s.allow_layover = true;
        }
        Route::new(String::from("t"), stops, None).unwrap()
    }

    #[test]
    fn prefers_nearest_ahead_in_direction() {
        let route = route_with_midpoint_layover();
        // Outbound from index 1: candidates ahead are 3 and 5; 3 is nearer.
        let target = select_target(&route, 1, Direction::Outbound).unwrap();
        assert_eq!(target.index, 3);
        assert!(target.ahead);
        // Inbound from index 4: candidates behind are 3 and 0; 3 is nearer.
        let target = select_target(&route, 4, Direction::Inbound).unwrap();
        assert_eq!(target.index, 3);
        assert!(target.ahead);
    }

    #[test]
    fn falls_back_to_nearest_overall_when_nothing_ahead() {
        let route = route_with_midpoint_layover();
        // Outbound at the last index: nothing ahead, nearest overall is 5
        // itself (distance 0).
        let target = select_target(&route, 5, Direction::Outbound).unwrap();
        assert_eq!(target.index, 5);
        assert!(!target.ahead);
        // Inbound at index 0: nothing behind, nearest overall is 0 itself.
        let target = select_target(&route, 0, Direction::Inbound).unwrap();
        assert_eq!(target.index, 0);
        assert!(!target.ahead);
    }

    #[test]
    fn endpoints_are_targets_even_without_flags() {
        let stops: Vec<Stop> = (1..=4)
            .map(|i| Stop::new(StopId(i), format!("S{i}"), 0.0, 0.0, 1.0, false))
            .collect();
        let route = Route::new(String::from("t"), stops, None).unwrap();
        let target = select_target(&route, 1, Direction::Outbound).unwrap();
        assert_eq!(target.index, 3);
        assert!(target.ahead);
    }

    #[test]
    fn out_of_range_index_yields_none() {
        let route = route_with_midpoint_layover();
        assert!(select_target(&route, 99, Direction::Outbound).is_none());
    }
}
