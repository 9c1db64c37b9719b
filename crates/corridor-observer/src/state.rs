//! Shared application state for the Observer API server.
//!
//! [`AppState`] holds the loaded route, the fleet template each run
//! clones, the run configuration, and the [`RunRegistry`] that routes
//! external control requests to the right live simulation.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;

use corridor_core::config::CorridorConfig;
use corridor_core::control::ControlState;
use corridor_model::{Route, Vehicle};
use corridor_types::{RunId, StopId};

/// Registry of live runs keyed by run id.
///
/// A synchronous lock on purpose: entries are deregistered from the SSE
/// stream's `Drop` implementation, which cannot await. Operations are
/// O(1) map touches, never held across anything slow.
#[derive(Debug, Default)]
pub struct RunRegistry {
    runs: RwLock<HashMap<RunId, Arc<ControlState>>>,
}

impl RunRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live run's control state.
    pub fn register(&self, run_id: RunId, control: Arc<ControlState>) {
        let mut runs = self.runs.write().unwrap_or_else(PoisonError::into_inner);
        let _ = runs.insert(run_id, control);
    }

    /// Remove a run from the registry (on stream teardown).
    pub fn deregister(&self, run_id: RunId) {
        let mut runs = self.runs.write().unwrap_or_else(PoisonError::into_inner);
        let _ = runs.remove(&run_id);
    }

    /// Look up the control state of a live run.
    pub fn control_for(&self, run_id: RunId) -> Option<Arc<ControlState>> {
        let runs = self.runs.read().unwrap_or_else(PoisonError::into_inner);
        runs.get(&run_id).map(Arc::clone)
    }

    /// Number of live runs.
    pub fn len(&self) -> usize {
        let runs = self.runs.read().unwrap_or_else(PoisonError::into_inner);
        runs.len()
    }

    /// Whether no runs are live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Serializable projection of one stop for `GET /api/route`.
#[derive(Debug, Clone, Serialize)]
pub struct StopView {
    /// Stop identifier.
    pub id: StopId,
    /// Human-readable stop name.
    pub name: String,
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
    /// Distance to the next stop, km.
    pub distance_to_next_km: f64,
    /// Cumulative distance from the route start, km.
    pub cumulative_km: f64,
    /// Whether vehicles may lay over here.
    pub allow_layover: bool,
}

/// Serializable projection of the route for `GET /api/route`.
#[derive(Debug, Clone, Serialize)]
pub struct RouteView {
    /// Route name.
    pub route: String,
    /// Total route distance, km.
    pub total_distance_km: f64,
    /// Ordered stop projections.
    pub stops: Vec<StopView>,
}

impl RouteView {
    /// Build the projection from the loaded route.
    pub fn from_route(route: &Route) -> Self {
        Self {
            route: route.name.clone(),
            total_distance_km: route.total_distance_km(),
            stops: route
                .stops()
                .iter()
                .map(|s| StopView {
                    id: s.id,
                    name: s.name.clone(),
                    lat: s.lat,
                    lng: s.lng,
                    distance_to_next_km: s.distance_to_next_km,
                    cumulative_km: s.cumulative_km,
                    allow_layover: s.allow_layover,
                })
                .collect(),
        }
    }
}

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
pub struct AppState {
    /// The loaded route; each run clones it (queues start empty).
    pub route: Route,
    /// Pre-built projection served by `GET /api/route`.
    pub route_view: RouteView,
    /// Fleet template; each run clones it.
    pub fleet: Vec<Vehicle>,
    /// Full configuration (demand shape, run defaults).
    pub config: CorridorConfig,
    /// Live run registry for the control endpoint.
    pub registry: RunRegistry,
}

impl AppState {
    /// Assemble the application state.
    pub fn new(route: Route, fleet: Vec<Vehicle>, config: CorridorConfig) -> Self {
        let route_view = RouteView::from_route(&route);
        Self {
            route,
            route_view,
            fleet,
            config,
            registry: RunRegistry::new(),
        }
    }
}
