//! Endpoint handlers for the Observer server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/route` | Loaded route topology |
//! | `GET` | `/api/stream` | Start a run, stream its events as SSE |
//! | `POST` | `/api/control` | Retune a live run (speed, arrival rate) |

use std::convert::Infallible;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::sse::{Event, KeepAlive, Sse};
use chrono::Utc;
use futures::Stream;
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use corridor_core::control::ControlState;
use corridor_core::realtime;
use corridor_core::state::SimParams;
use corridor_types::{RunId, SimEvent};

use crate::error::ObserverError;
use crate::state::{AppState, RouteView};

// ---------------------------------------------------------------------------
// GET /api/route
// ---------------------------------------------------------------------------

/// Serve the loaded route topology.
pub async fn get_route(State(state): State<Arc<AppState>>) -> Json<RouteView> {
    Json(state.route_view.clone())
}

// ---------------------------------------------------------------------------
// POST /api/control
// ---------------------------------------------------------------------------

/// Request body for `POST /api/control`.
#[derive(Debug, serde::Deserialize)]
pub struct ControlRequest {
    /// The run to retune.
    pub run_id: String,
    /// New speed multiplier, if changing (clamped to `[0.1, 10]`).
    pub speed: Option<f64>,
    /// New arrival-rate multiplier, if changing (clamped to `[0.1, 50]`).
    pub arrival_factor: Option<f64>,
}

/// Retune a live run without restarting it.
///
/// Values are clamped, never rejected; addressing a finished or unknown
/// run yields 404.
pub async fn post_control(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ControlRequest>,
) -> Result<StatusCode, ObserverError> {
    let uuid = Uuid::parse_str(&request.run_id)
        .map_err(|_| ObserverError::InvalidRunId(request.run_id.clone()))?;
    let run_id = RunId::from(uuid);
    let control = state
        .registry
        .control_for(run_id)
        .ok_or_else(|| ObserverError::RunNotFound(request.run_id.clone()))?;

    if let Some(speed) = request.speed {
        let stored = control.set_speed(speed);
        info!(run = %run_id, speed = stored, "speed multiplier updated");
    }
    if let Some(factor) = request.arrival_factor {
        let stored = control.set_arrival_factor(factor);
        info!(run = %run_id, arrival_factor = stored, "arrival multiplier updated");
    }
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// GET /api/stream
// ---------------------------------------------------------------------------

/// Query parameters for `GET /api/stream`.
#[derive(Debug, serde::Deserialize)]
pub struct StreamQuery {
    /// Initial speed multiplier override.
    pub speed: Option<f64>,
    /// Initial arrival-rate multiplier override.
    pub arrival_factor: Option<f64>,
    /// Base arrival rate override (arrivals per minute).
    pub lambda: Option<f64>,
}

/// Deregisters the run and raises its stop signal when the SSE body is
/// dropped, so a disconnected client tears its simulation down.
struct StreamGuard {
    state: Arc<AppState>,
    run_id: RunId,
    control: Arc<ControlState>,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.control.request_stop();
        self.state.registry.deregister(self.run_id);
        info!(run = %self.run_id, "stream closed, run stopped");
    }
}

/// Start one real-time run and stream its events.
pub async fn stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StreamQuery>,
) -> impl IntoResponse {
    let run_id = RunId::new();
    let control = Arc::new(ControlState::new(
        query.speed.unwrap_or(state.config.run.speed),
        query
            .arrival_factor
            .unwrap_or(state.config.run.arrival_factor),
    ));
    state.registry.register(run_id, Arc::clone(&control));

    let seed = effective_seed(state.config.world.seed);
    let demand = &state.config.demand;
    let params = SimParams {
        run_id,
        seed,
        period_id: demand.period_id,
        passenger_cap: demand.passenger_cap,
        morning_peak_outbound: demand.morning_peak_outbound,
        direction_bias: demand.direction_bias,
        spatial_gradient: demand.spatial_gradient,
        baseline_demand: demand.baseline_demand,
        base_rate_per_min: query.lambda.filter(|l| *l > 0.0).unwrap_or(demand.base_rate_per_min),
        trace_vehicle: state.config.run.trace_vehicle,
        start: Utc::now(),
    };
    info!(run = %run_id, seed, cap = params.passenger_cap, "starting streamed run");

    let (tx, rx) = mpsc::unbounded_channel();
    let _run = tokio::spawn(realtime::run(
        state.route.clone(),
        state.fleet.clone(),
        params,
        Arc::clone(&control),
        tx,
    ));

    let guard = StreamGuard {
        state,
        run_id,
        control,
    };
    Sse::new(event_stream(rx, guard)).keep_alive(KeepAlive::default())
}

/// Adapt the run's event channel into an SSE stream.
///
/// The guard travels with the stream state so teardown happens exactly
/// when the client goes away (or the run finishes and the sender drops).
fn event_stream(
    rx: mpsc::UnboundedReceiver<SimEvent>,
    guard: StreamGuard,
) -> impl Stream<Item = Result<Event, Infallible>> {
    futures::stream::unfold((rx, guard), |(mut rx, guard)| async move {
        let event = rx.recv().await?;
        let sse = Event::default()
            .event(event.kind())
            .json_data(&event)
            .unwrap_or_default();
        Some((Ok(sse), (rx, guard)))
    })
}

/// Resolve the configured seed: 0 means derive one from the wall clock,
/// so every connection gets an independent run.
fn effective_seed(configured: u64) -> u64 {
    if configured != 0 {
        return configured;
    }
    #[allow(clippy::cast_sign_loss)]
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or(0) as u64;
    nanos
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use corridor_core::config::CorridorConfig;
    use corridor_model::{Route, Stop, Vehicle, VehicleType};
    use corridor_types::{Direction, StopId, VehicleId, VehicleTypeId};

    use super::*;

    fn app_state() -> Arc<AppState> {
        let stops = (1..=3)
            .map(|i| Stop::new(StopId(i), format!("S{i}"), 0.0, 0.0, 1.0, false))
            .collect();
        let route = Route::new(String::from("test"), stops, None).unwrap();
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
        Arc::new(AppState::new(route, fleet, CorridorConfig::default()))
    }

    #[tokio::test]
    async fn control_rejects_unknown_runs() {
        let state = app_state();
        let request = ControlRequest {
            run_id: RunId::new().to_string(),
            speed: Some(2.0),
            arrival_factor: None,
        };
        let result = post_control(State(state), Json(request)).await;
        assert!(matches!(result, Err(ObserverError::RunNotFound(_))));
    }

    #[tokio::test]
    async fn control_rejects_malformed_run_ids() {
        let state = app_state();
        let request = ControlRequest {
            run_id: String::from("not-a-uuid"),
            speed: None,
            arrival_factor: None,
        };
        let result = post_control(State(state), Json(request)).await;
        assert!(matches!(result, Err(ObserverError::InvalidRunId(_))));
    }

    #[tokio::test]
    async fn control_clamps_and_applies_to_registered_runs() {
        let state = app_state();
        let run_id = RunId::new();
        let control = Arc::new(ControlState::new(1.0, 1.0));
        state.registry.register(run_id, Arc::clone(&control));

        let request = ControlRequest {
            run_id: run_id.to_string(),
            speed: Some(99.0),
            arrival_factor: Some(0.0),
        };
        let status = post_control(State(Arc::clone(&state)), Json(request))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!((control.speed() - 10.0).abs() < 1e-9);
        assert!((control.arrival_factor() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn configured_seeds_pass_through() {
        assert_eq!(effective_seed(77), 77);
        assert_ne!(effective_seed(0), 0);
    }
}
