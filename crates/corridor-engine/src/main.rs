//! Corridor binary.
//!
//! Wires the configuration, the route and fleet loaders, and the two
//! execution modes together:
//!
//! - **serve** -- start the Observer API server; each SSE connection runs
//!   its own live, speed-scalable simulation.
//! - **batch** -- run the fast-forward engine once, print a console
//!   report, and optionally write a CSV report.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `corridor-config.yaml`
//! 3. Load the route definition
//! 4. Load the fleet definition (default pair on failure)
//! 5. Dispatch on the configured mode

mod error;

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use corridor_core::config::{CorridorConfig, RunMode};
use corridor_core::state::SimParams;
use corridor_core::{fastforward, report};
use corridor_model::{Route, Vehicle};
use corridor_observer::AppState;
use corridor_types::RunId;

use crate::error::EngineError;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if any initialization step fails; the simulation
/// itself has no failure paths once started.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("corridor-engine starting");

    // 2. Load configuration.
    let config = load_config()?;
    info!(
        name = config.world.name,
        seed = config.world.seed,
        period = config.demand.period_id,
        passenger_cap = config.demand.passenger_cap,
        mode = ?config.run.mode,
        "Configuration loaded"
    );

    // 3. Load the route definition.
    let route = corridor_model::load_route_file(Path::new(&config.files.route))
        .map_err(EngineError::from)?;
    info!(
        route = route.name,
        stops = route.len(),
        distance_km = route.total_distance_km(),
        "Route loaded"
    );

    // 4. Load the fleet definition.
    let fleet = load_fleet(&config, &route);
    info!(vehicles = fleet.len(), "Fleet assembled");

    // 5. Dispatch.
    match config.run.mode {
        RunMode::Batch => run_batch(&config, route, fleet)?,
        RunMode::Serve => run_serve(config, route, fleet).await?,
    }

    Ok(())
}

/// Load `corridor-config.yaml` from the working directory, falling back
/// to defaults when the file is absent.
fn load_config() -> Result<CorridorConfig, EngineError> {
    let config_path = Path::new("corridor-config.yaml");
    if config_path.exists() {
        Ok(CorridorConfig::from_file(config_path)?)
    } else {
        info!("Config file not found, using defaults");
        Ok(CorridorConfig::default())
    }
}

/// Load the fleet definition, falling back to the default two-vehicle
/// fleet on any failure or an empty declaration.
fn load_fleet(config: &CorridorConfig, route: &Route) -> Vec<Vehicle> {
    let (Some(first), Some(last)) = (route.first_stop_id(), route.last_stop_id()) else {
        return Vec::new();
    };
    let path = Path::new(&config.files.fleet);
    let fleet = match corridor_model::load_fleet_file(path) {
        Ok((types, quantities)) => {
            let mut rng = StdRng::seed_from_u64(effective_seed(config.world.seed));
            corridor_model::build_fleet(&types, &quantities, first, last, &mut rng)
        }
        Err(e) => {
            warn!(error = %e, "fleet definition unusable, falling back to defaults");
            Vec::new()
        }
    };
    if fleet.is_empty() {
        return corridor_model::default_fleet(first, last);
    }
    fleet
}

/// Run the fast-forward engine once and report.
fn run_batch(config: &CorridorConfig, route: Route, fleet: Vec<Vehicle>) -> Result<(), EngineError> {
    let params = sim_params(config);
    info!(seed = params.seed, cap = params.passenger_cap, "batch run starting");

    let fleet_for_report = fleet.clone();
    let summary = fastforward::run(route, fleet, &params, config.run.arrival_factor)?;

    report::print_console_report(&fleet_for_report, &summary);
    if let Some(target) = &config.run.report {
        let written = report::write_csv_report(Path::new(target), &fleet_for_report, &summary)?;
        info!(path = %written.display(), "report written");
    }
    Ok(())
}

/// Start the Observer API server.
async fn run_serve(
    config: CorridorConfig,
    route: Route,
    fleet: Vec<Vehicle>,
) -> Result<(), EngineError> {
    let host = config.server.host.clone();
    let port = config.server.port;
    let state = Arc::new(AppState::new(route, fleet, config));
    corridor_observer::start_server(&host, port, state).await?;
    Ok(())
}

/// Build run parameters from configuration.
fn sim_params(config: &CorridorConfig) -> SimParams {
    let demand = &config.demand;
    SimParams {
        run_id: RunId::new(),
        seed: effective_seed(config.world.seed),
        period_id: demand.period_id,
        passenger_cap: demand.passenger_cap,
        morning_peak_outbound: demand.morning_peak_outbound,
        direction_bias: demand.direction_bias,
        spatial_gradient: demand.spatial_gradient,
        baseline_demand: demand.baseline_demand,
        base_rate_per_min: demand.base_rate_per_min,
        trace_vehicle: config.run.trace_vehicle,
        start: Utc::now(),
    }
}

/// Resolve the configured seed: 0 derives one from the wall clock.
fn effective_seed(configured: u64) -> u64 {
    if configured != 0 {
        return configured;
    }
    #[allow(clippy::cast_sign_loss)]
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or(0) as u64;
    nanos
}
