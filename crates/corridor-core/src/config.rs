//! Configuration loading and typed config structures.
//!
//! The canonical configuration lives in `corridor-config.yaml` at the
//! project root. This module defines strongly-typed structs that mirror
//! the YAML structure, and provides a loader that reads the file. All
//! fields have defaults, so a missing file or a partial file is fine.
//!
//! Two of these values -- the speed multiplier and the arrival-rate
//! multiplier -- are only *initial* values: they seed the live
//! [`ControlState`](crate::control::ControlState) and can be retuned
//! mid-run through the control endpoint.

use std::path::Path;

use serde::Deserialize;

use corridor_types::VehicleId;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Demand multiplier for a coarse time-of-day period.
///
/// Period semantics: 1 = very early off-peak, 2 = morning peak, 3 = late
/// morning, 4 = mid-day, 5 = evening peak, 6 = late evening. Unknown
/// periods fall back to a neutral multiplier.
pub const fn period_multiplier(period_id: u8) -> f64 {
    match period_id {
        1 => 0.3,
        2 => 1.6,
        3 => 0.9,
        4 => 0.8,
        5 => 1.4,
        6 => 0.5,
        _ => 1.0,
    }
}

/// Top-level configuration for the Corridor binary.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CorridorConfig {
    /// World-level settings (name, seed).
    #[serde(default)]
    pub world: WorldConfig,

    /// Paths of the route and fleet definition files.
    #[serde(default)]
    pub files: FilesConfig,

    /// Demand shape parameters.
    #[serde(default)]
    pub demand: DemandConfig,

    /// Run-mode parameters (initial tunables, mode, report target).
    #[serde(default)]
    pub run: RunConfig,

    /// Observer server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

impl CorridorConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values for deployment knobs:
    /// - `CORRIDOR_PORT` overrides `server.port`
    /// - `CORRIDOR_ROUTE_FILE` overrides `files.route`
    /// - `CORRIDOR_FLEET_FILE` overrides `files.fleet`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides for deployment knobs.
    fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("CORRIDOR_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(route) = std::env::var("CORRIDOR_ROUTE_FILE") {
            if !route.is_empty() {
                self.files.route = route;
            }
        }
        if let Ok(fleet) = std::env::var("CORRIDOR_FLEET_FILE") {
            if !fleet.is_empty() {
                self.files.fleet = fleet;
            }
        }
    }
}

/// World-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorldConfig {
    /// Human-readable simulation name.
    #[serde(default = "default_world_name")]
    pub name: String,

    /// Random seed for reproducibility (0 = derive from wall clock).
    #[serde(default)]
    pub seed: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: default_world_name(),
            seed: 0,
        }
    }
}

/// Paths of the external definition files.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FilesConfig {
    /// Route definition JSON (ordered stops with distances).
    #[serde(default = "default_route_file")]
    pub route: String,

    /// Fleet definition JSON (vehicle types and quantities).
    #[serde(default = "default_fleet_file")]
    pub fleet: String,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            route: default_route_file(),
            fleet: default_fleet_file(),
        }
    }
}

/// Demand shape parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DemandConfig {
    /// Coarse time-of-day period (1..=6) selecting a demand multiplier.
    #[serde(default = "default_period_id")]
    pub period_id: u8,

    /// Total passengers to generate (0 = unbounded / continuous mode).
    #[serde(default)]
    pub passenger_cap: u64,

    /// Whether the morning peak favors the outbound direction.
    #[serde(default = "default_true")]
    pub morning_peak_outbound: bool,

    /// Directional bias factor `b >= 1` toward the favored direction.
    #[serde(default = "default_direction_bias")]
    pub direction_bias: f64,

    /// Spatial gradient strength `g` in `[0, 1]` concentrating origins
    /// near the favored terminus.
    #[serde(default = "default_spatial_gradient")]
    pub spatial_gradient: f64,

    /// Baseline demand fraction `f` in `[0, 1]` under the gradient.
    #[serde(default = "default_baseline_demand")]
    pub baseline_demand: f64,

    /// Expected arrivals per minute for the whole corridor, before
    /// multipliers.
    #[serde(default = "default_base_rate")]
    pub base_rate_per_min: f64,
}

impl Default for DemandConfig {
    fn default() -> Self {
        Self {
            period_id: default_period_id(),
            passenger_cap: 0,
            morning_peak_outbound: true,
            direction_bias: default_direction_bias(),
            spatial_gradient: default_spatial_gradient(),
            baseline_demand: default_baseline_demand(),
            base_rate_per_min: default_base_rate(),
        }
    }
}

/// Execution mode of the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Start the observer server and stream live runs.
    Serve,
    /// Run the fast-forward engine once and report.
    Batch,
}

/// Run-mode parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunConfig {
    /// Initial speed multiplier (live-tunable afterwards).
    #[serde(default = "default_multiplier")]
    pub speed: f64,

    /// Initial arrival-rate multiplier (live-tunable afterwards).
    #[serde(default = "default_multiplier")]
    pub arrival_factor: f64,

    /// Vehicle id to emit trace logs for, if any.
    #[serde(default)]
    pub trace_vehicle: Option<VehicleId>,

    /// Execution mode.
    #[serde(default = "default_mode")]
    pub mode: RunMode,

    /// CSV report target (file or directory) for batch mode.
    #[serde(default)]
    pub report: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            speed: default_multiplier(),
            arrival_factor: default_multiplier(),
            trace_vehicle: None,
            mode: default_mode(),
            report: None,
        }
    }
}

/// Observer server settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_world_name() -> String {
    String::from("corridor")
}

fn default_route_file() -> String {
    String::from("data/route_stops.json")
}

fn default_fleet_file() -> String {
    String::from("data/fleet.json")
}

const fn default_period_id() -> u8 {
    2
}

const fn default_true() -> bool {
    true
}

const fn default_direction_bias() -> f64 {
    1.4
}

const fn default_spatial_gradient() -> f64 {
    0.8
}

const fn default_baseline_demand() -> f64 {
    0.3
}

const fn default_base_rate() -> f64 {
    1.2
}

const fn default_multiplier() -> f64 {
    1.0
}

const fn default_mode() -> RunMode {
    RunMode::Serve
}

fn default_host() -> String {
    String::from("0.0.0.0")
}

const fn default_port() -> u16 {
    8080
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_yields_defaults() {
        let config = CorridorConfig::parse("{}").unwrap();
        assert_eq!(config.demand.period_id, 2);
        assert_eq!(config.demand.passenger_cap, 0);
        assert!((config.demand.direction_bias - 1.4).abs() < 1e-9);
        assert_eq!(config.run.mode, RunMode::Serve);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn partial_yaml_overrides_only_named_fields() {
        let yaml = r"
demand:
  period_id: 5
  passenger_cap: 400
run:
  mode: batch
  speed: 4.0
";
        let config = CorridorConfig::parse(yaml).unwrap();
        assert_eq!(config.demand.period_id, 5);
        assert_eq!(config.demand.passenger_cap, 400);
        assert_eq!(config.run.mode, RunMode::Batch);
        assert!((config.run.speed - 4.0).abs() < 1e-9);
        // Untouched sections keep defaults.
        assert!((config.demand.spatial_gradient - 0.8).abs() < 1e-9);
    }

    #[test]
    fn unknown_period_has_neutral_multiplier() {
        assert!((period_multiplier(2) - 1.6).abs() < 1e-9);
        assert!((period_multiplier(9) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        assert!(CorridorConfig::parse(": not yaml :").is_err());
    }
}
