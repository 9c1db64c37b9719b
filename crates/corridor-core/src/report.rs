//! Run summary and end-of-run reporting.
//!
//! Batch mode prints a console report and optionally writes a CSV file.
//! Per-vehicle distances are rounded to two decimals *before* totalling,
//! so the printed rows and the totals always align.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::info;

use corridor_model::Vehicle;
use corridor_types::VehicleId;

use crate::state::SimState;

/// Errors that can occur while writing a report.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// Failed to create or write the report file.
    #[error("failed to write report: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// CSV serialization failed.
    #[error("failed to serialize report row: {source}")]
    Csv {
        /// The underlying CSV error.
        #[from]
        source: csv::Error,
    },
}

/// Final counters of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    /// Whether the run reached its completion condition.
    pub completed: bool,
    /// Total passengers generated, clamped to the cap.
    pub generated: u64,
    /// Outbound share of the generated count.
    pub outbound_generated: u64,
    /// Inbound share of the generated count.
    pub inbound_generated: u64,
    /// Total passengers served.
    pub served: u64,
    /// Final average wait in minutes.
    pub avg_wait_min: f64,
    /// Kilometres traveled per vehicle.
    pub vehicle_distance_km: BTreeMap<VehicleId, f64>,
    /// Sum of the display-rounded per-vehicle distances.
    pub total_distance_km: f64,
    /// Sum of the display-rounded per-vehicle operating costs.
    pub total_cost: f64,
}

impl Summary {
    /// Build the summary from final simulation state.
    pub fn from_state(state: &SimState, completed: bool) -> Self {
        let mut total_distance_km = 0.0;
        let mut total_cost = 0.0;
        for vehicle in &state.fleet {
            let km = round2(state.distance_km.get(&vehicle.id).copied().unwrap_or(0.0));
            total_distance_km += km;
            total_cost += round2(vehicle.vehicle_type.cost_per_km * km);
        }
        Self {
            completed,
            generated: state.generated_clamped(),
            outbound_generated: state.counters.outbound_generated,
            inbound_generated: state.counters.inbound_generated,
            served: state.counters.served,
            avg_wait_min: state.counters.avg_wait_min(),
            vehicle_distance_km: state.distance_km.clone(),
            total_distance_km,
            total_cost,
        }
    }
}

/// Round to two decimals for display and totalling.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Print a human-readable report to stdout.
pub fn print_console_report(fleet: &[Vehicle], summary: &Summary) {
    println!("=== Simulation Report (batch) ===");
    println!("Vehicles on route: {}", fleet.len());
    println!("Passengers generated: {}", summary.generated);
    println!("Passengers served: {}", summary.served);
    println!("Average wait: {:.2} minutes", summary.avg_wait_min);
    for vehicle in fleet {
        let km = round2(
            summary
                .vehicle_distance_km
                .get(&vehicle.id)
                .copied()
                .unwrap_or(0.0),
        );
        let cost = round2(vehicle.vehicle_type.cost_per_km * km);
        println!(
            "Vehicle {} ({}, {}) distance={km:.2} km cost={cost:.2}",
            vehicle.id, vehicle.direction, vehicle.vehicle_type.name
        );
    }
    println!("Total distance: {:.2} km", summary.total_distance_km);
    println!("Total operating cost: {:.2}", summary.total_cost);
}

/// Resolve the output path: directories get a timestamped file inside,
/// plain paths get the timestamp suffixed before the extension.
fn resolve_report_path(target: &Path) -> PathBuf {
    let ts = Utc::now().format("%Y%m%d-%H%M%S");
    if target.is_dir() {
        return target.join(format!("report-{ts}.csv"));
    }
    let stem = target
        .file_stem()
        .map_or_else(|| String::from("report"), |s| s.to_string_lossy().into_owned());
    let ext = target
        .extension()
        .map_or_else(|| String::from("csv"), |e| e.to_string_lossy().into_owned());
    target.with_file_name(format!("{stem}-{ts}.{ext}"))
}

/// Write a CSV report to `target` (file or directory).
///
/// Returns the path actually written.
///
/// # Errors
///
/// Returns [`ReportError`] when the file cannot be created or a row fails
/// to serialize.
pub fn write_csv_report(
    target: &Path,
    fleet: &[Vehicle],
    summary: &Summary,
) -> Result<PathBuf, ReportError> {
    let out_path = resolve_report_path(target);
    let mut writer = csv::Writer::from_path(&out_path)?;
    writer.write_record([
        "section",
        "vehicle_id",
        "direction",
        "type",
        "avg_speed_kmh",
        "distance_km",
        "cost",
        "generated",
        "served",
        "avg_wait_min",
        "vehicle_count",
    ])?;
    for vehicle in fleet {
        let km = round2(
            summary
                .vehicle_distance_km
                .get(&vehicle.id)
                .copied()
                .unwrap_or(0.0),
        );
        let cost = round2(vehicle.vehicle_type.cost_per_km * km);
        writer.write_record([
            String::from("vehicle"),
            vehicle.id.to_string(),
            vehicle.direction.to_string(),
            vehicle.vehicle_type.name.clone(),
            format!("{:.1}", vehicle.avg_speed_kmh),
            format!("{km:.2}"),
            format!("{cost:.2}"),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
        ])?;
    }
    writer.write_record([
        String::from("summary"),
        String::new(),
        String::new(),
        String::new(),
        String::new(),
        format!("{:.2}", summary.total_distance_km),
        format!("{:.2}", summary.total_cost),
        summary.generated.to_string(),
        summary.served.to_string(),
        format!("{:.2}", summary.avg_wait_min),
        fleet.len().to_string(),
    ])?;
    writer.flush()?;
    info!(path = %out_path.display(), "CSV report written");
    Ok(out_path)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use corridor_model::VehicleType;
    use corridor_types::{Direction, StopId, VehicleTypeId};

    use super::*;

    fn fleet() -> Vec<Vehicle> {
        let vt = VehicleType {
            id: VehicleTypeId(1),
            name: String::from("Standard 12m"),
            capacity: 70,
            cost_per_km: 1.75,
        };
        vec![
            Vehicle::new(VehicleId(1), vt.clone(), StopId(1), Direction::Outbound, 28.0),
            Vehicle::new(VehicleId(2), vt, StopId(5), Direction::Inbound, 26.5),
        ]
    }

    fn summary() -> Summary {
        let mut distances = BTreeMap::new();
        distances.insert(VehicleId(1), 12.345);
        distances.insert(VehicleId(2), 8.001);
        Summary {
            completed: true,
            generated: 200,
            outbound_generated: 120,
            inbound_generated: 80,
            served: 200,
            avg_wait_min: 4.25,
            vehicle_distance_km: distances,
            total_distance_km: round2(12.345) + round2(8.001),
            total_cost: round2(1.75 * round2(12.345)) + round2(1.75 * round2(8.001)),
        }
    }

    #[test]
    fn rounding_keeps_two_decimals() {
        assert!((round2(12.345) - 12.35).abs() < 1e-9);
        assert!((round2(8.001) - 8.0).abs() < 1e-9);
    }

    #[test]
    fn csv_report_writes_one_row_per_vehicle_plus_summary() {
        let dir = std::env::temp_dir().join(format!("corridor-report-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = write_csv_report(&dir, &fleet(), &summary()).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        // Header + 2 vehicles + summary.
        assert_eq!(lines.len(), 4);
        assert!(lines.first().unwrap().starts_with("section,"));
        assert!(lines.last().unwrap().starts_with("summary,"));
        assert!(contents.contains("Standard 12m"));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn file_targets_get_timestamp_suffixes() {
        let resolved = resolve_report_path(Path::new("/tmp/out.csv"));
        let name = resolved.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("out-"));
        assert!(name.ends_with(".csv"));
    }
}
