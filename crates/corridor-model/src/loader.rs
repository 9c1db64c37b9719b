//! Serde loaders for route and fleet definition files.
//!
//! Definition files are plain JSON. The raw structs here mirror the file
//! layout exactly; [`Route`] and the typed fleet tables are built from them
//! with sane-value flooring, so the simulation core never sees malformed
//! input.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use corridor_types::{StopId, VehicleTypeId};

use crate::error::ModelError;
use crate::fleet::FleetQuantity;
use crate::route::Route;
use crate::stop::Stop;
use crate::vehicle::VehicleType;

/// Capacity assigned to a vehicle type that declares none (or a
/// non-positive value).
const DEFAULT_CAPACITY: usize = 60;

// ---------------------------------------------------------------------------
// Raw file layouts
// ---------------------------------------------------------------------------

/// Raw layout of a route definition file.
#[derive(Debug, Deserialize)]
struct RawRoute {
    #[serde(default)]
    route: String,
    #[serde(default)]
    total_distance_km: Option<f64>,
    stops: Vec<RawStop>,
}

/// Raw layout of one stop entry.
#[derive(Debug, Deserialize)]
struct RawStop {
    stop_id: u32,
    stop_name: String,
    lat: f64,
    lng: f64,
    #[serde(default)]
    distance_to_next_km: f64,
    #[serde(default)]
    allow_layover: bool,
}

/// Raw layout of a fleet definition file.
#[derive(Debug, Deserialize)]
struct RawFleet {
    #[serde(default)]
    vehicle_types: Vec<RawVehicleType>,
    #[serde(default)]
    fleet: Vec<RawQuantity>,
}

/// Raw layout of one vehicle type entry.
#[derive(Debug, Deserialize)]
struct RawVehicleType {
    id: u32,
    #[serde(default)]
    name: String,
    #[serde(default)]
    capacity: i64,
    #[serde(default)]
    cost_per_km: f64,
}

/// Raw layout of one fleet quantity entry.
#[derive(Debug, Deserialize)]
struct RawQuantity {
    type_id: u32,
    quantity: i64,
}

// ---------------------------------------------------------------------------
// Loaders
// ---------------------------------------------------------------------------

/// Parse a route definition from a JSON string.
///
/// Cumulative distances are computed while loading; the declared total
/// distance falls back to the segment sum when absent or non-positive.
///
/// # Errors
///
/// Returns [`ModelError::Parse`] on malformed JSON and
/// [`ModelError::EmptyRoute`] when the file lists no stops.
pub fn load_route_str(contents: &str) -> Result<Route, ModelError> {
    let raw: RawRoute = serde_json::from_str(contents)?;
    let stops: Vec<Stop> = raw
        .stops
        .into_iter()
        .map(|s| {
            Stop::new(
                StopId(s.stop_id),
                s.stop_name,
                s.lat,
                s.lng,
                s.distance_to_next_km.max(0.0),
                s.allow_layover,
            )
        })
        .collect();
    Route::new(raw.route, stops, raw.total_distance_km)
}

/// Load a route definition from a file on disk.
///
/// # Errors
///
/// Returns [`ModelError::Io`] if the file cannot be read, plus the parse
/// errors of [`load_route_str`].
pub fn load_route_file(path: &Path) -> Result<Route, ModelError> {
    let contents = std::fs::read_to_string(path)?;
    load_route_str(&contents)
}

/// Parse a fleet definition from a JSON string.
///
/// Returns the type table keyed by id and the requested quantities.
/// Non-positive capacities are floored to a default, negative costs to
/// zero; entries with non-positive quantities are dropped.
///
/// # Errors
///
/// Returns [`ModelError::Parse`] on malformed JSON.
pub fn load_fleet_str(
    contents: &str,
) -> Result<(BTreeMap<VehicleTypeId, VehicleType>, Vec<FleetQuantity>), ModelError> {
    let raw: RawFleet = serde_json::from_str(contents)?;

    let mut types = BTreeMap::new();
    for t in raw.vehicle_types {
        let capacity = usize::try_from(t.capacity).ok().filter(|c| *c >= 1).unwrap_or(DEFAULT_CAPACITY);
        let id = VehicleTypeId(t.id);
        types.insert(
            id,
            VehicleType {
                id,
                name: t.name,
                capacity,
                cost_per_km: t.cost_per_km.max(0.0),
            },
        );
    }

    let quantities = raw
        .fleet
        .into_iter()
        .filter(|q| q.quantity > 0 && q.type_id != 0)
        .map(|q| FleetQuantity {
            type_id: VehicleTypeId(q.type_id),
            quantity: u32::try_from(q.quantity).unwrap_or(0),
        })
        .collect();

    Ok((types, quantities))
}

/// Load a fleet definition from a file on disk.
///
/// # Errors
///
/// Returns [`ModelError::Io`] if the file cannot be read, plus the parse
/// errors of [`load_fleet_str`].
pub fn load_fleet_file(
    path: &Path,
) -> Result<(BTreeMap<VehicleTypeId, VehicleType>, Vec<FleetQuantity>), ModelError> {
    let contents = std::fs::read_to_string(path)?;
    load_fleet_str(&contents)
}
