//! Type-safe identifier wrappers for simulation entities.
//!
//! Stops, vehicles, vehicle types, and passengers carry the numeric ids
//! assigned by the route and fleet definition files (or by the sequential
//! passenger counter), wrapped in newtypes so they cannot be mixed up at
//! compile time. Runs are identified by a [`Uuid`] so external control
//! requests can be routed to a live simulation instance.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around a numeric id with standard derives.
macro_rules! define_numeric_id {
    (
        $(#[$meta:meta])*
        $name:ident($inner:ty)
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl $name {
            /// Return the inner numeric value.
            pub const fn into_inner(self) -> $inner {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$inner> for $name {
            fn from(id: $inner) -> Self {
                Self(id)
            }
        }

        impl From<$name> for $inner {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_numeric_id! {
    /// Unique identifier for a stop along the corridor.
    StopId(u32)
}

define_numeric_id! {
    /// Unique identifier for a vehicle in the fleet.
    VehicleId(u32)
}

define_numeric_id! {
    /// Unique identifier for a vehicle type (capacity/cost class).
    VehicleTypeId(u32)
}

define_numeric_id! {
    /// Unique identifier for a passenger, assigned sequentially at creation.
    PassengerId(u64)
}

/// Unique identifier for a simulation run.
///
/// A run id is minted when a run starts and is the key under which the
/// boundary layer registers the run's live control state, so an external
/// control request can find the right running instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Create a new run identifier using UUID v7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Return the inner [`Uuid`] value.
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for RunId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RunId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl From<RunId> for Uuid {
    fn from(id: RunId) -> Self {
        id.0
    }
}
