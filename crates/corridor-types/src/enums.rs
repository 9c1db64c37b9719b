//! Enumeration types for the Corridor transit simulation.

use serde::{Deserialize, Serialize};

/// Travel direction along the corridor.
///
/// The corridor is an ordered stop sequence; `Outbound` traverses it from
/// index 0 toward the last index, `Inbound` traverses it in reverse. A
/// vehicle flips direction at each terminus; a passenger's direction is
/// fixed at creation and determines which stop queue it waits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// From the first stop toward the last stop (increasing index).
    Outbound,
    /// From the last stop toward the first stop (decreasing index).
    Inbound,
}

impl Direction {
    /// Return the opposite direction.
    pub const fn reverse(self) -> Self {
        match self {
            Self::Outbound => Self::Inbound,
            Self::Inbound => Self::Outbound,
        }
    }

    /// Whether this is the outbound direction.
    pub const fn is_outbound(self) -> bool {
        matches!(self, Self::Outbound)
    }
}

impl core::fmt::Display for Direction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Outbound => write!(f, "outbound"),
            Self::Inbound => write!(f, "inbound"),
        }
    }
}

/// Phase tag attached to in-transit position updates.
///
/// Distinguishes normal revenue travel from the post-completion reposition
/// leg toward a layover stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovePhase {
    /// Normal traversal between two stops while in service.
    Travel,
    /// Deadhead movement toward a layover stop after completion.
    Reposition,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverse_flips_both_ways() {
        assert_eq!(Direction::Outbound.reverse(), Direction::Inbound);
        assert_eq!(Direction::Inbound.reverse(), Direction::Outbound);
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(Direction::Outbound.to_string(), "outbound");
        assert_eq!(Direction::Inbound.to_string(), "inbound");
    }
}
