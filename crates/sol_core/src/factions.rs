//! Faction definitions and identifiers.

use serde::{Deserialize, Serialize};

/// Unique identifier for the two contesting factions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FactionId {
    /// The Solar Concord - holds the sunward half of the field.
    Solar,
    /// The Umbra Pact - fights from the shadowed rim.
    Umbra,
}

impl FactionId {
    /// Both factions in a fixed, deterministic order.
    pub const ALL: [Self; 2] = [Self::Solar, Self::Umbra];

    /// Get the opposing faction.
    #[must_use]
    pub const fn opponent(&self) -> Self {
        match self {
            Self::Solar => Self::Umbra,
            Self::Umbra => Self::Solar,
        }
    }

    /// Get the display name for this faction.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Solar => "The Solar Concord",
            Self::Umbra => "The Umbra Pact",
        }
    }

    /// Get the short name for this faction.
    #[must_use]
    pub const fn short_name(&self) -> &'static str {
        match self {
            Self::Solar => "Solar",
            Self::Umbra => "Umbra",
        }
    }

    /// Stable index for ordered per-faction traversal.
    #[must_use]
    pub const fn index(&self) -> usize {
        match self {
            Self::Solar => 0,
            Self::Umbra => 1,
        }
    }
}
