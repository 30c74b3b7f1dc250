//! Player commands and their outcomes.
//!
//! Commands are the only mutation surface besides the tick itself. Every
//! command is validated and answered with a [`CommandOutcome`]; an
//! invalid command is rejected with a reason, never a panic and never an
//! error across the boundary. The enum is serializable so replays can
//! record the full command stream.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::entities::{EntityId, StructureKind, UnitKind};
use crate::factions::FactionId;

/// A player order to the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Order a unit to move to a point.
    SetRallyPoint {
        /// Unit to order.
        unit: EntityId,
        /// Destination in world space.
        point: Vec2,
    },
    /// Trigger a unit's ability along a direction.
    UseAbility {
        /// Unit to order.
        unit: EntityId,
        /// Aim direction; need not be normalized.
        direction: Vec2,
    },
    /// Spend energy to place a structure.
    PlaceStructure {
        /// Owning faction.
        faction: FactionId,
        /// Structure kind to place.
        kind: StructureKind,
        /// Placement position.
        position: Vec2,
    },
    /// Spend energy to produce a hero at the faction's nexus.
    ProduceHero {
        /// Owning faction.
        faction: FactionId,
        /// Hero kind to produce.
        kind: UnitKind,
    },
}

/// Result of applying a [`Command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandOutcome {
    /// The command took effect.
    Accepted,
    /// The referenced entity does not exist or belongs to nobody alive.
    UnknownEntity,
    /// The referenced entity is dead.
    TargetDead,
    /// The ability is still on cooldown.
    AbilityOnCooldown,
    /// The kind has no ability or cannot be produced.
    InvalidKind,
    /// The faction cannot afford the cost.
    InsufficientEnergy,
    /// The placement overlaps an obstacle or leaves the map.
    InvalidPlacement,
    /// Production requires a living, completed nexus.
    NoNexus,
}

impl CommandOutcome {
    /// Check for the accepting outcome.
    #[must_use]
    pub fn is_accepted(self) -> bool {
        self == CommandOutcome::Accepted
    }
}
