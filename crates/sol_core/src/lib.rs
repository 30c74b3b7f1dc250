//! # Sol Core
//!
//! Deterministic game simulation core for Sol RTS.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO (beyond explicit config/replay file helpers)
//! - No system randomness (seeded PRNG only)
//! - No wall-clock reads (callers supply the tick delta)
//!
//! This separation enables:
//! - Lockstep multiplayer (identical simulation across clients)
//! - Headless CI runs
//! - Replay systems
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`math`] - Geometry primitives (rays, polygons, angles)
//! - [`spatial`] - Spatial hash grid and particle repulsion
//! - [`steering`] - Unit seek/avoid movement
//! - [`collision`] - Post-move penetration resolution
//! - [`visibility`] - Shadow and faction-visibility queries
//! - [`checksum`] - Deterministic state digest for desync detection
//! - [`simulation`] - Core simulation loop

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod checksum;
pub mod collision;
pub mod commands;
pub mod config;
pub mod entities;
pub mod error;
pub mod factions;
pub mod math;
pub mod replay;
pub mod simulation;
pub mod spatial;
pub mod steering;
pub mod visibility;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::commands::{Command, CommandOutcome};
    pub use crate::config::Tuning;
    pub use crate::entities::{
        Asteroid, EntityId, Health, LightSource, Particle, Projectile, Structure, StructureKind,
        Unit, UnitKind,
    };
    pub use crate::error::{GameError, Result};
    pub use crate::factions::FactionId;
    pub use crate::simulation::{Effect, SimConfig, Simulation};
}
