//! Simulation tuning constants.
//!
//! Every gameplay scalar the kernel consumes lives in [`Tuning`] so that
//! balance work happens in one RON file instead of scattered literals.
//! The defaults here are the canonical values; data files override them.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};

/// Axis-aligned playable map bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapBounds {
    /// Lower-left corner.
    pub min: Vec2,
    /// Upper-right corner.
    pub max: Vec2,
}

impl MapBounds {
    /// Clamp a point into the bounds (hard rectangle, not a soft force).
    #[must_use]
    pub fn clamp(&self, p: Vec2) -> Vec2 {
        Vec2::new(p.x.clamp(self.min.x, self.max.x), p.y.clamp(self.min.y, self.max.y))
    }

    /// Check whether a point lies inside the bounds.
    #[must_use]
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

/// All tunable simulation constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Playable map rectangle.
    pub map_bounds: MapBounds,
    /// Largest delta time a single tick may advance, in seconds.
    pub max_tick_delta: f32,
    /// Ticks between checkpoint checksums.
    pub checksum_cadence: u64,

    // --- Steering ---
    /// Distance at which a unit counts as arrived at its rally point.
    pub arrival_threshold: f32,
    /// Range within which units repel each other while seeking.
    pub unit_avoid_range: f32,
    /// Blend strength for the unit-unit avoidance vector.
    pub unit_avoid_strength: f32,
    /// Blend strength for the obstacle avoidance vector.
    pub obstacle_avoid_strength: f32,
    /// How far ahead a seeking unit scans for obstacles.
    pub look_ahead_distance: f32,
    /// Extra corridor width added to obstacle radius during look-ahead.
    pub look_ahead_buffer: f32,
    /// Avoidance multiplier applied when a minion yields to a hero.
    pub minion_yield_factor: f32,
    /// Avoidance multiplier applied when a hero crowds past minions.
    pub hero_yield_factor: f32,
    /// Maximum facing change per second, radians.
    pub turn_rate: f32,
    /// Velocity decay rate per second for idle units.
    pub idle_decay: f32,

    // --- Collision ---
    /// Minimum enforced gap between a unit and a structure footprint.
    pub structure_standoff: f32,
    /// Largest single-tick push-out distance before a move is reverted.
    pub max_push_out: f32,

    // --- Particles ---
    /// Number of ambient particles in the pool.
    pub particle_count: usize,
    /// Short-range repulsion radius between particles.
    pub repulsion_radius: f32,
    /// Repulsion force scale.
    pub repulsion_strength: f32,
    /// Spatial grid cell size as a multiple of the repulsion radius.
    pub grid_cell_factor: f32,
    /// Velocity damping applied to particles each second.
    pub particle_damping: f32,

    // --- Visibility ---
    /// A shadowed point within this range of a living friendly unit is
    /// still visible to that faction.
    pub proximity_reveal_range: f32,
    /// Influence radius of a faction's nexus for shadow reveal.
    pub nexus_influence_radius: f32,

    // --- Economy / production ---
    /// Energy each faction starts the match with.
    pub start_energy: f32,
    /// Energy income per second per mirror with line of sight to a light.
    pub mirror_income: f32,
    /// Build progress per second for incomplete structures.
    pub build_rate: f32,
    /// Energy cost to place a structure.
    pub structure_cost: f32,
    /// Energy cost to produce a hero.
    pub hero_cost: f32,

    // --- Abilities ---
    /// Dash speed multiplier while a Lancer dash is active.
    pub dash_speed_factor: f32,
    /// Dash duration in seconds.
    pub dash_duration: f32,
    /// Drill duration in seconds.
    pub drill_duration: f32,
    /// Ability cooldown in seconds (uniform across hero kinds).
    pub ability_cooldown: f32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            map_bounds: MapBounds {
                min: Vec2::new(0.0, 0.0),
                max: Vec2::new(1920.0, 1080.0),
            },
            max_tick_delta: 0.1,
            checksum_cadence: 30,

            arrival_threshold: 5.0,
            unit_avoid_range: 60.0,
            unit_avoid_strength: 1.5,
            obstacle_avoid_strength: 2.5,
            look_ahead_distance: 120.0,
            look_ahead_buffer: 20.0,
            minion_yield_factor: 1.8,
            hero_yield_factor: 0.4,
            turn_rate: 6.0,
            idle_decay: 4.0,

            structure_standoff: 10.0,
            max_push_out: 8.0,

            particle_count: 2000,
            repulsion_radius: 12.0,
            repulsion_strength: 40.0,
            grid_cell_factor: 4.0,
            particle_damping: 0.6,

            proximity_reveal_range: 150.0,
            nexus_influence_radius: 220.0,

            start_energy: 100.0,
            mirror_income: 2.0,
            build_rate: 0.2,
            structure_cost: 50.0,
            hero_cost: 100.0,

            dash_speed_factor: 4.0,
            dash_duration: 0.25,
            drill_duration: 1.2,
            ability_cooldown: 5.0,
        }
    }
}

impl Tuning {
    /// Parse a tuning override file from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        ron::from_str(text).map_err(|e| GameError::TuningParseError {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })
    }

    /// Load a tuning file from disk.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| GameError::TuningParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        ron::from_str(&text).map_err(|e| GameError::TuningParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Spatial grid cell size derived from the repulsion radius.
    #[must_use]
    pub fn grid_cell_size(&self) -> f32 {
        self.repulsion_radius * self.grid_cell_factor
    }
}
