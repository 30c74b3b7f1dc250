//! Entity definitions.
//!
//! Entities are plain data owned by the collection that created them
//! (per-faction unit/structure lists, the global projectile and particle
//! pools). Entities never hold strong references to each other:
//! relationships are weak back-references by [`EntityId`], re-resolved
//! against the owning collection on every use and cleared lazily when the
//! referenced entity is gone.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::factions::FactionId;

/// Unique identifier for entities, assigned monotonically by the
/// simulation and never reused within a match.
pub type EntityId = u64;

// ============================================================================
// Health
// ============================================================================

/// Hit points for damageable entities.
///
/// Invariant: `current <= max` always. An entity with `current <= 0.0` is
/// dead and must be excluded from targeting, collision and visibility
/// before removal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Health {
    /// Current hit points.
    pub current: f32,
    /// Maximum hit points.
    pub max: f32,
}

impl Health {
    /// Create health at full capacity.
    #[must_use]
    pub const fn new(max: f32) -> Self {
        Self { current: max, max }
    }

    /// Apply damage, flooring at zero.
    pub fn apply_damage(&mut self, amount: f32) {
        self.current = (self.current - amount).max(0.0);
    }

    /// Heal, capped at max.
    pub fn heal(&mut self, amount: f32) {
        self.current = (self.current + amount).min(self.max);
    }

    /// Check whether this entity is dead.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.current <= 0.0
    }
}

// ============================================================================
// Units
// ============================================================================

/// Per-kind base statistics.
///
/// Looked up from [`UnitKind::stats`] instead of being branched on at use
/// sites, so adding a kind touches exactly one table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitStats {
    /// Maximum hit points.
    pub max_health: f32,
    /// Movement speed in world units per second.
    pub move_speed: f32,
    /// Collision radius.
    pub radius: f32,
    /// Attack range.
    pub attack_range: f32,
    /// Damage per shot.
    pub attack_damage: f32,
    /// Seconds between shots.
    pub attack_cooldown: f32,
    /// Projectile travel speed.
    pub projectile_speed: f32,
}

/// Kind tag stored on every unit.
///
/// Minions are the common rank-and-file; the other kinds are heroes with
/// one locomotion or visibility quirk each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitKind {
    /// Rank-and-file combat unit.
    Minion,
    /// Hero whose ability is a directional dash (steering suspended).
    Lancer,
    /// Hero whose ability drills straight through obstacles
    /// (steering and obstacle collision suspended).
    Borer,
    /// Permanently cloaked hero: invisible to the enemy regardless of
    /// light, unless explicitly revealed.
    Wraith,
    /// Ranged hero with no locomotion quirk.
    Warden,
}

impl UnitKind {
    /// Stable string discriminator, mixed into the state checksum.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Minion => "minion",
            Self::Lancer => "lancer",
            Self::Borer => "borer",
            Self::Wraith => "wraith",
            Self::Warden => "warden",
        }
    }

    /// Heroes get priority in crowd avoidance and collision resolution.
    #[must_use]
    pub const fn is_hero(&self) -> bool {
        !matches!(self, Self::Minion)
    }

    /// Cloaked kinds are invisible to the enemy regardless of shadow
    /// state; cloak wins over every other visibility rule.
    #[must_use]
    pub const fn is_cloaked(&self) -> bool {
        matches!(self, Self::Wraith)
    }

    /// Base statistics for this kind.
    #[must_use]
    pub const fn stats(&self) -> UnitStats {
        match self {
            Self::Minion => UnitStats {
                max_health: 60.0,
                move_speed: 90.0,
                radius: 10.0,
                attack_range: 140.0,
                attack_damage: 6.0,
                attack_cooldown: 1.0,
                projectile_speed: 400.0,
            },
            Self::Lancer => UnitStats {
                max_health: 160.0,
                move_speed: 120.0,
                radius: 14.0,
                attack_range: 110.0,
                attack_damage: 14.0,
                attack_cooldown: 0.8,
                projectile_speed: 500.0,
            },
            Self::Borer => UnitStats {
                max_health: 200.0,
                move_speed: 80.0,
                radius: 16.0,
                attack_range: 90.0,
                attack_damage: 18.0,
                attack_cooldown: 1.2,
                projectile_speed: 350.0,
            },
            Self::Wraith => UnitStats {
                max_health: 110.0,
                move_speed: 110.0,
                radius: 12.0,
                attack_range: 160.0,
                attack_damage: 10.0,
                attack_cooldown: 0.9,
                projectile_speed: 450.0,
            },
            Self::Warden => UnitStats {
                max_health: 140.0,
                move_speed: 100.0,
                radius: 13.0,
                attack_range: 200.0,
                attack_damage: 12.0,
                attack_cooldown: 1.1,
                projectile_speed: 480.0,
            },
        }
    }
}

/// Ability-driven locomotion that overrides steering while active.
///
/// The elapsed accumulator is driven by the same tick delta as everything
/// else; there are no hidden wall-clock reads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Overdrive {
    /// Short straight-line burst at a speed multiple.
    Dash {
        /// Unit-length travel direction.
        direction: Vec2,
        /// Seconds the dash has been active.
        elapsed: f32,
    },
    /// Straight tunnel through obstacles; obstacle collision is skipped
    /// until it ends.
    Drill {
        /// Unit-length travel direction.
        direction: Vec2,
        /// Seconds the drill has been active.
        elapsed: f32,
    },
}

/// A mobile combat unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    /// Unique identifier.
    pub id: EntityId,
    /// Kind tag (stats, hero flag, cloak flag).
    pub kind: UnitKind,
    /// Owning faction.
    pub faction: FactionId,
    /// World position.
    pub position: Vec2,
    /// Current velocity (world units per second).
    pub velocity: Vec2,
    /// Facing angle in radians.
    pub facing: f32,
    /// Current movement destination; `None` while idle.
    pub rally_point: Option<Vec2>,
    /// Hit points.
    pub health: Health,
    /// Collision radius.
    pub radius: f32,
    /// Seconds until the next shot is available.
    pub attack_cooldown: f32,
    /// Seconds until the ability is available.
    pub ability_cooldown: f32,
    /// Weak back-reference to the current attack target, revalidated on
    /// every use.
    pub target: Option<EntityId>,
    /// Active ability locomotion, if any. While `Some`, steering is
    /// skipped entirely.
    pub overdrive: Option<Overdrive>,
}

impl Unit {
    /// Spawn a unit of the given kind at a position.
    #[must_use]
    pub fn new(id: EntityId, kind: UnitKind, faction: FactionId, position: Vec2) -> Self {
        let stats = kind.stats();
        Self {
            id,
            kind,
            faction,
            position,
            velocity: Vec2::ZERO,
            facing: 0.0,
            rally_point: None,
            health: Health::new(stats.max_health),
            radius: stats.radius,
            attack_cooldown: 0.0,
            ability_cooldown: 0.0,
            target: None,
            overdrive: None,
        }
    }

    /// Check whether the unit is alive.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        !self.health.is_dead()
    }
}

// ============================================================================
// Structures
// ============================================================================

/// Kind tag for stationary structures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StructureKind {
    /// Faction home structure. Losing it loses the match; it projects the
    /// shadow-reveal influence radius.
    Nexus,
    /// Light reflector. Generates energy while it has line of sight to a
    /// light source; sibling mirrors block each other's sight lines as
    /// circular obstacles.
    Mirror,
    /// Static defense turret.
    Turret,
}

impl StructureKind {
    /// Stable string discriminator, mixed into the state checksum.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Nexus => "nexus",
            Self::Mirror => "mirror",
            Self::Turret => "turret",
        }
    }

    /// Maximum hit points for this kind.
    #[must_use]
    pub const fn max_health(&self) -> f32 {
        match self {
            Self::Nexus => 1000.0,
            Self::Mirror => 200.0,
            Self::Turret => 350.0,
        }
    }

    /// Footprint radius for this kind.
    #[must_use]
    pub const fn radius(&self) -> f32 {
        match self {
            Self::Nexus => 48.0,
            Self::Mirror => 20.0,
            Self::Turret => 24.0,
        }
    }

    /// Attack statistics, for kinds that shoot.
    #[must_use]
    pub const fn attack(&self) -> Option<(f32, f32, f32)> {
        // (range, damage, cooldown)
        match self {
            Self::Turret => Some((180.0, 8.0, 0.7)),
            Self::Nexus | Self::Mirror => None,
        }
    }
}

/// A stationary structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    /// Unique identifier.
    pub id: EntityId,
    /// Kind tag.
    pub kind: StructureKind,
    /// Owning faction.
    pub faction: FactionId,
    /// World position.
    pub position: Vec2,
    /// Footprint radius.
    pub radius: f32,
    /// Hit points.
    pub health: Health,
    /// Construction progress in `0..=1`.
    pub build_progress: f32,
    /// Set once `build_progress` reaches 1.
    pub complete: bool,
    /// Seconds until the next shot (turrets only).
    pub attack_cooldown: f32,
    /// Weak back-reference to the current target, revalidated on use.
    pub target: Option<EntityId>,
}

impl Structure {
    /// Place a new structure under construction.
    #[must_use]
    pub fn new(id: EntityId, kind: StructureKind, faction: FactionId, position: Vec2) -> Self {
        Self {
            id,
            kind,
            faction,
            position,
            radius: kind.radius(),
            health: Health::new(kind.max_health()),
            build_progress: 0.0,
            complete: false,
            attack_cooldown: 0.0,
            target: None,
        }
    }

    /// Place a structure that starts fully built (match setup).
    #[must_use]
    pub fn new_complete(
        id: EntityId,
        kind: StructureKind,
        faction: FactionId,
        position: Vec2,
    ) -> Self {
        let mut s = Self::new(id, kind, faction, position);
        s.build_progress = 1.0;
        s.complete = true;
        s
    }

    /// Check whether the structure is alive.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        !self.health.is_dead()
    }
}

// ============================================================================
// Projectiles
// ============================================================================

/// An in-flight projectile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    /// World position.
    pub position: Vec2,
    /// Velocity (world units per second).
    pub velocity: Vec2,
    /// Remaining travel budget; the projectile expires at zero.
    pub remaining_range: f32,
    /// Damage dealt on hit.
    pub damage: f32,
    /// Faction that fired it (its own entities are immune).
    pub owner_faction: FactionId,
    /// Entity that fired it.
    pub owner: EntityId,
}

// ============================================================================
// Ambient particles
// ============================================================================

/// A decorative ambient particle. Never deals or receives damage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    /// World position.
    pub position: Vec2,
    /// Velocity (world units per second).
    pub velocity: Vec2,
    /// Color variance in `0..1`, fixed at spawn from the seeded RNG.
    pub tint: f32,
}

// ============================================================================
// Obstacles and lights
// ============================================================================

/// A rotating polygonal obstacle.
///
/// The object-space vertex ring (3-9 sides) is the single source of truth;
/// world-space vertices are derived after each rotation update, never
/// edited independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asteroid {
    /// Centroid position.
    pub position: Vec2,
    /// Current rotation in radians.
    pub rotation: f32,
    /// Spin rate in radians per second, jittered at spawn.
    pub spin_rate: f32,
    /// Ordered vertex ring in object space.
    pub local_vertices: Vec<Vec2>,
    /// Derived world-space vertex ring.
    world_vertices: Vec<Vec2>,
}

impl Asteroid {
    /// Create an asteroid from an object-space vertex ring.
    #[must_use]
    pub fn new(position: Vec2, rotation: f32, spin_rate: f32, local_vertices: Vec<Vec2>) -> Self {
        let mut asteroid = Self {
            position,
            rotation,
            spin_rate,
            local_vertices,
            world_vertices: Vec::new(),
        };
        asteroid.refresh_world_vertices();
        asteroid
    }

    /// Advance rotation and rederive world vertices.
    pub fn advance(&mut self, dt: f32) {
        self.rotation += self.spin_rate * dt;
        self.refresh_world_vertices();
    }

    /// World-space vertex ring, valid as of the last rotation update.
    #[must_use]
    pub fn world_vertices(&self) -> &[Vec2] {
        &self.world_vertices
    }

    /// Conservative bounding radius around the centroid.
    #[must_use]
    pub fn bounding_radius(&self) -> f32 {
        self.local_vertices
            .iter()
            .map(|v| v.length())
            .fold(0.0, f32::max)
    }

    fn refresh_world_vertices(&mut self) {
        let (sin, cos) = self.rotation.sin_cos();
        self.world_vertices.clear();
        self.world_vertices.extend(self.local_vertices.iter().map(|v| {
            Vec2::new(
                self.position.x + v.x * cos - v.y * sin,
                self.position.y + v.x * sin + v.y * cos,
            )
        }));
    }
}

/// A light source for the shadow engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightSource {
    /// World position.
    pub position: Vec2,
    /// Physical radius (the sun is also a collision obstacle).
    pub radius: f32,
}
