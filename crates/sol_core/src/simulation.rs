//! Core simulation loop.
//!
//! [`Simulation`] owns the whole match state and advances it one tick at
//! a time. All state mutation happens either inside [`advance_tick`] or
//! through [`apply_command`]; everything else is a read-only query.
//!
//! # Determinism
//!
//! Two simulations built from the same [`SimConfig`] and fed the same
//! command stream produce bit-identical state, verified by the periodic
//! checkpoint checksum:
//! - no system randomness (a seeded PRNG generates the world)
//! - single-threaded, fixed system order every tick
//! - collections are traversed in storage order, never hashed order
//!
//! # System Execution Order
//!
//! Each tick, systems run in this order:
//! 1. **Particles** - spatial grid rebuild, repulsion, damping, drift
//! 2. **Asteroids** - rotation advance, world vertex refresh
//! 3. **Production** - build progress, mirror light income
//! 4. **Units** - cooldowns, ability overrides or steering
//! 5. **Combat** - target acquisition and projectile spawns
//! 6. **Projectiles** - integration, occlusion, hit resolution
//! 7. **Collision** - unit pairs, obstacle push-out, structure standoff
//! 8. **Death sweep** - remove dead entities, invalidate stale targets
//!
//! The checkpoint checksum is recomputed every `checksum_cadence` ticks
//! and logged at debug level.
//!
//! [`advance_tick`]: Simulation::advance_tick
//! [`apply_command`]: Simulation::apply_command

use std::collections::HashSet;
use std::f32::consts::TAU;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::checksum::StateHasher;
use crate::collision::{
    clamp_structure_standoff, resolve_obstacle_overlaps, resolve_unit_overlaps,
};
use crate::commands::{Command, CommandOutcome};
use crate::config::Tuning;
use crate::entities::{
    Asteroid, EntityId, LightSource, Overdrive, Particle, Projectile, Structure, StructureKind,
    Unit, UnitKind,
};
use crate::error::{GameError, Result};
use crate::factions::FactionId;
use crate::math::{normalize_or_zero, ray_circle_intersection, ray_polygon_intersection};
use crate::spatial::{apply_repulsion, SpatialGrid};
use crate::steering::{steer_unit, NeighborInfo, ObstacleCircle};
use crate::visibility::{is_in_shadow, is_visible_to_faction, line_of_sight};

/// Number of asteroids generated at match start.
const ASTEROID_COUNT: usize = 6;
/// Radius of the central sun, both as a light and as an obstacle.
const SUN_RADIUS: f32 = 60.0;
/// Minions each faction starts with.
const STARTING_MINIONS: usize = 6;
/// Travel speed of turret projectiles.
const TURRET_PROJECTILE_SPEED: f32 = 420.0;
/// Range budget multiplier so projectiles can catch a retreating target.
const PROJECTILE_RANGE_SLACK: f32 = 1.2;

/// Match setup parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// PRNG seed for world generation.
    pub seed: u64,
    /// Tuning constants for the match.
    pub tuning: Tuning,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            tuning: Tuning::default(),
        }
    }
}

/// Per-faction mutable state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerState {
    /// Owning faction.
    pub faction: FactionId,
    /// Spendable energy stock.
    pub energy: f32,
    /// Living units, in spawn order.
    pub units: Vec<Unit>,
    /// Structures, in placement order.
    pub structures: Vec<Structure>,
}

impl PlayerState {
    fn new(faction: FactionId, energy: f32) -> Self {
        Self {
            faction,
            energy,
            units: Vec::new(),
            structures: Vec::new(),
        }
    }
}

/// Transient presentation event emitted during a tick.
///
/// Effects are advisory only: dropping them never changes simulation
/// state. Only the most recent tick's effects are retained; undrained
/// ones are discarded when the next tick starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Effect {
    /// A projectile was fired.
    ProjectileSpawned {
        /// Muzzle position.
        position: Vec2,
        /// Firing faction.
        faction: FactionId,
    },
    /// A projectile hit something.
    Impact {
        /// Impact position.
        position: Vec2,
        /// Damage dealt.
        damage: f32,
    },
    /// A unit died this tick.
    UnitDied {
        /// Unit id.
        id: EntityId,
        /// Owning faction.
        faction: FactionId,
        /// Position at death.
        position: Vec2,
    },
    /// A structure was destroyed this tick.
    StructureDied {
        /// Structure id.
        id: EntityId,
        /// Owning faction.
        faction: FactionId,
        /// Position.
        position: Vec2,
    },
    /// A structure finished construction.
    StructureCompleted {
        /// Structure id.
        id: EntityId,
        /// Owning faction.
        faction: FactionId,
    },
    /// A unit triggered its ability.
    AbilityTriggered {
        /// Unit id.
        id: EntityId,
        /// Unit kind.
        kind: UnitKind,
    },
    /// A hero was produced at a nexus.
    HeroProduced {
        /// New unit id.
        id: EntityId,
        /// Owning faction.
        faction: FactionId,
    },
}

/// Which slot fired a planned shot.
#[derive(Debug, Clone, Copy)]
enum ShooterSlot {
    Unit(usize, usize),
    Structure(usize, usize),
}

/// A shot resolved during the read-only combat pass, applied afterwards.
#[derive(Debug, Clone, Copy)]
struct ShotPlan {
    slot: ShooterSlot,
    origin: Vec2,
    target_id: EntityId,
    target_pos: Vec2,
    damage: f32,
    speed: f32,
    range: f32,
    cooldown: f32,
    owner: EntityId,
    faction: FactionId,
}

#[derive(Debug, Clone, Copy)]
enum HitKind {
    Unit(usize),
    Structure(usize),
}

/// The deterministic match simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    config: SimConfig,
    tick: u64,
    elapsed: f32,
    next_entity_id: EntityId,
    players: [PlayerState; 2],
    particles: Vec<Particle>,
    projectiles: Vec<Projectile>,
    asteroids: Vec<Asteroid>,
    lights: Vec<LightSource>,
    rng: ChaCha8Rng,
    last_checksum: u32,
    #[serde(skip)]
    grid: SpatialGrid,
    #[serde(skip)]
    effects: Vec<Effect>,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl Simulation {
    /// Build a fresh match from a config.
    ///
    /// World generation (asteroid field, particle pool) is driven entirely
    /// by the seed; the same config always produces the same world.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let tuning = &config.tuning;
        let bounds = tuning.map_bounds;
        let center = (bounds.min + bounds.max) * 0.5;
        let width = bounds.max.x - bounds.min.x;

        let lights = vec![LightSource {
            position: center,
            radius: SUN_RADIUS,
        }];

        let nexus_positions = [
            Vec2::new(bounds.min.x + width * 0.125, center.y),
            Vec2::new(bounds.max.x - width * 0.125, center.y),
        ];

        let mut next_id: EntityId = 1;
        let mut players = [
            PlayerState::new(FactionId::Solar, tuning.start_energy),
            PlayerState::new(FactionId::Umbra, tuning.start_energy),
        ];
        for (pi, player) in players.iter_mut().enumerate() {
            let nexus_pos = nexus_positions[pi];
            player.structures.push(Structure::new_complete(
                next_id,
                StructureKind::Nexus,
                player.faction,
                nexus_pos,
            ));
            next_id += 1;

            // Starting minions in a column on the map-center side.
            let toward: f32 = if pi == 0 { 1.0 } else { -1.0 };
            for i in 0..STARTING_MINIONS {
                let row = i as f32 - (STARTING_MINIONS as f32 - 1.0) * 0.5;
                let offset = Vec2::new(toward * 90.0, row * 26.0);
                player.units.push(Unit::new(
                    next_id,
                    UnitKind::Minion,
                    player.faction,
                    nexus_pos + offset,
                ));
                next_id += 1;
            }
        }

        let keep_clear = [
            (center, SUN_RADIUS + 160.0),
            (nexus_positions[0], 300.0),
            (nexus_positions[1], 300.0),
        ];
        let asteroids = spawn_asteroids(&mut rng, tuning, &keep_clear);
        let particles = spawn_particles(&mut rng, tuning);
        let grid = SpatialGrid::new(tuning.grid_cell_size());

        Self {
            config,
            tick: 0,
            elapsed: 0.0,
            next_entity_id: next_id,
            players,
            particles,
            projectiles: Vec::new(),
            asteroids,
            lights,
            rng,
            last_checksum: 0,
            grid,
            effects: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Current tick number.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Total simulated time in seconds.
    #[must_use]
    pub const fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Match config this simulation was built from.
    #[must_use]
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// State of one faction.
    #[must_use]
    pub fn player(&self, faction: FactionId) -> &PlayerState {
        &self.players[faction.index()]
    }

    /// Ambient particle pool.
    #[must_use]
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// In-flight projectiles.
    #[must_use]
    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    /// Asteroid field.
    #[must_use]
    pub fn asteroids(&self) -> &[Asteroid] {
        &self.asteroids
    }

    /// Light sources.
    #[must_use]
    pub fn lights(&self) -> &[LightSource] {
        &self.lights
    }

    /// Checksum from the most recent checkpoint tick.
    #[must_use]
    pub const fn last_checksum(&self) -> u32 {
        self.last_checksum
    }

    /// Look up a unit by id across both factions.
    #[must_use]
    pub fn unit(&self, id: EntityId) -> Option<&Unit> {
        self.players
            .iter()
            .flat_map(|p| p.units.iter())
            .find(|u| u.id == id)
    }

    /// Look up a structure by id across both factions.
    #[must_use]
    pub fn structure(&self, id: EntityId) -> Option<&Structure> {
        self.players
            .iter()
            .flat_map(|p| p.structures.iter())
            .find(|s| s.id == id)
    }

    /// Drain the effects emitted during the most recent tick.
    ///
    /// Effects from a tick are discarded when the next tick starts, so
    /// the buffer never grows across ticks for a caller that does not
    /// drain it.
    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    /// Advance the simulation by `dt` seconds.
    ///
    /// `dt` is clamped to `[0, max_tick_delta]`: a stalled host that
    /// resumes with a huge delta advances one bounded step instead of
    /// tunneling entities through the world.
    pub fn advance_tick(&mut self, dt: f32) {
        let dt = dt.clamp(0.0, self.config.tuning.max_tick_delta);

        // A caller that never drains still holds at most one tick's
        // worth of effects.
        self.effects.clear();

        let pre_positions = [
            self.players[0].units.iter().map(|u| u.position).collect::<Vec<_>>(),
            self.players[1].units.iter().map(|u| u.position).collect::<Vec<_>>(),
        ];

        self.run_particles(dt);
        for asteroid in &mut self.asteroids {
            asteroid.advance(dt);
        }
        self.run_production(dt);
        self.tick_cooldowns(dt);
        self.run_unit_movement(dt);
        let plans = self.plan_shots();
        self.apply_shots(&plans);
        self.run_projectiles(dt);
        self.run_collision(&pre_positions);
        self.run_death_sweep();

        self.tick += 1;
        self.elapsed += dt;

        let cadence = self.config.tuning.checksum_cadence.max(1);
        if self.tick % cadence == 0 {
            let checksum = self.state_checksum();
            self.last_checksum = checksum;
            tracing::debug!(tick = self.tick, checksum, "checkpoint checksum");
        }
    }

    fn run_particles(&mut self, dt: f32) {
        let cell = self.config.tuning.grid_cell_size();
        if (self.grid.cell_size() - cell).abs() > f32::EPSILON {
            self.grid = SpatialGrid::new(cell);
        }
        self.grid.rebuild(&self.particles);
        apply_repulsion(
            &self.grid,
            &mut self.particles,
            self.config.tuning.repulsion_radius,
            self.config.tuning.repulsion_strength,
            dt,
        );

        let tuning = &self.config.tuning;
        let damping = 1.0 - (tuning.particle_damping * dt).min(1.0);
        let bounds = tuning.map_bounds;
        let span = bounds.max - bounds.min;
        for particle in &mut self.particles {
            particle.velocity *= damping;
            let moved = particle.position + particle.velocity * dt;
            // Particles wrap at the map edge so the pool keeps covering
            // the whole map.
            particle.position = Vec2::new(
                bounds.min.x + (moved.x - bounds.min.x).rem_euclid(span.x),
                bounds.min.y + (moved.y - bounds.min.y).rem_euclid(span.y),
            );
        }
    }

    fn run_production(&mut self, dt: f32) {
        let tuning = &self.config.tuning;

        for player in &mut self.players {
            for structure in &mut player.structures {
                if structure.is_alive() && !structure.complete {
                    structure.build_progress =
                        (structure.build_progress + tuning.build_rate * dt).min(1.0);
                    if structure.build_progress >= 1.0 {
                        structure.complete = true;
                        self.effects.push(Effect::StructureCompleted {
                            id: structure.id,
                            faction: structure.faction,
                        });
                    }
                }
            }
        }

        // Mirror income needs line of sight to a light; other structures
        // (both factions) occlude the ray, the light itself does not.
        let blockers: Vec<(EntityId, ObstacleCircle)> = self
            .players
            .iter()
            .flat_map(|p| p.structures.iter())
            .filter(|s| s.is_alive())
            .map(|s| {
                (
                    s.id,
                    ObstacleCircle {
                        center: s.position,
                        radius: s.radius,
                    },
                )
            })
            .collect();

        let mut income = [0.0_f32; 2];
        for (pi, player) in self.players.iter().enumerate() {
            for structure in &player.structures {
                if structure.kind != StructureKind::Mirror
                    || !structure.complete
                    || !structure.is_alive()
                {
                    continue;
                }
                let others: Vec<ObstacleCircle> = blockers
                    .iter()
                    .filter(|(id, _)| *id != structure.id)
                    .map(|(_, c)| *c)
                    .collect();
                let lit = self.lights.iter().any(|light| {
                    line_of_sight(structure.position, light.position, &self.asteroids, &others)
                });
                if lit {
                    income[pi] += tuning.mirror_income * dt;
                }
            }
        }
        for (pi, player) in self.players.iter_mut().enumerate() {
            player.energy += income[pi];
        }
    }

    fn tick_cooldowns(&mut self, dt: f32) {
        for player in &mut self.players {
            for unit in &mut player.units {
                unit.attack_cooldown = (unit.attack_cooldown - dt).max(0.0);
                unit.ability_cooldown = (unit.ability_cooldown - dt).max(0.0);
            }
            for structure in &mut player.structures {
                structure.attack_cooldown = (structure.attack_cooldown - dt).max(0.0);
            }
        }
    }

    fn run_unit_movement(&mut self, dt: f32) {
        let neighbors = self.neighbor_snapshot();
        let obstacles = self.steering_obstacles();
        let tuning = &self.config.tuning;

        for player in &mut self.players {
            for unit in &mut player.units {
                if !unit.is_alive() {
                    continue;
                }
                if let Some(overdrive) = unit.overdrive {
                    let stats = unit.kind.stats();
                    let (direction, elapsed, duration, speed, rebuilt) = match overdrive {
                        Overdrive::Dash { direction, elapsed } => {
                            let e = elapsed + dt;
                            (
                                direction,
                                e,
                                tuning.dash_duration,
                                stats.move_speed * tuning.dash_speed_factor,
                                Overdrive::Dash {
                                    direction,
                                    elapsed: e,
                                },
                            )
                        }
                        Overdrive::Drill { direction, elapsed } => {
                            let e = elapsed + dt;
                            (
                                direction,
                                e,
                                tuning.drill_duration,
                                stats.move_speed,
                                Overdrive::Drill {
                                    direction,
                                    elapsed: e,
                                },
                            )
                        }
                    };
                    unit.velocity = direction * speed;
                    unit.position = tuning.map_bounds.clamp(unit.position + unit.velocity * dt);
                    unit.facing = direction.y.atan2(direction.x);
                    unit.overdrive = if elapsed >= duration { None } else { Some(rebuilt) };
                } else {
                    steer_unit(unit, &neighbors, &obstacles, tuning, dt);
                }
            }
        }
    }

    fn plan_shots(&self) -> Vec<ShotPlan> {
        let mut plans = Vec::new();

        for pi in 0..2 {
            let faction = self.players[pi].faction;
            let friendly: Vec<Vec2> = self.players[pi]
                .units
                .iter()
                .filter(|u| u.is_alive())
                .map(|u| u.position)
                .collect();
            let nexus = self.players[pi]
                .structures
                .iter()
                .find(|s| s.kind == StructureKind::Nexus && s.is_alive())
                .map(|s| s.position);

            for (ui, unit) in self.players[pi].units.iter().enumerate() {
                if !unit.is_alive() || unit.attack_cooldown > 0.0 || unit.overdrive.is_some() {
                    continue;
                }
                let stats = unit.kind.stats();
                if let Some((target_id, target_pos)) =
                    self.acquire_target(unit.position, stats.attack_range, faction, &friendly, nexus)
                {
                    plans.push(ShotPlan {
                        slot: ShooterSlot::Unit(pi, ui),
                        origin: unit.position,
                        target_id,
                        target_pos,
                        damage: stats.attack_damage,
                        speed: stats.projectile_speed,
                        range: stats.attack_range,
                        cooldown: stats.attack_cooldown,
                        owner: unit.id,
                        faction,
                    });
                }
            }

            for (si, structure) in self.players[pi].structures.iter().enumerate() {
                if !structure.is_alive() || !structure.complete || structure.attack_cooldown > 0.0 {
                    continue;
                }
                let Some((range, damage, cooldown)) = structure.kind.attack() else {
                    continue;
                };
                if let Some((target_id, target_pos)) =
                    self.acquire_target(structure.position, range, faction, &friendly, nexus)
                {
                    plans.push(ShotPlan {
                        slot: ShooterSlot::Structure(pi, si),
                        origin: structure.position,
                        target_id,
                        target_pos,
                        damage,
                        speed: TURRET_PROJECTILE_SPEED,
                        range,
                        cooldown,
                        owner: structure.id,
                        faction,
                    });
                }
            }
        }

        plans
    }

    /// Nearest live, visible enemy with line of sight, units before
    /// structures. Ties go to the earlier entry in storage order.
    fn acquire_target(
        &self,
        origin: Vec2,
        range: f32,
        faction: FactionId,
        friendly: &[Vec2],
        nexus: Option<Vec2>,
    ) -> Option<(EntityId, Vec2)> {
        let tuning = &self.config.tuning;
        let enemy = &self.players[faction.opponent().index()];

        let mut best: Option<(EntityId, Vec2, f32)> = None;
        for unit in &enemy.units {
            if !unit.is_alive() {
                continue;
            }
            let dist = origin.distance(unit.position);
            if dist > range {
                continue;
            }
            if !is_visible_to_faction(
                unit.position,
                unit.kind.is_cloaked(),
                friendly,
                nexus,
                &self.lights,
                &self.asteroids,
                tuning,
            ) {
                continue;
            }
            if !line_of_sight(origin, unit.position, &self.asteroids, &[]) {
                continue;
            }
            if best.map_or(true, |(_, _, bd)| dist < bd) {
                best = Some((unit.id, unit.position, dist));
            }
        }

        if best.is_none() {
            // Structures are static; shadow never hides them.
            for structure in &enemy.structures {
                if !structure.is_alive() {
                    continue;
                }
                let dist = origin.distance(structure.position);
                if dist > range {
                    continue;
                }
                if !line_of_sight(origin, structure.position, &self.asteroids, &[]) {
                    continue;
                }
                if best.map_or(true, |(_, _, bd)| dist < bd) {
                    best = Some((structure.id, structure.position, dist));
                }
            }
        }

        best.map(|(id, pos, _)| (id, pos))
    }

    fn apply_shots(&mut self, plans: &[ShotPlan]) {
        for plan in plans {
            let dir = normalize_or_zero(plan.target_pos - plan.origin);
            if dir == Vec2::ZERO {
                continue;
            }
            match plan.slot {
                ShooterSlot::Unit(pi, ui) => {
                    let unit = &mut self.players[pi].units[ui];
                    unit.attack_cooldown = plan.cooldown;
                    unit.target = Some(plan.target_id);
                }
                ShooterSlot::Structure(pi, si) => {
                    let structure = &mut self.players[pi].structures[si];
                    structure.attack_cooldown = plan.cooldown;
                    structure.target = Some(plan.target_id);
                }
            }
            self.projectiles.push(Projectile {
                position: plan.origin,
                velocity: dir * plan.speed,
                remaining_range: plan.range * PROJECTILE_RANGE_SLACK,
                damage: plan.damage,
                owner_faction: plan.faction,
                owner: plan.owner,
            });
            self.effects.push(Effect::ProjectileSpawned {
                position: plan.origin,
                faction: plan.faction,
            });
        }
    }

    fn run_projectiles(&mut self, dt: f32) {
        let mut projectiles = std::mem::take(&mut self.projectiles);
        projectiles.retain_mut(|proj| {
            let step = proj.velocity * dt;
            let travel = step.length();
            if travel == 0.0 {
                return false;
            }
            let origin = proj.position;
            let dir = step / travel;
            let reach = travel.min(proj.remaining_range);

            // Asteroids absorb projectiles.
            let mut absorb_t = f32::INFINITY;
            for asteroid in &self.asteroids {
                if let Some(t) = ray_polygon_intersection(origin, dir, asteroid.world_vertices()) {
                    if t <= reach && t < absorb_t {
                        absorb_t = t;
                    }
                }
            }

            // Earliest enemy hit along the travel segment.
            let ei = proj.owner_faction.opponent().index();
            let mut best: Option<(HitKind, f32)> = None;
            for (i, unit) in self.players[ei].units.iter().enumerate() {
                if !unit.is_alive() {
                    continue;
                }
                if let Some(t) = ray_circle_intersection(origin, dir, unit.position, unit.radius) {
                    if t <= reach && best.map_or(true, |(_, bt)| t < bt) {
                        best = Some((HitKind::Unit(i), t));
                    }
                }
            }
            for (i, structure) in self.players[ei].structures.iter().enumerate() {
                if !structure.is_alive() {
                    continue;
                }
                if let Some(t) =
                    ray_circle_intersection(origin, dir, structure.position, structure.radius)
                {
                    if t <= reach && best.map_or(true, |(_, bt)| t < bt) {
                        best = Some((HitKind::Structure(i), t));
                    }
                }
            }

            if let Some((kind, t)) = best {
                if t < absorb_t {
                    match kind {
                        HitKind::Unit(i) => {
                            self.players[ei].units[i].health.apply_damage(proj.damage);
                        }
                        HitKind::Structure(i) => {
                            self.players[ei].structures[i].health.apply_damage(proj.damage);
                        }
                    }
                    self.effects.push(Effect::Impact {
                        position: origin + dir * t,
                        damage: proj.damage,
                    });
                    return false;
                }
            }
            if absorb_t.is_finite() {
                return false;
            }

            proj.position = origin + dir * reach;
            proj.remaining_range -= reach;
            proj.remaining_range > 0.0
        });
        self.projectiles = projectiles;
    }

    fn run_collision(&mut self, pre_positions: &[Vec<Vec2>; 2]) {
        let obstacles = self.collision_obstacles();
        let structure_circles = self.structure_circles();
        let tuning = &self.config.tuning;

        let (left, right) = self.players.split_at_mut(1);
        let mut units: Vec<&mut Unit> = left[0]
            .units
            .iter_mut()
            .chain(right[0].units.iter_mut())
            .collect();
        let flat_pre: Vec<Vec2> = pre_positions[0]
            .iter()
            .chain(pre_positions[1].iter())
            .copied()
            .collect();
        debug_assert_eq!(units.len(), flat_pre.len());

        resolve_unit_overlaps(&mut units);

        // Drilling units tunnel through obstacles until the drill ends.
        let mut solid_units = Vec::with_capacity(units.len());
        let mut solid_pre = Vec::with_capacity(units.len());
        for (unit, pre) in units.into_iter().zip(flat_pre) {
            if matches!(unit.overdrive, Some(Overdrive::Drill { .. })) {
                continue;
            }
            solid_units.push(unit);
            solid_pre.push(pre);
        }
        resolve_obstacle_overlaps(&mut solid_units, &solid_pre, &obstacles, tuning);
        clamp_structure_standoff(&mut solid_units, &structure_circles, tuning);
    }

    fn run_death_sweep(&mut self) {
        for player in &mut self.players {
            for unit in &player.units {
                if !unit.is_alive() {
                    self.effects.push(Effect::UnitDied {
                        id: unit.id,
                        faction: unit.faction,
                        position: unit.position,
                    });
                }
            }
            player.units.retain(Unit::is_alive);

            for structure in &player.structures {
                if !structure.is_alive() {
                    self.effects.push(Effect::StructureDied {
                        id: structure.id,
                        faction: structure.faction,
                        position: structure.position,
                    });
                }
            }
            player.structures.retain(Structure::is_alive);
        }

        let living: HashSet<EntityId> = self
            .players
            .iter()
            .flat_map(|p| {
                p.units
                    .iter()
                    .map(|u| u.id)
                    .chain(p.structures.iter().map(|s| s.id))
            })
            .collect();
        for player in &mut self.players {
            for unit in &mut player.units {
                if unit.target.map_or(false, |t| !living.contains(&t)) {
                    unit.target = None;
                }
            }
            for structure in &mut player.structures {
                if structure.target.map_or(false, |t| !living.contains(&t)) {
                    structure.target = None;
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    fn neighbor_snapshot(&self) -> Vec<NeighborInfo> {
        self.players
            .iter()
            .flat_map(|p| p.units.iter())
            .filter(|u| u.is_alive())
            .map(|u| NeighborInfo {
                id: u.id,
                position: u.position,
                is_hero: u.kind.is_hero(),
            })
            .collect()
    }

    /// Obstacles as seen by steering: standoff is folded into the
    /// structure radius so units aim to keep the gap.
    fn steering_obstacles(&self) -> Vec<ObstacleCircle> {
        let standoff = self.config.tuning.structure_standoff;
        let mut obstacles: Vec<ObstacleCircle> = self
            .lights
            .iter()
            .map(|l| ObstacleCircle {
                center: l.position,
                radius: l.radius,
            })
            .collect();
        obstacles.extend(self.asteroids.iter().map(|a| ObstacleCircle {
            center: a.position,
            radius: a.bounding_radius(),
        }));
        obstacles.extend(
            self.players
                .iter()
                .flat_map(|p| p.structures.iter())
                .filter(|s| s.is_alive())
                .map(|s| ObstacleCircle {
                    center: s.position,
                    radius: s.radius + standoff,
                }),
        );
        obstacles
    }

    /// Hard push-out sources: sun, asteroids, structure footprints.
    fn collision_obstacles(&self) -> Vec<ObstacleCircle> {
        let mut obstacles: Vec<ObstacleCircle> = self
            .lights
            .iter()
            .map(|l| ObstacleCircle {
                center: l.position,
                radius: l.radius,
            })
            .collect();
        obstacles.extend(self.asteroids.iter().map(|a| ObstacleCircle {
            center: a.position,
            radius: a.bounding_radius(),
        }));
        obstacles.extend(
            self.players
                .iter()
                .flat_map(|p| p.structures.iter())
                .filter(|s| s.is_alive())
                .map(|s| ObstacleCircle {
                    center: s.position,
                    radius: s.radius,
                }),
        );
        obstacles
    }

    fn structure_circles(&self) -> Vec<ObstacleCircle> {
        self.players
            .iter()
            .flat_map(|p| p.structures.iter())
            .filter(|s| s.is_alive())
            .map(|s| ObstacleCircle {
                center: s.position,
                radius: s.radius,
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Apply a player command, returning the outcome.
    ///
    /// Never panics and never returns an error: invalid commands are
    /// rejected with a reason.
    pub fn apply_command(&mut self, command: Command) -> CommandOutcome {
        match command {
            Command::SetRallyPoint { unit, point } => self.set_rally_point(unit, point),
            Command::UseAbility { unit, direction } => self.use_ability(unit, direction),
            Command::PlaceStructure {
                faction,
                kind,
                position,
            } => self.place_structure(faction, kind, position),
            Command::ProduceHero { faction, kind } => self.produce_hero(faction, kind),
        }
    }

    /// Order a unit to move to a point (clamped into the map).
    ///
    /// A rally inside an obstacle is accepted; the unit walks until the
    /// collision pass reverts it and clears the rally.
    pub fn set_rally_point(&mut self, id: EntityId, point: Vec2) -> CommandOutcome {
        let bounds = self.config.tuning.map_bounds;
        let Some(unit) = self.find_unit_mut(id) else {
            return CommandOutcome::UnknownEntity;
        };
        if !unit.is_alive() {
            return CommandOutcome::TargetDead;
        }
        unit.rally_point = Some(bounds.clamp(point));
        CommandOutcome::Accepted
    }

    /// Trigger a unit's ability along a direction.
    ///
    /// A zero direction falls back to the unit's facing. Minions have no
    /// ability; Lancers dash, Borers drill, Wraiths and Wardens fire an
    /// empowered shot.
    pub fn use_ability(&mut self, id: EntityId, direction: Vec2) -> CommandOutcome {
        let cooldown = self.config.tuning.ability_cooldown;
        let Some(unit) = self.find_unit_mut(id) else {
            return CommandOutcome::UnknownEntity;
        };
        if !unit.is_alive() {
            return CommandOutcome::TargetDead;
        }
        if unit.ability_cooldown > 0.0 {
            return CommandOutcome::AbilityOnCooldown;
        }

        let mut dir = normalize_or_zero(direction);
        if dir == Vec2::ZERO {
            dir = Vec2::new(unit.facing.cos(), unit.facing.sin());
        }

        let kind = unit.kind;
        let stats = kind.stats();
        let mut shot: Option<Projectile> = None;
        match kind {
            UnitKind::Minion => return CommandOutcome::InvalidKind,
            UnitKind::Lancer => {
                unit.overdrive = Some(Overdrive::Dash {
                    direction: dir,
                    elapsed: 0.0,
                });
            }
            UnitKind::Borer => {
                unit.overdrive = Some(Overdrive::Drill {
                    direction: dir,
                    elapsed: 0.0,
                });
            }
            UnitKind::Wraith | UnitKind::Warden => {
                shot = Some(Projectile {
                    position: unit.position,
                    velocity: dir * stats.projectile_speed,
                    remaining_range: stats.attack_range * 1.5,
                    damage: stats.attack_damage * 2.0,
                    owner_faction: unit.faction,
                    owner: unit.id,
                });
            }
        }
        unit.ability_cooldown = cooldown;
        unit.facing = dir.y.atan2(dir.x);
        let unit_id = unit.id;

        if let Some(projectile) = shot {
            self.projectiles.push(projectile);
        }
        self.effects.push(Effect::AbilityTriggered { id: unit_id, kind });
        CommandOutcome::Accepted
    }

    /// Spend energy to place a structure under construction.
    pub fn place_structure(
        &mut self,
        faction: FactionId,
        kind: StructureKind,
        position: Vec2,
    ) -> CommandOutcome {
        if kind == StructureKind::Nexus {
            return CommandOutcome::InvalidKind;
        }
        let cost = self.config.tuning.structure_cost;
        if !self.config.tuning.map_bounds.contains(position) {
            return CommandOutcome::InvalidPlacement;
        }
        if self.check_collision(position, kind.radius(), None) {
            return CommandOutcome::InvalidPlacement;
        }
        let pi = faction.index();
        if self.players[pi].energy < cost {
            return CommandOutcome::InsufficientEnergy;
        }
        self.players[pi].energy -= cost;
        let id = self.alloc_id();
        self.players[pi]
            .structures
            .push(Structure::new(id, kind, faction, position));
        CommandOutcome::Accepted
    }

    /// Spend energy to produce a hero beside the faction's nexus.
    pub fn produce_hero(&mut self, faction: FactionId, kind: UnitKind) -> CommandOutcome {
        if !kind.is_hero() {
            return CommandOutcome::InvalidKind;
        }
        let tuning = &self.config.tuning;
        let cost = tuning.hero_cost;
        let standoff = tuning.structure_standoff;
        let center = (tuning.map_bounds.min + tuning.map_bounds.max) * 0.5;

        let pi = faction.index();
        let Some((nexus_pos, nexus_radius)) = self.players[pi]
            .structures
            .iter()
            .find(|s| s.kind == StructureKind::Nexus && s.is_alive() && s.complete)
            .map(|s| (s.position, s.radius))
        else {
            return CommandOutcome::NoNexus;
        };
        if self.players[pi].energy < cost {
            return CommandOutcome::InsufficientEnergy;
        }

        self.players[pi].energy -= cost;
        let mut dir = normalize_or_zero(center - nexus_pos);
        if dir == Vec2::ZERO {
            dir = Vec2::X;
        }
        let stats = kind.stats();
        let spawn = nexus_pos + dir * (nexus_radius + stats.radius + standoff + 1.0);
        let id = self.alloc_id();
        self.players[pi]
            .units
            .push(Unit::new(id, kind, faction, spawn));
        self.effects.push(Effect::HeroProduced { id, faction });
        CommandOutcome::Accepted
    }

    fn find_unit_mut(&mut self, id: EntityId) -> Option<&mut Unit> {
        self.players
            .iter_mut()
            .flat_map(|p| p.units.iter_mut())
            .find(|u| u.id == id)
    }

    fn alloc_id(&mut self) -> EntityId {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        id
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Check whether a point lies in shadow.
    #[must_use]
    pub fn is_in_shadow(&self, point: Vec2) -> bool {
        is_in_shadow(point, &self.lights, &self.asteroids)
    }

    /// Check whether a point (optionally cloaked) is visible to a faction.
    #[must_use]
    pub fn is_visible_to_faction(&self, point: Vec2, faction: FactionId, cloaked: bool) -> bool {
        let player = &self.players[faction.index()];
        let friendly: Vec<Vec2> = player
            .units
            .iter()
            .filter(|u| u.is_alive())
            .map(|u| u.position)
            .collect();
        let nexus = player
            .structures
            .iter()
            .find(|s| s.kind == StructureKind::Nexus && s.is_alive())
            .map(|s| s.position);
        is_visible_to_faction(
            point,
            cloaked,
            &friendly,
            nexus,
            &self.lights,
            &self.asteroids,
            &self.config.tuning,
        )
    }

    /// Check whether a circle overlaps anything solid.
    ///
    /// Tests the sun, asteroids (bounding circles), living structures and
    /// living units; `ignore` excludes one entity id from the unit and
    /// structure tests.
    #[must_use]
    pub fn check_collision(&self, point: Vec2, radius: f32, ignore: Option<EntityId>) -> bool {
        for light in &self.lights {
            if point.distance(light.position) < light.radius + radius {
                return true;
            }
        }
        for asteroid in &self.asteroids {
            if point.distance(asteroid.position) < asteroid.bounding_radius() + radius {
                return true;
            }
        }
        for player in &self.players {
            for structure in &player.structures {
                if structure.is_alive()
                    && ignore != Some(structure.id)
                    && point.distance(structure.position) < structure.radius + radius
                {
                    return true;
                }
            }
            for unit in &player.units {
                if unit.is_alive()
                    && ignore != Some(unit.id)
                    && point.distance(unit.position) < unit.radius + radius
                {
                    return true;
                }
            }
        }
        false
    }

    // ------------------------------------------------------------------
    // Checksum and snapshots
    // ------------------------------------------------------------------

    /// Compute the deterministic state checksum.
    ///
    /// The traversal order is fixed and explicit; see the `checksum`
    /// module for the mixing rules.
    #[must_use]
    pub fn state_checksum(&self) -> u32 {
        let mut h = StateHasher::new();
        h.write_u64(self.tick);
        h.write_f32(self.elapsed);

        for player in &self.players {
            h.write_str(player.faction.short_name());
            h.write_f32(player.energy);

            h.write_u64(player.units.len() as u64);
            for unit in &player.units {
                h.write_u64(unit.id);
                h.write_str(unit.kind.tag());
                h.write_f32(unit.position.x);
                h.write_f32(unit.position.y);
                h.write_f32(unit.velocity.x);
                h.write_f32(unit.velocity.y);
                h.write_f32(unit.facing);
                h.write_f32(unit.health.current);
                h.write_f32(unit.attack_cooldown);
                h.write_f32(unit.ability_cooldown);
                // Entity id 0 is never assigned, so it encodes "no target"
                h.write_u64(unit.target.unwrap_or(0));
                h.write_bool(unit.rally_point.is_some());
                if let Some(rally) = unit.rally_point {
                    h.write_f32(rally.x);
                    h.write_f32(rally.y);
                }
                match unit.overdrive {
                    None => h.write_str("none"),
                    Some(Overdrive::Dash { direction, elapsed }) => {
                        h.write_str("dash");
                        h.write_f32(direction.x);
                        h.write_f32(direction.y);
                        h.write_f32(elapsed);
                    }
                    Some(Overdrive::Drill { direction, elapsed }) => {
                        h.write_str("drill");
                        h.write_f32(direction.x);
                        h.write_f32(direction.y);
                        h.write_f32(elapsed);
                    }
                }
            }

            h.write_u64(player.structures.len() as u64);
            for structure in &player.structures {
                h.write_u64(structure.id);
                h.write_str(structure.kind.tag());
                h.write_f32(structure.position.x);
                h.write_f32(structure.position.y);
                h.write_f32(structure.health.current);
                h.write_f32(structure.build_progress);
                h.write_bool(structure.complete);
                h.write_f32(structure.attack_cooldown);
                h.write_u64(structure.target.unwrap_or(0));
            }
        }

        h.write_u64(self.projectiles.len() as u64);
        for proj in &self.projectiles {
            h.write_f32(proj.position.x);
            h.write_f32(proj.position.y);
            h.write_f32(proj.velocity.x);
            h.write_f32(proj.velocity.y);
            h.write_f32(proj.remaining_range);
            h.write_f32(proj.damage);
            h.write_str(proj.owner_faction.short_name());
            h.write_u64(proj.owner);
        }

        h.write_u64(self.asteroids.len() as u64);
        for asteroid in &self.asteroids {
            h.write_f32(asteroid.position.x);
            h.write_f32(asteroid.position.y);
            h.write_f32(asteroid.rotation);
        }

        h.write_u64(self.particles.len() as u64);
        for particle in &self.particles {
            h.write_f32(particle.position.x);
            h.write_f32(particle.position.y);
            h.write_f32(particle.velocity.x);
            h.write_f32(particle.velocity.y);
        }

        h.finish()
    }

    /// Compare a remote checkpoint checksum against the local one.
    pub fn verify_remote_checksum(&self, remote_checksum: u32) -> Result<()> {
        if remote_checksum == self.last_checksum {
            Ok(())
        } else {
            Err(GameError::DesyncDetected {
                tick: self.tick,
                local_checksum: self.last_checksum,
                remote_checksum,
            })
        }
    }

    /// Serialize the full state to bytes.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| GameError::Serialization(e.to_string()))
    }

    /// Restore a simulation from serialized bytes.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(|e| GameError::Serialization(e.to_string()))
    }
}

fn spawn_asteroids(
    rng: &mut ChaCha8Rng,
    tuning: &Tuning,
    keep_clear: &[(Vec2, f32)],
) -> Vec<Asteroid> {
    let bounds = tuning.map_bounds;
    let mut asteroids: Vec<Asteroid> = Vec::with_capacity(ASTEROID_COUNT);

    for _ in 0..ASTEROID_COUNT {
        // Rejection-sample a position away from bases, sun and other
        // asteroids; fall back to the last candidate after a bounded
        // number of tries so generation always terminates.
        let mut position = Vec2::new(
            (bounds.min.x + bounds.max.x) * 0.5,
            bounds.min.y + 140.0,
        );
        for _ in 0..24 {
            let candidate = Vec2::new(
                rng.gen_range(bounds.min.x + 120.0..bounds.max.x - 120.0),
                rng.gen_range(bounds.min.y + 120.0..bounds.max.y - 120.0),
            );
            position = candidate;
            let clear = keep_clear.iter().all(|&(p, r)| candidate.distance(p) > r)
                && asteroids
                    .iter()
                    .all(|a| candidate.distance(a.position) > a.bounding_radius() * 2.5);
            if clear {
                break;
            }
        }

        let sides = rng.gen_range(5..=9);
        let base: f32 = rng.gen_range(40.0..80.0);
        let mut vertices = Vec::with_capacity(sides);
        for i in 0..sides {
            let angle = TAU * (i as f32) / (sides as f32);
            let radial = base * rng.gen_range(0.7..1.15);
            vertices.push(Vec2::new(angle.cos(), angle.sin()) * radial);
        }
        let rotation: f32 = rng.gen_range(0.0..TAU);
        let spin: f32 = rng.gen_range(-0.3..0.3);
        asteroids.push(Asteroid::new(position, rotation, spin, vertices));
    }

    asteroids
}

fn spawn_particles(rng: &mut ChaCha8Rng, tuning: &Tuning) -> Vec<Particle> {
    let bounds = tuning.map_bounds;
    (0..tuning.particle_count)
        .map(|_| Particle {
            position: Vec2::new(
                rng.gen_range(bounds.min.x..bounds.max.x),
                rng.gen_range(bounds.min.y..bounds.max.y),
            ),
            velocity: Vec2::ZERO,
            tint: rng.gen_range(0.0..1.0),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config(seed: u64) -> SimConfig {
        // Fewer particles keeps the tests fast without changing behavior
        SimConfig {
            seed,
            tuning: Tuning {
                particle_count: 200,
                ..Tuning::default()
            },
        }
    }

    fn first_unit_id(sim: &Simulation, faction: FactionId) -> EntityId {
        sim.player(faction).units[0].id
    }

    #[test]
    fn test_match_setup() {
        let sim = Simulation::new(small_config(7));
        assert_eq!(sim.tick(), 0);
        for faction in FactionId::ALL {
            let player = sim.player(faction);
            assert_eq!(player.units.len(), STARTING_MINIONS);
            assert!(player
                .structures
                .iter()
                .any(|s| s.kind == StructureKind::Nexus && s.complete));
        }
        assert_eq!(sim.particles().len(), 200);
        assert_eq!(sim.asteroids().len(), ASTEROID_COUNT);
        assert_eq!(sim.lights().len(), 1);
    }

    #[test]
    fn test_same_seed_same_world() {
        let a = Simulation::new(small_config(42));
        let b = Simulation::new(small_config(42));
        assert_eq!(a.state_checksum(), b.state_checksum());

        let c = Simulation::new(small_config(43));
        assert_ne!(a.state_checksum(), c.state_checksum());
    }

    #[test]
    fn test_tick_delta_is_clamped() {
        let mut sim = Simulation::new(small_config(1));
        sim.advance_tick(10.0);
        assert_eq!(sim.tick(), 1);
        let max = sim.config().tuning.max_tick_delta;
        assert!((sim.elapsed() - max).abs() < 1e-6);
    }

    #[test]
    fn test_determinism_over_many_ticks() {
        let mut a = Simulation::new(small_config(99));
        let mut b = Simulation::new(small_config(99));

        let unit_a = first_unit_id(&a, FactionId::Solar);
        let unit_b = first_unit_id(&b, FactionId::Solar);
        assert_eq!(unit_a, unit_b);

        let order = Command::SetRallyPoint {
            unit: unit_a,
            point: Vec2::new(900.0, 400.0),
        };
        assert!(a.apply_command(order).is_accepted());
        assert!(b.apply_command(order).is_accepted());

        for _ in 0..120 {
            a.advance_tick(1.0 / 30.0);
            b.advance_tick(1.0 / 30.0);
        }
        assert_eq!(a.state_checksum(), b.state_checksum());
        assert_eq!(a.last_checksum(), b.last_checksum());
        assert_ne!(a.last_checksum(), 0);
    }

    #[test]
    fn test_rally_command_moves_unit() {
        let mut sim = Simulation::new(small_config(5));
        let id = first_unit_id(&sim, FactionId::Solar);
        let start = sim.unit(id).unwrap().position;
        let target = start + Vec2::new(50.0, 0.0);

        assert!(sim
            .apply_command(Command::SetRallyPoint {
                unit: id,
                point: target
            })
            .is_accepted());

        for _ in 0..90 {
            sim.advance_tick(1.0 / 30.0);
        }
        let unit = sim.unit(id).unwrap();
        let threshold = sim.config().tuning.arrival_threshold;
        // Arrived near the target; crowd separation allows some slack
        assert!(unit.position.distance(target) <= threshold + 15.0);
    }

    #[test]
    fn test_unknown_entity_rejected() {
        let mut sim = Simulation::new(small_config(5));
        let outcome = sim.apply_command(Command::SetRallyPoint {
            unit: 9999,
            point: Vec2::ZERO,
        });
        assert_eq!(outcome, CommandOutcome::UnknownEntity);
    }

    #[test]
    fn test_minion_has_no_ability() {
        let mut sim = Simulation::new(small_config(5));
        let id = first_unit_id(&sim, FactionId::Solar);
        let outcome = sim.use_ability(id, Vec2::X);
        assert_eq!(outcome, CommandOutcome::InvalidKind);
    }

    #[test]
    fn test_dash_sets_overdrive_and_cooldown() {
        let mut sim = Simulation::new(small_config(5));
        assert!(sim.produce_hero(FactionId::Solar, UnitKind::Lancer).is_accepted());
        let hero_id = sim
            .player(FactionId::Solar)
            .units
            .iter()
            .find(|u| u.kind == UnitKind::Lancer)
            .unwrap()
            .id;

        assert!(sim.use_ability(hero_id, Vec2::new(0.0, 1.0)).is_accepted());
        let hero = sim.unit(hero_id).unwrap();
        assert!(matches!(hero.overdrive, Some(Overdrive::Dash { .. })));
        assert!(hero.ability_cooldown > 0.0);

        // Immediate retrigger is rejected
        assert_eq!(
            sim.use_ability(hero_id, Vec2::X),
            CommandOutcome::AbilityOnCooldown
        );

        // The dash ends on its own
        for _ in 0..30 {
            sim.advance_tick(1.0 / 30.0);
        }
        assert!(sim.unit(hero_id).unwrap().overdrive.is_none());
    }

    #[test]
    fn test_produce_hero_costs_energy() {
        let mut sim = Simulation::new(small_config(5));
        let before = sim.player(FactionId::Umbra).energy;
        assert!(sim.produce_hero(FactionId::Umbra, UnitKind::Warden).is_accepted());
        let after = sim.player(FactionId::Umbra).energy;
        assert!((before - after - sim.config().tuning.hero_cost).abs() < 1e-3);
        assert_eq!(sim.player(FactionId::Umbra).units.len(), STARTING_MINIONS + 1);

        // Minions are not produced this way
        assert_eq!(
            sim.produce_hero(FactionId::Umbra, UnitKind::Minion),
            CommandOutcome::InvalidKind
        );
    }

    #[test]
    fn test_produce_hero_requires_energy() {
        let mut sim = Simulation::new(small_config(5));
        assert!(sim.produce_hero(FactionId::Solar, UnitKind::Wraith).is_accepted());
        // Start energy covers exactly one hero at default costs
        assert_eq!(
            sim.produce_hero(FactionId::Solar, UnitKind::Wraith),
            CommandOutcome::InsufficientEnergy
        );
    }

    #[test]
    fn test_place_structure_legality() {
        let mut sim = Simulation::new(small_config(5));
        // On top of the enemy nexus: overlap
        let enemy_nexus = sim
            .player(FactionId::Umbra)
            .structures
            .iter()
            .find(|s| s.kind == StructureKind::Nexus)
            .unwrap()
            .position;
        assert_eq!(
            sim.place_structure(FactionId::Solar, StructureKind::Mirror, enemy_nexus),
            CommandOutcome::InvalidPlacement
        );
        // Outside the map
        assert_eq!(
            sim.place_structure(
                FactionId::Solar,
                StructureKind::Mirror,
                Vec2::new(-100.0, -100.0)
            ),
            CommandOutcome::InvalidPlacement
        );
        // Nexus cannot be built
        assert_eq!(
            sim.place_structure(FactionId::Solar, StructureKind::Nexus, Vec2::new(500.0, 200.0)),
            CommandOutcome::InvalidKind
        );
    }

    #[test]
    fn test_placed_structure_builds_up() {
        let mut sim = Simulation::new(small_config(5));
        let nexus = sim
            .player(FactionId::Solar)
            .structures
            .iter()
            .find(|s| s.kind == StructureKind::Nexus)
            .unwrap()
            .position;
        let spot = nexus + Vec2::new(0.0, 240.0);
        assert!(sim
            .place_structure(FactionId::Solar, StructureKind::Turret, spot)
            .is_accepted());

        let turret_id = sim
            .player(FactionId::Solar)
            .structures
            .iter()
            .find(|s| s.kind == StructureKind::Turret)
            .unwrap()
            .id;
        assert!(!sim.structure(turret_id).unwrap().complete);

        // build_rate 0.2/s -> complete after 5 simulated seconds
        let mut saw_completion = false;
        for _ in 0..160 {
            sim.advance_tick(1.0 / 30.0);
            saw_completion |= sim
                .take_effects()
                .iter()
                .any(|e| matches!(e, Effect::StructureCompleted { id, .. } if *id == turret_id));
        }
        assert!(sim.structure(turret_id).unwrap().complete);
        assert!(saw_completion);
    }

    #[test]
    fn test_dead_units_are_swept() {
        let mut sim = Simulation::new(small_config(5));
        let id = first_unit_id(&sim, FactionId::Solar);
        sim.find_unit_mut(id).unwrap().health.apply_damage(1000.0);

        sim.advance_tick(1.0 / 30.0);
        assert!(sim.unit(id).is_none());
        assert_eq!(
            sim.player(FactionId::Solar).units.len(),
            STARTING_MINIONS - 1
        );
        let effects = sim.take_effects();
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::UnitDied { id: dead, .. } if *dead == id)));
    }

    #[test]
    fn test_take_effects_drains() {
        let mut sim = Simulation::new(small_config(5));
        let id = first_unit_id(&sim, FactionId::Solar);
        sim.find_unit_mut(id).unwrap().health.apply_damage(1000.0);
        sim.advance_tick(1.0 / 30.0);

        assert!(!sim.take_effects().is_empty());
        assert!(sim.take_effects().is_empty());
    }

    #[test]
    fn test_undrained_effects_do_not_accumulate() {
        let mut sim = Simulation::new(small_config(5));
        let id = first_unit_id(&sim, FactionId::Solar);
        sim.find_unit_mut(id).unwrap().health.apply_damage(1000.0);

        // Never drain; quiet ticks after the death must flush its event
        for _ in 0..10 {
            sim.advance_tick(1.0 / 30.0);
        }
        let effects = sim.take_effects();
        assert!(
            !effects
                .iter()
                .any(|e| matches!(e, Effect::UnitDied { .. })),
            "stale effects must not survive later ticks"
        );
    }

    #[test]
    fn test_snapshot_roundtrip_preserves_state() {
        let mut sim = Simulation::new(small_config(31));
        for _ in 0..45 {
            sim.advance_tick(1.0 / 30.0);
        }
        let bytes = sim.serialize().unwrap();
        let mut restored = Simulation::deserialize(&bytes).unwrap();
        assert_eq!(sim.state_checksum(), restored.state_checksum());

        // And the two keep agreeing after further ticks
        for _ in 0..45 {
            sim.advance_tick(1.0 / 30.0);
            restored.advance_tick(1.0 / 30.0);
        }
        assert_eq!(sim.state_checksum(), restored.state_checksum());
    }

    #[test]
    fn test_checksum_covers_mutable_fields() {
        // Each single-field divergence must flip the digest, or a peer
        // desync confined to that field would pass checkpoints.
        let base = Simulation::new(small_config(77));
        let reference = base.state_checksum();

        let mut diverged = base.clone();
        diverged.players[0].units[0].attack_cooldown = 42.0;
        assert_ne!(diverged.state_checksum(), reference);

        let mut diverged = base.clone();
        diverged.players[0].units[0].rally_point = Some(Vec2::new(500.0, 500.0));
        assert_ne!(diverged.state_checksum(), reference);

        let mut diverged = base.clone();
        diverged.players[0].units[0].overdrive = Some(Overdrive::Dash {
            direction: Vec2::X,
            elapsed: 0.1,
        });
        assert_ne!(diverged.state_checksum(), reference);

        let mut diverged = base.clone();
        diverged.players[0].units[0].target = Some(7);
        assert_ne!(diverged.state_checksum(), reference);

        let mut diverged = base.clone();
        diverged.players[1].structures[0].attack_cooldown = 0.5;
        assert_ne!(diverged.state_checksum(), reference);

        let mut diverged = base.clone();
        diverged.asteroids[0].rotation += 1.0;
        assert_ne!(diverged.state_checksum(), reference);

        let mut diverged = base.clone();
        diverged.particles[0].velocity = Vec2::new(9.0, 0.0);
        assert_ne!(diverged.state_checksum(), reference);

        let proj = Projectile {
            position: Vec2::new(10.0, 10.0),
            velocity: Vec2::X,
            remaining_range: 50.0,
            damage: 5.0,
            owner_faction: FactionId::Solar,
            owner: 1,
        };
        let mut a = base.clone();
        a.projectiles.push(proj);
        let mut b = base.clone();
        b.projectiles.push(Projectile { damage: 9.0, ..proj });
        assert_ne!(a.state_checksum(), b.state_checksum());
    }

    #[test]
    fn test_verify_remote_checksum() {
        let mut sim = Simulation::new(small_config(5));
        for _ in 0..30 {
            sim.advance_tick(1.0 / 30.0);
        }
        let local = sim.last_checksum();
        assert!(sim.verify_remote_checksum(local).is_ok());
        let err = sim.verify_remote_checksum(local.wrapping_add(1)).unwrap_err();
        assert!(matches!(err, GameError::DesyncDetected { .. }));
    }

    #[test]
    fn test_units_stay_out_of_structures() {
        let mut sim = Simulation::new(small_config(5));
        let id = first_unit_id(&sim, FactionId::Solar);
        let nexus = sim
            .player(FactionId::Solar)
            .structures
            .iter()
            .find(|s| s.kind == StructureKind::Nexus)
            .unwrap()
            .position;

        // Order the unit straight into its own nexus
        sim.apply_command(Command::SetRallyPoint {
            unit: id,
            point: nexus,
        });
        for _ in 0..120 {
            sim.advance_tick(1.0 / 30.0);
        }
        let unit = sim.unit(id).unwrap();
        let min_dist = StructureKind::Nexus.radius() + unit.radius
            + sim.config().tuning.structure_standoff;
        assert!(unit.position.distance(nexus) >= min_dist - 1e-3);
    }
}
