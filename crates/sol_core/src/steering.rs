//! Unit steering and avoidance.
//!
//! A seeking unit blends four influences into a single heading each tick:
//! the seek direction toward its rally point, separation from nearby
//! units, look-ahead avoidance of static obstacles, and structure
//! standoff. The blend is normalized before use and falls back to the
//! pure seek direction when the influences cancel out.
//!
//! Units with an active ability override ([`Overdrive`]) are not steered
//! at all; the orchestrator skips this module for them.
//!
//! [`Overdrive`]: crate::entities::Overdrive

use glam::Vec2;

use crate::config::Tuning;
use crate::entities::{EntityId, Unit};
use crate::math::{normalize_or_zero, rotate_towards};

/// Position snapshot of another live unit, taken before the movement pass
/// so steering reads a consistent view of the crowd.
#[derive(Debug, Clone, Copy)]
pub struct NeighborInfo {
    /// Unit id (used only to skip the self pair).
    pub id: EntityId,
    /// World position.
    pub position: Vec2,
    /// Hero units yield less and are yielded to more.
    pub is_hero: bool,
}

/// Circle approximation of a static obstacle (sun, asteroid bounding
/// circle, structure footprint plus standoff).
#[derive(Debug, Clone, Copy)]
pub struct ObstacleCircle {
    /// Center position.
    pub center: Vec2,
    /// Effective radius a unit's center must stay outside of.
    pub radius: f32,
}

/// Outcome of a steering step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SteerOutcome {
    /// No rally point; velocity is decaying.
    Idle,
    /// Moving toward the rally point.
    Seeking,
    /// Arrived this tick; the rally point was cleared.
    Arrived,
}

/// Advance one unit by one tick of steering.
///
/// Position is advanced along the blended heading, facing is rotated at a
/// capped rate, and the final position is hard-clamped to the map bounds.
pub fn steer_unit(
    unit: &mut Unit,
    neighbors: &[NeighborInfo],
    obstacles: &[ObstacleCircle],
    tuning: &Tuning,
    dt: f32,
) -> SteerOutcome {
    let Some(rally) = unit.rally_point else {
        // Idle: velocity decays toward zero, position coasts out.
        let decay = (tuning.idle_decay * dt).min(1.0);
        unit.velocity *= 1.0 - decay;
        unit.position = tuning.map_bounds.clamp(unit.position + unit.velocity * dt);
        return SteerOutcome::Idle;
    };

    let to_rally = rally - unit.position;
    if to_rally.length() <= tuning.arrival_threshold {
        unit.rally_point = None;
        unit.velocity = Vec2::ZERO;
        return SteerOutcome::Arrived;
    }

    let seek = normalize_or_zero(to_rally);
    let avoid_units = unit_separation(unit, neighbors, tuning);
    let avoid_obstacles = obstacle_avoidance(unit, seek, obstacles, tuning);

    let blended = seek
        + avoid_units * tuning.unit_avoid_strength
        + avoid_obstacles * tuning.obstacle_avoid_strength;
    let mut direction = normalize_or_zero(blended);
    if direction == Vec2::ZERO {
        // Influences cancelled out exactly; fall back to pure seek.
        direction = seek;
    }

    let target_facing = direction.y.atan2(direction.x);
    unit.facing = rotate_towards(unit.facing, target_facing, tuning.turn_rate * dt);

    let speed = unit.kind.stats().move_speed;
    unit.velocity = direction * speed;
    unit.position = tuning.map_bounds.clamp(unit.position + unit.velocity * dt);

    SteerOutcome::Seeking
}

/// Separation from nearby live units, weighted by `(range - d) / range`
/// and by the hero/minion asymmetry: a minion yields more strongly to a
/// hero, a hero barely registers minions.
fn unit_separation(unit: &Unit, neighbors: &[NeighborInfo], tuning: &Tuning) -> Vec2 {
    let range = tuning.unit_avoid_range;
    let mut accum = Vec2::ZERO;

    for other in neighbors {
        if other.id == unit.id {
            continue;
        }
        let offset = unit.position - other.position;
        let dist = offset.length();
        if dist == 0.0 || dist >= range {
            continue;
        }

        let weight = (range - dist) / range;
        let asymmetry = if other.is_hero && !unit.kind.is_hero() {
            tuning.minion_yield_factor
        } else if unit.kind.is_hero() && !other.is_hero {
            tuning.hero_yield_factor
        } else {
            1.0
        };
        accum += (offset / dist) * (weight * asymmetry);
    }

    accum
}

/// Look-ahead obstacle avoidance plus an overlap push-out term.
///
/// An obstacle ahead of the unit within the look-ahead distance and inside
/// the radius-plus-buffer corridor contributes a steer perpendicular to
/// the forward direction, away from the side the obstacle is biased
/// toward (sign of the forward x offset cross product). Obstacles the
/// unit is already overlapping also push straight out regardless of
/// facing.
fn obstacle_avoidance(
    unit: &Unit,
    forward: Vec2,
    obstacles: &[ObstacleCircle],
    tuning: &Tuning,
) -> Vec2 {
    let mut accum = Vec2::ZERO;

    for obstacle in obstacles {
        let offset = obstacle.center - unit.position;
        let ahead = offset.dot(forward);
        let corridor = obstacle.radius + unit.radius + tuning.look_ahead_buffer;

        if ahead > 0.0 && ahead < tuning.look_ahead_distance {
            // forward is unit length, so the cross product magnitude is
            // the obstacle's lateral distance from the travel line.
            let lateral = forward.x * offset.y - forward.y * offset.x;
            if lateral.abs() < corridor {
                let falloff = 1.0 - ahead / tuning.look_ahead_distance;
                // Steer to the side opposite the obstacle's bias. A dead-
                // center obstacle (lateral == 0) breaks right.
                let side = if lateral > 0.0 { -1.0 } else { 1.0 };
                accum += Vec2::new(-forward.y, forward.x) * (side * falloff);
            }
        }

        // Overlap push-out independent of facing.
        let dist = offset.length();
        let min_dist = obstacle.radius + unit.radius;
        if dist > 0.0 && dist < min_dist {
            accum += (-offset / dist) * (1.0 - dist / min_dist);
        }
    }

    accum
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::UnitKind;
    use crate::factions::FactionId;

    fn test_unit(kind: UnitKind, pos: Vec2) -> Unit {
        Unit::new(1, kind, FactionId::Solar, pos)
    }

    #[test]
    fn test_seek_straight_line_scenario() {
        // Unit at origin seeking (100, 0) with no obstacles moves straight
        // along +x by speed * dt and ends up facing +x.
        let mut unit = test_unit(UnitKind::Minion, Vec2::ZERO);
        let speed = unit.kind.stats().move_speed;
        unit.rally_point = Some(Vec2::new(100.0, 0.0));

        let tuning = Tuning::default();
        let outcome = steer_unit(&mut unit, &[], &[], &tuning, 0.5);

        assert_eq!(outcome, SteerOutcome::Seeking);
        assert!((unit.position.x - speed * 0.5).abs() < 1e-3);
        assert!(unit.position.y.abs() < 1e-3);
        assert!(unit.facing.abs() < 1e-3, "should face +x");
    }

    #[test]
    fn test_arrival_clears_rally_and_velocity() {
        let tuning = Tuning::default();
        let mut unit = test_unit(UnitKind::Minion, Vec2::new(99.0, 0.0));
        unit.rally_point = Some(Vec2::new(100.0, 0.0));

        let outcome = steer_unit(&mut unit, &[], &[], &tuning, 0.1);
        assert_eq!(outcome, SteerOutcome::Arrived);
        assert!(unit.rally_point.is_none());
        assert_eq!(unit.velocity, Vec2::ZERO);
    }

    #[test]
    fn test_idle_velocity_decays() {
        let tuning = Tuning::default();
        let mut unit = test_unit(UnitKind::Minion, Vec2::new(100.0, 100.0));
        unit.velocity = Vec2::new(50.0, 0.0);

        let outcome = steer_unit(&mut unit, &[], &[], &tuning, 0.1);
        assert_eq!(outcome, SteerOutcome::Idle);
        assert!(unit.velocity.x < 50.0);
        assert!(unit.velocity.x > 0.0);
    }

    #[test]
    fn test_minion_yields_to_hero_more_than_hero_to_minion() {
        let tuning = Tuning::default();
        let neighbor_hero = NeighborInfo {
            id: 2,
            position: Vec2::new(20.0, 0.0),
            is_hero: true,
        };
        let neighbor_minion = NeighborInfo {
            id: 2,
            position: Vec2::new(20.0, 0.0),
            is_hero: false,
        };

        let minion = test_unit(UnitKind::Minion, Vec2::ZERO);
        let hero = test_unit(UnitKind::Lancer, Vec2::ZERO);

        let minion_push = unit_separation(&minion, &[neighbor_hero], &tuning).length();
        let hero_push = unit_separation(&hero, &[neighbor_minion], &tuning).length();
        assert!(minion_push > hero_push);
    }

    #[test]
    fn test_separation_skips_self() {
        let tuning = Tuning::default();
        let unit = test_unit(UnitKind::Minion, Vec2::ZERO);
        let own_entry = NeighborInfo {
            id: unit.id,
            position: unit.position,
            is_hero: false,
        };
        assert_eq!(unit_separation(&unit, &[own_entry], &tuning), Vec2::ZERO);
    }

    #[test]
    fn test_obstacle_ahead_steers_perpendicular() {
        let tuning = Tuning::default();
        let unit = test_unit(UnitKind::Minion, Vec2::ZERO);
        // Obstacle slightly left of the +x travel line
        let obstacle = ObstacleCircle {
            center: Vec2::new(60.0, 5.0),
            radius: 20.0,
        };
        let avoid = obstacle_avoidance(&unit, Vec2::X, &[obstacle], &tuning);
        // Biased left -> steer right (negative y)
        assert!(avoid.y < 0.0);
    }

    #[test]
    fn test_obstacle_behind_is_ignored() {
        let tuning = Tuning::default();
        let unit = test_unit(UnitKind::Minion, Vec2::ZERO);
        let obstacle = ObstacleCircle {
            center: Vec2::new(-60.0, 0.0),
            radius: 20.0,
        };
        let avoid = obstacle_avoidance(&unit, Vec2::X, &[obstacle], &tuning);
        assert_eq!(avoid, Vec2::ZERO);
    }

    #[test]
    fn test_overlap_pushes_out_regardless_of_facing() {
        let tuning = Tuning::default();
        let unit = test_unit(UnitKind::Minion, Vec2::ZERO);
        // Unit is inside the obstacle behind it
        let obstacle = ObstacleCircle {
            center: Vec2::new(-5.0, 0.0),
            radius: 20.0,
        };
        let avoid = obstacle_avoidance(&unit, Vec2::X, &[obstacle], &tuning);
        assert!(avoid.x > 0.0);
    }

    #[test]
    fn test_position_clamped_to_map_bounds() {
        let tuning = Tuning::default();
        let mut unit = test_unit(UnitKind::Minion, Vec2::new(1.0, 1.0));
        unit.rally_point = Some(Vec2::new(-500.0, -500.0));

        for _ in 0..50 {
            steer_unit(&mut unit, &[], &[], &tuning, 0.1);
        }
        assert!(tuning.map_bounds.contains(unit.position));
    }

    #[test]
    fn test_facing_turn_rate_is_capped() {
        let tuning = Tuning::default();
        let mut unit = test_unit(UnitKind::Minion, Vec2::ZERO);
        unit.facing = 0.0;
        unit.rally_point = Some(Vec2::new(0.0, 100.0)); // target facing PI/2

        let dt = 0.01;
        steer_unit(&mut unit, &[], &[], &tuning, dt);
        assert!((unit.facing - tuning.turn_rate * dt).abs() < 1e-4);
    }
}
