//! Post-movement collision resolution.
//!
//! Two independent passes run once per tick after every entity has moved:
//! unit-unit penetration resolution, then unit-obstacle push-out with a
//! revert fallback. A final standoff clamp keeps units outside structure
//! envelopes unconditionally so a unit never rests inside a building, not
//! even for one tick. All three are position corrections, not forces.

use glam::Vec2;

use crate::config::Tuning;
use crate::entities::Unit;
use crate::math::normalize_or_zero;
use crate::steering::ObstacleCircle;

/// Resolve pairwise unit overlaps by pushing along the separation normal.
///
/// Penetration is split by class: a hero pushes a non-hero fully, a
/// non-hero does not move a hero at all, and same-class pairs split the
/// correction 50/50. Exactly coincident pairs separate along a
/// deterministic axis that alternates by pair index, so the displacement
/// is never undefined.
pub fn resolve_unit_overlaps(units: &mut [&mut Unit]) {
    for i in 0..units.len() {
        for j in (i + 1)..units.len() {
            if !units[i].is_alive() || !units[j].is_alive() {
                continue;
            }

            let offset = units[j].position - units[i].position;
            let min_dist = units[i].radius + units[j].radius;
            let dist_sq = offset.length_squared();
            if dist_sq >= min_dist * min_dist {
                continue;
            }

            let (normal, penetration) = if dist_sq == 0.0 {
                // Coincident centers: alternate the fallback axis so
                // stacked pairs fan out instead of oscillating.
                let axis = if (i + j) % 2 == 0 { Vec2::X } else { -Vec2::X };
                (axis, min_dist)
            } else {
                let dist = dist_sq.sqrt();
                (offset / dist, min_dist - dist)
            };

            let (weight_i, weight_j) = match (units[i].kind.is_hero(), units[j].kind.is_hero()) {
                (true, false) => (0.0, 1.0),
                (false, true) => (1.0, 0.0),
                _ => (0.5, 0.5),
            };

            units[i].position -= normal * (penetration * weight_i);
            units[j].position += normal * (penetration * weight_j);
        }
    }
}

/// Push units out of static obstacles, reverting the move when the capped
/// nudge cannot escape.
///
/// For each penetrating unit the push vectors from *every* overlapping
/// source are combined, normalized, and applied as a single nudge whose
/// length is capped at `tuning.max_push_out`. If the unit is still
/// penetrating afterwards and its pre-move position was clear, the whole
/// move is reverted to `pre_positions` and an active rally point is
/// cleared - the terminal "unreachable" outcome, not an error. A unit
/// whose pre-move position already penetrates (a drill that ended inside
/// an asteroid) keeps the capped nudge and escapes over several ticks.
///
/// `pre_positions` holds each unit's position from before this tick's
/// movement, aligned by index with `units`.
pub fn resolve_obstacle_overlaps(
    units: &mut [&mut Unit],
    pre_positions: &[Vec2],
    obstacles: &[ObstacleCircle],
    tuning: &Tuning,
) {
    debug_assert_eq!(units.len(), pre_positions.len());

    for (unit, &pre_position) in units.iter_mut().zip(pre_positions) {
        if !unit.is_alive() {
            continue;
        }

        let push = combined_push(unit.position, unit.radius, obstacles);
        if push == Vec2::ZERO {
            continue;
        }

        let magnitude = push.length().min(tuning.max_push_out);
        unit.position += normalize_or_zero(push) * magnitude;

        if penetrates_any(unit.position, unit.radius, obstacles)
            && !penetrates_any(pre_position, unit.radius, obstacles)
        {
            unit.position = pre_position;
            unit.rally_point = None;
        }
    }
}

/// Clamp units out of structure envelopes.
///
/// Runs unconditionally every tick, after steering and the push-out pass:
/// any unit inside a structure's radius-plus-standoff envelope is moved
/// directly outward along its existing offset vector. A no-op for units
/// already outside.
pub fn clamp_structure_standoff(
    units: &mut [&mut Unit],
    structures: &[ObstacleCircle],
    tuning: &Tuning,
) {
    for unit in units.iter_mut() {
        if !unit.is_alive() {
            continue;
        }
        for structure in structures {
            let envelope = structure.radius + unit.radius + tuning.structure_standoff;
            let offset = unit.position - structure.center;
            let dist = offset.length();
            if dist >= envelope {
                continue;
            }
            if dist == 0.0 {
                // Dead center: any outward direction works as long as it
                // is the same one every run.
                unit.position = structure.center + Vec2::X * envelope;
            } else {
                unit.position = structure.center + (offset / dist) * envelope;
            }
        }
    }
}

/// Sum of penetration-scaled push vectors from every overlapping obstacle.
fn combined_push(position: Vec2, radius: f32, obstacles: &[ObstacleCircle]) -> Vec2 {
    let mut push = Vec2::ZERO;
    for obstacle in obstacles {
        let offset = position - obstacle.center;
        let min_dist = obstacle.radius + radius;
        let dist = offset.length();
        if dist >= min_dist {
            continue;
        }
        if dist == 0.0 {
            push += Vec2::X * min_dist;
        } else {
            push += (offset / dist) * (min_dist - dist);
        }
    }
    push
}

/// Check whether a circle at `position` still penetrates any obstacle.
fn penetrates_any(position: Vec2, radius: f32, obstacles: &[ObstacleCircle]) -> bool {
    obstacles.iter().any(|o| {
        let min_dist = o.radius + radius;
        position.distance_squared(o.center) < min_dist * min_dist
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::UnitKind;
    use crate::factions::FactionId;

    fn unit_at(id: u64, kind: UnitKind, pos: Vec2) -> Unit {
        Unit::new(id, kind, FactionId::Solar, pos)
    }

    #[test]
    fn test_symmetric_pair_splits_correction() {
        // Two radius-10 minions at (0,0) and (5,0) must separate to >= 20
        let mut a = unit_at(1, UnitKind::Minion, Vec2::ZERO);
        let mut b = unit_at(2, UnitKind::Minion, Vec2::new(5.0, 0.0));
        {
            let mut units = [&mut a, &mut b];
            resolve_unit_overlaps(&mut units);
        }

        let dist = a.position.distance(b.position);
        assert!(dist >= 20.0 - 1e-3);
        // Symmetric push: both moved the same amount
        assert!((a.position.x + b.position.x - 5.0).abs() < 1e-3);
    }

    #[test]
    fn test_hero_pushes_minion_only() {
        let mut hero = unit_at(1, UnitKind::Lancer, Vec2::ZERO);
        let mut minion = unit_at(2, UnitKind::Minion, Vec2::new(5.0, 0.0));
        let hero_before = hero.position;
        {
            let mut units = [&mut hero, &mut minion];
            resolve_unit_overlaps(&mut units);
        }

        assert_eq!(hero.position, hero_before, "hero must not move");
        let dist = hero.position.distance(minion.position);
        assert!(dist >= hero.radius + minion.radius - 1e-3);
    }

    #[test]
    fn test_coincident_pair_gets_deterministic_axis() {
        let mut a = unit_at(1, UnitKind::Minion, Vec2::new(50.0, 50.0));
        let mut b = unit_at(2, UnitKind::Minion, Vec2::new(50.0, 50.0));
        {
            let mut units = [&mut a, &mut b];
            resolve_unit_overlaps(&mut units);
        }
        assert!(a.position != b.position);
        assert!(a.position.distance(b.position) >= 20.0 - 1e-3);
        // Fallback axis is x-aligned
        assert!((a.position.y - 50.0).abs() < 1e-6);
        assert!((b.position.y - 50.0).abs() < 1e-6);
    }

    #[test]
    fn test_dead_units_are_skipped() {
        let mut a = unit_at(1, UnitKind::Minion, Vec2::ZERO);
        let mut b = unit_at(2, UnitKind::Minion, Vec2::new(5.0, 0.0));
        b.health.apply_damage(1000.0);
        let before = (a.position, b.position);
        {
            let mut units = [&mut a, &mut b];
            resolve_unit_overlaps(&mut units);
        }
        assert_eq!((a.position, b.position), before);
    }

    #[test]
    fn test_shallow_obstacle_overlap_is_nudged_out() {
        let tuning = Tuning::default();
        let obstacle = ObstacleCircle {
            center: Vec2::new(100.0, 100.0),
            radius: 30.0,
        };
        let mut unit = unit_at(1, UnitKind::Minion, Vec2::new(100.0 + 36.0, 100.0));
        // radius 10 -> min distance 40, currently at 36: shallow overlap
        let pre = Vec2::new(100.0 + 45.0, 100.0);
        {
            let mut units = [&mut unit];
            resolve_obstacle_overlaps(&mut units, &[pre], &[obstacle], &tuning);
        }
        let dist = unit.position.distance(obstacle.center);
        assert!(dist >= 40.0 - 1e-3);
        assert_ne!(unit.position, pre, "shallow overlap must not revert");
    }

    #[test]
    fn test_deep_penetration_reverts_and_clears_rally() {
        let tuning = Tuning::default();
        let obstacle = ObstacleCircle {
            center: Vec2::new(100.0, 100.0),
            radius: 60.0,
        };
        // Deep inside: max_push_out cannot escape a 60+10 envelope from
        // 5 units off center.
        let mut unit = unit_at(1, UnitKind::Minion, Vec2::new(105.0, 100.0));
        unit.rally_point = Some(Vec2::new(100.0, 100.0));
        let pre = Vec2::new(200.0, 100.0);
        {
            let mut units = [&mut unit];
            resolve_obstacle_overlaps(&mut units, &[pre], &[obstacle], &tuning);
        }
        assert_eq!(unit.position, pre, "unrecoverable move must revert");
        assert!(unit.rally_point.is_none(), "rally into obstacle is cleared");
    }

    #[test]
    fn test_unit_starting_inside_obstacle_escapes_incrementally() {
        // A drill can end with the unit deep inside an asteroid; the
        // pre-move position penetrates too, so the revert path must not
        // trap it there.
        let tuning = Tuning::default();
        let obstacle = ObstacleCircle {
            center: Vec2::new(100.0, 100.0),
            radius: 60.0,
        };
        let mut unit = unit_at(1, UnitKind::Borer, Vec2::new(105.0, 100.0));
        let envelope = obstacle.radius + unit.radius;

        for _ in 0..20 {
            let pre = unit.position;
            let mut units = [&mut unit];
            resolve_obstacle_overlaps(&mut units, &[pre], &[obstacle], &tuning);
        }
        let dist = unit.position.distance(obstacle.center);
        assert!(
            dist >= envelope - 1e-3,
            "unit must escape within 20 nudges, got dist {dist}"
        );
    }

    #[test]
    fn test_push_combines_all_overlapping_sources() {
        // Two obstacles flanking above/below; combined push is along +x
        // because the y components cancel.
        let obstacles = [
            ObstacleCircle {
                center: Vec2::new(0.0, 15.0),
                radius: 20.0,
            },
            ObstacleCircle {
                center: Vec2::new(0.0, -15.0),
                radius: 20.0,
            },
        ];
        let push = combined_push(Vec2::new(5.0, 0.0), 10.0, &obstacles);
        assert!(push.x > 0.0);
        assert!(push.y.abs() < 1e-4);
    }

    #[test]
    fn test_standoff_clamp_pushes_outward() {
        let tuning = Tuning::default();
        let structure = ObstacleCircle {
            center: Vec2::new(300.0, 300.0),
            radius: 48.0,
        };
        let mut unit = unit_at(1, UnitKind::Minion, Vec2::new(310.0, 300.0));
        {
            let mut units = [&mut unit];
            clamp_structure_standoff(&mut units, &[structure], &tuning);
        }
        let expected = structure.radius + unit.radius + tuning.structure_standoff;
        let dist = unit.position.distance(structure.center);
        assert!((dist - expected).abs() < 1e-3);
        // Pushed along the existing offset vector (+x here)
        assert!((unit.position.y - 300.0).abs() < 1e-4);
    }

    #[test]
    fn test_standoff_clamp_noop_outside_envelope() {
        let tuning = Tuning::default();
        let structure = ObstacleCircle {
            center: Vec2::new(300.0, 300.0),
            radius: 48.0,
        };
        let start = Vec2::new(500.0, 300.0);
        let mut unit = unit_at(1, UnitKind::Minion, start);
        {
            let mut units = [&mut unit];
            clamp_structure_standoff(&mut units, &[structure], &tuning);
        }
        assert_eq!(unit.position, start);
    }
}
