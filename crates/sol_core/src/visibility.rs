//! Shadow and per-faction visibility.
//!
//! The map is lit by point lights whose rays asteroids occlude. A point
//! that no light reaches is in shadow, and shadowed points are invisible
//! to a faction unless one of its own units or its nexus is close enough
//! to reveal them. Cloak beats everything.

use glam::Vec2;

use crate::config::Tuning;
use crate::entities::{Asteroid, LightSource};
use crate::math::{point_in_polygon, ray_polygon_intersection, segment_point_distance};
use crate::steering::ObstacleCircle;

/// Check whether a point lies in shadow.
///
/// A point is lit when at least one light has an unobstructed ray to it.
/// With zero lights everything is in shadow. Points inside an asteroid
/// count as shadowed.
#[must_use]
pub fn is_in_shadow(point: Vec2, lights: &[LightSource], asteroids: &[Asteroid]) -> bool {
    if asteroids.iter().any(|a| {
        point.distance_squared(a.position) <= a.bounding_radius() * a.bounding_radius()
            && point_in_polygon(point, a.world_vertices())
    }) {
        return true;
    }

    lights
        .iter()
        .all(|light| ray_blocked(point, light.position, asteroids))
}

/// Check whether the open segment between two points crosses an asteroid.
fn ray_blocked(from: Vec2, to: Vec2, asteroids: &[Asteroid]) -> bool {
    let offset = to - from;
    let dist = offset.length();
    if dist == 0.0 {
        return false;
    }
    let dir = offset / dist;

    asteroids.iter().any(|asteroid| {
        // Bounding-circle reject before the per-edge tests.
        if segment_point_distance(from, to, asteroid.position) > asteroid.bounding_radius() {
            return false;
        }
        matches!(
            ray_polygon_intersection(from, dir, asteroid.world_vertices()),
            Some(t) if t < dist
        )
    })
}

/// Line-of-sight test between two points.
///
/// Blocked by asteroid polygon edges and by circular blockers (structure
/// footprints, the sun). Callers exclude the endpoints' own footprints
/// from `blockers`.
#[must_use]
pub fn line_of_sight(
    from: Vec2,
    to: Vec2,
    asteroids: &[Asteroid],
    blockers: &[ObstacleCircle],
) -> bool {
    if ray_blocked(from, to, asteroids) {
        return false;
    }
    !blockers
        .iter()
        .any(|b| segment_point_distance(from, to, b.center) < b.radius)
}

/// Check whether a point is visible to a faction.
///
/// Resolution order: cloak hides unconditionally; a lit point is visible
/// to everyone; a shadowed point is revealed by a living friendly unit
/// within the proximity-reveal range or by the faction's nexus within its
/// influence radius.
#[must_use]
pub fn is_visible_to_faction(
    point: Vec2,
    cloaked: bool,
    friendly_units: &[Vec2],
    nexus: Option<Vec2>,
    lights: &[LightSource],
    asteroids: &[Asteroid],
    tuning: &Tuning,
) -> bool {
    if cloaked {
        return false;
    }
    if !is_in_shadow(point, lights, asteroids) {
        return true;
    }

    let reveal_sq = tuning.proximity_reveal_range * tuning.proximity_reveal_range;
    if friendly_units
        .iter()
        .any(|&p| p.distance_squared(point) <= reveal_sq)
    {
        return true;
    }

    let influence_sq = tuning.nexus_influence_radius * tuning.nexus_influence_radius;
    nexus.map_or(false, |p| p.distance_squared(point) <= influence_sq)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_asteroid(center: Vec2, half: f32) -> Asteroid {
        Asteroid::new(
            center,
            0.0,
            0.0,
            vec![
                Vec2::new(-half, -half),
                Vec2::new(half, -half),
                Vec2::new(half, half),
                Vec2::new(-half, half),
            ],
        )
    }

    fn light_at(x: f32, y: f32) -> LightSource {
        LightSource {
            position: Vec2::new(x, y),
            radius: 40.0,
        }
    }

    #[test]
    fn test_no_lights_means_shadow() {
        assert!(is_in_shadow(Vec2::new(100.0, 100.0), &[], &[]));
    }

    #[test]
    fn test_unobstructed_light_means_lit() {
        let lights = [light_at(500.0, 500.0)];
        assert!(!is_in_shadow(Vec2::new(100.0, 100.0), &lights, &[]));
    }

    #[test]
    fn test_asteroid_casts_shadow() {
        let lights = [light_at(500.0, 100.0)];
        // Square asteroid sits between the light and the point
        let asteroids = [square_asteroid(Vec2::new(300.0, 100.0), 50.0)];
        assert!(is_in_shadow(Vec2::new(100.0, 100.0), &lights, &asteroids));
        // A point on the lit side of the asteroid stays lit
        assert!(!is_in_shadow(Vec2::new(400.0, 100.0), &lights, &asteroids));
    }

    #[test]
    fn test_point_inside_asteroid_is_shadowed() {
        let lights = [light_at(500.0, 100.0)];
        let asteroids = [square_asteroid(Vec2::new(300.0, 100.0), 50.0)];
        assert!(is_in_shadow(Vec2::new(300.0, 100.0), &lights, &asteroids));
    }

    #[test]
    fn test_second_light_beats_occlusion() {
        let lights = [light_at(500.0, 100.0), light_at(100.0, 500.0)];
        let asteroids = [square_asteroid(Vec2::new(300.0, 100.0), 50.0)];
        // Blocked toward the first light, clear toward the second
        assert!(!is_in_shadow(Vec2::new(100.0, 100.0), &lights, &asteroids));
    }

    #[test]
    fn test_line_of_sight_blocked_by_circle() {
        let blocker = ObstacleCircle {
            center: Vec2::new(50.0, 0.0),
            radius: 10.0,
        };
        assert!(!line_of_sight(
            Vec2::ZERO,
            Vec2::new(100.0, 0.0),
            &[],
            &[blocker]
        ));
        // Passing wide of the blocker is clear
        assert!(line_of_sight(
            Vec2::new(0.0, 30.0),
            Vec2::new(100.0, 30.0),
            &[],
            &[blocker]
        ));
    }

    #[test]
    fn test_line_of_sight_blocked_by_asteroid() {
        let asteroids = [square_asteroid(Vec2::new(50.0, 0.0), 20.0)];
        assert!(!line_of_sight(
            Vec2::ZERO,
            Vec2::new(100.0, 0.0),
            &asteroids,
            &[]
        ));
        assert!(line_of_sight(
            Vec2::new(0.0, 50.0),
            Vec2::new(100.0, 50.0),
            &asteroids,
            &[]
        ));
    }

    #[test]
    fn test_cloak_hides_even_when_lit() {
        let tuning = Tuning::default();
        let lights = [light_at(500.0, 500.0)];
        let point = Vec2::new(100.0, 100.0);
        assert!(is_visible_to_faction(
            point, false, &[], None, &lights, &[], &tuning
        ));
        assert!(!is_visible_to_faction(
            point, true, &[], None, &lights, &[], &tuning
        ));
    }

    #[test]
    fn test_friendly_proximity_reveals_shadow() {
        let tuning = Tuning::default();
        let point = Vec2::new(100.0, 100.0);
        // No lights at all: everything is shadowed
        assert!(!is_visible_to_faction(
            point, false, &[], None, &[], &[], &tuning
        ));

        let near = Vec2::new(100.0 + tuning.proximity_reveal_range - 1.0, 100.0);
        assert!(is_visible_to_faction(
            point,
            false,
            &[near],
            None,
            &[],
            &[],
            &tuning
        ));

        let far = Vec2::new(100.0 + tuning.proximity_reveal_range + 1.0, 100.0);
        assert!(!is_visible_to_faction(
            point,
            false,
            &[far],
            None,
            &[],
            &[],
            &tuning
        ));
    }

    #[test]
    fn test_nexus_influence_reveals_shadow() {
        let tuning = Tuning::default();
        let point = Vec2::new(100.0, 100.0);
        let nexus = Some(Vec2::new(100.0, 100.0 + tuning.nexus_influence_radius - 1.0));
        assert!(is_visible_to_faction(
            point, false, &[], nexus, &[], &[], &tuning
        ));
        let far_nexus = Some(Vec2::new(
            100.0,
            100.0 + tuning.nexus_influence_radius + 1.0,
        ));
        assert!(!is_visible_to_faction(
            point, false, &[], far_nexus, &[], &[], &tuning
        ));
    }
}
