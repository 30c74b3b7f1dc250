//! Geometry primitives for the simulation.
//!
//! All functions here are pure and side-effect free. Given bit-identical
//! inputs they produce bit-identical outputs; "closest" ties are broken
//! by minimum distance, first-found on exact ties. Degenerate inputs
//! (zero-length vectors, parallel rays, coincident points) resolve to a
//! documented fallback rather than an error.

use glam::Vec2;
use std::f32::consts::{PI, TAU};

/// Tolerance below which a ray/segment denominator is treated as parallel.
pub const PARALLEL_EPSILON: f32 = 1e-6;

/// Distance between two points.
#[must_use]
pub fn distance(a: Vec2, b: Vec2) -> f32 {
    a.distance(b)
}

/// Normalize a vector, returning the zero vector (not NaN) for zero-length
/// input.
#[must_use]
pub fn normalize_or_zero(v: Vec2) -> Vec2 {
    let len_sq = v.length_squared();
    if len_sq == 0.0 {
        return Vec2::ZERO;
    }
    v / len_sq.sqrt()
}

/// Intersect a ray with a line segment.
///
/// Solves the 2x2 linear system for the ray `origin + t * dir` against the
/// segment `p1..p2`. Returns the ray distance `t` to the hit, or `None`
/// when the ray and segment are parallel (denominator below
/// [`PARALLEL_EPSILON`]) or the intersection falls outside `t >= 0` /
/// `u in [0, 1]`.
///
/// `dir` is expected to be unit length so the returned `t` is a world
/// distance.
#[must_use]
pub fn ray_segment_intersection(origin: Vec2, dir: Vec2, p1: Vec2, p2: Vec2) -> Option<f32> {
    let seg = p2 - p1;
    let denom = dir.x * seg.y - dir.y * seg.x;
    if denom.abs() < PARALLEL_EPSILON {
        return None;
    }

    let diff = p1 - origin;
    let t = (diff.x * seg.y - diff.y * seg.x) / denom;
    let u = (diff.x * dir.y - diff.y * dir.x) / denom;

    if t >= 0.0 && (0.0..=1.0).contains(&u) {
        Some(t)
    } else {
        None
    }
}

/// Intersect a ray with a closed polygon boundary.
///
/// Iterates every edge and returns the minimum positive ray distance, or
/// `None` when no edge is hit. Exact distance ties keep the first edge
/// found, which is deterministic because the vertex ring is ordered.
#[must_use]
pub fn ray_polygon_intersection(origin: Vec2, dir: Vec2, vertices: &[Vec2]) -> Option<f32> {
    if vertices.len() < 3 {
        return None;
    }

    let mut closest: Option<f32> = None;
    for i in 0..vertices.len() {
        let p1 = vertices[i];
        let p2 = vertices[(i + 1) % vertices.len()];
        if let Some(t) = ray_segment_intersection(origin, dir, p1, p2) {
            if closest.map_or(true, |best| t < best) {
                closest = Some(t);
            }
        }
    }
    closest
}

/// Intersect a ray with a circle.
///
/// Returns the distance to the nearest intersection with `t >= 0`, or
/// `None` when the ray misses. A ray starting inside the circle reports
/// the exit distance.
#[must_use]
pub fn ray_circle_intersection(origin: Vec2, dir: Vec2, center: Vec2, radius: f32) -> Option<f32> {
    let to_center = center - origin;
    let proj = to_center.dot(dir);
    let perp_sq = to_center.length_squared() - proj * proj;
    let radius_sq = radius * radius;
    if perp_sq > radius_sq {
        return None;
    }

    let half_chord = (radius_sq - perp_sq).sqrt();
    let near = proj - half_chord;
    let far = proj + half_chord;
    if near >= 0.0 {
        Some(near)
    } else if far >= 0.0 {
        Some(far)
    } else {
        None
    }
}

/// Shortest distance from a point to the segment `a..b`.
///
/// Used for circle-versus-segment line-of-sight tests: a circular blocker
/// of radius `r` obstructs the segment iff this distance is below `r`.
#[must_use]
pub fn segment_point_distance(a: Vec2, b: Vec2, point: Vec2) -> f32 {
    let seg = b - a;
    let len_sq = seg.length_squared();
    if len_sq == 0.0 {
        return point.distance(a);
    }
    let t = ((point - a).dot(seg) / len_sq).clamp(0.0, 1.0);
    point.distance(a + seg * t)
}

/// Check whether a point lies inside a closed polygon (ray casting).
#[must_use]
pub fn point_in_polygon(point: Vec2, vertices: &[Vec2]) -> bool {
    let n = vertices.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let pi = vertices[i];
        let pj = vertices[j];
        if (pi.y > point.y) != (pj.y > point.y) {
            let cross_x = (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x;
            if point.x < cross_x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Normalize the angular delta `to - from` into `(-PI, PI]`.
///
/// All rotation smoothing goes through this so facing never snaps across
/// the +/-PI wrap.
#[must_use]
pub fn shortest_angle_delta(from: f32, to: f32) -> f32 {
    let mut delta = to - from;
    while delta > PI {
        delta -= TAU;
    }
    while delta <= -PI {
        delta += TAU;
    }
    delta
}

/// Rotate `current` toward `target` by at most `max_step` radians.
///
/// Snaps exactly onto `target` once the remaining delta is within the
/// capped step.
#[must_use]
pub fn rotate_towards(current: f32, target: f32, max_step: f32) -> f32 {
    let delta = shortest_angle_delta(current, target);
    if delta.abs() <= max_step {
        target
    } else {
        current + max_step.copysign(delta)
    }
}
