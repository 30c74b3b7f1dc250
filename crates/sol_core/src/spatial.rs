//! Spatial hash grid for particle neighborhood queries.
//!
//! A uniform grid keyed by integer cell coordinates gives the ambient
//! particle pool O(1)-amortized neighbor queries, so pairwise short-range
//! repulsion over thousands of particles stays O(n) per tick instead of
//! O(n^2).
//!
//! The grid is rebuilt from scratch every tick and holds no identity
//! across ticks. Buckets are cleared and reused between rebuilds so the
//! steady state allocates nothing.

use std::collections::HashMap;

use glam::Vec2;

use crate::entities::Particle;

/// Combine integer cell coordinates into a single hashable key.
///
/// The coordinates are bit-packed rather than hashed together so that two
/// distinct cells can never collide into one bucket.
#[inline]
#[must_use]
pub fn cell_key(cx: i32, cy: i32) -> u64 {
    ((cx as u32 as u64) << 32) | (cy as u32 as u64)
}

/// Uniform spatial hash over particle indices.
#[derive(Debug, Clone, Default)]
pub struct SpatialGrid {
    cell_size: f32,
    cells: HashMap<u64, Vec<usize>>,
}

impl SpatialGrid {
    /// Create a grid with the given cell size.
    ///
    /// Cell size should be a small multiple of the interaction radius
    /// (4x works well) so a query only needs the 3x3 neighborhood.
    #[must_use]
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            cells: HashMap::new(),
        }
    }

    /// Cell size in world units.
    #[must_use]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Integer cell coordinates for a world position.
    #[inline]
    #[must_use]
    pub fn cell_coords(&self, pos: Vec2) -> (i32, i32) {
        (
            (pos.x / self.cell_size).floor() as i32,
            (pos.y / self.cell_size).floor() as i32,
        )
    }

    /// Rebuild the grid from the particle pool.
    ///
    /// Buckets are emptied but their capacity is kept, so rebuilding is
    /// allocation-free once the grid has warmed up.
    pub fn rebuild(&mut self, particles: &[Particle]) {
        for bucket in self.cells.values_mut() {
            bucket.clear();
        }
        for (index, particle) in particles.iter().enumerate() {
            let (cx, cy) = self.cell_coords(particle.position);
            self.cells.entry(cell_key(cx, cy)).or_default().push(index);
        }
    }

    /// Visit every particle index in the 3x3 cell neighborhood around a
    /// position.
    pub fn for_each_neighbor<F: FnMut(usize)>(&self, pos: Vec2, mut visit: F) {
        let (cx, cy) = self.cell_coords(pos);
        for dy in -1..=1 {
            for dx in -1..=1 {
                if let Some(bucket) = self.cells.get(&cell_key(cx + dx, cy + dy)) {
                    for &index in bucket {
                        visit(index);
                    }
                }
            }
        }
    }

    /// Total number of indices across all buckets (test support).
    #[must_use]
    pub fn occupancy(&self) -> usize {
        self.cells.values().map(Vec::len).sum()
    }
}

/// Accumulate pairwise short-range repulsion into particle velocities.
///
/// For each particle the 3x3 neighborhood is scanned; neighbors within
/// `radius` contribute a push of `(1 - dist/radius) * strength` along the
/// separation direction. Self-pairs are skipped by index comparison, not
/// by distance, and exactly coincident pairs are skipped outright so no
/// division by zero can occur.
pub fn apply_repulsion(
    grid: &SpatialGrid,
    particles: &mut [Particle],
    radius: f32,
    strength: f32,
    dt: f32,
) {
    let radius_sq = radius * radius;

    for i in 0..particles.len() {
        let pos = particles[i].position;
        let mut force = Vec2::ZERO;

        grid.for_each_neighbor(pos, |j| {
            if j == i {
                return;
            }
            let offset = pos - particles[j].position;
            let dist_sq = offset.length_squared();
            if dist_sq == 0.0 || dist_sq >= radius_sq {
                return;
            }
            let dist = dist_sq.sqrt();
            let falloff = 1.0 - dist / radius;
            force += (offset / dist) * (falloff * strength);
        });

        particles[i].velocity += force * dt;
    }
}
