//! Match fixture builders.
//!
//! Scenarios used across the determinism harness and the headless
//! runner. All fixtures are seed-driven; the same arguments always build
//! the same match.

use glam::Vec2;
use sol_core::prelude::*;
use sol_core::simulation::SimConfig;

/// Fixed step used by every fixture, 30 ticks per simulated second.
pub const FIXTURE_DT: f32 = 1.0 / 30.0;

/// A test config with a reduced particle pool.
///
/// Particle behavior is identical at any pool size; the smaller pool just
/// keeps test runs fast.
#[must_use]
pub fn test_config(seed: u64) -> SimConfig {
    SimConfig {
        seed,
        tuning: Tuning {
            particle_count: 200,
            ..Tuning::default()
        },
    }
}

/// A fresh match from [`test_config`].
#[must_use]
pub fn test_sim(seed: u64) -> Simulation {
    Simulation::new(test_config(seed))
}

/// A match where both starting armies are ordered at each other's nexus,
/// so combat, projectiles and deaths all occur within a few hundred
/// ticks.
#[must_use]
pub fn skirmish_sim(seed: u64) -> Simulation {
    let mut sim = test_sim(seed);
    for faction in FactionId::ALL {
        let enemy_nexus = sim
            .player(faction.opponent())
            .structures
            .iter()
            .find(|s| s.kind == StructureKind::Nexus)
            .map(|s| s.position)
            .unwrap_or(Vec2::ZERO);
        let ids: Vec<EntityId> = sim.player(faction).units.iter().map(|u| u.id).collect();
        for id in ids {
            sim.apply_command(Command::SetRallyPoint {
                unit: id,
                point: enemy_nexus,
            });
        }
    }
    sim
}

/// Advance a simulation by `ticks` fixed steps, draining effects.
pub fn run_ticks(sim: &mut Simulation, ticks: u64) {
    for _ in 0..ticks {
        sim.advance_tick(FIXTURE_DT);
        sim.take_effects();
    }
}
