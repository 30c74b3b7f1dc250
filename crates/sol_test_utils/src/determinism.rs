//! Determinism testing utilities.
//!
//! A harness for verifying that the simulation produces identical
//! results given identical inputs.
//!
//! # Testing Strategy
//!
//! Lockstep-style play and replay verification both require the
//! simulation to be 100% deterministic. Sources of non-determinism to
//! guard against:
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   The simulation only traverses collections in storage order; the
//!   spatial grid's hash map is query-only.
//!
//! - **System randomness**: no unseeded PRNGs. World generation runs off
//!   the seed in `SimConfig`.
//!
//! - **Wall-clock reads**: the tick delta is always supplied by the
//!   caller and clamped, never measured.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: individual system determinism
//! 2. **Property tests**: random inputs must still produce deterministic outputs
//! 3. **Integration tests**: full match scenarios are reproducible
//! 4. **Parallel tests**: running N simulations in parallel all match

use std::thread;

use sol_core::simulation::Simulation;

use crate::fixtures::FIXTURE_DT;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Checksums from each run.
    pub checksums: Vec<u32>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// All unique checksums (should be 1 for a deterministic simulation).
    #[must_use]
    pub fn unique_checksums(&self) -> Vec<u32> {
        let mut unique: Vec<u32> = self.checksums.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed
    /// error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different checksums.
    pub fn assert_deterministic(&self) {
        assert!(
            self.is_deterministic,
            "Simulation is non-deterministic!\n\
             Runs: {}\n\
             Ticks: {}\n\
             Unique checksums: {} (expected 1)\n\
             All checksums: {:?}",
            self.checksums.len(),
            self.ticks,
            self.unique_checksums().len(),
            self.checksums
        );
    }
}

/// Run a scenario multiple times and compare final checksums.
///
/// # Arguments
///
/// * `runs` - number of times to run the scenario
/// * `ticks` - ticks to simulate per run
/// * `setup` - builds the initial simulation (commands included)
pub fn verify_determinism<Setup>(runs: usize, ticks: u64, setup: Setup) -> DeterminismResult
where
    Setup: Fn() -> Simulation,
{
    let mut checksums = Vec::with_capacity(runs);
    for _ in 0..runs {
        let mut sim = setup();
        for _ in 0..ticks {
            sim.advance_tick(FIXTURE_DT);
        }
        checksums.push(sim.state_checksum());
    }

    let is_deterministic = checksums.windows(2).all(|w| w[0] == w[1]);
    DeterminismResult {
        is_deterministic,
        checksums,
        ticks,
    }
}

/// Run N copies of a scenario on separate threads and compare checksums.
///
/// Catches non-determinism that only manifests under thread scheduling
/// or memory layout variation.
pub fn run_parallel_simulations<Setup>(
    setup: Setup,
    num_sims: usize,
    ticks: u64,
) -> DeterminismResult
where
    Setup: Fn() -> Simulation + Sync,
{
    let checksums: Vec<u32> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup();
                    for _ in 0..ticks {
                        sim.advance_tick(FIXTURE_DT);
                    }
                    sim.state_checksum()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let is_deterministic = checksums.windows(2).all(|w| w[0] == w[1]);
    DeterminismResult {
        is_deterministic,
        checksums,
        ticks,
    }
}

/// Compare two runs tick-by-tick and report the first diverging tick.
///
/// Returns `None` when the runs agree for the whole duration.
pub fn find_first_divergence<Setup>(setup: Setup, ticks: u64) -> Option<u64>
where
    Setup: Fn() -> Simulation,
{
    let mut sim1 = setup();
    let mut sim2 = setup();

    if sim1.state_checksum() != sim2.state_checksum() {
        return Some(0);
    }
    for tick in 1..=ticks {
        sim1.advance_tick(FIXTURE_DT);
        sim2.advance_tick(FIXTURE_DT);
        if sim1.state_checksum() != sim2.state_checksum() {
            return Some(tick);
        }
    }
    None
}

/// Verify that a snapshot round-trip preserves state exactly.
pub fn verify_snapshot_determinism<Setup>(setup: Setup, ticks: u64) -> bool
where
    Setup: Fn() -> Simulation,
{
    let mut sim = setup();
    for _ in 0..ticks {
        sim.advance_tick(FIXTURE_DT);
    }

    let before = sim.state_checksum();
    let Ok(bytes) = sim.serialize() else {
        return false;
    };
    let Ok(restored) = Simulation::deserialize(&bytes) else {
        return false;
    };
    before == restored.state_checksum()
}

/// Proptest strategies for determinism testing.
pub mod strategies {
    use glam::Vec2;
    use proptest::prelude::*;
    use sol_core::prelude::*;

    /// A world position inside the default map bounds.
    pub fn arb_position() -> impl Strategy<Value = Vec2> {
        (0.0f32..1920.0, 0.0f32..1080.0).prop_map(|(x, y)| Vec2::new(x, y))
    }

    /// A non-degenerate aim direction.
    pub fn arb_direction() -> impl Strategy<Value = Vec2> {
        (0.0f32..std::f32::consts::TAU).prop_map(|a| Vec2::new(a.cos(), a.sin()))
    }

    /// A rally command for one of the starting unit slots.
    pub fn arb_rally_command(unit_ids: Vec<EntityId>) -> impl Strategy<Value = Command> {
        (proptest::sample::select(unit_ids), arb_position())
            .prop_map(|(unit, point)| Command::SetRallyPoint { unit, point })
    }

    /// A world seed.
    pub fn arb_seed() -> impl Strategy<Value = u64> {
        any::<u64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{skirmish_sim, test_sim};
    use proptest::prelude::*;
    use sol_core::prelude::*;
    use super::strategies::{arb_position, arb_seed};

    #[test]
    fn test_idle_match_is_deterministic() {
        verify_determinism(3, 150, || test_sim(17)).assert_deterministic();
    }

    #[test]
    fn test_skirmish_is_deterministic() {
        // Combat exercises projectiles, damage and the death sweep
        verify_determinism(2, 600, || skirmish_sim(23)).assert_deterministic();
    }

    #[test]
    fn test_parallel_runs_agree() {
        run_parallel_simulations(|| skirmish_sim(31), 4, 300).assert_deterministic();
    }

    #[test]
    fn test_no_divergence_in_long_run() {
        assert_eq!(find_first_divergence(|| skirmish_sim(5), 600), None);
    }

    #[test]
    fn test_snapshot_roundtrip() {
        assert!(verify_snapshot_determinism(|| skirmish_sim(8), 200));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn prop_any_seed_is_deterministic(seed in arb_seed()) {
            verify_determinism(2, 60, || test_sim(seed)).assert_deterministic();
        }

        #[test]
        fn prop_random_rallies_stay_deterministic(
            seed in arb_seed(),
            points in proptest::collection::vec(arb_position(), 1..6)
        ) {
            let points = points.clone();
            let setup = move || {
                let mut sim = test_sim(seed);
                let ids: Vec<EntityId> =
                    sim.player(FactionId::Solar).units.iter().map(|u| u.id).collect();
                for (i, point) in points.iter().enumerate() {
                    let unit = ids[i % ids.len()];
                    sim.apply_command(Command::SetRallyPoint { unit, point: *point });
                }
                sim
            };
            verify_determinism(2, 90, setup).assert_deterministic();
        }
    }
}
