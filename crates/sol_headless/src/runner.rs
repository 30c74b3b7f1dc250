//! Scripted match runner.
//!
//! Builds a match from a seed, optionally scripts the starting armies at
//! each other, runs a fixed number of fixed-delta ticks and reports the
//! checkpoint checksums. Two hosts running the same arguments must print
//! identical reports.

use std::path::{Path, PathBuf};

use serde::Serialize;

use sol_core::prelude::*;
use sol_core::replay::{record_match, Checkpoint, Replay, TimedCommand};
use sol_core::simulation::SimConfig;

/// Arguments for one scripted match.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// World seed.
    pub seed: u64,
    /// Ticks to simulate.
    pub ticks: u64,
    /// Fixed per-tick delta in seconds.
    pub tick_delta: f32,
    /// Optional RON tuning override file.
    pub tuning: Option<PathBuf>,
    /// Script the starting armies at each other's nexus.
    pub skirmish: bool,
}

/// Summary of a finished match.
#[derive(Debug, Clone, Serialize)]
pub struct MatchReport {
    /// World seed the match ran with.
    pub seed: u64,
    /// Tick the match ended at.
    pub final_tick: u64,
    /// Checksum at the last checkpoint.
    pub final_checksum: u32,
    /// Every checkpoint in tick order.
    pub checkpoints: Vec<Checkpoint>,
    /// Living units per faction at the end, in faction order.
    pub surviving_units: [usize; 2],
}

/// Resolve the simulation config for a run.
pub fn sim_config(run: &RunConfig) -> Result<SimConfig> {
    let tuning = match &run.tuning {
        Some(path) => Tuning::load(path)?,
        None => Tuning::default(),
    };
    Ok(SimConfig {
        seed: run.seed,
        tuning,
    })
}

/// Rally every starting unit at the opposing nexus.
#[must_use]
pub fn skirmish_commands(sim: &Simulation) -> Vec<TimedCommand> {
    let mut commands = Vec::new();
    for faction in FactionId::ALL {
        let Some(enemy_nexus) = sim
            .player(faction.opponent())
            .structures
            .iter()
            .find(|s| s.kind == StructureKind::Nexus)
            .map(|s| s.position)
        else {
            continue;
        };
        for unit in &sim.player(faction).units {
            commands.push(TimedCommand {
                tick: 0,
                command: Command::SetRallyPoint {
                    unit: unit.id,
                    point: enemy_nexus,
                },
            });
        }
    }
    commands
}

fn scripted_commands(config: &SimConfig, run: &RunConfig) -> Vec<TimedCommand> {
    if run.skirmish {
        skirmish_commands(&Simulation::new(config.clone()))
    } else {
        Vec::new()
    }
}

/// Run a match and report its checkpoints.
pub fn run_match(run: &RunConfig) -> Result<MatchReport> {
    let config = sim_config(run)?;
    let commands = scripted_commands(&config, run);
    let replay = record_match(config, run.tick_delta, run.ticks, &commands);
    let sim = replay.verify()?;
    Ok(report_from(&replay, &sim))
}

/// Run a match and also save its replay file.
pub fn record_to_file(run: &RunConfig, output: &Path) -> Result<MatchReport> {
    let config = sim_config(run)?;
    let commands = scripted_commands(&config, run);
    let replay = record_match(config, run.tick_delta, run.ticks, &commands);
    let sim = replay.verify()?;
    replay.save(output)?;
    Ok(report_from(&replay, &sim))
}

/// Load a replay file and verify every checkpoint.
pub fn verify_file(path: &Path) -> Result<MatchReport> {
    let replay = Replay::load(path)?;
    let sim = replay.verify()?;
    Ok(report_from(&replay, &sim))
}

fn report_from(replay: &Replay, sim: &Simulation) -> MatchReport {
    MatchReport {
        seed: replay.config.seed,
        final_tick: replay.final_tick,
        final_checksum: replay
            .checkpoints
            .last()
            .map_or(0, |checkpoint| checkpoint.checksum),
        checkpoints: replay.checkpoints.clone(),
        surviving_units: [
            sim.player(FactionId::Solar).units.len(),
            sim.player(FactionId::Umbra).units.len(),
        ],
    }
}
