//! Replay recording and verified playback.
//!
//! A replay stores the match config, the fixed tick delta, the command
//! stream and the checkpoint checksums. Because the simulation is fully
//! deterministic, that is enough to recreate the whole match; playback
//! re-verifies every checkpoint and reports the first divergence.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::commands::Command;
use crate::error::{GameError, Result};
use crate::simulation::{SimConfig, Simulation};

/// Replay file format version.
pub const REPLAY_VERSION: u32 = 1;

/// A command stamped with the tick it was issued before.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimedCommand {
    /// Tick the command applies at (before that tick advances).
    pub tick: u64,
    /// The command itself.
    pub command: Command,
}

/// A recorded checkpoint checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Tick the checksum was taken at.
    pub tick: u64,
    /// State checksum at that tick.
    pub checksum: u32,
}

/// Complete replay data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Replay {
    /// Replay format version.
    pub version: u32,
    /// Match config (seed and tuning) the match was built from.
    pub config: SimConfig,
    /// Fixed per-tick delta the match was advanced with.
    pub tick_delta: f32,
    /// Command stream in issue order.
    pub commands: Vec<TimedCommand>,
    /// Checkpoint checksums in tick order.
    pub checkpoints: Vec<Checkpoint>,
    /// Tick the match ended at.
    pub final_tick: u64,
}

impl Replay {
    /// Start recording a match.
    #[must_use]
    pub fn new(config: SimConfig, tick_delta: f32) -> Self {
        Self {
            version: REPLAY_VERSION,
            config,
            tick_delta,
            commands: Vec::new(),
            checkpoints: Vec::new(),
            final_tick: 0,
        }
    }

    /// Record a command issued before the given tick advances.
    pub fn record_command(&mut self, tick: u64, command: Command) {
        self.commands.push(TimedCommand { tick, command });
    }

    /// Record a checkpoint checksum.
    pub fn record_checkpoint(&mut self, tick: u64, checksum: u32) {
        self.checkpoints.push(Checkpoint { tick, checksum });
    }

    /// Finalize the replay with the ending tick.
    pub fn finalize(&mut self, final_tick: u64) {
        self.final_tick = final_tick;
    }

    /// Commands issued before the given tick advances.
    #[must_use]
    pub fn commands_at_tick(&self, tick: u64) -> Vec<&TimedCommand> {
        self.commands.iter().filter(|c| c.tick == tick).collect()
    }

    /// Save the replay to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = bincode::serialize(self).map_err(|e| GameError::ReplayIo(e.to_string()))?;
        std::fs::write(path.as_ref(), bytes).map_err(|e| GameError::ReplayIo(e.to_string()))?;
        Ok(())
    }

    /// Load a replay from a file, checking the format version.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref()).map_err(|e| GameError::ReplayIo(e.to_string()))?;
        let replay: Self =
            bincode::deserialize(&bytes).map_err(|e| GameError::ReplayIo(e.to_string()))?;
        if replay.version != REPLAY_VERSION {
            return Err(GameError::ReplayVersionMismatch {
                expected: REPLAY_VERSION,
                found: replay.version,
            });
        }
        Ok(replay)
    }

    /// Play the replay back against a fresh simulation, verifying every
    /// checkpoint.
    ///
    /// Returns the finished simulation, or [`GameError::DesyncDetected`]
    /// at the first checkpoint that disagrees.
    pub fn verify(&self) -> Result<Simulation> {
        let mut sim = Simulation::new(self.config.clone());
        let mut next_checkpoint = 0;

        while sim.tick() < self.final_tick {
            for timed in self.commands_at_tick(sim.tick()) {
                sim.apply_command(timed.command);
            }
            sim.advance_tick(self.tick_delta);

            while next_checkpoint < self.checkpoints.len()
                && self.checkpoints[next_checkpoint].tick == sim.tick()
            {
                let expected = self.checkpoints[next_checkpoint];
                if sim.last_checksum() != expected.checksum {
                    return Err(GameError::DesyncDetected {
                        tick: expected.tick,
                        local_checksum: sim.last_checksum(),
                        remote_checksum: expected.checksum,
                    });
                }
                next_checkpoint += 1;
            }
        }

        Ok(sim)
    }
}

/// Record a scripted match and return the finished replay.
///
/// Runs `ticks` fixed steps, applying `commands` at their stamped ticks
/// and recording a checkpoint at every cadence tick.
pub fn record_match(
    config: SimConfig,
    tick_delta: f32,
    ticks: u64,
    commands: &[TimedCommand],
) -> Replay {
    let cadence = config.tuning.checksum_cadence.max(1);
    let mut replay = Replay::new(config.clone(), tick_delta);
    let mut sim = Simulation::new(config);

    for timed in commands {
        replay.record_command(timed.tick, timed.command);
    }

    while sim.tick() < ticks {
        for timed in replay.commands_at_tick(sim.tick()) {
            sim.apply_command(timed.command);
        }
        sim.advance_tick(tick_delta);
        if sim.tick() % cadence == 0 {
            replay.record_checkpoint(sim.tick(), sim.last_checksum());
        }
    }
    replay.finalize(sim.tick());
    replay
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Tuning;
    use crate::factions::FactionId;
    use glam::Vec2;

    fn test_config(seed: u64) -> SimConfig {
        SimConfig {
            seed,
            tuning: Tuning {
                particle_count: 150,
                ..Tuning::default()
            },
        }
    }

    fn scripted_commands(sim: &Simulation) -> Vec<TimedCommand> {
        let unit = sim.player(FactionId::Solar).units[0].id;
        vec![TimedCommand {
            tick: 5,
            command: Command::SetRallyPoint {
                unit,
                point: Vec2::new(800.0, 600.0),
            },
        }]
    }

    #[test]
    fn test_recorded_match_verifies() {
        let config = test_config(11);
        let commands = scripted_commands(&Simulation::new(config.clone()));
        let replay = record_match(config, 1.0 / 30.0, 120, &commands);

        assert_eq!(replay.final_tick, 120);
        assert_eq!(replay.checkpoints.len(), 4);
        let sim = replay.verify().expect("replay must reproduce checkpoints");
        assert_eq!(sim.tick(), 120);
    }

    #[test]
    fn test_tampered_checkpoint_is_detected() {
        let config = test_config(11);
        let commands = scripted_commands(&Simulation::new(config.clone()));
        let mut replay = record_match(config, 1.0 / 30.0, 90, &commands);

        replay.checkpoints[1].checksum ^= 0xdead_beef;
        let err = replay.verify().unwrap_err();
        assert!(matches!(err, GameError::DesyncDetected { tick, .. } if tick == 60));
    }

    #[test]
    fn test_dropped_command_diverges() {
        let config = test_config(11);
        let commands = scripted_commands(&Simulation::new(config.clone()));
        let mut replay = record_match(config, 1.0 / 30.0, 120, &commands);

        // Losing a command must change the state stream
        replay.commands.clear();
        assert!(replay.verify().is_err());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let config = test_config(3);
        let replay = record_match(config, 1.0 / 30.0, 60, &[]);

        let path = std::env::temp_dir().join("sol_replay_roundtrip.replay");
        replay.save(&path).unwrap();
        let loaded = Replay::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.final_tick, replay.final_tick);
        assert_eq!(loaded.checkpoints, replay.checkpoints);
        assert!(loaded.verify().is_ok());
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let config = test_config(3);
        let mut replay = record_match(config, 1.0 / 30.0, 30, &[]);
        replay.version = REPLAY_VERSION + 1;

        let path = std::env::temp_dir().join("sol_replay_version.replay");
        replay.save(&path).unwrap();
        let err = Replay::load(&path).unwrap_err();
        std::fs::remove_file(&path).ok();

        assert!(matches!(err, GameError::ReplayVersionMismatch { .. }));
    }
}
