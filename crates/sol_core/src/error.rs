//! Error types for the game simulation.

use thiserror::Error;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all game simulation errors.
#[derive(Debug, Error)]
pub enum GameError {
    /// Tuning/config file parsing error.
    #[error("Failed to parse tuning file '{path}': {message}")]
    TuningParseError {
        /// Path to the file that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// State snapshot could not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Replay file could not be read or written.
    #[error("Replay IO error: {0}")]
    ReplayIo(String),

    /// Replay format version mismatch.
    #[error("Replay version mismatch: expected {expected}, got {found}")]
    ReplayVersionMismatch {
        /// Version this build writes and reads.
        expected: u32,
        /// Version found in the file.
        found: u32,
    },

    /// Desync detected in multiplayer.
    #[error(
        "Desync detected at tick {tick}: local checksum {local_checksum}, \
         remote checksum {remote_checksum}"
    )]
    DesyncDetected {
        /// Tick where desync occurred.
        tick: u64,
        /// Local simulation checksum.
        local_checksum: u32,
        /// Remote simulation checksum.
        remote_checksum: u32,
    },
}
