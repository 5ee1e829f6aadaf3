//! Error types for the battle engine.
//!
//! Ordinary game conditions (a dead unit, a missing battle) never surface as
//! errors; registry calls answer with `false`/`None` instead. The types here
//! cover contract violations, bad configuration, and snapshot I/O.

use crate::hex::HexCoord;

/// Contract violations on a battle.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BattleError {
    #[error("battle at {0} needs at least one attacker")]
    MissingAttackers(HexCoord),
    #[error("battle at {0} needs at least one defender")]
    MissingDefenders(HexCoord),
    #[error("battle at {0} is already initialized")]
    AlreadyInitialized(HexCoord),
    #[error("battle at {0} is not active")]
    NotActive(HexCoord),
}

/// Invalid battle configuration.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("max_turns must be at least 1")]
    ZeroMaxTurns,
    #[error("round_interval must be at least 1")]
    ZeroRoundInterval,
    #[error("log_capacity must be at least 1")]
    ZeroLogCapacity,
    #[error("log_retain ({retain}) exceeds log_capacity ({capacity})")]
    RetainExceedsCapacity { retain: usize, capacity: usize },
}

/// Failure reading or writing a battle snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}
