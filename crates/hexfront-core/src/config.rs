//! Battle engine configuration.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Tunables for battles and the registry that drives them.
///
/// Every field has a default, so a partial config file is valid input.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    /// Rounds after which an undecided battle ends in stalemate.
    pub max_turns: u32,
    /// Minimum ticks between two rounds of the same battle.
    pub round_interval: u64,
    /// Log entries kept before the log is trimmed.
    pub log_capacity: usize,
    /// Most recent log entries kept after a trim.
    pub log_retain: usize,
    /// Log entries included in a snapshot.
    pub snapshot_log_entries: usize,
    /// Seed for the registry's default random source.
    pub seed: u64,
}

impl BattleConfig {
    /// Validate settings and return the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_turns == 0 {
            return Err(ConfigError::ZeroMaxTurns);
        }
        if self.round_interval == 0 {
            return Err(ConfigError::ZeroRoundInterval);
        }
        if self.log_capacity == 0 {
            return Err(ConfigError::ZeroLogCapacity);
        }
        if self.log_retain > self.log_capacity {
            return Err(ConfigError::RetainExceedsCapacity {
                retain: self.log_retain,
                capacity: self.log_capacity,
            });
        }
        Ok(())
    }

    /// Same config with a different stalemate cap.
    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Same config with a different seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            max_turns: 10,
            round_interval: 1,
            log_capacity: 100,
            log_retain: 50,
            snapshot_log_entries: 10,
            seed: 0,
        }
    }
}
