//! Core type aliases and small shared enums.

use serde::{Deserialize, Serialize};

/// Opaque player identity used for side assignment.
pub type PlayerId = u8;

/// Unique identifier for a unit.
pub type UnitId = u64;

/// Battle identifier, the `"q,r"` key of the anchoring hex.
pub type BattleId = String;

/// Simulation clock value supplied by the caller.
pub type Tick = u64;

/// One of the two opposing groups in a battle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Attackers,
    Defenders,
}

impl Side {
    /// The side facing this one.
    pub const fn opponent(&self) -> Side {
        match self {
            Side::Attackers => Side::Defenders,
            Side::Defenders => Side::Attackers,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Attackers => write!(f, "attackers"),
            Side::Defenders => write!(f, "defenders"),
        }
    }
}
