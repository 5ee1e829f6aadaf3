//! Hexfront Core Library
//!
//! This crate contains the battle engine for Hexfront, a real-time strategy
//! game played on a hex grid. It resolves the fights that break out when
//! opposing units share a hex: one battle per hex, one round per battle per
//! tick, until a side is wiped out or the turn cap forces a stalemate.
//!
//! # Design Principles
//!
//! - **No UI dependencies**: This crate is purely battle logic
//! - **Caller owns the units**: Battles hold unit ids and read units through a [`Roster`]
//! - **Deterministic**: The random source is injected, so a seeded run replays exactly
//! - **Serializable**: Battles can be snapshotted and restored via serde

// Core modules
pub mod hex;
pub mod terrain;
pub mod types;

// Units and combat
pub mod combat;
pub mod unit;

// Battles
pub mod battle;
pub mod registry;

// Configuration and errors
pub mod config;
pub mod error;

// Re-exports for convenience
pub use battle::{
    Battle, BattleEvent, BattleLog, BattleSnapshot, BattleState, BattleStatistics, BattleStatus,
    LogEntry, ParticipantState, Resolution, Winner,
};
pub use combat::{
    predict_battle_outcome, preview_damage, resolve_combat, select_target, BattlePrediction,
    CombatOutcome, RoundEntry, Strike, StrikeResult,
};
pub use config::BattleConfig;
pub use error::{BattleError, ConfigError, SnapshotError};
pub use hex::HexCoord;
pub use registry::{BattleEnd, BattleRegistry, RoundReport, TickReport};
pub use terrain::{TerrainKind, TerrainLookup, TerrainMap};
pub use types::*;
pub use unit::{Combatant, Roster, Unit, UnitKind, UnitStats};
