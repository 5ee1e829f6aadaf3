//! A single engagement anchored on one hex.
//!
//! A battle moves through `Pending -> Active -> Resolved`; `Destroyed` can be
//! reached from any state through an explicit teardown. Stalemate is not a
//! state of its own but a kind of resolution.
//!
//! Battles never own units. Side lists hold unit ids, and anything that
//! needs hp or liveness asks a [`Roster`]. Dead units stay in the side lists
//! so losses can be read as `total - alive` at any time.

use crate::combat::RoundEntry;
use crate::config::BattleConfig;
use crate::error::{BattleError, SnapshotError};
use crate::hex::HexCoord;
use crate::types::{BattleId, PlayerId, Side, Tick, UnitId};
use crate::unit::{Combatant, Roster, UnitKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};

/// Lifecycle state of a battle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BattleStatus {
    #[default]
    Pending,
    Active,
    Resolved,
    Destroyed,
}

impl BattleStatus {
    /// True once no further combat can happen.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, BattleStatus::Resolved | BattleStatus::Destroyed)
    }
}

/// Who came out on top.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Attackers,
    Defenders,
    /// Turn cap reached with both sides standing.
    Stalemate,
    /// Both sides eliminated in the same round.
    Draw,
}

impl From<Side> for Winner {
    fn from(side: Side) -> Self {
        match side {
            Side::Attackers => Winner::Attackers,
            Side::Defenders => Winner::Defenders,
        }
    }
}

impl std::fmt::Display for Winner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Winner::Attackers => write!(f, "attackers"),
            Winner::Defenders => write!(f, "defenders"),
            Winner::Stalemate => write!(f, "stalemate"),
            Winner::Draw => write!(f, "draw"),
        }
    }
}

/// Final outcome of a resolved battle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub winner: Winner,
    pub details: String,
    /// Turn count at resolution.
    pub end_turn: u32,
    /// Simulation tick at resolution.
    pub timestamp: Tick,
}

/// Something that happened during a battle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BattleEvent {
    Initialized { attackers: usize, defenders: usize },
    Round { turn: u32, entries: Vec<RoundEntry> },
    TurnAdvance { turn: u32 },
    Reinforcement { unit: UnitId, side: Side },
    Retreat { unit: UnitId, side: Side },
    Resolution { winner: Winner, details: String },
    Destroyed,
}

/// A tick-stamped log record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub tick: Tick,
    pub event: BattleEvent,
}

/// Bounded event log.
///
/// When the log grows past `capacity` it drops its oldest entries, keeping
/// the most recent `retain`.
#[derive(Clone, Debug)]
pub struct BattleLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    retain: usize,
    /// Entries ever pushed, trimmed ones included.
    total: u64,
}

impl BattleLog {
    pub fn new(capacity: usize, retain: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
            retain: retain.min(capacity),
            total: 0,
        }
    }

    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push_back(entry);
        self.total += 1;
        if self.entries.len() > self.capacity {
            let excess = self.entries.len() - self.retain;
            self.entries.drain(..excess);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ever logged, including trimmed ones.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &LogEntry> + ExactSizeIterator {
        self.entries.iter()
    }

    /// The last `count` entries, oldest first.
    pub fn recent(&self, count: usize) -> Vec<LogEntry> {
        let skip = self.entries.len().saturating_sub(count);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Losses and bookkeeping derived from a battle and the live roster.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleStatistics {
    /// Rounds fought, i.e. the turn count.
    pub duration: u32,
    pub attackers_total: usize,
    pub defenders_total: usize,
    pub attackers_alive: usize,
    pub defenders_alive: usize,
    pub attacker_losses: usize,
    pub defender_losses: usize,
    pub total_losses: usize,
    pub total_events: u64,
}

/// Read-only view of one participant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantState {
    pub id: UnitId,
    /// `None` when the unit is no longer in the roster.
    pub owner: Option<PlayerId>,
    pub kind: Option<UnitKind>,
    pub hp: u32,
    pub max_hp: u32,
    pub alive: bool,
}

/// Read-only view of a battle for UI and telemetry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleState {
    pub id: BattleId,
    pub hex: HexCoord,
    pub status: BattleStatus,
    pub turn_count: u32,
    pub max_turns: u32,
    pub attackers: Vec<ParticipantState>,
    pub defenders: Vec<ParticipantState>,
    pub resolution: Option<Resolution>,
}

/// Compact persistent form of a battle.
///
/// Every field has a default so partial or older snapshots still load.
/// A zero `max_turns` means "use the configured cap".
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleSnapshot {
    pub id: BattleId,
    pub hex: HexCoord,
    pub status: BattleStatus,
    pub start_tick: Tick,
    pub last_combat_tick: Tick,
    pub turn_count: u32,
    pub max_turns: u32,
    pub resolution: Option<Resolution>,
    pub attackers: Vec<UnitId>,
    pub defenders: Vec<UnitId>,
    pub recent_log: Vec<LogEntry>,
    pub statistics: Option<BattleStatistics>,
    pub spectators: Vec<PlayerId>,
}

impl BattleSnapshot {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// One ongoing engagement.
#[derive(Clone, Debug)]
pub struct Battle {
    id: BattleId,
    hex: HexCoord,
    attackers: Vec<UnitId>,
    defenders: Vec<UnitId>,
    start_tick: Tick,
    last_combat_tick: Tick,
    turn_count: u32,
    max_turns: u32,
    status: BattleStatus,
    resolution: Option<Resolution>,
    log: BattleLog,
    spectators: BTreeSet<PlayerId>,
    snapshot_log_entries: usize,
}

/// Remove repeated ids, keeping first occurrences in order.
fn dedup_ids(ids: impl IntoIterator<Item = UnitId>, seen: &mut BTreeSet<UnitId>) -> Vec<UnitId> {
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

impl Battle {
    /// Create a battle at `hex`.
    ///
    /// The battle starts active when both sides have someone in them and
    /// pending otherwise. A unit listed twice, or on both sides, is kept once
    /// on the first side it appears in.
    pub fn new(
        hex: HexCoord,
        attackers: Vec<UnitId>,
        defenders: Vec<UnitId>,
        start_tick: Tick,
        config: &BattleConfig,
    ) -> Self {
        let mut battle = Self::pending(hex, start_tick, config);
        if !attackers.is_empty() && !defenders.is_empty() {
            battle.activate(attackers, defenders);
        } else {
            let mut seen = BTreeSet::new();
            battle.attackers = dedup_ids(attackers, &mut seen);
            battle.defenders = dedup_ids(defenders, &mut seen);
        }
        battle
    }

    /// Create an empty battle to be filled by [`Battle::initialize`].
    pub fn pending(hex: HexCoord, start_tick: Tick, config: &BattleConfig) -> Self {
        Self {
            id: hex.key(),
            hex,
            attackers: Vec::new(),
            defenders: Vec::new(),
            start_tick,
            last_combat_tick: start_tick,
            turn_count: 0,
            max_turns: config.max_turns.max(1),
            status: BattleStatus::Pending,
            resolution: None,
            log: BattleLog::new(config.log_capacity, config.log_retain),
            spectators: BTreeSet::new(),
            snapshot_log_entries: config.snapshot_log_entries,
        }
    }

    /// Second step of two-step construction: populate and activate.
    pub fn initialize(
        &mut self,
        attackers: Vec<UnitId>,
        defenders: Vec<UnitId>,
    ) -> Result<(), BattleError> {
        if self.status != BattleStatus::Pending {
            return Err(BattleError::AlreadyInitialized(self.hex));
        }
        if attackers.is_empty() {
            return Err(BattleError::MissingAttackers(self.hex));
        }
        if defenders.is_empty() {
            return Err(BattleError::MissingDefenders(self.hex));
        }
        self.activate(attackers, defenders);
        Ok(())
    }

    fn activate(&mut self, attackers: Vec<UnitId>, defenders: Vec<UnitId>) {
        let mut seen = BTreeSet::new();
        self.attackers = dedup_ids(attackers, &mut seen);
        self.defenders = dedup_ids(defenders, &mut seen);
        self.status = BattleStatus::Active;
        self.record(BattleEvent::Initialized {
            attackers: self.attackers.len(),
            defenders: self.defenders.len(),
        });
        tracing::debug!(
            battle = %self.id,
            attackers = self.attackers.len(),
            defenders = self.defenders.len(),
            "Battle initialized"
        );
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn hex(&self) -> HexCoord {
        self.hex
    }

    pub fn attackers(&self) -> &[UnitId] {
        &self.attackers
    }

    pub fn defenders(&self) -> &[UnitId] {
        &self.defenders
    }

    /// Unit ids on `side`.
    pub fn side(&self, side: Side) -> &[UnitId] {
        match side {
            Side::Attackers => &self.attackers,
            Side::Defenders => &self.defenders,
        }
    }

    /// Every participant, attackers first.
    pub fn participants(&self) -> impl Iterator<Item = UnitId> + '_ {
        self.attackers.iter().chain(self.defenders.iter()).copied()
    }

    /// Side `unit` fights on, if it is in this battle.
    pub fn side_of(&self, unit: UnitId) -> Option<Side> {
        if self.attackers.contains(&unit) {
            Some(Side::Attackers)
        } else if self.defenders.contains(&unit) {
            Some(Side::Defenders)
        } else {
            None
        }
    }

    pub fn start_tick(&self) -> Tick {
        self.start_tick
    }

    pub fn last_combat_tick(&self) -> Tick {
        self.last_combat_tick
    }

    pub fn turn_count(&self) -> u32 {
        self.turn_count
    }

    pub fn max_turns(&self) -> u32 {
        self.max_turns
    }

    pub fn status(&self) -> BattleStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == BattleStatus::Active
    }

    pub fn resolution(&self) -> Option<&Resolution> {
        self.resolution.as_ref()
    }

    pub fn log(&self) -> &BattleLog {
        &self.log
    }

    pub fn spectators(&self) -> &BTreeSet<PlayerId> {
        &self.spectators
    }

    /// Whether a round is due at `tick` given the cadence `interval`.
    pub fn round_due(&self, tick: Tick, interval: u64) -> bool {
        self.is_active() && tick.saturating_sub(self.last_combat_tick) >= interval
    }

    fn record(&mut self, event: BattleEvent) {
        self.record_at(self.last_combat_tick, event);
    }

    fn record_at(&mut self, tick: Tick, event: BattleEvent) {
        self.log.push(LogEntry { tick, event });
    }

    /// Stamp a fought round and log its entries.
    pub(crate) fn record_round(&mut self, tick: Tick, entries: Vec<RoundEntry>) {
        if !self.is_active() {
            return;
        }
        self.last_combat_tick = tick;
        self.record(BattleEvent::Round {
            turn: self.turn_count + 1,
            entries,
        });
    }

    /// Close the current round.
    ///
    /// With a victor the battle resolves in their favour; otherwise the turn
    /// advances and a stalemate is declared once the cap is reached.
    pub(crate) fn conclude_round(&mut self, victor: Option<Winner>) -> BattleStatus {
        if !self.is_active() {
            return self.status;
        }
        self.turn_count += 1;

        if let Some(winner) = victor {
            let details = match winner {
                Winner::Draw => "both sides eliminated".to_string(),
                _ => format!("{} eliminated the opposing side", winner),
            };
            self.set_resolution(winner, details);
        } else if self.turn_count >= self.max_turns {
            let details = format!("no decision after {} turns", self.turn_count);
            self.set_resolution(Winner::Stalemate, details);
        } else {
            self.record(BattleEvent::TurnAdvance {
                turn: self.turn_count,
            });
        }

        self.status
    }

    /// Advance one turn, resolving as stalemate at the turn cap.
    pub fn next_turn(&mut self) -> BattleStatus {
        self.conclude_round(None)
    }

    /// Resolve the battle. Returns false if it was not active.
    pub fn set_resolution(&mut self, winner: Winner, details: impl Into<String>) -> bool {
        if !self.is_active() {
            return false;
        }
        let details = details.into();
        self.record(BattleEvent::Resolution {
            winner,
            details: details.clone(),
        });
        self.resolution = Some(Resolution {
            winner,
            details,
            end_turn: self.turn_count,
            timestamp: self.last_combat_tick,
        });
        self.status = BattleStatus::Resolved;
        tracing::debug!(battle = %self.id, %winner, turn = self.turn_count, "Battle resolved");
        true
    }

    /// Tear the battle down. It keeps its id and hex but nothing else.
    pub fn destroy(&mut self) {
        if self.status == BattleStatus::Destroyed {
            return;
        }
        self.record(BattleEvent::Destroyed);
        tracing::debug!(battle = %self.id, "Battle destroyed");

        self.attackers.clear();
        self.defenders.clear();
        self.spectators.clear();
        self.log.clear();
        self.status = BattleStatus::Destroyed;
    }

    /// Add a reinforcement. Refused unless active or if already present.
    pub fn add_unit(&mut self, unit: UnitId, side: Side, tick: Tick) -> bool {
        if !self.is_active() || self.side_of(unit).is_some() {
            return false;
        }
        match side {
            Side::Attackers => self.attackers.push(unit),
            Side::Defenders => self.defenders.push(unit),
        }
        self.record_at(tick, BattleEvent::Reinforcement { unit, side });
        true
    }

    /// Pull a unit out of the battle, returning the side it left.
    pub fn remove_unit(&mut self, unit: UnitId, tick: Tick) -> Option<Side> {
        if !self.is_active() {
            return None;
        }
        let side = self.side_of(unit)?;
        let list = match side {
            Side::Attackers => &mut self.attackers,
            Side::Defenders => &mut self.defenders,
        };
        list.retain(|id| *id != unit);
        self.record_at(tick, BattleEvent::Retreat { unit, side });
        Some(side)
    }

    pub fn add_spectator(&mut self, player: PlayerId) -> bool {
        if self.status == BattleStatus::Destroyed {
            return false;
        }
        self.spectators.insert(player)
    }

    pub fn remove_spectator(&mut self, player: PlayerId) -> bool {
        self.spectators.remove(&player)
    }

    pub fn is_spectator(&self, player: PlayerId) -> bool {
        self.spectators.contains(&player)
    }

    /// Living unit ids on `side`.
    pub fn alive<R: Roster + ?Sized>(&self, side: Side, roster: &R) -> Vec<UnitId> {
        self.side(side)
            .iter()
            .copied()
            .filter(|id| roster.is_alive(*id))
            .collect()
    }

    pub fn alive_count<R: Roster + ?Sized>(&self, side: Side, roster: &R) -> usize {
        self.side(side)
            .iter()
            .filter(|id| roster.is_alive(**id))
            .count()
    }

    /// The side left standing once the other has no living member.
    ///
    /// `None` while both sides still fight.
    pub fn victor<R: Roster + ?Sized>(&self, roster: &R) -> Option<Winner> {
        let attackers = self.alive_count(Side::Attackers, roster);
        let defenders = self.alive_count(Side::Defenders, roster);
        match (attackers, defenders) {
            (0, 0) => Some(Winner::Draw),
            (_, 0) => Some(Winner::Attackers),
            (0, _) => Some(Winner::Defenders),
            _ => None,
        }
    }

    pub fn statistics<R: Roster + ?Sized>(&self, roster: &R) -> BattleStatistics {
        let attackers_alive = self.alive_count(Side::Attackers, roster);
        let defenders_alive = self.alive_count(Side::Defenders, roster);
        let attacker_losses = self.attackers.len() - attackers_alive;
        let defender_losses = self.defenders.len() - defenders_alive;

        BattleStatistics {
            duration: self.turn_count,
            attackers_total: self.attackers.len(),
            defenders_total: self.defenders.len(),
            attackers_alive,
            defenders_alive,
            attacker_losses,
            defender_losses,
            total_losses: attacker_losses + defender_losses,
            total_events: self.log.total(),
        }
    }

    pub fn state<R: Roster + ?Sized>(&self, roster: &R) -> BattleState {
        let describe = |id: &UnitId| match roster.unit(*id) {
            Some(unit) => ParticipantState {
                id: *id,
                owner: Some(unit.owner()),
                kind: Some(unit.kind()),
                hp: unit.hp(),
                max_hp: unit.max_hp(),
                alive: unit.is_alive(),
            },
            None => ParticipantState {
                id: *id,
                owner: None,
                kind: None,
                hp: 0,
                max_hp: 0,
                alive: false,
            },
        };

        BattleState {
            id: self.id.clone(),
            hex: self.hex,
            status: self.status,
            turn_count: self.turn_count,
            max_turns: self.max_turns,
            attackers: self.attackers.iter().map(describe).collect(),
            defenders: self.defenders.iter().map(describe).collect(),
            resolution: self.resolution.clone(),
        }
    }

    /// Persistent form, with statistics computed against `roster`.
    pub fn snapshot<R: Roster + ?Sized>(&self, roster: &R) -> BattleSnapshot {
        BattleSnapshot {
            statistics: Some(self.statistics(roster)),
            ..self.snapshot_detached()
        }
    }

    /// Persistent form without statistics, for when no roster is at hand.
    pub fn snapshot_detached(&self) -> BattleSnapshot {
        BattleSnapshot {
            id: self.id.clone(),
            hex: self.hex,
            status: self.status,
            start_tick: self.start_tick,
            last_combat_tick: self.last_combat_tick,
            turn_count: self.turn_count,
            max_turns: self.max_turns,
            resolution: self.resolution.clone(),
            attackers: self.attackers.clone(),
            defenders: self.defenders.clone(),
            recent_log: self.log.recent(self.snapshot_log_entries),
            statistics: None,
            spectators: self.spectators.iter().copied().collect(),
        }
    }

    /// Rebuild a battle from a snapshot.
    pub fn from_snapshot(snapshot: BattleSnapshot, config: &BattleConfig) -> Self {
        let mut battle = Self::pending(snapshot.hex, snapshot.start_tick, config);

        if !snapshot.id.is_empty() {
            battle.id = snapshot.id;
        }
        if snapshot.max_turns > 0 {
            battle.max_turns = snapshot.max_turns;
        }
        let mut seen = BTreeSet::new();
        battle.attackers = dedup_ids(snapshot.attackers, &mut seen);
        battle.defenders = dedup_ids(snapshot.defenders, &mut seen);
        battle.last_combat_tick = snapshot.last_combat_tick.max(snapshot.start_tick);
        battle.turn_count = snapshot.turn_count;
        battle.status = snapshot.status;
        battle.resolution = snapshot.resolution;
        battle.spectators = snapshot.spectators.into_iter().collect();
        for entry in snapshot.recent_log {
            battle.log.push(entry);
        }

        if battle.status == BattleStatus::Destroyed {
            battle.attackers.clear();
            battle.defenders.clear();
            battle.spectators.clear();
        }
        battle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::{Unit, UnitKind, UnitStats};
    use rustc_hash::FxHashMap;

    fn config() -> BattleConfig {
        BattleConfig::default()
    }

    fn active_battle() -> Battle {
        Battle::new(HexCoord::new(2, 3), vec![1, 2], vec![3], 0, &config())
    }

    fn roster(ids: &[UnitId]) -> FxHashMap<UnitId, Unit> {
        ids.iter()
            .map(|&id| {
                let unit = Unit::with_stats(
                    id,
                    (id % 2) as u8,
                    UnitKind::Infantry,
                    HexCoord::new(2, 3),
                    UnitStats::new(10, 5, 1, 1),
                );
                (id, unit)
            })
            .collect()
    }

    #[test]
    fn test_new_with_both_sides_is_active() {
        let battle = active_battle();
        assert_eq!(battle.id(), "2,3");
        assert_eq!(battle.status(), BattleStatus::Active);
        assert!(matches!(
            battle.log().last().map(|e| &e.event),
            Some(BattleEvent::Initialized {
                attackers: 2,
                defenders: 1
            })
        ));
    }

    #[test]
    fn test_new_with_empty_side_is_pending() {
        let battle = Battle::new(HexCoord::new(0, 0), vec![1], vec![], 0, &config());
        assert_eq!(battle.status(), BattleStatus::Pending);
        assert!(battle.log().is_empty());
    }

    #[test]
    fn test_new_deduplicates() {
        let battle = Battle::new(HexCoord::new(0, 0), vec![1, 1, 2], vec![2, 3], 0, &config());
        assert_eq!(battle.attackers(), &[1, 2]);
        assert_eq!(battle.defenders(), &[3]);
    }

    #[test]
    fn test_two_step_initialize() {
        let mut battle = Battle::pending(HexCoord::new(1, 1), 5, &config());
        assert_eq!(
            battle.initialize(vec![], vec![2]),
            Err(BattleError::MissingAttackers(HexCoord::new(1, 1)))
        );
        assert_eq!(
            battle.initialize(vec![1], vec![]),
            Err(BattleError::MissingDefenders(HexCoord::new(1, 1)))
        );
        assert!(battle.initialize(vec![1], vec![2]).is_ok());
        assert!(battle.is_active());
        assert_eq!(
            battle.initialize(vec![1], vec![2]),
            Err(BattleError::AlreadyInitialized(HexCoord::new(1, 1)))
        );
    }

    #[test]
    fn test_next_turn_stalemates_at_cap() {
        let cfg = config().with_max_turns(3);
        let mut battle = Battle::new(HexCoord::new(0, 0), vec![1], vec![2], 0, &cfg);

        assert_eq!(battle.next_turn(), BattleStatus::Active);
        assert_eq!(battle.next_turn(), BattleStatus::Active);
        assert_eq!(battle.next_turn(), BattleStatus::Resolved);
        assert_eq!(battle.turn_count(), 3);

        let resolution = battle.resolution().unwrap();
        assert_eq!(resolution.winner, Winner::Stalemate);
        assert_eq!(resolution.end_turn, 3);

        // Terminal: further turns change nothing.
        assert_eq!(battle.next_turn(), BattleStatus::Resolved);
        assert_eq!(battle.turn_count(), 3);
    }

    #[test]
    fn test_set_resolution_is_idempotent() {
        let mut battle = active_battle();
        assert!(battle.set_resolution(Winner::Attackers, "routed"));
        assert!(!battle.set_resolution(Winner::Defenders, "late"));
        assert_eq!(battle.resolution().unwrap().winner, Winner::Attackers);
    }

    #[test]
    fn test_add_unit_only_while_active() {
        let mut battle = active_battle();
        assert!(battle.add_unit(9, Side::Defenders, 0));
        assert!(!battle.add_unit(9, Side::Attackers, 0));
        assert_eq!(battle.side_of(9), Some(Side::Defenders));

        battle.set_resolution(Winner::Defenders, "done");
        assert!(!battle.add_unit(10, Side::Attackers, 0));
    }

    #[test]
    fn test_remove_unit_logs_retreat() {
        let mut battle = active_battle();
        assert_eq!(battle.remove_unit(2, 0), Some(Side::Attackers));
        assert_eq!(battle.attackers(), &[1]);
        assert!(matches!(
            battle.log().last().map(|e| &e.event),
            Some(BattleEvent::Retreat {
                unit: 2,
                side: Side::Attackers
            })
        ));
        assert_eq!(battle.remove_unit(2, 0), None);
    }

    #[test]
    fn test_membership_events_carry_their_own_tick() {
        let mut battle = active_battle();
        battle.record_round(5, Vec::new());
        battle.conclude_round(None);

        battle.add_unit(9, Side::Defenders, 7);
        assert_eq!(battle.log().last().map(|e| e.tick), Some(7));
        battle.remove_unit(9, 8);
        assert_eq!(battle.log().last().map(|e| e.tick), Some(8));
        assert_eq!(battle.last_combat_tick(), 5);
    }

    #[test]
    fn test_alive_skips_dead_and_missing() {
        let battle = active_battle();
        let mut units = roster(&[1, 2]);
        units.get_mut(&2).unwrap().take_damage(10);

        assert_eq!(battle.alive(Side::Attackers, &units), vec![1]);
        assert!(battle.alive(Side::Defenders, &units).is_empty());
        assert_eq!(battle.alive_count(Side::Attackers, &units), 1);
    }

    #[test]
    fn test_remove_spectator() {
        let mut battle = active_battle();
        assert!(battle.add_spectator(4));
        assert!(battle.remove_spectator(4));
        assert!(!battle.remove_spectator(4));
        assert!(!battle.is_spectator(4));
    }

    #[test]
    fn test_destroy_is_inert() {
        let mut battle = active_battle();
        battle.add_spectator(4);
        battle.destroy();

        assert_eq!(battle.status(), BattleStatus::Destroyed);
        assert!(battle.attackers().is_empty());
        assert!(battle.defenders().is_empty());
        assert!(battle.spectators().is_empty());
        assert!(battle.log().is_empty());
        assert!(!battle.add_unit(5, Side::Attackers, 0));
        assert!(!battle.set_resolution(Winner::Attackers, "x"));
        assert_eq!(battle.next_turn(), BattleStatus::Destroyed);
        assert!(!battle.add_spectator(4));
    }

    #[test]
    fn test_log_trims_to_recent_half() {
        let mut battle = active_battle();
        for unit in 100..250 {
            battle.add_unit(unit, Side::Attackers, 0);
        }
        assert!(battle.log().len() <= 100);
        assert!(battle.log().len() >= 50);
        assert_eq!(battle.log().total(), 151);
        assert!(matches!(
            battle.log().last().map(|e| &e.event),
            Some(BattleEvent::Reinforcement { unit: 249, .. })
        ));
    }

    #[test]
    fn test_log_trim_boundary() {
        let mut log = BattleLog::new(4, 2);
        for tick in 0..5 {
            log.push(LogEntry {
                tick,
                event: BattleEvent::Destroyed,
            });
        }
        let ticks: Vec<Tick> = log.iter().map(|e| e.tick).collect();
        assert_eq!(ticks, vec![3, 4]);
    }

    #[test]
    fn test_statistics_count_losses() {
        let mut units = roster(&[1, 2, 3]);
        let battle = active_battle();
        units.get_mut(&2).unwrap().take_damage(100);
        units.remove(&3);

        let stats = battle.statistics(&units);
        assert_eq!(stats.attackers_alive, 1);
        assert_eq!(stats.attacker_losses, 1);
        assert_eq!(stats.defender_losses, 1);
        assert_eq!(stats.total_losses, 2);
        assert_eq!(battle.victor(&units), Some(Winner::Attackers));
    }

    #[test]
    fn test_state_marks_missing_units() {
        let units = roster(&[1, 3]);
        let state = active_battle().state(&units);
        assert_eq!(state.attackers.len(), 2);
        assert!(state.attackers[0].alive);
        assert_eq!(state.attackers[1].owner, None);
        assert!(!state.attackers[1].alive);
    }

    #[test]
    fn test_snapshot_roundtrip_keeps_identity() {
        let units = roster(&[1, 2, 3]);
        let mut battle = active_battle();
        battle.next_turn();

        let json = battle.snapshot(&units).to_json().unwrap();
        let restored = Battle::from_snapshot(BattleSnapshot::from_json(&json).unwrap(), &config());

        assert_eq!(restored.id(), battle.id());
        assert_eq!(restored.hex(), battle.hex());
        assert_eq!(restored.status(), battle.status());
        assert_eq!(restored.turn_count(), 1);
        assert!(restored.spectators().is_empty());
        assert_eq!(restored.attackers(), battle.attackers());
    }

    #[test]
    fn test_snapshot_keeps_last_ten_entries() {
        let mut battle = active_battle();
        for unit in 100..120 {
            battle.add_unit(unit, Side::Defenders, 0);
        }
        let snapshot = battle.snapshot_detached();
        assert_eq!(snapshot.recent_log.len(), 10);
        assert!(matches!(
            snapshot.recent_log.last().map(|e| &e.event),
            Some(BattleEvent::Reinforcement { unit: 119, .. })
        ));
    }

    #[test]
    fn test_sparse_snapshot_loads() {
        let snapshot = BattleSnapshot::from_json(r#"{"hex": {"q": 4, "r": -2}}"#).unwrap();
        let battle = Battle::from_snapshot(snapshot, &config());
        assert_eq!(battle.id(), "4,-2");
        assert_eq!(battle.status(), BattleStatus::Pending);
        assert_eq!(battle.max_turns(), 10);
        assert!(battle.spectators().is_empty());
    }

    #[test]
    fn test_spectators_restored_from_list() {
        let snapshot = BattleSnapshot::from_json(r#"{"spectators": [3, 1, 3]}"#).unwrap();
        let battle = Battle::from_snapshot(snapshot, &config());
        assert_eq!(battle.spectators().len(), 2);
        assert!(battle.is_spectator(1));
    }
}
