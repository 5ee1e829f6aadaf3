//! Owner of every live battle and driver of the per-tick combat loop.
//!
//! The registry keeps two indexes:
//!
//! - `battles`: one battle per hex, iterated in insertion order
//! - `unit_battles`: the hex of the battle each engaged unit fights in
//!
//! The reverse index is what guarantees a unit is never on two battlefields
//! at once. Every public operation is total: ordinary game conditions such
//! as a dead unit or a missing battle produce `false`/`None` and a warning,
//! never a panic.

use crate::battle::{Battle, BattleSnapshot, BattleStatistics, Resolution};
use crate::combat::{
    predict_battle_outcome, resolve_strike, select_target, BattlePrediction, RoundEntry, Strike,
};
use crate::config::BattleConfig;
use crate::error::BattleError;
use crate::hex::HexCoord;
use crate::terrain::{TerrainKind, TerrainLookup};
use crate::types::{BattleId, PlayerId, Side, Tick, UnitId};
use crate::unit::{Combatant, Roster};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Attacks exchanged in one battle during one tick.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundReport {
    pub battle_id: BattleId,
    pub hex: HexCoord,
    /// Turn number of this round, starting at 1.
    pub turn: u32,
    pub entries: Vec<RoundEntry>,
}

/// A battle that ended and left the registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleEnd {
    pub battle_id: BattleId,
    pub hex: HexCoord,
    pub resolution: Resolution,
    pub statistics: BattleStatistics,
}

/// Everything that happened during one call to [`BattleRegistry::tick`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    pub tick: Tick,
    pub rounds: Vec<RoundReport>,
    pub ended: Vec<BattleEnd>,
}

impl TickReport {
    /// True if no battle fought or ended.
    pub fn is_quiet(&self) -> bool {
        self.rounds.is_empty() && self.ended.is_empty()
    }
}

/// Registry of all battles in the simulation.
#[derive(Debug)]
pub struct BattleRegistry<G = ChaCha8Rng> {
    config: BattleConfig,
    battles: FxHashMap<HexCoord, Battle>,
    /// Battle hexes in insertion order.
    order: Vec<HexCoord>,
    unit_battles: FxHashMap<UnitId, HexCoord>,
    /// Battles ended between ticks, reported by the next `tick`.
    concluded: Vec<BattleEnd>,
    rng: G,
}

impl BattleRegistry<ChaCha8Rng> {
    /// Create a registry whose random source is seeded from `config.seed`.
    pub fn new(config: BattleConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self::with_rng(config, rng)
    }
}

impl Default for BattleRegistry<ChaCha8Rng> {
    fn default() -> Self {
        Self::new(BattleConfig::default())
    }
}

impl<G: Rng> BattleRegistry<G> {
    /// Create a registry drawing combat variance from `rng`.
    pub fn with_rng(config: BattleConfig, rng: G) -> Self {
        Self {
            config,
            battles: FxHashMap::default(),
            order: Vec::new(),
            unit_battles: FxHashMap::default(),
            concluded: Vec::new(),
            rng,
        }
    }

    pub fn config(&self) -> &BattleConfig {
        &self.config
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn get_battle_at(&self, hex: HexCoord) -> Option<&Battle> {
        self.battles.get(&hex)
    }

    pub fn get_unit_battle(&self, unit: UnitId) -> Option<&Battle> {
        self.unit_battles
            .get(&unit)
            .and_then(|hex| self.battles.get(hex))
    }

    pub fn is_engaged(&self, unit: UnitId) -> bool {
        self.unit_battles.contains_key(&unit)
    }

    /// Live battles in the order they were started.
    pub fn active_battles(&self) -> Vec<&Battle> {
        self.order
            .iter()
            .filter_map(|hex| self.battles.get(hex))
            .filter(|battle| battle.is_active())
            .collect()
    }

    pub fn battle_count(&self) -> usize {
        self.battles.len()
    }

    /// True when the battle at `hex` has a side with no living member left.
    pub fn should_battle_end<R: Roster + ?Sized>(&self, hex: HexCoord, roster: &R) -> bool {
        self.battles
            .get(&hex)
            .is_some_and(|battle| battle.victor(roster).is_some())
    }

    /// Outcome prediction for the battle at `hex`, from its living units.
    pub fn predict_at<R, T>(&self, hex: HexCoord, roster: &R, terrain: &T) -> Option<BattlePrediction>
    where
        R: Roster + ?Sized,
        T: TerrainLookup + ?Sized,
    {
        let battle = self.battles.get(&hex)?;
        let attackers = living_units(battle, Side::Attackers, roster);
        let defenders = living_units(battle, Side::Defenders, roster);

        Some(predict_battle_outcome(
            &attackers,
            &defenders,
            terrain.terrain_at(hex),
        ))
    }

    /// Snapshots of every live battle, in insertion order.
    pub fn snapshots<R: Roster + ?Sized>(&self, roster: &R) -> Vec<BattleSnapshot> {
        self.order
            .iter()
            .filter_map(|hex| self.battles.get(hex))
            .map(|battle| battle.snapshot(roster))
            .collect()
    }

    // =========================================================================
    // Battle membership
    // =========================================================================

    /// Start a battle at `hex`, or fold the units into the one already there.
    ///
    /// Units that are unknown, dead, or already fighting elsewhere are left
    /// out. No battle is created unless both sides keep at least one unit.
    pub fn start_battle<R: Roster + ?Sized>(
        &mut self,
        hex: HexCoord,
        attackers: &[UnitId],
        defenders: &[UnitId],
        roster: &R,
        tick: Tick,
    ) -> Option<&Battle> {
        if self.battles.contains_key(&hex) {
            for &unit in attackers.iter().chain(defenders) {
                self.add_unit_to_battle(unit, hex, roster, tick);
            }
            return self.battles.get(&hex);
        }

        let attackers = self.admissible(attackers, roster);
        let defenders: Vec<UnitId> = self
            .admissible(defenders, roster)
            .into_iter()
            .filter(|id| !attackers.contains(id))
            .collect();
        if attackers.is_empty() || defenders.is_empty() {
            tracing::warn!(
                %hex,
                attackers = attackers.len(),
                defenders = defenders.len(),
                "Not starting battle: a side has no eligible units"
            );
            return None;
        }

        let battle = Battle::new(hex, attackers, defenders, tick, &self.config);
        for unit in battle.participants() {
            self.unit_battles.insert(unit, hex);
        }
        tracing::debug!(battle = %battle.id(), tick, "Battle started");

        self.order.push(hex);
        self.battles.insert(hex, battle);
        self.battles.get(&hex)
    }

    /// Units from `ids` that may join a new battle, without repeats.
    fn admissible<R: Roster + ?Sized>(&self, ids: &[UnitId], roster: &R) -> Vec<UnitId> {
        let mut seen = BTreeSet::new();
        ids.iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .filter(|id| {
                if let Some(hex) = self.unit_battles.get(id) {
                    tracing::warn!(unit = id, battle_hex = %hex, "Unit already engaged");
                    return false;
                }
                if !roster.is_alive(*id) {
                    tracing::warn!(unit = id, "Unit is dead or unknown");
                    return false;
                }
                true
            })
            .collect()
    }

    /// Add a unit to the battle at `hex`.
    ///
    /// The unit joins the side of the first participant sharing its owner;
    /// a faction new to the battle joins the attackers.
    pub fn add_unit_to_battle<R: Roster + ?Sized>(
        &mut self,
        unit: UnitId,
        hex: HexCoord,
        roster: &R,
        tick: Tick,
    ) -> bool {
        let Some(battle) = self.battles.get_mut(&hex) else {
            tracing::warn!(unit, %hex, "No battle to join");
            return false;
        };
        if !battle.is_active() {
            tracing::warn!(unit, battle = %battle.id(), "Battle is not accepting units");
            return false;
        }
        if let Some(engaged) = self.unit_battles.get(&unit) {
            tracing::warn!(unit, battle_hex = %engaged, "Unit already engaged");
            return false;
        }
        let Some(candidate) = roster.unit(unit).filter(|u| u.is_alive()) else {
            tracing::warn!(unit, "Unit is dead or unknown");
            return false;
        };

        let side = Self::side_for_owner(battle, candidate.owner(), roster).unwrap_or(Side::Attackers);
        if !battle.add_unit(unit, side, tick) {
            return false;
        }
        self.unit_battles.insert(unit, hex);
        true
    }

    /// Side already holding a unit of `owner`, if any.
    fn side_for_owner<R: Roster + ?Sized>(battle: &Battle, owner: PlayerId, roster: &R) -> Option<Side> {
        [Side::Attackers, Side::Defenders].into_iter().find(|&side| {
            battle
                .side(side)
                .iter()
                .filter_map(|id| roster.unit(*id))
                .any(|unit| unit.owner() == owner)
        })
    }

    /// Pull a unit out of whatever battle it is in.
    ///
    /// If that leaves a side without living units the battle ends at once;
    /// the end is reported by the next `tick`.
    pub fn retreat_unit<R: Roster + ?Sized>(&mut self, unit: UnitId, roster: &R, tick: Tick) -> bool {
        let Some(&hex) = self.unit_battles.get(&unit) else {
            tracing::warn!(unit, "Unit is not in a battle");
            return false;
        };
        let Some(battle) = self.battles.get_mut(&hex) else {
            self.unit_battles.remove(&unit);
            tracing::warn!(unit, %hex, "Dropped stale battle index entry");
            return false;
        };
        let Some(side) = battle.remove_unit(unit, tick) else {
            return false;
        };
        self.unit_battles.remove(&unit);

        if let Some(winner) = battle.victor(roster) {
            battle.set_resolution(winner, format!("{} withdrew", side));
            if let Some(end) = self.conclude(hex, roster) {
                self.concluded.push(end);
            }
        }
        true
    }

    /// Register a battle rebuilt from a snapshot.
    ///
    /// Refused if the hex is taken, the battle is not active, or one of its
    /// units is already engaged.
    pub fn restore_battle(&mut self, snapshot: BattleSnapshot) -> bool {
        let battle = Battle::from_snapshot(snapshot, &self.config);
        let hex = battle.hex();

        if self.battles.contains_key(&hex) || !battle.is_active() {
            tracing::warn!(battle = %battle.id(), "Cannot restore battle");
            return false;
        }
        if let Some(unit) = battle.participants().find(|id| self.unit_battles.contains_key(id)) {
            tracing::warn!(battle = %battle.id(), unit, "Cannot restore battle: unit already engaged");
            return false;
        }

        for unit in battle.participants() {
            self.unit_battles.insert(unit, hex);
        }
        self.order.push(hex);
        self.battles.insert(hex, battle);
        true
    }

    /// Add an observer to the battle at `hex`.
    pub fn add_spectator(&mut self, hex: HexCoord, player: PlayerId) -> bool {
        self.battles
            .get_mut(&hex)
            .is_some_and(|battle| battle.add_spectator(player))
    }

    pub fn remove_spectator(&mut self, hex: HexCoord, player: PlayerId) -> bool {
        self.battles
            .get_mut(&hex)
            .is_some_and(|battle| battle.remove_spectator(player))
    }

    /// Tear down the battle at `hex` without a combat outcome.
    pub fn destroy_battle(&mut self, hex: HexCoord) -> bool {
        match self.finalize(hex) {
            Some(mut battle) => {
                battle.destroy();
                true
            }
            None => false,
        }
    }

    /// Remove the battle at `hex` and release its units.
    fn finalize(&mut self, hex: HexCoord) -> Option<Battle> {
        let battle = self.battles.remove(&hex)?;
        self.order.retain(|h| *h != hex);
        self.unit_battles.retain(|_, h| *h != hex);
        Some(battle)
    }

    /// Finalize a resolved battle and describe how it ended.
    fn conclude<R: Roster + ?Sized>(&mut self, hex: HexCoord, roster: &R) -> Option<BattleEnd> {
        let battle = self.finalize(hex)?;
        let resolution = battle.resolution().cloned()?;
        tracing::info!(
            battle = %battle.id(),
            winner = %resolution.winner,
            turns = resolution.end_turn,
            "Battle ended"
        );
        Some(BattleEnd {
            battle_id: battle.id().to_string(),
            hex,
            statistics: battle.statistics(roster),
            resolution,
        })
    }

    // =========================================================================
    // Contact detection
    // =========================================================================

    /// Start or grow battles wherever opposing units share a hex.
    ///
    /// Only living units not already in a battle are considered. On a new
    /// battlefield the owner of the lowest unit id defends and everyone else
    /// attacks. Returns the hexes whose battles started or grew.
    pub fn engage_contacts<R: Roster + ?Sized>(&mut self, roster: &R, tick: Tick) -> Vec<HexCoord> {
        let mut by_hex: BTreeMap<HexCoord, Vec<(UnitId, PlayerId)>> = BTreeMap::new();
        for id in roster.unit_ids() {
            if self.is_engaged(id) {
                continue;
            }
            if let Some(unit) = roster.unit(id).filter(|u| u.is_alive()) {
                by_hex
                    .entry(unit.coords())
                    .or_default()
                    .push((id, unit.owner()));
            }
        }

        let mut touched = Vec::new();
        for (hex, units) in by_hex {
            if self.battles.contains_key(&hex) {
                let joined = units
                    .iter()
                    .filter(|(id, _)| self.add_unit_to_battle(*id, hex, roster, tick))
                    .count();
                if joined > 0 {
                    touched.push(hex);
                }
                continue;
            }

            let Some(&(_, defender_owner)) = units.first() else {
                continue;
            };
            let (defenders, attackers): (Vec<_>, Vec<_>) =
                units.into_iter().partition(|(_, owner)| *owner == defender_owner);
            if attackers.is_empty() {
                continue;
            }

            let attackers: Vec<UnitId> = attackers.into_iter().map(|(id, _)| id).collect();
            let defenders: Vec<UnitId> = defenders.into_iter().map(|(id, _)| id).collect();
            if self
                .start_battle(hex, &attackers, &defenders, roster, tick)
                .is_some()
            {
                touched.push(hex);
            }
        }

        touched
    }

    // =========================================================================
    // Simulation loop
    // =========================================================================

    /// Advance every due battle by one round.
    ///
    /// Battles are visited in insertion order. A battle is due when at least
    /// `round_interval` ticks have passed since its last round. Battles that
    /// end are removed after the pass and their units released.
    pub fn tick<R, T>(&mut self, tick: Tick, roster: &mut R, terrain: &T) -> TickReport
    where
        R: Roster + ?Sized,
        T: TerrainLookup + ?Sized,
    {
        let mut report = TickReport {
            tick,
            ended: std::mem::take(&mut self.concluded),
            ..Default::default()
        };
        let mut finished = Vec::new();
        let interval = self.config.round_interval;

        for &hex in &self.order {
            let Some(battle) = self.battles.get_mut(&hex) else {
                continue;
            };
            if battle.status().is_terminal() {
                finished.push(hex);
                continue;
            }
            if !battle.round_due(tick, interval) {
                continue;
            }

            let entries = match Self::resolve_round(battle, roster, terrain.terrain_at(hex), &mut self.rng) {
                Ok(entries) => entries,
                Err(err) => {
                    tracing::warn!(battle = %battle.id(), error = %err, "Skipping battle this tick");
                    continue;
                }
            };

            let turn = battle.turn_count() + 1;
            battle.record_round(tick, entries.clone());
            let victor = battle.victor(&*roster);
            if battle.conclude_round(victor).is_terminal() {
                finished.push(hex);
            }

            report.rounds.push(RoundReport {
                battle_id: battle.id().to_string(),
                hex,
                turn,
                entries,
            });
        }

        for hex in finished {
            if let Some(end) = self.conclude(hex, &*roster) {
                report.ended.push(end);
            }
        }

        report
    }

    /// Resolve one simultaneous exchange: the attackers' pass, then the
    /// defenders' pass.
    fn resolve_round<R>(
        battle: &Battle,
        roster: &mut R,
        terrain: Option<TerrainKind>,
        rng: &mut G,
    ) -> Result<Vec<RoundEntry>, BattleError>
    where
        R: Roster + ?Sized,
    {
        if !battle.is_active() {
            return Err(BattleError::NotActive(battle.hex()));
        }

        let mut entries = Vec::new();
        for side in [Side::Attackers, Side::Defenders] {
            Self::strike_pass(battle.side(side), battle.side(side.opponent()), roster, terrain, rng, &mut entries);
        }
        Ok(entries)
    }

    /// Every living unit in `actors` strikes its preferred target in `targets`.
    fn strike_pass<R>(
        actors: &[UnitId],
        targets: &[UnitId],
        roster: &mut R,
        terrain: Option<TerrainKind>,
        rng: &mut G,
        entries: &mut Vec<RoundEntry>,
    ) where
        R: Roster + ?Sized,
    {
        for &actor_id in actors {
            // Liveness is checked per actor: units felled earlier in this
            // round do not strike back.
            let Some(actor) = roster.unit(actor_id).filter(|u| u.is_alive()) else {
                continue;
            };
            let candidates = targets.iter().filter_map(|id| roster.unit(*id));
            let Some(target) = select_target(actor, candidates).map(|t| t.id()) else {
                continue;
            };
            let strike = Strike::from_unit(actor);

            let Some(defender) = roster.unit_mut(target) else {
                continue;
            };
            let outcome = resolve_strike(strike, defender, terrain, rng);
            entries.push(RoundEntry {
                attacker: actor_id,
                target,
                outcome,
            });
        }
    }
}

fn living_units<'a, R: Roster + ?Sized>(battle: &Battle, side: Side, roster: &'a R) -> Vec<&'a R::Unit> {
    battle
        .alive(side, roster)
        .into_iter()
        .filter_map(|id| roster.unit(id))
        .collect()
}
