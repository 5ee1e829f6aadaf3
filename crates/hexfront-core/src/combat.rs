//! Combat resolution between individual units.
//!
//! Everything here is a pure computation over its inputs plus an injected
//! random source. The only side effect is the `take_damage` call on the
//! defender, which belongs to the combatant itself.
//!
//! Damage pipeline for one attack:
//!
//! 1. base attack, at least 1
//! 2. terrain modifier (attacker's terrain bonus over defender's)
//! 3. unit-type modifier
//! 4. random variance in `[0.8, 1.2]`
//! 5. floor, subtract defense, clamp to at least 1

use crate::hex::HexCoord;
use crate::terrain::TerrainKind;
use crate::types::UnitId;
use crate::unit::{Combatant, Roster, UnitKind};
use rand::Rng;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// Lower bound of the damage variance roll.
pub const VARIANCE_MIN: f64 = 0.8;
/// Upper bound of the damage variance roll.
pub const VARIANCE_MAX: f64 = 1.2;
/// Smallest fraction of attack an area strike keeps at its edge.
pub const AOE_MIN_FALLOFF: f64 = 0.3;
/// Strength one round is expected to grind through.
const STRENGTH_PER_ROUND: f64 = 10.0;

/// How a single attack ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrikeResult {
    /// One side was already dead; nothing happened.
    Invalid,
    /// Damage dealt, defender survived.
    Hit,
    /// Defender died from this attack.
    Victory,
}

/// Result of one attack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatOutcome {
    pub result: StrikeResult,
    pub damage: u32,
}

impl CombatOutcome {
    /// The no-op outcome for attacks involving a dead unit.
    pub const INVALID: CombatOutcome = CombatOutcome {
        result: StrikeResult::Invalid,
        damage: 0,
    };

    /// True if the attack killed its target.
    pub fn is_kill(&self) -> bool {
        self.result == StrikeResult::Victory
    }
}

/// One entry of a round's combat log, emitted for presentation layers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundEntry {
    pub attacker: UnitId,
    pub target: UnitId,
    pub outcome: CombatOutcome,
}

/// The attacking half of an attack, detached from the attacking unit.
///
/// Holding a copy lets the registry strike a unit that lives in the same
/// roster as the attacker, and lets area attacks weaken the blow.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Strike {
    pub attack: f64,
    pub kind: UnitKind,
    pub alive: bool,
}

impl Strike {
    /// Capture the attacking stats of a combatant.
    pub fn from_unit<C: Combatant + ?Sized>(unit: &C) -> Self {
        Self {
            attack: f64::from(unit.attack()),
            kind: unit.kind(),
            alive: unit.is_alive(),
        }
    }

    /// Same strike with its attack multiplied by `factor`.
    pub fn scaled(self, factor: f64) -> Self {
        Self {
            attack: self.attack * factor,
            ..self
        }
    }
}

/// Damage multiplier for `attacker` kind hitting `defender` kind.
pub fn type_modifier(attacker: UnitKind, defender: UnitKind) -> f64 {
    use UnitKind::*;

    match (attacker, defender) {
        (Cavalry, Infantry) => 1.3,
        (Cavalry, Archer) => 1.4,
        (Infantry, Archer) => 1.2,
        (Infantry, Cavalry) => 0.8,
        (Archer, Cavalry) => 1.1,
        (Archer, Infantry) => 0.9,
        (Catapult, Building) => 2.0,
        (Warrior, Archer) => 1.1,
        (Knight, Infantry) => 1.3,
        (Knight, Warrior) => 1.2,
        _ => 1.0,
    }
}

/// Terrain multiplier for an attacker of `kind`; 1.0 without terrain.
pub fn terrain_modifier(kind: UnitKind, terrain: Option<TerrainKind>) -> f64 {
    terrain.map_or(1.0, |t| t.combat_modifier(kind))
}

/// Draw a damage variance factor.
pub fn roll_variance<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.gen_range(VARIANCE_MIN..=VARIANCE_MAX)
}

/// Damage of a strike for a given variance. Never less than 1.
pub fn compute_damage(
    strike: &Strike,
    defender_kind: UnitKind,
    defender_defense: u32,
    terrain: Option<TerrainKind>,
    variance: f64,
) -> u32 {
    let base = strike.attack.max(1.0);
    let modified = base
        * terrain_modifier(strike.kind, terrain)
        * type_modifier(strike.kind, defender_kind)
        * variance;

    // f64 -> i64 saturates; clamp again before narrowing so huge hits cap
    // at u32::MAX instead of wrapping.
    let raw = modified.floor() as i64 - i64::from(defender_defense);
    u32::try_from(raw.max(1)).unwrap_or(u32::MAX)
}

/// Resolve a detached strike against a defender.
pub fn resolve_strike<D, R>(
    strike: Strike,
    defender: &mut D,
    terrain: Option<TerrainKind>,
    rng: &mut R,
) -> CombatOutcome
where
    D: Combatant + ?Sized,
    R: Rng + ?Sized,
{
    if !strike.alive || !defender.is_alive() {
        return CombatOutcome::INVALID;
    }

    let variance = roll_variance(rng);
    let damage = compute_damage(
        &strike,
        defender.kind(),
        defender.defense(),
        terrain,
        variance,
    );
    defender.take_damage(damage);

    let result = if defender.is_alive() {
        StrikeResult::Hit
    } else {
        StrikeResult::Victory
    };

    CombatOutcome { result, damage }
}

/// Resolve one attack of `attacker` on `defender`.
///
/// Returns [`CombatOutcome::INVALID`] without touching anything if either
/// side is already dead.
pub fn resolve_combat<A, D, R>(
    attacker: &A,
    defender: &mut D,
    terrain: Option<TerrainKind>,
    rng: &mut R,
) -> CombatOutcome
where
    A: Combatant + ?Sized,
    D: Combatant + ?Sized,
    R: Rng + ?Sized,
{
    resolve_strike(Strike::from_unit(attacker), defender, terrain, rng)
}

/// Expected damage of an attack without randomness (variance 1.0).
pub fn preview_damage<A, D>(attacker: &A, defender: &D, terrain: Option<TerrainKind>) -> u32
where
    A: Combatant + ?Sized,
    D: Combatant + ?Sized,
{
    compute_damage(
        &Strike::from_unit(attacker),
        defender.kind(),
        defender.defense(),
        terrain,
        1.0,
    )
}

/// Pick the target `attacker` should hit first.
///
/// Only living candidates the attacker can reach are considered. Preference
/// goes to the lowest range, then the lowest hp; unit id breaks exact ties
/// so the choice never depends on candidate order.
pub fn select_target<'a, C, I>(attacker: &C, candidates: I) -> Option<&'a C>
where
    C: Combatant + 'a,
    I: IntoIterator<Item = &'a C>,
{
    candidates
        .into_iter()
        .filter(|c| c.is_alive() && attacker.can_attack(c))
        .min_by_key(|c| (c.range(), c.hp(), c.id()))
}

/// Predicted balance of a pending or ongoing engagement.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BattlePrediction {
    pub attacker_strength: f64,
    pub defender_strength: f64,
    pub attacker_win_chance: f64,
    pub defender_win_chance: f64,
    /// Coarse heuristic, not a guarantee.
    pub estimated_rounds: u32,
}

/// Strength of one side against the other.
fn side_strength<C: Combatant>(side: &[&C], opposing: &[&C], terrain: Option<TerrainKind>) -> f64 {
    // Terrain is read against the first opposing unit; no opponent, no modifier.
    let has_opponent = !opposing.is_empty();

    side.iter()
        .filter(|unit| unit.max_hp() > 0)
        .map(|unit| {
            let health = f64::from(unit.hp()) / f64::from(unit.max_hp());
            let modifier = if has_opponent {
                terrain_modifier(unit.kind(), terrain)
            } else {
                1.0
            };
            f64::from(unit.attack()) * health * modifier
        })
        .sum()
}

/// Predict which side is favoured to win.
pub fn predict_battle_outcome<C: Combatant>(
    attackers: &[&C],
    defenders: &[&C],
    terrain: Option<TerrainKind>,
) -> BattlePrediction {
    let attacker_strength = side_strength(attackers, defenders, terrain);
    let defender_strength = side_strength(defenders, attackers, terrain);
    let total = attacker_strength + defender_strength;

    let (attacker_win_chance, defender_win_chance) = if total > 0.0 {
        (attacker_strength / total, defender_strength / total)
    } else {
        (0.5, 0.5)
    };

    BattlePrediction {
        attacker_strength,
        defender_strength,
        attacker_win_chance,
        defender_win_chance,
        estimated_rounds: (total / STRENGTH_PER_ROUND).ceil() as u32,
    }
}

/// Resolve a list of `(attacker, target)` pairs in order.
///
/// Pairs naming a unit missing from the roster produce an invalid entry.
pub fn resolve_batch_combat<S, R>(
    roster: &mut S,
    pairs: &[(UnitId, UnitId)],
    terrain: Option<TerrainKind>,
    rng: &mut R,
) -> Vec<RoundEntry>
where
    S: Roster + ?Sized,
    R: Rng + ?Sized,
{
    pairs
        .iter()
        .map(|&(attacker, target)| {
            let outcome = match roster.unit(attacker).map(Strike::from_unit) {
                Some(strike) => match roster.unit_mut(target) {
                    Some(defender) => resolve_strike(strike, defender, terrain, rng),
                    None => CombatOutcome::INVALID,
                },
                None => CombatOutcome::INVALID,
            };
            RoundEntry {
                attacker,
                target,
                outcome,
            }
        })
        .collect()
}

/// Attack multiplier at `distance` from the impact point.
pub fn aoe_falloff(distance: u32, radius: u32) -> f64 {
    if radius == 0 {
        return 1.0;
    }
    let ratio = f64::from(distance) / f64::from(radius);
    (1.0 - ratio * 0.5).max(AOE_MIN_FALLOFF)
}

/// Hit every living enemy of `attacker` within `radius` of `impact`.
///
/// Each target takes a strike weakened by [`aoe_falloff`]. Targets are
/// processed in ascending id order.
pub fn resolve_aoe_combat<S, R>(
    roster: &mut S,
    attacker: UnitId,
    impact: HexCoord,
    radius: u32,
    terrain: Option<TerrainKind>,
    rng: &mut R,
) -> Vec<RoundEntry>
where
    S: Roster + ?Sized,
    R: Rng + ?Sized,
{
    let Some((strike, owner)) = roster
        .unit(attacker)
        .filter(|unit| unit.is_alive())
        .map(|unit| (Strike::from_unit(unit), unit.owner()))
    else {
        return Vec::new();
    };

    let area: FxHashSet<HexCoord> = impact.hexes_in_radius(radius).into_iter().collect();
    let mut entries = Vec::new();
    for target in roster.unit_ids() {
        if target == attacker {
            continue;
        }
        let Some(defender) = roster.unit_mut(target) else {
            continue;
        };
        if defender.owner() == owner || !defender.is_alive() {
            continue;
        }
        let coords = defender.coords();
        if !area.contains(&coords) {
            continue;
        }
        let distance = coords.distance(&impact);

        let falloff = aoe_falloff(distance, radius);
        let outcome = resolve_strike(strike.scaled(falloff), defender, terrain, rng);
        entries.push(RoundEntry {
            attacker,
            target,
            outcome,
        });
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::{Unit, UnitStats};
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rustc_hash::FxHashMap;

    fn unit(id: UnitId, owner: u8, kind: UnitKind, stats: UnitStats) -> Unit {
        Unit::with_stats(id, owner, kind, HexCoord::new(0, 0), stats)
    }

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    #[test]
    fn test_type_modifier_table() {
        assert_eq!(type_modifier(UnitKind::Cavalry, UnitKind::Infantry), 1.3);
        assert_eq!(type_modifier(UnitKind::Cavalry, UnitKind::Archer), 1.4);
        assert_eq!(type_modifier(UnitKind::Infantry, UnitKind::Cavalry), 0.8);
        assert_eq!(type_modifier(UnitKind::Catapult, UnitKind::Building), 2.0);
        assert_eq!(type_modifier(UnitKind::Knight, UnitKind::Warrior), 1.2);
        assert_eq!(type_modifier(UnitKind::Archer, UnitKind::Archer), 1.0);
    }

    #[test]
    fn test_cavalry_charges_infantry_in_forest() {
        let attacker = unit(1, 0, UnitKind::Cavalry, UnitStats::new(50, 10, 0, 1));
        let mut defender = unit(2, 1, UnitKind::Infantry, UnitStats::new(20, 5, 3, 1));
        let mut rng = rng();

        // floor(10 / 1.2 * 1.3 * [0.8, 1.2]) - 3
        let low = (10.0 / 1.2 * 1.3 * VARIANCE_MIN).floor() as u32 - 3;
        let high = (10.0 * (1.0 / 1.2) * 1.3 * VARIANCE_MAX).floor() as u32 - 3;

        let outcome = resolve_combat(
            &attacker,
            &mut defender,
            Some(TerrainKind::Forest),
            &mut rng,
        );

        assert_eq!(outcome.result, StrikeResult::Hit);
        assert!(
            (low..=high).contains(&outcome.damage),
            "damage {} outside [{}, {}]",
            outcome.damage,
            low,
            high
        );
        assert_eq!(defender.hp, 20 - outcome.damage);
    }

    #[test]
    fn test_huge_attack_caps_instead_of_wrapping() {
        // floor(2^31 * 2.0) is exactly 2^32, one past u32::MAX.
        let catapult = unit(1, 0, UnitKind::Catapult, UnitStats::new(10, 1 << 31, 0, 4));
        let mut building = unit(2, 1, UnitKind::Building, UnitStats::new(200, 0, 0, 0));

        assert_eq!(preview_damage(&catapult, &building, None), u32::MAX);

        let outcome = resolve_combat(&catapult, &mut building, None, &mut rng());
        assert!(outcome.damage >= 1);
        assert_eq!(outcome.result, StrikeResult::Victory);
        assert_eq!(building.hp, 0);
    }

    #[test]
    fn test_dead_participant_is_invalid() {
        let mut attacker = unit(1, 0, UnitKind::Warrior, UnitStats::new(10, 10, 0, 1));
        let mut defender = unit(2, 1, UnitKind::Warrior, UnitStats::new(10, 10, 0, 1));
        attacker.take_damage(10);

        let outcome = resolve_combat(&attacker, &mut defender, None, &mut rng());
        assert_eq!(outcome, CombatOutcome::INVALID);
        assert_eq!(defender.hp, 10);
    }

    #[test]
    fn test_killing_blow_reports_victory() {
        let attacker = unit(1, 0, UnitKind::Knight, UnitStats::new(10, 50, 0, 1));
        let mut defender = unit(2, 1, UnitKind::Warrior, UnitStats::new(1, 1, 0, 1));

        let outcome = resolve_combat(&attacker, &mut defender, None, &mut rng());
        assert!(outcome.is_kill());
        assert!(!defender.is_alive());
    }

    #[test]
    fn test_heavy_defense_still_takes_one() {
        let attacker = unit(1, 0, UnitKind::Other, UnitStats::new(10, 0, 0, 1));
        let mut defender = unit(2, 1, UnitKind::Building, UnitStats::new(100, 0, 500, 0));

        let outcome = resolve_combat(&attacker, &mut defender, None, &mut rng());
        assert_eq!(outcome.damage, 1);
        assert_eq!(defender.hp, 99);
    }

    #[test]
    fn test_ship_favoured_on_water() {
        let ship = unit(1, 0, UnitKind::Ship, UnitStats::new(10, 20, 0, 2));
        let soldier = unit(2, 0, UnitKind::Infantry, UnitStats::new(10, 20, 0, 1));
        let target = unit(3, 1, UnitKind::Other, UnitStats::new(100, 0, 0, 1));

        let water = Some(TerrainKind::Water);
        assert!(preview_damage(&ship, &target, water) > preview_damage(&soldier, &target, water));
    }

    #[test]
    fn test_select_target_prefers_short_range_then_low_hp() {
        let attacker = unit(1, 0, UnitKind::Cavalry, UnitStats::new(10, 10, 0, 1));
        let archer = unit(2, 1, UnitKind::Archer, UnitStats::new(5, 5, 0, 3));
        let mut tough = unit(3, 1, UnitKind::Infantry, UnitStats::new(30, 5, 0, 1));
        let mut weak = unit(4, 1, UnitKind::Infantry, UnitStats::new(30, 5, 0, 1));
        tough.take_damage(5);
        weak.take_damage(20);

        let chosen = select_target(&attacker, [&archer, &tough, &weak]);
        assert_eq!(chosen.map(|u| u.id), Some(4));
    }

    #[test]
    fn test_select_target_ignores_dead() {
        let attacker = unit(1, 0, UnitKind::Cavalry, UnitStats::new(10, 10, 0, 1));
        let mut dead = unit(2, 1, UnitKind::Infantry, UnitStats::new(1, 5, 0, 1));
        dead.take_damage(1);

        assert!(select_target(&attacker, [&dead]).is_none());
        assert!(select_target(&attacker, std::iter::empty::<&Unit>()).is_none());
    }

    #[test]
    fn test_select_target_order_independent() {
        let attacker = unit(1, 0, UnitKind::Cavalry, UnitStats::new(10, 10, 0, 1));
        let a = unit(5, 1, UnitKind::Infantry, UnitStats::new(10, 5, 0, 1));
        let b = unit(3, 1, UnitKind::Infantry, UnitStats::new(10, 5, 0, 1));
        let c = unit(9, 1, UnitKind::Infantry, UnitStats::new(10, 5, 0, 1));

        let forward = select_target(&attacker, [&a, &b, &c]).map(|u| u.id);
        let reverse = select_target(&attacker, [&c, &b, &a]).map(|u| u.id);
        assert_eq!(forward, Some(3));
        assert_eq!(forward, reverse);
    }

    #[test]
    fn test_predict_even_sides() {
        let a = unit(1, 0, UnitKind::Other, UnitStats::new(10, 10, 0, 1));
        let d = unit(2, 1, UnitKind::Other, UnitStats::new(10, 10, 0, 1));

        let prediction = predict_battle_outcome(&[&a], &[&d], None);
        assert_eq!(prediction.attacker_win_chance, 0.5);
        assert_eq!(prediction.defender_win_chance, 0.5);
        assert_eq!(prediction.estimated_rounds, 2);
    }

    #[test]
    fn test_predict_scales_by_health() {
        let mut a = unit(1, 0, UnitKind::Other, UnitStats::new(10, 10, 0, 1));
        let d = unit(2, 1, UnitKind::Other, UnitStats::new(10, 10, 0, 1));
        a.take_damage(5);

        let prediction = predict_battle_outcome(&[&a], &[&d], None);
        assert!((prediction.attacker_strength - 5.0).abs() < 1e-9);
        assert!(prediction.defender_win_chance > prediction.attacker_win_chance);
    }

    #[test]
    fn test_predict_empty_is_even() {
        let prediction = predict_battle_outcome::<Unit>(&[], &[], Some(TerrainKind::Hill));
        assert_eq!(prediction.attacker_win_chance, 0.5);
        assert_eq!(prediction.estimated_rounds, 0);
    }

    #[test]
    fn test_aoe_falloff() {
        assert_eq!(aoe_falloff(0, 0), 1.0);
        assert_eq!(aoe_falloff(0, 4), 1.0);
        assert_eq!(aoe_falloff(2, 4), 0.75);
        assert_eq!(aoe_falloff(4, 4), 0.5);
        assert_eq!(aoe_falloff(20, 4), AOE_MIN_FALLOFF);
    }

    #[test]
    fn test_aoe_hits_only_enemies_in_radius() {
        let mut roster: FxHashMap<UnitId, Unit> = FxHashMap::default();
        let stats = UnitStats::new(100, 20, 0, 1);
        let mut place = |id: UnitId, owner: u8, q: i32, r: i32| {
            roster.insert(
                id,
                Unit::with_stats(id, owner, UnitKind::Catapult, HexCoord::new(q, r), stats),
            );
        };
        place(1, 0, 0, 0); // attacker
        place(2, 1, 1, 0); // enemy in range
        place(3, 0, 1, 0); // friendly in range
        place(4, 1, 5, 5); // enemy out of range

        let entries =
            resolve_aoe_combat(&mut roster, 1, HexCoord::new(1, 0), 2, None, &mut rng());

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].target, 2);
        assert!(roster[&2].hp < 100);
        assert_eq!(roster[&3].hp, 100);
        assert_eq!(roster[&4].hp, 100);
    }

    #[test]
    fn test_batch_combat_reports_missing_units() {
        let mut roster: FxHashMap<UnitId, Unit> = FxHashMap::default();
        roster.insert(1, unit(1, 0, UnitKind::Knight, UnitStats::new(50, 15, 0, 1)));
        roster.insert(2, unit(2, 1, UnitKind::Warrior, UnitStats::new(50, 10, 0, 1)));

        let entries = resolve_batch_combat(&mut roster, &[(1, 2), (1, 99)], None, &mut rng());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].outcome.result, StrikeResult::Hit);
        assert_eq!(entries[1].outcome, CombatOutcome::INVALID);
    }

    proptest! {
        #[test]
        fn damage_is_never_below_one(
            attack in prop_oneof![0u32..200, (1u32 << 30)..=u32::MAX],
            defense in 0u32..400,
            hp in 1u32..500,
            seed in any::<u64>(),
            terrain_index in 0usize..8,
        ) {
            let attacker = unit(1, 0, UnitKind::Cavalry, UnitStats::new(10, attack, 0, 1));
            let mut defender = unit(2, 1, UnitKind::Archer, UnitStats::new(hp, 0, defense, 1));
            let terrain = TerrainKind::all()[terrain_index];
            let mut rng = ChaCha8Rng::seed_from_u64(seed);

            let outcome = resolve_combat(&attacker, &mut defender, Some(terrain), &mut rng);
            prop_assert!(outcome.damage >= 1);
            prop_assert_eq!(defender.hp, hp.saturating_sub(outcome.damage));
        }

        #[test]
        fn target_choice_ignores_candidate_order(
            stats in proptest::collection::vec((1u32..5, 1u32..5, 1u32..4), 1..8),
            rotation in 0usize..8,
        ) {
            let attacker = unit(100, 0, UnitKind::Infantry, UnitStats::new(10, 5, 0, 1));
            let candidates: Vec<Unit> = stats
                .iter()
                .enumerate()
                .map(|(i, &(hp, max_hp, range))| {
                    let stats = UnitStats::new(hp.max(max_hp), 5, 0, range);
                    let mut candidate = unit(i as UnitId, 1, UnitKind::Infantry, stats);
                    candidate.hp = hp;
                    candidate
                })
                .collect();
            let mut shuffled = candidates.clone();
            shuffled.rotate_left(rotation % candidates.len());
            shuffled.reverse();

            let first = select_target(&attacker, &candidates).map(|u| u.id);
            let second = select_target(&attacker, &shuffled).map(|u| u.id);
            prop_assert_eq!(first, second);
        }
    }
}
