//! Combatants as seen by the battle engine.
//!
//! Units are owned by the wider simulation, not by battles. The engine talks
//! to them through two seams:
//!
//! - [`Combatant`]: the capability set a fighting entity must expose
//! - [`Roster`]: the id-addressed store the caller keeps its units in
//!
//! [`Unit`] is a ready-made combatant for tools and tests.

use crate::hex::HexCoord;
use crate::types::{PlayerId, UnitId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

/// Unit type tag used for modifier lookups.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum UnitKind {
    Infantry,
    Cavalry,
    Archer,
    Catapult,
    Warrior,
    Knight,
    Ship,
    Building,
    #[default]
    Other,
}

impl UnitKind {
    /// Parse a type tag, ignoring case. Unrecognised tags map to `Other`.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "infantry" => UnitKind::Infantry,
            "cavalry" => UnitKind::Cavalry,
            "archer" => UnitKind::Archer,
            "catapult" => UnitKind::Catapult,
            "warrior" => UnitKind::Warrior,
            "knight" => UnitKind::Knight,
            "ship" => UnitKind::Ship,
            "building" => UnitKind::Building,
            _ => UnitKind::Other,
        }
    }

    /// Default stats for a freshly raised unit of this kind.
    pub const fn base_stats(&self) -> UnitStats {
        match self {
            UnitKind::Infantry => UnitStats::new(100, 12, 6, 1),
            UnitKind::Cavalry => UnitStats::new(90, 15, 4, 1),
            UnitKind::Archer => UnitStats::new(70, 10, 3, 3),
            UnitKind::Catapult => UnitStats::new(60, 20, 2, 4),
            UnitKind::Warrior => UnitStats::new(80, 10, 4, 1),
            UnitKind::Knight => UnitStats::new(110, 16, 7, 1),
            UnitKind::Ship => UnitStats::new(120, 14, 6, 2),
            UnitKind::Building => UnitStats::new(200, 0, 10, 0),
            UnitKind::Other => UnitStats::new(50, 5, 2, 1),
        }
    }
}

impl From<String> for UnitKind {
    fn from(tag: String) -> Self {
        Self::from_tag(&tag)
    }
}

impl std::fmt::Display for UnitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            UnitKind::Infantry => "infantry",
            UnitKind::Cavalry => "cavalry",
            UnitKind::Archer => "archer",
            UnitKind::Catapult => "catapult",
            UnitKind::Warrior => "warrior",
            UnitKind::Knight => "knight",
            UnitKind::Ship => "ship",
            UnitKind::Building => "building",
            UnitKind::Other => "other",
        };
        write!(f, "{}", name)
    }
}

/// Combat statistics of a unit kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStats {
    pub max_hp: u32,
    pub attack: u32,
    pub defense: u32,
    /// Attack range in hexes (1 = melee).
    pub range: u32,
}

impl UnitStats {
    pub const fn new(max_hp: u32, attack: u32, defense: u32, range: u32) -> Self {
        Self {
            max_hp,
            attack,
            defense,
            range,
        }
    }
}

/// Capability set of anything that can fight in a battle.
pub trait Combatant {
    fn id(&self) -> UnitId;
    fn owner(&self) -> PlayerId;
    fn kind(&self) -> UnitKind;
    fn hp(&self) -> u32;
    fn max_hp(&self) -> u32;
    fn attack(&self) -> u32;
    fn defense(&self) -> u32;
    fn range(&self) -> u32;
    fn coords(&self) -> HexCoord;

    /// Reduce hp by `amount`. Reaching zero hp must make the unit dead.
    fn take_damage(&mut self, amount: u32);

    fn is_alive(&self) -> bool {
        self.hp() > 0
    }

    /// Whether this unit is able to strike `target` at all (range, line of
    /// sight, ...). Defaults to always.
    fn can_attack(&self, _target: &Self) -> bool {
        true
    }
}

/// Id-addressed store of the combatants the engine may touch.
///
/// A unit missing from the roster is treated as dead.
pub trait Roster {
    type Unit: Combatant;

    fn unit(&self, id: UnitId) -> Option<&Self::Unit>;

    fn unit_mut(&mut self, id: UnitId) -> Option<&mut Self::Unit>;

    /// Every unit id, in ascending order.
    fn unit_ids(&self) -> Vec<UnitId>;

    fn is_alive(&self, id: UnitId) -> bool {
        self.unit(id).is_some_and(|unit| unit.is_alive())
    }
}

impl<C: Combatant, S: BuildHasher> Roster for HashMap<UnitId, C, S> {
    type Unit = C;

    fn unit(&self, id: UnitId) -> Option<&C> {
        self.get(&id)
    }

    fn unit_mut(&mut self, id: UnitId) -> Option<&mut C> {
        self.get_mut(&id)
    }

    fn unit_ids(&self) -> Vec<UnitId> {
        let mut ids: Vec<UnitId> = self.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl<C: Combatant> Roster for BTreeMap<UnitId, C> {
    type Unit = C;

    fn unit(&self, id: UnitId) -> Option<&C> {
        self.get(&id)
    }

    fn unit_mut(&mut self, id: UnitId) -> Option<&mut C> {
        self.get_mut(&id)
    }

    fn unit_ids(&self) -> Vec<UnitId> {
        self.keys().copied().collect()
    }
}

/// A concrete unit on the battlefield.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    /// Unique identifier.
    pub id: UnitId,
    /// Owning player.
    pub owner: PlayerId,
    /// Type tag.
    pub kind: UnitKind,
    /// Current position on the map.
    pub position: HexCoord,
    pub hp: u32,
    pub max_hp: u32,
    pub attack: u32,
    pub defense: u32,
    pub range: u32,
}

impl Unit {
    /// Create a unit at full health with the kind's base stats.
    pub fn new(id: UnitId, owner: PlayerId, kind: UnitKind, position: HexCoord) -> Self {
        Self::with_stats(id, owner, kind, position, kind.base_stats())
    }

    /// Create a unit at full health with explicit stats.
    pub fn with_stats(
        id: UnitId,
        owner: PlayerId,
        kind: UnitKind,
        position: HexCoord,
        stats: UnitStats,
    ) -> Self {
        Self {
            id,
            owner,
            kind,
            position,
            hp: stats.max_hp,
            max_hp: stats.max_hp,
            attack: stats.attack,
            defense: stats.defense,
            range: stats.range,
        }
    }
}

impl Combatant for Unit {
    fn id(&self) -> UnitId {
        self.id
    }

    fn owner(&self) -> PlayerId {
        self.owner
    }

    fn kind(&self) -> UnitKind {
        self.kind
    }

    fn hp(&self) -> u32 {
        self.hp
    }

    fn max_hp(&self) -> u32 {
        self.max_hp
    }

    fn attack(&self) -> u32 {
        self.attack
    }

    fn defense(&self) -> u32 {
        self.defense
    }

    fn range(&self) -> u32 {
        self.range
    }

    fn coords(&self) -> HexCoord {
        self.position
    }

    fn take_damage(&mut self, amount: u32) {
        self.hp = self.hp.saturating_sub(amount);
    }
}
