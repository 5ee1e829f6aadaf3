//! Terrain kinds and the combat modifiers they impose.

use crate::hex::HexCoord;
use crate::unit::UnitKind;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Terrain type of a hex, as far as combat is concerned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum TerrainKind {
    Plains,
    Forest,
    Mountain,
    Hill,
    Swamp,
    Desert,
    Water,
    #[default]
    Unknown,
}

impl TerrainKind {
    /// Parse a terrain tag, ignoring case. Unrecognised tags map to `Unknown`.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "plains" => TerrainKind::Plains,
            "forest" => TerrainKind::Forest,
            "mountain" => TerrainKind::Mountain,
            "hill" => TerrainKind::Hill,
            "swamp" => TerrainKind::Swamp,
            "desert" => TerrainKind::Desert,
            "water" => TerrainKind::Water,
            _ => TerrainKind::Unknown,
        }
    }

    /// Multiplier protecting a unit defending on this terrain.
    ///
    /// Values above 1.0 reduce incoming damage.
    pub const fn defense_modifier(&self) -> f64 {
        match self {
            TerrainKind::Forest => 1.2,
            TerrainKind::Mountain => 1.5,
            TerrainKind::Hill => 1.3,
            TerrainKind::Swamp => 1.1,
            TerrainKind::Desert => 0.9,
            TerrainKind::Plains => 1.0,
            TerrainKind::Water => 0.8,
            TerrainKind::Unknown => 1.0,
        }
    }

    /// Multiplier applied to a unit of `attacker` kind striking on this terrain.
    pub fn attack_modifier(&self, attacker: UnitKind) -> f64 {
        match self {
            TerrainKind::Plains => 1.1,
            TerrainKind::Water if attacker == UnitKind::Ship => 1.2,
            TerrainKind::Water => 0.5,
            _ => 1.0,
        }
    }

    /// Combined damage multiplier: attack side over defense side.
    pub fn combat_modifier(&self, attacker: UnitKind) -> f64 {
        self.attack_modifier(attacker) / self.defense_modifier()
    }

    /// Get all terrain variants.
    pub const fn all() -> &'static [TerrainKind] {
        &[
            TerrainKind::Plains,
            TerrainKind::Forest,
            TerrainKind::Mountain,
            TerrainKind::Hill,
            TerrainKind::Swamp,
            TerrainKind::Desert,
            TerrainKind::Water,
            TerrainKind::Unknown,
        ]
    }
}

impl From<String> for TerrainKind {
    fn from(tag: String) -> Self {
        Self::from_tag(&tag)
    }
}

impl std::fmt::Display for TerrainKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TerrainKind::Plains => "plains",
            TerrainKind::Forest => "forest",
            TerrainKind::Mountain => "mountain",
            TerrainKind::Hill => "hill",
            TerrainKind::Swamp => "swamp",
            TerrainKind::Desert => "desert",
            TerrainKind::Water => "water",
            TerrainKind::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// Terrain provider consulted by the registry for each battle hex.
///
/// Closures of the form `Fn(HexCoord) -> Option<TerrainKind>` implement it.
pub trait TerrainLookup {
    /// Terrain at `hex`, or `None` when the world has nothing there.
    fn terrain_at(&self, hex: HexCoord) -> Option<TerrainKind>;
}

impl<F> TerrainLookup for F
where
    F: Fn(HexCoord) -> Option<TerrainKind>,
{
    fn terrain_at(&self, hex: HexCoord) -> Option<TerrainKind> {
        self(hex)
    }
}

/// Sparse terrain table keyed by hex.
#[derive(Clone, Debug, Default)]
pub struct TerrainMap {
    cells: FxHashMap<HexCoord, TerrainKind>,
}

impl TerrainMap {
    /// Create an empty terrain map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the terrain of a hex, returning the previous value.
    pub fn set(&mut self, hex: HexCoord, terrain: TerrainKind) -> Option<TerrainKind> {
        self.cells.insert(hex, terrain)
    }

    /// Number of hexes with terrain.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// True if no hex has terrain.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl TerrainLookup for TerrainMap {
    fn terrain_at(&self, hex: HexCoord) -> Option<TerrainKind> {
        self.cells.get(&hex).copied()
    }
}

impl FromIterator<(HexCoord, TerrainKind)> for TerrainMap {
    fn from_iter<I: IntoIterator<Item = (HexCoord, TerrainKind)>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}
