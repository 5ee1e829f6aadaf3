//! Scenario files: battle config, terrain, and the units on the map.

use std::path::Path;

use anyhow::{bail, Context, Result};
use rustc_hash::FxHashMap;
use serde::Deserialize;

use hexfront_core::{
    BattleConfig, HexCoord, PlayerId, TerrainKind, TerrainMap, Unit, UnitId, UnitKind,
};

/// Units by id, as handed to the registry.
pub type Units = FxHashMap<UnitId, Unit>;

#[derive(Debug, Deserialize)]
struct TerrainCell {
    q: i32,
    r: i32,
    terrain: TerrainKind,
}

/// A unit entry. Stats not given come from the kind's base stats.
#[derive(Debug, Deserialize)]
struct UnitEntry {
    id: UnitId,
    owner: PlayerId,
    kind: UnitKind,
    q: i32,
    r: i32,
    hp: Option<u32>,
    attack: Option<u32>,
    defense: Option<u32>,
    range: Option<u32>,
}

impl UnitEntry {
    fn into_unit(self) -> Unit {
        let mut unit = Unit::new(self.id, self.owner, self.kind, HexCoord::new(self.q, self.r));
        if let Some(hp) = self.hp {
            unit.max_hp = unit.max_hp.max(hp);
            unit.hp = hp;
        }
        if let Some(attack) = self.attack {
            unit.attack = attack;
        }
        if let Some(defense) = self.defense {
            unit.defense = defense;
        }
        if let Some(range) = self.range {
            unit.range = range;
        }
        unit
    }
}

#[derive(Debug, Deserialize)]
struct ScenarioFile {
    #[serde(default)]
    config: BattleConfig,
    #[serde(default)]
    terrain: Vec<TerrainCell>,
    units: Vec<UnitEntry>,
}

/// A loaded, validated scenario.
#[derive(Debug)]
pub struct Scenario {
    pub config: BattleConfig,
    pub terrain: TerrainMap,
    pub units: Units,
}

impl Scenario {
    /// Load a scenario from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario: {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid scenario: {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let file: ScenarioFile = serde_json::from_str(text).context("Malformed scenario JSON")?;
        file.config.validate().context("Invalid battle config")?;

        let terrain = file
            .terrain
            .into_iter()
            .map(|cell| (HexCoord::new(cell.q, cell.r), cell.terrain))
            .collect();

        let mut units = Units::default();
        for entry in file.units {
            let unit = entry.into_unit();
            if units.contains_key(&unit.id) {
                bail!("Duplicate unit id {}", unit.id);
            }
            units.insert(unit.id, unit);
        }

        Ok(Self {
            config: file.config,
            terrain,
            units,
        })
    }
}
