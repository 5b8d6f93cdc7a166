//! Unit catalog - static per-faction unit statistics
//!
//! Every army and production queue refers to unit types by `UnitTypeId`.
//! The catalog is loaded once (built-in defaults or TOML) and shared
//! read-only by the whole simulation.

use ahash::AHashMap;
use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::castle::building::BuildingKind;
use crate::core::error::{Result, SimError};
use crate::core::types::FactionId;

/// Identifier of a unit type in the catalog
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[display(fmt = "unit#{}", _0)]
pub struct UnitTypeId(pub u16);

fn default_anti_castle() -> f64 {
    1.0
}

fn default_train_time() -> f64 {
    5000.0
}

/// A catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitType {
    pub id: UnitTypeId,
    pub name: String,
    /// Faction whose roster contains this unit
    pub faction: FactionId,
    /// Combat power contributed per unit
    pub power: f64,
    /// Movement speed; armies average this over distinct types
    pub speed: f64,
    /// Gold paid when a castle finishes training one unit
    pub cost: u32,
    #[serde(default = "default_train_time")]
    pub train_time_ms: f64,
    pub trained_at: BuildingKind,
    #[serde(default)]
    pub ranged: bool,
    #[serde(default)]
    pub spellcaster: bool,
    /// Multiplier applied to this unit's power when assaulting castle defenses
    #[serde(default = "default_anti_castle")]
    pub anti_castle_multiplier: f64,
    /// Named special ability, informational for collaborators
    #[serde(default)]
    pub special: Option<String>,
}

/// Static faction and unit data
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    factions: Vec<(FactionId, String)>,
    units: AHashMap<UnitTypeId, UnitType>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in two-faction catalog
    pub fn with_defaults() -> Self {
        let mut catalog = Self::new();
        let kingdom = FactionId(1);
        let horde = FactionId(2);
        catalog.factions.push((kingdom, "Kingdom".into()));
        catalog.factions.push((horde, "Horde".into()));

        let entries = [
            (1, "Militia", kingdom, 1.0, 10.0, 10, BuildingKind::Barracks, false, false, 1.0),
            (2, "Archer", kingdom, 2.0, 8.0, 25, BuildingKind::ArcheryRange, true, false, 1.0),
            (3, "Knight", kingdom, 5.0, 12.0, 60, BuildingKind::Barracks, false, false, 1.0),
            (4, "Mage", kingdom, 3.0, 5.0, 80, BuildingKind::Sanctum, false, true, 1.0),
            (5, "Battering Ram", kingdom, 1.0, 4.0, 50, BuildingKind::Barracks, false, false, 4.0),
            (11, "Raider", horde, 1.0, 12.0, 10, BuildingKind::Barracks, false, false, 1.0),
            (12, "Slinger", horde, 2.0, 9.0, 20, BuildingKind::ArcheryRange, true, false, 1.0),
            (13, "Ogre", horde, 6.0, 6.0, 70, BuildingKind::Barracks, false, false, 1.5),
            (14, "Shaman", horde, 3.0, 6.0, 75, BuildingKind::Sanctum, false, true, 1.0),
            (15, "Catapult", horde, 2.0, 3.0, 60, BuildingKind::Barracks, true, false, 3.0),
        ];

        for (id, name, faction, power, speed, cost, trained_at, ranged, spellcaster, anti_castle) in
            entries
        {
            catalog.units.insert(
                UnitTypeId(id),
                UnitType {
                    id: UnitTypeId(id),
                    name: name.into(),
                    faction,
                    power,
                    speed,
                    cost,
                    train_time_ms: default_train_time(),
                    trained_at,
                    ranged,
                    spellcaster,
                    anti_castle_multiplier: anti_castle,
                    special: None,
                },
            );
        }

        catalog
    }

    /// Register a faction; units may only reference registered factions
    pub fn add_faction(&mut self, id: FactionId, name: impl Into<String>) {
        if !self.factions.iter().any(|(f, _)| *f == id) {
            self.factions.push((id, name.into()));
        }
    }

    /// Add a unit type, rejecting entries that would corrupt the catalog
    pub fn add_unit(&mut self, unit: UnitType) -> Result<()> {
        if self.units.contains_key(&unit.id) {
            return Err(SimError::Catalog(format!("duplicate unit type {}", unit.id)));
        }
        if !self.factions.iter().any(|(f, _)| *f == unit.faction) {
            return Err(SimError::Catalog(format!(
                "unit {} ({}) references unknown {}",
                unit.id, unit.name, unit.faction
            )));
        }
        if unit.power < 0.0 || unit.speed < 0.0 || unit.anti_castle_multiplier < 0.0 {
            return Err(SimError::Catalog(format!(
                "unit {} ({}) has negative stats",
                unit.id, unit.name
            )));
        }
        self.units.insert(unit.id, unit);
        Ok(())
    }

    /// Look up a unit type regardless of faction
    pub fn unit(&self, id: UnitTypeId) -> Option<&UnitType> {
        self.units.get(&id)
    }

    /// Look up a unit type on a faction's roster
    pub fn unit_for(&self, faction: FactionId, id: UnitTypeId) -> Option<&UnitType> {
        self.units.get(&id).filter(|u| u.faction == faction)
    }

    /// All unit types a faction can field, sorted by id
    pub fn roster(&self, faction: FactionId) -> Vec<&UnitType> {
        let mut roster: Vec<_> = self.units.values().filter(|u| u.faction == faction).collect();
        roster.sort_by_key(|u| u.id);
        roster
    }

    pub fn factions(&self) -> &[(FactionId, String)] {
        &self.factions
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Load a catalog from a TOML file
    pub fn load_from_toml(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse a catalog from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self> {
        let data: TomlCatalog = toml::from_str(content)?;

        let mut catalog = Self::new();
        for faction in data.factions {
            catalog.add_faction(faction.id, faction.name);
        }
        for unit in data.units {
            catalog.add_unit(unit)?;
        }
        Ok(catalog)
    }
}

/// TOML representation of a catalog file
#[derive(Debug, Deserialize)]
struct TomlCatalog {
    factions: Vec<TomlFaction>,
    #[serde(default)]
    units: Vec<UnitType>,
}

#[derive(Debug, Deserialize)]
struct TomlFaction {
    id: FactionId,
    name: String,
}
