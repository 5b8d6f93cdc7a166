//! Castle aggregate - buildings, garrison handle, unit pool, and defense
//!
//! Defense = base(level) + garrison · (1 + garrison_bonus(level))
//!         + building bonus + wall bonus(wall level, integrity)
//!
//! The garrison army itself lives in the world's army registry; the castle
//! only stores its id, so defense takes the garrison's power as an input.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::castle::building::{Building, BuildingKind, ProductionJob};
use crate::castle::treasury::Treasury;
use crate::core::config::SimulationConfig;
use crate::core::error::{Result, SimError};
use crate::core::types::{ArmyId, CastleId, FactionId, Position};
use crate::units::army::Composition;
use crate::units::catalog::{Catalog, UnitTypeId};
use crate::units::spell::SpellEffect;

/// Defense contributed by the castle itself per level
pub const BASE_DEFENSE_PER_LEVEL: f64 = 5.0;

/// Garrison power multiplier gained per castle level
pub const GARRISON_BONUS_PER_LEVEL: f64 = 0.1;

/// Defense added per wall level at full integrity
pub const WALL_BONUS_PER_LEVEL: f64 = 6.0;

/// Wall hit points per wall level
pub const WALL_HP_PER_LEVEL: f64 = 100.0;

/// Gold to raise the castle from level 0; scaled by the growth factor per level
pub const CASTLE_UPGRADE_BASE_COST: u32 = 200;

/// Highest castle level
pub const MAX_CASTLE_LEVEL: u32 = 5;

/// Gold per second each castle level yields
pub const INCOME_PER_LEVEL: f64 = 2.0;

/// Extra multiplier for ranged garrison units shooting from the walls
pub const RANGED_GARRISON_BONUS: f64 = 0.25;

pub fn base_power(level: u32) -> f64 {
    BASE_DEFENSE_PER_LEVEL * level as f64
}

pub fn garrison_bonus(level: u32) -> f64 {
    GARRISON_BONUS_PER_LEVEL * level as f64
}

/// Wall bonus scales with wall level and falls linearly to zero with damage
pub fn wall_bonus(wall_level: u32, hit_points: f64, max_hit_points: f64) -> f64 {
    if wall_level == 0 || max_hit_points <= 0.0 {
        return 0.0;
    }
    let integrity = (hit_points / max_hit_points).clamp(0.0, 1.0);
    WALL_BONUS_PER_LEVEL * wall_level as f64 * integrity
}

/// A fortified castle occupying one tile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Castle {
    pub id: CastleId,
    pub owner: FactionId,
    pub position: Position,
    pub level: u32,
    buildings: BTreeMap<BuildingKind, Building>,
    /// The single army stationed inside, if any
    pub garrison: Option<ArmyId>,
    /// Armies this castle has sent out, for accounting only
    pub dispatched: BTreeSet<ArmyId>,
    /// Trained units waiting to be dispatched
    available: Composition,
    wall_hit_points: f64,
    /// Fractional gold carried between ticks
    income_carry: f64,
    /// Effects queued for the next siege
    pub effects: Vec<SpellEffect>,
}

impl Castle {
    pub fn new(id: CastleId, owner: FactionId, position: Position, level: u32) -> Self {
        Self {
            id,
            owner,
            position,
            level: level.min(MAX_CASTLE_LEVEL),
            buildings: BTreeMap::new(),
            garrison: None,
            dispatched: BTreeSet::new(),
            available: Composition::new(),
            wall_hit_points: 0.0,
            income_carry: 0.0,
            effects: Vec::new(),
        }
    }

    /// Add a finished building during world setup
    pub fn with_building(mut self, kind: BuildingKind, level: u32) -> Self {
        self.buildings.insert(kind, Building::complete(kind, level));
        if kind == BuildingKind::Wall {
            self.wall_hit_points = self.max_wall_hit_points();
        }
        self
    }

    pub fn building(&self, kind: BuildingKind) -> Option<&Building> {
        self.buildings.get(&kind)
    }

    pub fn buildings(&self) -> impl Iterator<Item = &Building> {
        self.buildings.values()
    }

    pub(crate) fn buildings_mut(&mut self) -> impl Iterator<Item = &mut Building> {
        self.buildings.values_mut()
    }

    /// Level of a completed building, zero if absent or unfinished
    pub fn building_level(&self, kind: BuildingKind) -> u32 {
        self.buildings
            .get(&kind)
            .map(Building::effective_level)
            .unwrap_or(0)
    }

    pub fn building_defense_bonus(&self) -> f64 {
        self.buildings
            .values()
            .map(|b| b.kind.defense_bonus(b.effective_level()))
            .sum()
    }

    pub fn wall_level(&self) -> u32 {
        self.building_level(BuildingKind::Wall)
    }

    pub fn max_wall_hit_points(&self) -> f64 {
        WALL_HP_PER_LEVEL * self.wall_level() as f64
    }

    pub fn wall_hit_points(&self) -> f64 {
        self.wall_hit_points
    }

    pub fn wall_bonus(&self) -> f64 {
        wall_bonus(
            self.wall_level(),
            self.wall_hit_points,
            self.max_wall_hit_points(),
        )
    }

    /// Total defense given the garrison's (already modified) power
    pub fn defense(&self, garrison_power: f64) -> f64 {
        base_power(self.level)
            + garrison_power * (1.0 + garrison_bonus(self.level))
            + self.building_defense_bonus()
            + self.wall_bonus()
    }

    /// Damage walls; returns hit points actually removed
    pub fn damage_walls(&mut self, amount: f64) -> f64 {
        let before = self.wall_hit_points;
        self.wall_hit_points = (self.wall_hit_points - amount.max(0.0)).max(0.0);
        before - self.wall_hit_points
    }

    pub fn repair_walls(&mut self, amount: f64) {
        self.wall_hit_points = (self.wall_hit_points + amount.max(0.0)).min(self.max_wall_hit_points());
    }

    /// Gold per second from castle level and markets
    pub fn income_per_second(&self) -> f64 {
        INCOME_PER_LEVEL * self.level as f64
            + self
                .buildings
                .values()
                .map(|b| b.kind.income_per_second(b.effective_level()))
                .sum::<f64>()
    }

    /// Accumulate income for `delta_ms`; returns whole gold to pay out
    pub(crate) fn accrue_income(&mut self, delta_ms: f64) -> u32 {
        self.income_carry += self.income_per_second() * delta_ms / 1000.0;
        let whole = self.income_carry.floor();
        self.income_carry -= whole;
        whole as u32
    }

    /// Cost of the next upgrade of a building: base · growth^level
    pub fn upgrade_cost(&self, kind: BuildingKind, config: &SimulationConfig) -> u32 {
        let level = self.buildings.get(&kind).map(|b| b.level).unwrap_or(0);
        scaled_cost(kind.base_cost(), config.upgrade_cost_growth, level)
    }

    /// Start constructing a new building, paying its base cost
    pub fn construct(&mut self, kind: BuildingKind, treasury: &mut impl Treasury) -> Result<()> {
        if self.buildings.contains_key(&kind) {
            return Err(SimError::Validation(format!(
                "{} already has a {:?}",
                self.id, kind
            )));
        }
        treasury.try_spend(self.owner, kind.base_cost())?;
        self.buildings.insert(kind, Building::construction_site(kind));
        tracing::debug!("{} started construction of {:?}", self.id, kind);
        Ok(())
    }

    /// Upgrade a completed building; returns the new level
    pub fn upgrade(
        &mut self,
        kind: BuildingKind,
        config: &SimulationConfig,
        treasury: &mut impl Treasury,
    ) -> Result<u32> {
        let Some(building) = self.buildings.get(&kind) else {
            return Err(SimError::Validation(format!("{} has no {:?}", self.id, kind)));
        };
        if !building.is_complete() {
            return Err(SimError::Validation(format!(
                "{:?} in {} is still under construction",
                kind, self.id
            )));
        }

        let cost = self.upgrade_cost(kind, config);
        treasury.try_spend(self.owner, cost)?;

        let level = match self.buildings.get_mut(&kind) {
            Some(b) => {
                b.level += 1;
                b.level
            }
            None => return Err(SimError::Validation(format!("{} has no {:?}", self.id, kind))),
        };
        if kind == BuildingKind::Wall {
            self.wall_hit_points = self.max_wall_hit_points();
        }
        tracing::debug!("{} upgraded {:?} to level {} for {}", self.id, kind, level, cost);
        Ok(level)
    }

    /// Raise the castle level; returns the new level
    pub fn upgrade_level(
        &mut self,
        config: &SimulationConfig,
        treasury: &mut impl Treasury,
    ) -> Result<u32> {
        if self.level >= MAX_CASTLE_LEVEL {
            return Err(SimError::Validation(format!(
                "{} is already at maximum level",
                self.id
            )));
        }
        let cost = scaled_cost(CASTLE_UPGRADE_BASE_COST, config.upgrade_cost_growth, self.level);
        treasury.try_spend(self.owner, cost)?;
        self.level += 1;
        Ok(self.level)
    }

    /// Queue a unit for training at the building its catalog entry names
    pub fn queue_production(&mut self, catalog: &Catalog, unit: UnitTypeId) -> Result<()> {
        let Some(stats) = catalog.unit_for(self.owner, unit) else {
            return Err(SimError::Validation(format!(
                "{} is not available to {}",
                unit, self.owner
            )));
        };
        let building = self
            .buildings
            .get_mut(&stats.trained_at)
            .filter(|b| b.is_complete())
            .ok_or_else(|| {
                SimError::Validation(format!(
                    "{} needs a completed {:?} to train {}",
                    self.id, stats.trained_at, stats.name
                ))
            })?;
        building
            .queue
            .push_back(ProductionJob::new(unit, stats.train_time_ms));
        Ok(())
    }

    /// Trained units waiting in the castle
    pub fn available(&self) -> &Composition {
        &self.available
    }

    pub(crate) fn add_available(&mut self, unit: UnitTypeId, count: u32) {
        if count > 0 {
            *self.available.entry(unit).or_insert(0) += count;
        }
    }

    /// Withdraw units from the pool; all or nothing
    pub(crate) fn take_available(&mut self, request: &Composition) -> Result<()> {
        for (unit, &count) in request {
            let held = self.available.get(unit).copied().unwrap_or(0);
            if count > held {
                return Err(SimError::Validation(format!(
                    "{} has only {} of {} available, {} requested",
                    self.id, held, unit, count
                )));
            }
        }
        for (unit, &count) in request {
            if let Some(held) = self.available.get_mut(unit) {
                *held -= count;
            }
        }
        self.available.retain(|_, c| *c > 0);
        Ok(())
    }

    /// Hand the castle to a new owner. Queues and the unit pool belong to the
    /// old owner's roster and are discarded.
    pub(crate) fn transfer_ownership(&mut self, new_owner: FactionId) {
        self.owner = new_owner;
        self.available.clear();
        self.dispatched.clear();
        for building in self.buildings.values_mut() {
            building.queue.clear();
        }
    }
}

fn scaled_cost(base: u32, growth: f64, level: u32) -> u32 {
    (base as f64 * growth.powi(level as i32)).round() as u32
}
