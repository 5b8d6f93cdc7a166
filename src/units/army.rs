//! Army aggregate - a typed unit composition with derived power and speed
//!
//! Power is the count-weighted sum of unit power. Speed is the plain mean of
//! the distinct unit types present: a handful of slow elite units is not
//! diluted by a mass of fast cheap ones.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, SimError};
use crate::core::types::{ArmyId, FactionId, Position};
use crate::units::catalog::{Catalog, UnitTypeId};
use crate::units::spell::SpellEffect;

/// Unit type → held count. Never stores a zero count.
pub type Composition = BTreeMap<UnitTypeId, u32>;

/// An army on the map or inside a castle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Army {
    pub id: ArmyId,
    pub owner: FactionId,
    pub position: Position,
    composition: Composition,
    power: f64,
    speed: f64,
    /// Effects queued for the next combat
    pub effects: Vec<SpellEffect>,
}

impl Army {
    /// Create an empty army
    pub fn new(id: ArmyId, owner: FactionId, position: Position) -> Self {
        Self {
            id,
            owner,
            position,
            composition: Composition::new(),
            power: 0.0,
            speed: 0.0,
            effects: Vec::new(),
        }
    }

    /// Create an army from a composition. Unit types missing from the owner's
    /// roster mean the entity is corrupt and construction fails.
    pub fn with_composition(
        id: ArmyId,
        owner: FactionId,
        position: Position,
        composition: impl IntoIterator<Item = (UnitTypeId, u32)>,
        catalog: &Catalog,
    ) -> Result<Self> {
        let mut army = Self::new(id, owner, position);
        for (unit, count) in composition {
            if catalog.unit_for(owner, unit).is_none() {
                return Err(SimError::Catalog(format!(
                    "{} is not on the roster of {}",
                    unit, owner
                )));
            }
            if count > 0 {
                *army.composition.entry(unit).or_insert(0) += count;
            }
        }
        army.recompute(catalog);
        Ok(army)
    }

    pub fn composition(&self) -> &Composition {
        &self.composition
    }

    /// Units of a given type held
    pub fn count(&self, unit: UnitTypeId) -> u32 {
        self.composition.get(&unit).copied().unwrap_or(0)
    }

    /// Total number of units across all types
    pub fn total_units(&self) -> u32 {
        self.composition.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.composition.is_empty()
    }

    /// Σ unit_power(t) · count(t)
    pub fn power(&self) -> f64 {
        self.power
    }

    /// Mean speed of the distinct unit types present, 0 when empty
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Add units of a type on the owner's roster
    pub fn add_units(&mut self, catalog: &Catalog, unit: UnitTypeId, count: u32) -> Result<()> {
        if count == 0 {
            return Err(SimError::Validation("unit count must be positive".into()));
        }
        if catalog.unit_for(self.owner, unit).is_none() {
            return Err(SimError::Validation(format!(
                "{} is not available to {}",
                unit, self.owner
            )));
        }
        *self.composition.entry(unit).or_insert(0) += count;
        self.recompute(catalog);
        Ok(())
    }

    /// Remove units; fails without touching state if fewer are held
    pub fn remove_units(&mut self, catalog: &Catalog, unit: UnitTypeId, count: u32) -> Result<()> {
        if count == 0 {
            return Err(SimError::Validation("unit count must be positive".into()));
        }
        let held = self.count(unit);
        if count > held {
            return Err(SimError::Validation(format!(
                "cannot remove {} of {}: only {} held",
                count, unit, held
            )));
        }
        if held == count {
            self.composition.remove(&unit);
        } else if let Some(entry) = self.composition.get_mut(&unit) {
            *entry -= count;
        }
        self.recompute(catalog);
        Ok(())
    }

    /// Fold another army of the same owner into this one, leaving it empty
    pub fn merge(&mut self, catalog: &Catalog, other: &mut Army) -> Result<()> {
        if other.owner != self.owner {
            return Err(SimError::InvalidTarget(format!(
                "cannot merge {} ({}) into {} ({})",
                other.id, other.owner, self.id, self.owner
            )));
        }
        for (unit, count) in std::mem::take(&mut other.composition) {
            *self.composition.entry(unit).or_insert(0) += count;
        }
        self.effects.append(&mut other.effects);
        self.recompute(catalog);
        other.recompute(catalog);
        Ok(())
    }

    /// Split off the requested units into a new army at the same position.
    /// Any shortfall fails the whole request.
    pub fn split(&mut self, catalog: &Catalog, request: &Composition, new_id: ArmyId) -> Result<Army> {
        if request.values().all(|&c| c == 0) {
            return Err(SimError::Validation("split request is empty".into()));
        }
        for (&unit, &count) in request {
            let held = self.count(unit);
            if count > held {
                return Err(SimError::Validation(format!(
                    "cannot split {} of {}: only {} held",
                    count, unit, held
                )));
            }
        }

        let mut split = Army::new(new_id, self.owner, self.position);
        for (&unit, &count) in request.iter().filter(|(_, count)| **count > 0) {
            let held = self.count(unit);
            if held == count {
                self.composition.remove(&unit);
            } else if let Some(entry) = self.composition.get_mut(&unit) {
                *entry -= count;
            }
            split.composition.insert(unit, count);
        }
        self.recompute(catalog);
        split.recompute(catalog);
        Ok(split)
    }

    /// Empty the army (combat elimination)
    pub fn clear(&mut self, catalog: &Catalog) -> u32 {
        let lost = self.total_units();
        self.composition.clear();
        self.recompute(catalog);
        lost
    }

    /// Power against castle defenses, weighting each unit by its
    /// anti-castle multiplier
    pub fn siege_power(&self, catalog: &Catalog) -> f64 {
        self.composition
            .iter()
            .filter_map(|(unit, &count)| {
                catalog
                    .unit(*unit)
                    .map(|u| u.power * u.anti_castle_multiplier * count as f64)
            })
            .sum()
    }

    /// Power contributed by ranged units
    pub fn ranged_power(&self, catalog: &Catalog) -> f64 {
        self.composition
            .iter()
            .filter_map(|(unit, &count)| {
                catalog
                    .unit(*unit)
                    .filter(|u| u.ranged)
                    .map(|u| u.power * count as f64)
            })
            .sum()
    }

    pub fn has_spellcaster(&self, catalog: &Catalog) -> bool {
        self.composition
            .keys()
            .any(|unit| catalog.unit(*unit).is_some_and(|u| u.spellcaster))
    }

    fn recompute(&mut self, catalog: &Catalog) {
        let mut power = 0.0;
        let mut speed_sum = 0.0;
        let mut distinct = 0usize;
        for (unit, &count) in &self.composition {
            if let Some(stats) = catalog.unit(*unit) {
                power += stats.power * count as f64;
                speed_sum += stats.speed;
                distinct += 1;
            }
        }
        self.power = power;
        self.speed = if distinct == 0 {
            0.0
        } else {
            speed_sum / distinct as f64
        };
    }
}

/// Slack for float noise when a loss fraction lands on a whole unit
const LOSS_EPSILON: f64 = 1e-9;

/// Whole units a force of `total` loses when it keeps `keep_fraction` of its
/// strength. Any loss above zero costs at least one unit.
pub fn units_lost(total: u32, keep_fraction: f64) -> u32 {
    let loss = (1.0 - keep_fraction.clamp(0.0, 1.0)) * total as f64;
    ((loss - LOSS_EPSILON).ceil().max(0.0) as u32).min(total)
}

/// Remove `count` units from a group of armies in proportion to what each
/// army holds of each unit type.
///
/// Shares are floored and the leftover units go to the largest remainders,
/// ties to the earlier army and then the lower unit id, so the group loses
/// exactly `count` units (capped at what it holds). Returns units removed.
pub fn remove_losses<'a>(
    catalog: &Catalog,
    armies: impl IntoIterator<Item = &'a mut Army>,
    count: u32,
) -> u32 {
    let mut armies: Vec<&mut Army> = armies.into_iter().collect();
    let holdings: Vec<(usize, UnitTypeId, u64)> = armies
        .iter()
        .enumerate()
        .flat_map(|(i, army)| {
            army.composition
                .iter()
                .map(move |(&unit, &held)| (i, unit, held as u64))
        })
        .collect();

    let total: u64 = holdings.iter().map(|&(_, _, held)| held).sum();
    let count = (count as u64).min(total);
    if count == 0 {
        return 0;
    }

    let mut losses: Vec<u64> = holdings.iter().map(|&(_, _, held)| held * count / total).collect();
    let mut leftover = count - losses.iter().sum::<u64>();

    let mut by_remainder: Vec<usize> = (0..holdings.len()).collect();
    by_remainder.sort_by_key(|&i| std::cmp::Reverse(holdings[i].2 * count % total));
    for i in by_remainder {
        if leftover == 0 {
            break;
        }
        if losses[i] < holdings[i].2 {
            losses[i] += 1;
            leftover -= 1;
        }
    }

    let mut removed = 0u32;
    for (&(i, unit, held), &lost) in holdings.iter().zip(&losses) {
        if lost == 0 {
            continue;
        }
        let army = &mut *armies[i];
        if lost >= held {
            army.composition.remove(&unit);
        } else if let Some(entry) = army.composition.get_mut(&unit) {
            *entry -= lost as u32;
        }
        removed += lost as u32;
    }
    for army in armies.iter_mut() {
        army.recompute(catalog);
    }
    removed
}
