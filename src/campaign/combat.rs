//! Combat resolution for forces sharing a tile
//!
//! Field combat groups the armies on a tile into sides by alliance and
//! compares modified power: the strongest side wins, every other side is
//! eliminated, and the winner loses `min(W × attacker_loss, L × defender_loss)`
//! where L is the combined power of the beaten sides. Exactly equal leaders
//! draw and keep `1 - draw_loss_fraction` of their units.
//!
//! A siege runs in two phases:
//! 1. the attacking coalition against reinforcements on the castle tile
//! 2. the phase-1 survivors' siege power against the castle's defense
//!
//! Both phases are subtractive: the stronger party keeps the difference.
//! Ties favour the defender. A castle whose garrison has no power falls to
//! any surviving attacker without a phase-2 contest.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::campaign::terrain::TerrainKind;
use crate::castle::fortress::{Castle, RANGED_GARRISON_BONUS};
use crate::core::config::SimulationConfig;
use crate::core::error::{Result, SimError};
use crate::core::faction::FactionRegistry;
use crate::core::types::{ArmyId, CastleId, FactionId, Position};
use crate::units::army::{remove_losses, units_lost, Army};
use crate::units::catalog::Catalog;
use crate::units::spell::{apply_effects, SpellEffect};

/// Whether a castle took part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombatKind {
    Field,
    Siege,
}

/// How a combat ended. Side indices refer to `CombatResult::sides`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CombatOutcome {
    Victory { side: usize },
    Draw { sides: Vec<usize> },
    /// Reinforcements beat the attackers in phase 1
    Repelled,
    CastleHeld,
    CastleCaptured { from: FactionId, to: FactionId },
}

/// Per-side summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideReport {
    pub factions: Vec<FactionId>,
    pub armies: Vec<ArmyId>,
    /// Modified power the side fought with
    pub power: f64,
    /// Base power of the side's surviving units
    pub remaining_power: f64,
    pub units_lost: u32,
}

impl SideReport {
    pub fn is_eliminated(&self) -> bool {
        self.remaining_power <= 0.0
    }
}

/// One subtractive siege phase
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseReport {
    pub attack: f64,
    pub defense: f64,
    pub attacker_won: bool,
    /// Power left to whichever party won
    pub survivors: f64,
}

/// Siege-specific details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiegeReport {
    pub castle: CastleId,
    pub defender: FactionId,
    pub phase_one: Option<PhaseReport>,
    pub phase_two: Option<PhaseReport>,
    pub wall_damage: f64,
    /// Garrison after resolution
    pub garrison: Option<ArmyId>,
    /// Armies folded into the garrison
    pub absorbed: Vec<ArmyId>,
}

/// Outcome of one combat at one tile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatResult {
    pub kind: CombatKind,
    pub position: Position,
    pub terrain: TerrainKind,
    pub outcome: CombatOutcome,
    pub sides: Vec<SideReport>,
    pub siege: Option<SiegeReport>,
}

impl CombatResult {
    pub fn is_draw(&self) -> bool {
        matches!(self.outcome, CombatOutcome::Draw { .. })
    }

    pub fn winner(&self) -> Option<&SideReport> {
        match self.outcome {
            CombatOutcome::Victory { side } => self.sides.get(side),
            CombatOutcome::CastleCaptured { .. } => self.sides.first(),
            CombatOutcome::Repelled | CombatOutcome::CastleHeld => self.sides.get(1),
            CombatOutcome::Draw { .. } => None,
        }
    }

    pub fn total_units_lost(&self) -> u32 {
        self.sides.iter().map(|s| s.units_lost).sum()
    }
}

/// Base power after terrain and queued effects, floored at zero
pub fn modified_power(base: f64, terrain: TerrainKind, effects: &[SpellEffect]) -> f64 {
    apply_effects(base * terrain.combat_modifier(), effects)
}

/// Losses the sole winner of a field battle takes
pub fn winner_losses(winner_power: f64, loser_power: f64, config: &SimulationConfig) -> f64 {
    (winner_power * config.attacker_loss_fraction)
        .min(loser_power * config.defender_loss_fraction)
        .max(0.0)
}

/// Result of comparing side powers
#[derive(Debug, Clone, PartialEq)]
pub struct Contest {
    /// Fraction of units each side keeps
    pub keep: Vec<f64>,
    /// Sides sharing the highest power
    pub leaders: Vec<usize>,
}

/// Compare any number of sides
pub fn contest(powers: &[f64], config: &SimulationConfig) -> Contest {
    let top = powers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let leaders: Vec<usize> = (0..powers.len()).filter(|&i| powers[i] == top).collect();
    let mut keep = vec![0.0; powers.len()];

    match leaders.as_slice() {
        [] => {}
        [winner] => {
            let beaten: f64 = powers
                .iter()
                .enumerate()
                .filter(|(i, _)| i != winner)
                .map(|(_, p)| *p)
                .sum();
            let loss = winner_losses(top, beaten, config);
            keep[*winner] = if top > 0.0 { (top - loss) / top } else { 0.0 };
        }
        tied => {
            for &i in tied {
                keep[i] = (1.0 - config.draw_loss_fraction).clamp(0.0, 1.0);
            }
        }
    }

    Contest { keep, leaders }
}

/// One subtractive phase; the defender holds on a tie
pub fn siege_phase(attack: f64, defense: f64) -> PhaseReport {
    let attacker_won = attack > defense;
    PhaseReport {
        attack,
        defense,
        attacker_won,
        survivors: (attack - defense).abs(),
    }
}

/// Partition factions into sides. A faction joins the first side whose
/// members it is allied with, otherwise it opens a new one.
pub fn group_sides(
    factions: impl IntoIterator<Item = FactionId>,
    registry: &FactionRegistry,
) -> Vec<Vec<FactionId>> {
    let ordered: BTreeSet<FactionId> = factions.into_iter().collect();
    let mut sides: Vec<Vec<FactionId>> = Vec::new();
    for faction in ordered {
        match sides
            .iter_mut()
            .find(|side| side.iter().all(|m| registry.are_allied(*m, faction)))
        {
            Some(side) => side.push(faction),
            None => sides.push(vec![faction]),
        }
    }
    sides
}

/// Fold `armies[from]` into `armies[into]`
fn merge_within(catalog: &Catalog, armies: &mut [Army], into: usize, from: usize) -> Result<()> {
    if into == from {
        return Ok(());
    }
    let (target, source) = if into < from {
        let (left, right) = armies.split_at_mut(from);
        (&mut left[into], &mut right[0])
    } else {
        let (left, right) = armies.split_at_mut(into);
        (&mut right[0], &mut left[from])
    };
    target.merge(catalog, source)
}

/// Keep `keep` of a group's units, counted over the whole group so small
/// armies do not round away separately
fn scale_all(catalog: &Catalog, armies: &mut [Army], keep: f64) -> u32 {
    let total: u32 = armies.iter().map(Army::total_units).sum();
    remove_losses(catalog, armies.iter_mut(), units_lost(total, keep))
}

fn base_power(armies: &[Army]) -> f64 {
    armies.iter().map(Army::power).sum()
}

/// Resolves combats against shared read-only context
pub struct CombatResolver<'a> {
    catalog: &'a Catalog,
    config: &'a SimulationConfig,
    factions: &'a FactionRegistry,
}

impl<'a> CombatResolver<'a> {
    pub fn new(
        catalog: &'a Catalog,
        config: &'a SimulationConfig,
        factions: &'a FactionRegistry,
    ) -> Self {
        Self {
            catalog,
            config,
            factions,
        }
    }

    /// Power an army brings to the field
    pub fn army_power(&self, army: &Army, terrain: TerrainKind) -> f64 {
        modified_power(army.power(), terrain, &army.effects)
    }

    /// Power an army brings against castle defenses
    pub fn army_siege_power(&self, army: &Army, terrain: TerrainKind) -> f64 {
        modified_power(army.siege_power(self.catalog), terrain, &army.effects)
    }

    /// Garrison contribution before the castle's level bonus; ranged units
    /// fight better from the walls
    pub fn garrison_power(&self, garrison: &Army) -> f64 {
        let base = garrison.power() + garrison.ranged_power(self.catalog) * RANGED_GARRISON_BONUS;
        apply_effects(base, &garrison.effects)
    }

    /// Total castle defense including queued castle effects.
    ///
    /// Terrain is not applied here: the attackers already fight with the
    /// tile's combat modifier, and the castle's walls, towers and level
    /// bonus stand in for the ground it is built on, so applying the
    /// modifier to both parties would cancel it out of every siege.
    pub fn castle_defense(&self, castle: &Castle, garrison: Option<&Army>) -> f64 {
        let garrison_power = garrison.map(|g| self.garrison_power(g)).unwrap_or(0.0);
        apply_effects(castle.defense(garrison_power), &castle.effects)
    }

    /// Resolve a battle between the armies on one tile
    pub fn resolve_field(
        &self,
        armies: &mut [Army],
        position: Position,
        terrain: TerrainKind,
    ) -> Result<CombatResult> {
        let sides = group_sides(armies.iter().map(|a| a.owner), self.factions);
        if sides.len() < 2 {
            return Err(SimError::InvalidTarget(format!(
                "no hostile forces at {}",
                position
            )));
        }

        let side_of = |owner: FactionId| {
            sides
                .iter()
                .position(|s| s.contains(&owner))
                .unwrap_or(0)
        };

        let mut powers = vec![0.0; sides.len()];
        for army in armies.iter() {
            powers[side_of(army.owner)] += self.army_power(army, terrain);
        }

        let result = contest(&powers, self.config);

        let mut reports: Vec<SideReport> = sides
            .iter()
            .zip(&powers)
            .map(|(factions, &power)| SideReport {
                factions: factions.clone(),
                armies: Vec::new(),
                power,
                remaining_power: 0.0,
                units_lost: 0,
            })
            .collect();

        let draw = result.leaders.len() > 1;
        for (side, report) in reports.iter_mut().enumerate() {
            let total: u32 = armies
                .iter()
                .filter(|a| side_of(a.owner) == side)
                .map(Army::total_units)
                .sum();
            let mut lost = units_lost(total, result.keep[side]);
            if draw && result.leaders.contains(&side) {
                // A drawn side always keeps a remnant
                lost = lost.min(total.saturating_sub(1));
            }
            report.units_lost = remove_losses(
                self.catalog,
                armies.iter_mut().filter(|a| side_of(a.owner) == side),
                lost,
            );
        }

        for army in armies.iter_mut() {
            let side = side_of(army.owner);
            reports[side].armies.push(army.id);
            reports[side].remaining_power += army.power();
            army.effects.clear();
        }

        let outcome = match result.leaders.as_slice() {
            [winner] => CombatOutcome::Victory { side: *winner },
            tied => CombatOutcome::Draw {
                sides: tied.to_vec(),
            },
        };

        tracing::debug!(
            "field battle at {}: powers {:?} -> {:?}",
            position,
            powers,
            outcome
        );

        Ok(CombatResult {
            kind: CombatKind::Field,
            position,
            terrain,
            outcome,
            sides: reports,
            siege: None,
        })
    }

    /// Resolve an assault on `castle`.
    ///
    /// `attackers` are every hostile army on the tile and act as one
    /// coalition. `reinforcements` are armies allied with the owner, not
    /// counting the garrison. Emptied armies stay in the slices for the
    /// caller to remove.
    pub fn resolve_siege(
        &self,
        castle: &mut Castle,
        mut garrison: Option<&mut Army>,
        attackers: &mut [Army],
        reinforcements: &mut [Army],
        terrain: TerrainKind,
    ) -> Result<CombatResult> {
        let defender = castle.owner;
        if attackers.is_empty() {
            return Err(SimError::InvalidTarget(format!("{} has no attackers", castle.id)));
        }
        if let Some(ally) = attackers
            .iter()
            .find(|a| self.factions.are_allied(a.owner, defender))
        {
            return Err(SimError::InvalidTarget(format!(
                "{} is allied with the owner of {}",
                ally.id, castle.id
            )));
        }

        let attack: f64 = attackers.iter().map(|a| self.army_power(a, terrain)).sum();
        let reinforcement: f64 = reinforcements
            .iter()
            .map(|a| self.army_power(a, terrain))
            .sum();
        let defense = self.castle_defense(castle, garrison.as_deref());

        // Siege contribution per attacking faction, used to pick the new owner
        let mut contribution: BTreeMap<FactionId, f64> = BTreeMap::new();
        for army in attackers.iter() {
            *contribution.entry(army.owner).or_insert(0.0) += self.army_siege_power(army, terrain);
        }
        let siege_power: f64 = contribution.values().sum();

        let mut report = SiegeReport {
            castle: castle.id,
            defender,
            phase_one: None,
            phase_two: None,
            wall_damage: 0.0,
            garrison: castle.garrison,
            absorbed: Vec::new(),
        };
        let mut attacker_lost = 0u32;
        let mut defender_lost = 0u32;
        let mut attack_keep = 1.0;

        let outcome = 'resolve: {
            if !reinforcements.is_empty() {
                let phase = siege_phase(attack, reinforcement);
                report.phase_one = Some(phase);

                if !phase.attacker_won {
                    let keep = if reinforcement > 0.0 {
                        phase.survivors / reinforcement
                    } else {
                        0.0
                    };
                    defender_lost += scale_all(self.catalog, reinforcements, keep);
                    attacker_lost += scale_all(self.catalog, attackers, 0.0);
                    self.absorb_reinforcements(castle, garrison.as_deref_mut(), reinforcements, &mut report)?;
                    break 'resolve CombatOutcome::Repelled;
                }

                attack_keep = if attack > 0.0 { phase.survivors / attack } else { 0.0 };
                defender_lost += scale_all(self.catalog, reinforcements, 0.0);
            }

            let garrison_power = garrison
                .as_deref()
                .map(|g| self.garrison_power(g))
                .unwrap_or(0.0);
            let remaining_siege = siege_power * attack_keep;

            let final_keep = if garrison_power <= 0.0 {
                if attack * attack_keep <= 0.0 {
                    attacker_lost += scale_all(self.catalog, attackers, 0.0);
                    break 'resolve CombatOutcome::CastleHeld;
                }
                attack_keep
            } else {
                let phase = siege_phase(remaining_siege, defense);
                report.phase_two = Some(phase);

                if !phase.attacker_won {
                    let keep = if defense > 0.0 { phase.survivors / defense } else { 0.0 };
                    if let Some(g) = garrison.as_deref_mut() {
                        defender_lost += scale_all(self.catalog, std::slice::from_mut(g), keep);
                    }
                    attacker_lost += scale_all(self.catalog, attackers, 0.0);
                    report.wall_damage = castle.damage_walls(remaining_siege);
                    break 'resolve CombatOutcome::CastleHeld;
                }
                attack_keep * phase.survivors / remaining_siege
            };

            attacker_lost += scale_all(self.catalog, attackers, final_keep);
            if let Some(g) = garrison.as_deref_mut() {
                defender_lost += g.clear(self.catalog);
            }

            let new_owner = contribution
                .iter()
                .fold(None, |best: Option<(FactionId, f64)>, (&f, &p)| match best {
                    Some((_, bp)) if bp >= p => best,
                    _ => Some((f, p)),
                })
                .map(|(f, _)| f)
                .unwrap_or(attackers[0].owner);

            castle.transfer_ownership(new_owner);
            castle.garrison = self.install_garrison(attackers, new_owner, &mut report)?;
            report.garrison = castle.garrison;

            CombatOutcome::CastleCaptured {
                from: defender,
                to: new_owner,
            }
        };

        for army in attackers.iter_mut().chain(reinforcements.iter_mut()) {
            army.effects.clear();
        }
        if let Some(g) = garrison.as_deref_mut() {
            g.effects.clear();
        }
        castle.effects.clear();

        let attacker_side = SideReport {
            factions: attackers
                .iter()
                .map(|a| a.owner)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
            armies: attackers.iter().map(|a| a.id).collect(),
            power: attack,
            remaining_power: base_power(attackers),
            units_lost: attacker_lost,
        };

        let mut defender_factions: BTreeSet<FactionId> =
            reinforcements.iter().map(|a| a.owner).collect();
        defender_factions.insert(defender);
        let mut defender_armies: Vec<ArmyId> = garrison.as_deref().map(|g| g.id).into_iter().collect();
        defender_armies.extend(reinforcements.iter().map(|a| a.id));
        let garrison_remaining = match &outcome {
            CombatOutcome::CastleCaptured { .. } => 0.0,
            _ => garrison.as_deref().map(Army::power).unwrap_or(0.0),
        };
        let defender_side = SideReport {
            factions: defender_factions.into_iter().collect(),
            armies: defender_armies,
            power: reinforcement + defense,
            remaining_power: garrison_remaining + base_power(reinforcements),
            units_lost: defender_lost,
        };

        tracing::debug!(
            "siege of {}: attack {:.1}, reinforcements {:.1}, defense {:.1} -> {:?}",
            castle.id,
            attack,
            reinforcement,
            defense,
            outcome
        );

        Ok(CombatResult {
            kind: CombatKind::Siege,
            position: castle.position,
            terrain,
            outcome,
            sides: vec![attacker_side, defender_side],
            siege: Some(report),
        })
    }

    /// Fold the owner's surviving reinforcements into the garrison
    fn absorb_reinforcements(
        &self,
        castle: &mut Castle,
        garrison: Option<&mut Army>,
        reinforcements: &mut [Army],
        report: &mut SiegeReport,
    ) -> Result<()> {
        let owned: Vec<usize> = (0..reinforcements.len())
            .filter(|&i| reinforcements[i].owner == castle.owner && !reinforcements[i].is_empty())
            .collect();

        match garrison {
            Some(g) => {
                for i in owned {
                    report.absorbed.push(reinforcements[i].id);
                    g.merge(self.catalog, &mut reinforcements[i])?;
                }
            }
            None => {
                let Some((&first, rest)) = owned.split_first() else {
                    return Ok(());
                };
                for &i in rest {
                    report.absorbed.push(reinforcements[i].id);
                    merge_within(self.catalog, reinforcements, first, i)?;
                }
                castle.garrison = Some(reinforcements[first].id);
            }
        }
        report.garrison = castle.garrison;
        Ok(())
    }

    /// Merge the new owner's surviving attackers into one garrison army
    fn install_garrison(
        &self,
        attackers: &mut [Army],
        owner: FactionId,
        report: &mut SiegeReport,
    ) -> Result<Option<ArmyId>> {
        let owned: Vec<usize> = (0..attackers.len())
            .filter(|&i| attackers[i].owner == owner && !attackers[i].is_empty())
            .collect();
        let Some((&first, rest)) = owned.split_first() else {
            return Ok(None);
        };
        for &i in rest {
            report.absorbed.push(attackers[i].id);
            merge_within(self.catalog, attackers, first, i)?;
        }
        Ok(Some(attackers[first].id))
    }
}
