//! World state and the command/query surface
//!
//! The world owns every army and castle in id-keyed registries. Castles
//! refer to their garrison by id; ownership is a plain faction id. Callers
//! inject the terrain grid and the treasury on each call that needs them.
//!
//! Each tick runs the castle economy first, then movement. Movement
//! repeatedly sweeps active orders in creation order, stepping each at most
//! one tile per sweep, and runs the occupation check after every step.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::campaign::combat::{CombatOutcome, CombatResolver};
use crate::campaign::events::SimEvent;
use crate::campaign::map::WorldGrid;
use crate::campaign::movement::{tile_time_ms, MovementOrder, MovementScheduler, OrderStatus};
use crate::campaign::pathfinding::find_path;
use crate::campaign::terrain::TerrainKind;
use crate::castle::building::BuildingKind;
use crate::castle::fortress::Castle;
use crate::castle::production::tick_castle;
use crate::castle::treasury::Treasury;
use crate::core::config::SimulationConfig;
use crate::core::error::{Result, SimError};
use crate::core::faction::FactionRegistry;
use crate::core::types::{ArmyId, CastleId, FactionId, Millis, OrderId, Position};
use crate::units::army::{Army, Composition};
use crate::units::catalog::{Catalog, UnitTypeId};
use crate::units::spell::SpellEffect;

/// Where a dispatched army comes from
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchSource {
    /// An existing army, garrison included
    Army(ArmyId),
    /// A new army raised from a castle's trained-unit pool
    Pool {
        castle: CastleId,
        composition: Composition,
    },
    /// A new army split off a castle's garrison
    Garrison {
        castle: CastleId,
        composition: Composition,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpellTarget {
    Army(ArmyId),
    Castle(CastleId),
}

/// Serializable read-only copy of the whole world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub time_ms: Millis,
    pub armies: Vec<Army>,
    pub castles: Vec<Castle>,
    pub orders: Vec<MovementOrder>,
}

pub struct World {
    config: SimulationConfig,
    catalog: Arc<Catalog>,
    factions: FactionRegistry,
    armies: BTreeMap<ArmyId, Army>,
    castles: BTreeMap<CastleId, Castle>,
    scheduler: MovementScheduler,
    /// Events raised by commands, flushed at the start of the next tick
    pending: Vec<SimEvent>,
    next_army: u32,
    next_castle: u32,
    time_ms: Millis,
}

impl World {
    pub fn new(
        config: SimulationConfig,
        catalog: Arc<Catalog>,
        factions: FactionRegistry,
    ) -> Result<Self> {
        config.validate().map_err(SimError::Config)?;
        Ok(Self {
            config,
            catalog,
            factions,
            armies: BTreeMap::new(),
            castles: BTreeMap::new(),
            scheduler: MovementScheduler::new(),
            pending: Vec::new(),
            next_army: 0,
            next_castle: 0,
            time_ms: 0.0,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn factions(&self) -> &FactionRegistry {
        &self.factions
    }

    pub fn ally(&mut self, a: FactionId, b: FactionId) {
        self.factions.ally(a, b);
    }

    pub fn break_alliance(&mut self, a: FactionId, b: FactionId) {
        self.factions.break_alliance(a, b);
    }

    /// Simulated time elapsed
    pub fn time_ms(&self) -> Millis {
        self.time_ms
    }

    // === SETUP ===

    /// Place a new army on the map
    pub fn spawn_army(
        &mut self,
        grid: &impl WorldGrid,
        owner: FactionId,
        position: Position,
        units: impl IntoIterator<Item = (UnitTypeId, u32)>,
    ) -> Result<ArmyId> {
        if !grid.is_passable(position) {
            return Err(SimError::InvalidTarget(format!(
                "cannot place an army on impassable {}",
                position
            )));
        }
        let id = ArmyId(self.next_army + 1);
        let army = Army::with_composition(id, owner, position, units, &self.catalog)?;
        if army.is_empty() {
            return Err(SimError::Validation("army needs at least one unit".into()));
        }
        self.next_army += 1;
        self.armies.insert(id, army);
        Ok(id)
    }

    /// Found a castle at world setup
    pub fn add_castle(
        &mut self,
        grid: &impl WorldGrid,
        owner: FactionId,
        position: Position,
        level: u32,
    ) -> Result<CastleId> {
        if !grid.is_passable(position) {
            return Err(SimError::InvalidTarget(format!(
                "cannot build a castle on impassable {}",
                position
            )));
        }
        if let Some(existing) = self.castle_at(position) {
            return Err(SimError::Validation(format!(
                "{} already stands at {}",
                existing, position
            )));
        }
        self.next_castle += 1;
        let id = CastleId(self.next_castle);
        self.castles.insert(id, Castle::new(id, owner, position, level));
        Ok(id)
    }

    /// Give a castle a finished building without paying for it
    pub fn place_building(&mut self, castle: CastleId, kind: BuildingKind, level: u32) -> Result<()> {
        let entry = self
            .castles
            .remove(&castle)
            .ok_or(SimError::CastleNotFound(castle))?;
        self.castles.insert(castle, entry.with_building(kind, level));
        Ok(())
    }

    /// Station an army already on the castle tile inside it
    pub fn station_garrison(&mut self, castle: CastleId, army: ArmyId) -> Result<()> {
        let c = self.castles.get(&castle).ok_or(SimError::CastleNotFound(castle))?;
        let a = self.armies.get(&army).ok_or(SimError::ArmyNotFound(army))?;
        if a.owner != c.owner || a.position != c.position {
            return Err(SimError::InvalidTarget(format!(
                "{} cannot garrison {}",
                army, castle
            )));
        }
        if c.garrison == Some(army) {
            return Ok(());
        }
        let mut events = Vec::new();
        self.fold_into_garrison(castle, army, &mut events)?;
        self.pending.extend(events);
        Ok(())
    }

    // === COMMANDS ===

    /// Send an army toward `destination`. The route is computed now; the
    /// army starts moving on the next tick.
    pub fn dispatch(
        &mut self,
        grid: &impl WorldGrid,
        source: DispatchSource,
        destination: Position,
    ) -> Result<OrderId> {
        if !grid.is_passable(destination) {
            return Err(SimError::InvalidTarget(format!(
                "destination {} is impassable",
                destination
            )));
        }

        let origin = match &source {
            DispatchSource::Army(id) => {
                self.armies.get(id).ok_or(SimError::ArmyNotFound(*id))?.position
            }
            DispatchSource::Pool {
                castle,
                composition,
            }
            | DispatchSource::Garrison {
                castle,
                composition,
            } => {
                if composition.values().all(|&c| c == 0) {
                    return Err(SimError::Validation("dispatch composition is empty".into()));
                }
                self.castles
                    .get(castle)
                    .ok_or(SimError::CastleNotFound(*castle))?
                    .position
            }
        };

        if origin == destination {
            return Err(SimError::Validation(format!(
                "already at {}",
                destination
            )));
        }

        let route = find_path(grid, origin, destination, &self.config).ok_or(
            SimError::Unreachable {
                from: origin,
                to: destination,
            },
        )?;

        let army_id = match source {
            DispatchSource::Army(id) => {
                for castle in self.castles.values_mut() {
                    if castle.garrison == Some(id) {
                        castle.garrison = None;
                    }
                }
                id
            }
            DispatchSource::Pool {
                castle,
                composition,
            } => self.raise_from_pool(castle, composition)?,
            DispatchSource::Garrison {
                castle,
                composition,
            } => self.split_garrison(castle, &composition)?,
        };

        let order = self.scheduler.issue(army_id, route);
        tracing::debug!("{} dispatched {} from {} to {}", order, army_id, origin, destination);
        self.pending.push(SimEvent::MovementStarted {
            order,
            army: army_id,
            from: origin,
            to: destination,
        });
        Ok(order)
    }

    fn raise_from_pool(&mut self, castle_id: CastleId, composition: Composition) -> Result<ArmyId> {
        let castle = self
            .castles
            .get_mut(&castle_id)
            .ok_or(SimError::CastleNotFound(castle_id))?;
        let id = ArmyId(self.next_army + 1);
        let army = Army::with_composition(
            id,
            castle.owner,
            castle.position,
            composition.clone(),
            &self.catalog,
        )?;
        castle.take_available(&composition)?;
        castle.dispatched.insert(id);
        self.next_army += 1;
        self.armies.insert(id, army);
        Ok(id)
    }

    fn split_garrison(&mut self, castle_id: CastleId, composition: &Composition) -> Result<ArmyId> {
        let castle = self
            .castles
            .get_mut(&castle_id)
            .ok_or(SimError::CastleNotFound(castle_id))?;
        let garrison_id = castle.garrison.ok_or_else(|| {
            SimError::Validation(format!("{} has no garrison", castle_id))
        })?;
        let garrison = self
            .armies
            .get_mut(&garrison_id)
            .ok_or(SimError::ArmyNotFound(garrison_id))?;

        let id = ArmyId(self.next_army + 1);
        let army = garrison.split(&self.catalog, composition, id)?;
        if garrison.is_empty() {
            self.armies.remove(&garrison_id);
            castle.garrison = None;
        }
        castle.dispatched.insert(id);
        self.next_army += 1;
        self.armies.insert(id, army);
        Ok(id)
    }

    /// Stop an order where the army stands
    pub fn cancel(&mut self, order: OrderId) -> Result<()> {
        let cancelled = self.scheduler.cancel(order)?;
        tracing::debug!("{} cancelled at {:?}", order, cancelled.current_tile());
        Ok(())
    }

    /// Queue a spell effect from an army with a spellcaster onto a target in sight
    pub fn cast_spell(
        &mut self,
        grid: &impl WorldGrid,
        caster: ArmyId,
        target: SpellTarget,
        effect: SpellEffect,
    ) -> Result<()> {
        if !effect.is_valid() {
            return Err(SimError::Validation(format!("invalid spell effect {:?}", effect)));
        }
        let caster_army = self.armies.get(&caster).ok_or(SimError::ArmyNotFound(caster))?;
        if !caster_army.has_spellcaster(&self.catalog) {
            return Err(SimError::Validation(format!("{} has no spellcaster", caster)));
        }
        let range = self.army_sight_range(grid, caster).unwrap_or(0);
        let origin = caster_army.position;

        let target_position = match target {
            SpellTarget::Army(id) => self.armies.get(&id).ok_or(SimError::ArmyNotFound(id))?.position,
            SpellTarget::Castle(id) => {
                self.castles.get(&id).ok_or(SimError::CastleNotFound(id))?.position
            }
        };
        if origin.distance(&target_position) > range {
            return Err(SimError::InvalidTarget(format!(
                "{} is out of sight of {}",
                target_position, caster
            )));
        }

        match target {
            SpellTarget::Army(id) => {
                if let Some(army) = self.armies.get_mut(&id) {
                    army.effects.push(effect);
                }
            }
            SpellTarget::Castle(id) => {
                if let Some(castle) = self.castles.get_mut(&id) {
                    castle.effects.push(effect);
                }
            }
        }
        Ok(())
    }

    pub fn construct(
        &mut self,
        castle: CastleId,
        kind: BuildingKind,
        treasury: &mut impl Treasury,
    ) -> Result<()> {
        self.castle_mut(castle)?.construct(kind, treasury)
    }

    pub fn upgrade(
        &mut self,
        castle: CastleId,
        kind: BuildingKind,
        treasury: &mut impl Treasury,
    ) -> Result<u32> {
        self.castles
            .get_mut(&castle)
            .ok_or(SimError::CastleNotFound(castle))?
            .upgrade(kind, &self.config, treasury)
    }

    pub fn upgrade_level(&mut self, castle: CastleId, treasury: &mut impl Treasury) -> Result<u32> {
        self.castles
            .get_mut(&castle)
            .ok_or(SimError::CastleNotFound(castle))?
            .upgrade_level(&self.config, treasury)
    }

    pub fn queue_production(&mut self, castle: CastleId, unit: UnitTypeId) -> Result<()> {
        self.castles
            .get_mut(&castle)
            .ok_or(SimError::CastleNotFound(castle))?
            .queue_production(&self.catalog, unit)
    }

    fn castle_mut(&mut self, id: CastleId) -> Result<&mut Castle> {
        self.castles.get_mut(&id).ok_or(SimError::CastleNotFound(id))
    }

    // === TICK ===

    /// Advance the simulation by `delta_ms`; returns events in order
    pub fn tick(
        &mut self,
        delta_ms: Millis,
        grid: &impl WorldGrid,
        treasury: &mut impl Treasury,
    ) -> Vec<SimEvent> {
        let delta = delta_ms.max(0.0);
        let mut events = std::mem::take(&mut self.pending);
        self.time_ms += delta;

        self.tick_economy(delta, treasury, &mut events);
        self.tick_movement(delta, grid, &mut events);

        events
    }

    fn tick_economy(&mut self, delta: Millis, treasury: &mut impl Treasury, events: &mut Vec<SimEvent>) {
        for castle in self.castles.values_mut() {
            let report = tick_castle(castle, &self.catalog, &self.config, treasury, delta);
            for building in report.buildings_completed {
                events.push(SimEvent::BuildingCompleted {
                    castle: castle.id,
                    building,
                });
            }
            for trained in report.trained {
                events.push(SimEvent::ProductionCompleted {
                    castle: castle.id,
                    building: trained.building,
                    unit: trained.unit,
                });
            }
        }
    }

    fn tick_movement(&mut self, delta: Millis, grid: &impl WorldGrid, events: &mut Vec<SimEvent>) {
        self.scheduler.begin_tick(delta);
        let base = self.config.base_time_per_tile_ms;

        loop {
            let mut advanced = false;

            for order_id in self.scheduler.ids() {
                let Some(order) = self.scheduler.get(order_id) else {
                    continue;
                };
                if !order.is_active() {
                    continue;
                }
                let army_id = order.army;
                let next = order.next_tile();

                let Some(army) = self.armies.get(&army_id) else {
                    self.scheduler.remove_army(army_id, OrderStatus::Cancelled);
                    continue;
                };

                // Terrain may have changed since the route was planned
                if next.is_some_and(|n| !grid.is_passable(n)) {
                    tracing::warn!("{} blocked at {}; cancelling", order_id, army.position);
                    self.scheduler.remove_army(army_id, OrderStatus::Cancelled);
                    continue;
                }

                let modifier = grid
                    .terrain(army.position)
                    .map(|t| t.movement_modifier())
                    .unwrap_or(0.0);
                let tile_time = tile_time_ms(base, army.speed(), modifier);

                let Some(entered) = self
                    .scheduler
                    .get_mut(order_id)
                    .and_then(|o| o.try_step(tile_time))
                else {
                    continue;
                };
                advanced = true;

                if let Some(army) = self.armies.get_mut(&army_id) {
                    army.position = entered;
                }
                events.push(SimEvent::TileEntered {
                    order: order_id,
                    army: army_id,
                    position: entered,
                });

                self.occupation_check(grid, order_id, army_id, entered, events);
            }

            if !advanced {
                break;
            }
        }
    }

    /// Decide what happens to an army that just stepped onto `pos`
    fn occupation_check(
        &mut self,
        grid: &impl WorldGrid,
        order_id: OrderId,
        army_id: ArmyId,
        pos: Position,
        events: &mut Vec<SimEvent>,
    ) {
        let Some(owner) = self.armies.get(&army_id).map(|a| a.owner) else {
            return;
        };
        let at_destination = self
            .scheduler
            .get(order_id)
            .is_some_and(|o| o.destination == pos);
        let terrain = grid.terrain(pos).unwrap_or_default();
        let castle = self.castle_at(pos);

        if let Some(castle_id) = castle {
            let castle_owner = self.castles.get(&castle_id).map(|c| c.owner);
            if castle_owner.is_some_and(|o| !self.factions.are_allied(owner, o)) {
                let participants = self.siege(castle_id, terrain, events);
                self.after_combat(order_id, army_id, at_destination, &participants, events);
                return;
            }
        }

        // An allied castle's garrison stays behind its walls; only field
        // armies on the tile fight
        let hostile = self
            .field_armies_at(pos)
            .iter()
            .any(|a| a.id != army_id && !self.factions.are_allied(a.owner, owner));
        if hostile {
            let participants = self.field_battle(pos, terrain, events);
            self.after_combat(order_id, army_id, at_destination, &participants, events);
            return;
        }

        if !at_destination {
            // Own armies met on the way join the march; own castles are passed
            let met: Vec<ArmyId> = self
                .field_armies_at(pos)
                .iter()
                .filter(|a| a.id != army_id && a.owner == owner)
                .map(|a| a.id)
                .collect();
            for from in met {
                self.merge_armies(army_id, from, events);
            }
            return;
        }

        self.complete_order(army_id, pos, events);

        if let Some(castle_id) = castle.filter(|c| self.castles.get(c).is_some_and(|c| c.owner == owner)) {
            if let Err(err) = self.fold_into_garrison(castle_id, army_id, events) {
                tracing::warn!("{} could not join {}: {}", army_id, castle_id, err);
            }
            return;
        }

        let partner = self
            .field_armies_at(pos)
            .iter()
            .find(|a| a.id != army_id && a.owner == owner)
            .map(|a| a.id);
        if let Some(into) = partner {
            self.merge_armies(into, army_id, events);
        }
    }

    fn complete_order(&mut self, army_id: ArmyId, pos: Position, events: &mut Vec<SimEvent>) {
        if let Some(order) = self.scheduler.remove_army(army_id, OrderStatus::Completed) {
            events.push(SimEvent::MovementCompleted {
                order: order.id,
                army: army_id,
                position: pos,
            });
        }
    }

    /// Pause survivors; a mover that survived on its destination has arrived
    fn after_combat(
        &mut self,
        order_id: OrderId,
        army_id: ArmyId,
        at_destination: bool,
        participants: &[ArmyId],
        events: &mut Vec<SimEvent>,
    ) {
        for id in participants {
            self.scheduler.pause_army(*id);
        }
        let mover_order = self.scheduler.order_for_army(army_id);
        if at_destination && mover_order == Some(order_id) {
            if let Some(pos) = self.armies.get(&army_id).map(|a| a.position) {
                self.complete_order(army_id, pos, events);
            }
        }
    }

    /// Fold `from` into `into`; both must share an owner
    fn merge_armies(&mut self, into: ArmyId, from: ArmyId, events: &mut Vec<SimEvent>) {
        let Some(mut source) = self.armies.remove(&from) else {
            return;
        };
        let Some(target) = self.armies.get_mut(&into) else {
            self.armies.insert(from, source);
            return;
        };
        match target.merge(&self.catalog, &mut source) {
            Ok(()) => {
                self.scheduler.remove_army(from, OrderStatus::Completed);
                for castle in self.castles.values_mut() {
                    castle.dispatched.remove(&from);
                }
                events.push(SimEvent::ArmiesMerged { into, from });
            }
            Err(err) => {
                tracing::warn!("merge of {} into {} failed: {}", from, into, err);
                self.armies.insert(from, source);
            }
        }
    }

    /// Put an army inside a castle of the same owner, merging it into an
    /// existing garrison
    fn fold_into_garrison(
        &mut self,
        castle_id: CastleId,
        army_id: ArmyId,
        events: &mut Vec<SimEvent>,
    ) -> Result<()> {
        let existing = self
            .castles
            .get(&castle_id)
            .ok_or(SimError::CastleNotFound(castle_id))?
            .garrison
            .filter(|g| self.armies.contains_key(g));

        self.scheduler.remove_army(army_id, OrderStatus::Completed);
        match existing {
            Some(garrison) => self.merge_armies(garrison, army_id, events),
            None => {
                if let Some(castle) = self.castles.get_mut(&castle_id) {
                    castle.garrison = Some(army_id);
                }
            }
        }
        events.push(SimEvent::ArmyGarrisoned {
            army: army_id,
            castle: castle_id,
        });
        Ok(())
    }

    fn take_armies(&mut self, ids: &[ArmyId]) -> Vec<Army> {
        ids.iter().filter_map(|id| self.armies.remove(id)).collect()
    }

    fn return_armies(&mut self, armies: impl IntoIterator<Item = Army>) {
        for army in armies {
            self.armies.insert(army.id, army);
        }
    }

    fn field_battle(&mut self, pos: Position, terrain: TerrainKind, events: &mut Vec<SimEvent>) -> Vec<ArmyId> {
        let ids: Vec<ArmyId> = self.field_armies_at(pos).iter().map(|a| a.id).collect();
        events.push(SimEvent::CombatInitiated {
            position: pos,
            armies: ids.clone(),
            castle: None,
        });

        let mut armies = self.take_armies(&ids);
        let resolver = CombatResolver::new(&self.catalog, &self.config, &self.factions);
        let result = resolver.resolve_field(&mut armies, pos, terrain);
        self.return_armies(armies);

        match result {
            Ok(result) => {
                events.push(SimEvent::CombatResolved(result));
                self.remove_emptied(&ids, &[], None, events);
            }
            Err(err) => tracing::warn!("battle at {} not resolved: {}", pos, err),
        }
        ids
    }

    fn siege(&mut self, castle_id: CastleId, terrain: TerrainKind, events: &mut Vec<SimEvent>) -> Vec<ArmyId> {
        let Some(castle) = self.castles.get(&castle_id) else {
            return Vec::new();
        };
        let pos = castle.position;
        let defender = castle.owner;
        let previous_garrison = castle.garrison.filter(|g| self.armies.contains_key(g));

        let mut attacker_ids = Vec::new();
        let mut reinforcement_ids = Vec::new();
        for army in self.field_armies_at(pos) {
            if self.factions.are_allied(army.owner, defender) {
                reinforcement_ids.push(army.id);
            } else {
                attacker_ids.push(army.id);
            }
        }

        let mut participants: Vec<ArmyId> = previous_garrison.into_iter().collect();
        participants.extend(&attacker_ids);
        participants.extend(&reinforcement_ids);
        participants.sort();
        events.push(SimEvent::CombatInitiated {
            position: pos,
            armies: participants.clone(),
            castle: Some(castle_id),
        });

        let mut attackers = self.take_armies(&attacker_ids);
        let mut reinforcements = self.take_armies(&reinforcement_ids);
        let mut garrison = previous_garrison.and_then(|id| self.armies.remove(&id));

        let result = match self.castles.get_mut(&castle_id) {
            Some(castle) => {
                let resolver = CombatResolver::new(&self.catalog, &self.config, &self.factions);
                resolver.resolve_siege(
                    castle,
                    garrison.as_mut(),
                    &mut attackers,
                    &mut reinforcements,
                    terrain,
                )
            }
            None => Err(SimError::CastleNotFound(castle_id)),
        };

        self.return_armies(attackers);
        self.return_armies(reinforcements);
        self.return_armies(garrison);

        let result = match result {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!("siege of {} not resolved: {}", castle_id, err);
                return participants;
            }
        };

        let captured = match result.outcome {
            CombatOutcome::CastleCaptured { from, to } => Some((from, to)),
            _ => None,
        };
        let (absorbed, new_garrison) = result
            .siege
            .as_ref()
            .map(|s| (s.absorbed.clone(), s.garrison))
            .unwrap_or_default();

        events.push(SimEvent::CombatResolved(result));
        self.remove_emptied(&participants, &absorbed, new_garrison, events);

        if let Some((from, to)) = captured {
            tracing::info!("{} captured by {} from {}", castle_id, to, from);
            events.push(SimEvent::CastleCaptured {
                castle: castle_id,
                from,
                to,
            });
        }

        if let Some(garrison) = new_garrison.filter(|g| Some(*g) != previous_garrison) {
            self.scheduler.remove_army(garrison, OrderStatus::Completed);
            events.push(SimEvent::ArmyGarrisoned {
                army: garrison,
                castle: castle_id,
            });
        }

        participants
    }

    /// Drop armies a combat emptied. Absorbed armies were merged into
    /// `into`; everything else empty was destroyed.
    fn remove_emptied(
        &mut self,
        ids: &[ArmyId],
        absorbed: &[ArmyId],
        into: Option<ArmyId>,
        events: &mut Vec<SimEvent>,
    ) {
        for id in ids {
            let Some(army) = self.armies.get(id) else {
                continue;
            };
            if !army.is_empty() {
                continue;
            }
            let owner = army.owner;
            self.armies.remove(id);
            self.scheduler.remove_army(*id, OrderStatus::Cancelled);
            for castle in self.castles.values_mut() {
                if castle.garrison == Some(*id) {
                    castle.garrison = None;
                }
                castle.dispatched.remove(id);
            }

            match into.filter(|_| absorbed.contains(id)) {
                Some(into) => events.push(SimEvent::ArmiesMerged { into, from: *id }),
                None => {
                    tracing::debug!("{} of {} eliminated", id, owner);
                    events.push(SimEvent::ArmyEliminated { army: *id, owner });
                }
            }
        }
    }

    // === QUERIES ===

    pub fn army(&self, id: ArmyId) -> Option<&Army> {
        self.armies.get(&id)
    }

    pub fn castle(&self, id: CastleId) -> Option<&Castle> {
        self.castles.get(&id)
    }

    pub fn army_snapshot(&self, id: ArmyId) -> Option<Army> {
        self.armies.get(&id).cloned()
    }

    pub fn castle_snapshot(&self, id: CastleId) -> Option<Castle> {
        self.castles.get(&id).cloned()
    }

    pub fn armies(&self) -> impl Iterator<Item = &Army> {
        self.armies.values()
    }

    pub fn castles(&self) -> impl Iterator<Item = &Castle> {
        self.castles.values()
    }

    pub fn order(&self, id: OrderId) -> Option<&MovementOrder> {
        self.scheduler.get(id)
    }

    pub fn order_for_army(&self, army: ArmyId) -> Option<&MovementOrder> {
        self.scheduler
            .order_for_army(army)
            .and_then(|id| self.scheduler.get(id))
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            time_ms: self.time_ms,
            armies: self.armies.values().cloned().collect(),
            castles: self.castles.values().cloned().collect(),
            orders: self.scheduler.orders().cloned().collect(),
        }
    }

    pub fn castle_at(&self, pos: Position) -> Option<CastleId> {
        self.castles
            .values()
            .find(|c| c.position == pos)
            .map(|c| c.id)
    }

    /// Castle whose garrison is `army`
    pub fn garrisoned_in(&self, army: ArmyId) -> Option<CastleId> {
        self.castles
            .values()
            .find(|c| c.garrison == Some(army))
            .map(|c| c.id)
    }

    /// Armies standing on a tile outside any castle, in id order
    pub fn armies_at(&self, pos: Position) -> Vec<ArmyId> {
        self.field_armies_at(pos).iter().map(|a| a.id).collect()
    }

    fn field_armies_at(&self, pos: Position) -> Vec<&Army> {
        self.armies
            .values()
            .filter(|a| a.position == pos && self.garrisoned_in(a.id).is_none())
            .collect()
    }

    /// Current castle defense, including queued castle effects
    pub fn castle_defense(&self, id: CastleId) -> Option<f64> {
        let castle = self.castles.get(&id)?;
        let garrison = castle.garrison.and_then(|g| self.armies.get(&g));
        let resolver = CombatResolver::new(&self.catalog, &self.config, &self.factions);
        Some(resolver.castle_defense(castle, garrison))
    }

    pub fn army_sight_range(&self, grid: &impl WorldGrid, id: ArmyId) -> Option<u32> {
        let army = self.armies.get(&id)?;
        let terrain = grid.terrain(army.position).unwrap_or_default();
        Some(terrain.sight_range(self.config.base_sight_range))
    }

    /// Castles see further with every level and tower level
    pub fn castle_sight_range(&self, grid: &impl WorldGrid, id: CastleId) -> Option<u32> {
        let castle = self.castles.get(&id)?;
        let terrain = grid.terrain(castle.position).unwrap_or_default();
        Some(
            terrain.sight_range(self.config.base_sight_range)
                + castle.level
                + castle.building_level(BuildingKind::Tower),
        )
    }

    /// Non-allied armies within sight of any army or castle of `faction`
    pub fn visible_armies(&self, grid: &impl WorldGrid, faction: FactionId) -> Vec<ArmyId> {
        let mut observers: Vec<(Position, u32)> = self
            .armies
            .values()
            .filter(|a| a.owner == faction)
            .filter_map(|a| Some((a.position, self.army_sight_range(grid, a.id)?)))
            .collect();
        observers.extend(
            self.castles
                .values()
                .filter(|c| c.owner == faction)
                .filter_map(|c| Some((c.position, self.castle_sight_range(grid, c.id)?))),
        );

        self.armies
            .values()
            .filter(|a| !self.factions.are_allied(a.owner, faction))
            .filter(|a| {
                observers
                    .iter()
                    .any(|(pos, range)| pos.distance(&a.position) <= *range)
            })
            .map(|a| a.id)
            .collect()
    }
}
