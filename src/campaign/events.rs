//! Events emitted by the simulation, in the order they happened

use serde::{Deserialize, Serialize};

use crate::campaign::combat::CombatResult;
use crate::castle::building::BuildingKind;
use crate::core::types::{ArmyId, CastleId, FactionId, OrderId, Position};
use crate::units::catalog::UnitTypeId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    MovementStarted {
        order: OrderId,
        army: ArmyId,
        from: Position,
        to: Position,
    },
    TileEntered {
        order: OrderId,
        army: ArmyId,
        position: Position,
    },
    MovementCompleted {
        order: OrderId,
        army: ArmyId,
        position: Position,
    },
    CombatInitiated {
        position: Position,
        armies: Vec<ArmyId>,
        castle: Option<CastleId>,
    },
    CombatResolved(CombatResult),
    ArmyEliminated {
        army: ArmyId,
        owner: FactionId,
    },
    /// `from` was folded into `into` and no longer exists
    ArmiesMerged {
        into: ArmyId,
        from: ArmyId,
    },
    ArmyGarrisoned {
        army: ArmyId,
        castle: CastleId,
    },
    CastleCaptured {
        castle: CastleId,
        from: FactionId,
        to: FactionId,
    },
    ProductionCompleted {
        castle: CastleId,
        building: BuildingKind,
        unit: UnitTypeId,
    },
    BuildingCompleted {
        castle: CastleId,
        building: BuildingKind,
    },
}

impl SimEvent {
    /// Short tag for logs and filters
    pub fn name(&self) -> &'static str {
        match self {
            SimEvent::MovementStarted { .. } => "movement-started",
            SimEvent::TileEntered { .. } => "tile-entered",
            SimEvent::MovementCompleted { .. } => "movement-completed",
            SimEvent::CombatInitiated { .. } => "combat-initiated",
            SimEvent::CombatResolved(_) => "combat-resolved",
            SimEvent::ArmyEliminated { .. } => "army-eliminated",
            SimEvent::ArmiesMerged { .. } => "armies-merged",
            SimEvent::ArmyGarrisoned { .. } => "army-garrisoned",
            SimEvent::CastleCaptured { .. } => "castle-captured",
            SimEvent::ProductionCompleted { .. } => "production-completed",
            SimEvent::BuildingCompleted { .. } => "building-completed",
        }
    }
}
