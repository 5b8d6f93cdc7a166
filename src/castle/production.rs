//! Castle economy - processes construction, training, and income each tick
//!
//! For every building of a castle, in a fixed order:
//! - construction sites advance and may complete
//! - the head of each production queue advances by the elapsed time
//! - a finished job is paid for in full from the owner's treasury; on
//!   success the unit joins the castle's available pool, otherwise the job
//!   waits at the head of the queue and is retried next tick
//!
//! Walls repair and income accrues afterwards.

use crate::castle::building::BuildingKind;
use crate::castle::fortress::Castle;
use crate::castle::treasury::Treasury;
use crate::core::config::SimulationConfig;
use crate::core::types::Millis;
use crate::units::catalog::{Catalog, UnitTypeId};

/// A unit finished training
#[derive(Debug, Clone, PartialEq)]
pub struct ProductionResult {
    pub building: BuildingKind,
    pub unit: UnitTypeId,
}

/// Everything that happened in one castle during a tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CastleTickReport {
    pub buildings_completed: Vec<BuildingKind>,
    pub trained: Vec<ProductionResult>,
    pub income: u32,
}

/// Advance one castle's economy by `delta` milliseconds
pub fn tick_castle(
    castle: &mut Castle,
    catalog: &Catalog,
    config: &SimulationConfig,
    treasury: &mut impl Treasury,
    delta: Millis,
) -> CastleTickReport {
    let mut report = CastleTickReport::default();
    let owner = castle.owner;
    let castle_id = castle.id;
    let mut trained_units = Vec::new();

    for building in castle.buildings_mut() {
        if building.advance_construction(delta) {
            report.buildings_completed.push(building.kind);
        }

        let Some(job) = building.advance_production(delta) else {
            continue;
        };
        let unit = job.unit;

        // Unit types that vanished from the roster (ownership change) are dropped
        let Some(stats) = catalog.unit_for(owner, unit) else {
            building.queue.pop_front();
            continue;
        };

        match treasury.try_spend(owner, stats.cost) {
            Ok(()) => {
                building.queue.pop_front();
                trained_units.push(unit);
                report.trained.push(ProductionResult {
                    building: building.kind,
                    unit,
                });
            }
            Err(err) => {
                tracing::warn!("{} cannot pay for {}: {}", castle_id, stats.name, err);
            }
        }
    }

    for unit in trained_units {
        castle.add_available(unit, 1);
    }

    // Walls only exist once built; upgrading or finishing one fills them
    for kind in &report.buildings_completed {
        if *kind == BuildingKind::Wall {
            castle.repair_walls(f64::MAX);
        }
    }
    castle.repair_walls(config.wall_repair_per_second * delta / 1000.0);

    report.income = castle.accrue_income(delta);
    if report.income > 0 {
        treasury.deposit(owner, report.income);
    }

    report
}
