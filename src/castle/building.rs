//! Castle buildings and their static table

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::core::types::Millis;
use crate::units::catalog::UnitTypeId;

/// Type of building
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingKind {
    Barracks,
    ArcheryRange,
    Sanctum,
    Tower,
    Wall,
    Market,
}

impl BuildingKind {
    pub const ALL: [BuildingKind; 6] = [
        BuildingKind::Barracks,
        BuildingKind::ArcheryRange,
        BuildingKind::Sanctum,
        BuildingKind::Tower,
        BuildingKind::Wall,
        BuildingKind::Market,
    ];

    /// Gold to construct; upgrades scale this by the growth factor
    pub fn base_cost(&self) -> u32 {
        match self {
            BuildingKind::Barracks => 100,
            BuildingKind::ArcheryRange => 120,
            BuildingKind::Sanctum => 200,
            BuildingKind::Tower => 150,
            BuildingKind::Wall => 180,
            BuildingKind::Market => 80,
        }
    }

    /// Construction time before the building becomes effective
    pub fn build_time_ms(&self) -> Millis {
        match self {
            BuildingKind::Barracks => 8_000.0,
            BuildingKind::ArcheryRange => 10_000.0,
            BuildingKind::Sanctum => 15_000.0,
            BuildingKind::Tower => 12_000.0,
            BuildingKind::Wall => 20_000.0,
            BuildingKind::Market => 6_000.0,
        }
    }

    /// Whether the building trains units
    pub fn is_production(&self) -> bool {
        matches!(
            self,
            BuildingKind::Barracks | BuildingKind::ArcheryRange | BuildingKind::Sanctum
        )
    }

    /// Flat defense added to the castle at a given level
    pub fn defense_bonus(&self, level: u32) -> f64 {
        match self {
            BuildingKind::Tower => 4.0 * level as f64,
            _ => 0.0,
        }
    }

    /// Gold per second at a given level
    pub fn income_per_second(&self, level: u32) -> f64 {
        match self {
            BuildingKind::Market => 3.0 * level as f64,
            _ => 0.0,
        }
    }

    /// Training speed multiplier: each level past the first adds 25%
    pub fn training_rate(&self, level: u32) -> f64 {
        1.0 + 0.25 * level.saturating_sub(1) as f64
    }
}

/// A unit being trained
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionJob {
    pub unit: UnitTypeId,
    pub progress_ms: Millis,
    pub required_ms: Millis,
}

impl ProductionJob {
    pub fn new(unit: UnitTypeId, required_ms: Millis) -> Self {
        Self {
            unit,
            progress_ms: 0.0,
            required_ms,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.progress_ms >= self.required_ms
    }
}

/// A building inside a castle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub kind: BuildingKind,
    pub level: u32,
    /// Time left until the building is usable; zero once complete
    pub construction_remaining_ms: Millis,
    pub queue: VecDeque<ProductionJob>,
}

impl Building {
    /// A construction site for a new level-1 building
    pub fn construction_site(kind: BuildingKind) -> Self {
        Self {
            kind,
            level: 1,
            construction_remaining_ms: kind.build_time_ms(),
            queue: VecDeque::new(),
        }
    }

    /// A finished building (world setup)
    pub fn complete(kind: BuildingKind, level: u32) -> Self {
        Self {
            kind,
            level: level.max(1),
            construction_remaining_ms: 0.0,
            queue: VecDeque::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.construction_remaining_ms <= 0.0
    }

    /// Level counted towards bonuses; zero while under construction
    pub fn effective_level(&self) -> u32 {
        if self.is_complete() {
            self.level
        } else {
            0
        }
    }

    /// Advance construction. Returns true on the tick construction finishes.
    pub fn advance_construction(&mut self, delta: Millis) -> bool {
        if self.is_complete() {
            return false;
        }
        self.construction_remaining_ms = (self.construction_remaining_ms - delta).max(0.0);
        self.is_complete()
    }

    /// Advance the job at the head of the queue. Progress stops at the
    /// requirement; a finished job waits until it is paid for.
    pub fn advance_production(&mut self, delta: Millis) -> Option<&ProductionJob> {
        if !self.is_complete() {
            return None;
        }
        let rate = self.kind.training_rate(self.level);
        let job = self.queue.front_mut()?;
        job.progress_ms = (job.progress_ms + delta * rate).min(job.required_ms);
        if job.is_finished() {
            self.queue.front()
        } else {
            None
        }
    }
}
