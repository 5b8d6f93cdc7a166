//! Core type definitions used throughout the codebase

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Simulation time in milliseconds
pub type Millis = f64;

/// Unique identifier for factions (players)
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[display(fmt = "faction#{}", _0)]
pub struct FactionId(pub u32);

/// Unique identifier for armies
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[display(fmt = "army#{}", _0)]
pub struct ArmyId(pub u32);

/// Unique identifier for castles
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[display(fmt = "castle#{}", _0)]
pub struct CastleId(pub u32);

/// Handle for a movement order. Ids grow monotonically, so ordering by id is
/// ordering by creation.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[display(fmt = "order#{}", _0)]
pub struct OrderId(pub u32);

/// Integer tile coordinate on a square grid
///
/// Ordering is lexicographic (x, then y); the pathfinder relies on it for
/// deterministic tie-breaking.
#[derive(
    Debug, Display, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[display(fmt = "({}, {})", x, y)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The four orthogonal neighbours in fixed order: east, north, west, south
    pub fn neighbors(&self) -> [Position; 4] {
        [
            Position::new(self.x + 1, self.y),
            Position::new(self.x, self.y - 1),
            Position::new(self.x - 1, self.y),
            Position::new(self.x, self.y + 1),
        ]
    }

    /// Manhattan distance in tiles
    pub fn distance(&self, other: &Position) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}
