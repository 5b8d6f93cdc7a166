//! Siegefield - tile-based strategic conflict simulation
//!
//! Factions move armies across terrain, garrison and besiege castles, and
//! settle every encounter with deterministic power comparisons. Rendering,
//! input, and AI policy sit outside this crate and talk to it through
//! `World` commands, queries, and the events `World::tick` returns.

pub mod campaign;
pub mod castle;
pub mod core;
pub mod units;

pub use campaign::{DispatchSource, SimEvent, SpellTarget, TileMap, World, WorldGrid};
pub use core::{Result, SimError, SimulationConfig};
