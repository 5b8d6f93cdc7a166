//! Unit layer - catalog, armies, and spell effects

pub mod army;
pub mod catalog;
pub mod spell;

pub use army::{Army, Composition};
pub use catalog::{Catalog, UnitType, UnitTypeId};
pub use spell::{apply_effects, SpellEffect};
