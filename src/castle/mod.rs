//! Castle layer - buildings, production, treasury, and defense

pub mod building;
pub mod fortress;
pub mod production;
pub mod treasury;

pub use building::{Building, BuildingKind, ProductionJob};
pub use fortress::Castle;
pub use production::{tick_castle, CastleTickReport, ProductionResult};
pub use treasury::{Ledger, Treasury};
