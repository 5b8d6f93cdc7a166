pub mod config;
pub mod error;
pub mod faction;
pub mod types;

pub use config::SimulationConfig;
pub use error::{Result, SimError};
pub use faction::{Faction, FactionRegistry};
