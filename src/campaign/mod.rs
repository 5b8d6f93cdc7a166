pub mod combat;
pub mod events;
pub mod map;
pub mod movement;
pub mod pathfinding;
pub mod terrain;
pub mod world;

pub use combat::{CombatKind, CombatOutcome, CombatResolver, CombatResult, SideReport, SiegeReport};
pub use events::SimEvent;
pub use map::{TileMap, WorldGrid};
pub use movement::{MovementOrder, MovementScheduler, OrderStatus};
pub use pathfinding::{find_path, Route};
pub use terrain::TerrainKind;
pub use world::{DispatchSource, SpellTarget, World, WorldSnapshot};
