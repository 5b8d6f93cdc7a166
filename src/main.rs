//! Siegefield - headless campaign runner
//!
//! Builds a two-faction scenario on a generated map, dispatches an army from
//! each side toward the other's castle, and runs the simulation for a fixed
//! number of ticks, logging every event.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use siegefield::campaign::terrain::TerrainKind;
use siegefield::campaign::{DispatchSource, SimEvent, TileMap, World};
use siegefield::castle::{BuildingKind, Ledger, Treasury};
use siegefield::core::types::{FactionId, Position};
use siegefield::core::{Faction, FactionRegistry};
use siegefield::units::{Catalog, UnitTypeId};
use siegefield::{Result, SimulationConfig};

const KINGDOM: FactionId = FactionId(1);
const HORDE: FactionId = FactionId(2);

/// Run a headless siege campaign between two factions
#[derive(Parser, Debug)]
#[command(name = "siegefield")]
#[command(about = "Run a deterministic two-faction siege campaign")]
struct Args {
    /// Random seed for map generation
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Map width in tiles
    #[arg(long, default_value_t = 24)]
    width: i32,

    /// Map height in tiles
    #[arg(long, default_value_t = 16)]
    height: i32,

    /// Number of ticks to simulate
    #[arg(long, default_value_t = 600)]
    ticks: u32,

    /// Simulated milliseconds per tick
    #[arg(long, default_value_t = 100.0)]
    delta_ms: f64,

    /// Simulation config (TOML); defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Unit catalog (TOML); the built-in catalog is used when omitted
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Print the final world snapshot as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("siegefield=info")
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => SimulationConfig::load_from_toml(path)?,
        None => SimulationConfig::default(),
    };
    let catalog = match &args.catalog {
        Some(path) => Catalog::load_from_toml(path)?,
        None => Catalog::with_defaults(),
    };

    let width = args.width.max(8);
    let height = args.height.max(8);
    let mut map = TileMap::generate(width, height, args.seed);

    let home = Position::new(2, 2);
    let enemy_home = Position::new(width - 3, height - 3);
    lay_road(&mut map, home, enemy_home);

    let mut factions = FactionRegistry::new();
    factions.register(Faction::new(KINGDOM, "Kingdom"));
    factions.register(Faction::new(HORDE, "Horde"));

    let mut world = World::new(config, Arc::new(catalog), factions)?;
    let mut ledger = Ledger::new()
        .with_balance(KINGDOM, 600)
        .with_balance(HORDE, 600);

    let keep = world.add_castle(&map, KINGDOM, home, 2)?;
    world.place_building(keep, BuildingKind::Barracks, 1)?;
    world.place_building(keep, BuildingKind::Wall, 1)?;
    let guard = world.spawn_army(&map, KINGDOM, home, [(UnitTypeId(1), 20), (UnitTypeId(2), 5)])?;
    world.station_garrison(keep, guard)?;

    let stronghold = world.add_castle(&map, HORDE, enemy_home, 1)?;
    world.place_building(stronghold, BuildingKind::Barracks, 1)?;
    let warband = world.spawn_army(&map, HORDE, enemy_home, [(UnitTypeId(11), 12)])?;
    world.station_garrison(stronghold, warband)?;

    let host = world.spawn_army(
        &map,
        HORDE,
        enemy_home,
        [
            (UnitTypeId(11), 30),
            (UnitTypeId(13), 4),
            (UnitTypeId(14), 1),
            (UnitTypeId(15), 2),
        ],
    )?;
    let expedition = world.spawn_army(
        &map,
        KINGDOM,
        home,
        [(UnitTypeId(1), 15), (UnitTypeId(3), 3), (UnitTypeId(4), 1)],
    )?;

    for unit in [UnitTypeId(1), UnitTypeId(1), UnitTypeId(3)] {
        world.queue_production(keep, unit)?;
    }
    world.queue_production(stronghold, UnitTypeId(11))?;

    for (army, target) in [(host, home), (expedition, enemy_home)] {
        if let Err(err) = world.dispatch(&map, DispatchSource::Army(army), target) {
            tracing::warn!("{} stays home: {}", army, err);
        }
    }

    tracing::info!(
        "Siegefield starting: {}x{} map, seed {}, {} ticks of {}ms",
        width,
        height,
        args.seed,
        args.ticks,
        args.delta_ms
    );

    for tick in 0..args.ticks {
        let events = world.tick(args.delta_ms, &map, &mut ledger);
        for event in &events {
            log_event(tick, event);
        }
    }

    for castle in world.castles() {
        let defense = world.castle_defense(castle.id).unwrap_or(0.0);
        tracing::info!(
            "{} at {} held by {} (level {}, defense {:.1})",
            castle.id,
            castle.position,
            castle.owner,
            castle.level,
            defense
        );
    }
    for army in world.armies() {
        tracing::info!(
            "{} of {} at {}: {} units, power {:.1}",
            army.id,
            army.owner,
            army.position,
            army.total_units(),
            army.power()
        );
    }
    tracing::info!(
        "treasury: {} {}, {} {}",
        KINGDOM,
        ledger.balance(KINGDOM),
        HORDE,
        ledger.balance(HORDE)
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&world.snapshot())?);
    }

    Ok(())
}

/// Carve an L-shaped road between two tiles so both castles are connected
fn lay_road(map: &mut TileMap, from: Position, to: Position) {
    let (x0, x1) = (from.x.min(to.x), from.x.max(to.x));
    let (y0, y1) = (from.y.min(to.y), from.y.max(to.y));
    for x in x0..=x1 {
        map.set(Position::new(x, from.y), TerrainKind::Road);
    }
    for y in y0..=y1 {
        map.set(Position::new(to.x, y), TerrainKind::Road);
    }
}

fn log_event(tick: u32, event: &SimEvent) {
    match event {
        SimEvent::TileEntered { .. } => tracing::debug!("[{}] {:?}", tick, event),
        SimEvent::CombatResolved(result) => tracing::info!(
            "[{}] combat at {} on {:?}: {:?}, {} units lost",
            tick,
            result.position,
            result.terrain,
            result.outcome,
            result.total_units_lost()
        ),
        _ => tracing::info!("[{}] {}: {:?}", tick, event.name(), event),
    }
}
