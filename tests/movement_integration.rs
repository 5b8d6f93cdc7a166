//! Integration tests for terrain-aware movement
//!
//! Per-tile time is `base / (speed × modifier)` on the tile being left, so
//! these tests pin arrival ticks for known speeds and terrains.

use std::sync::Arc;

use siegefield::campaign::movement::OrderStatus;
use siegefield::campaign::terrain::TerrainKind;
use siegefield::campaign::{DispatchSource, SimEvent, TileMap, World};
use siegefield::castle::{BuildingKind, Ledger};
use siegefield::core::types::{FactionId, Position};
use siegefield::core::FactionRegistry;
use siegefield::units::{Catalog, UnitType, UnitTypeId};
use siegefield::SimulationConfig;

const KINGDOM: FactionId = FactionId(1);
const MILITIA: UnitTypeId = UnitTypeId(1);
const MAGE: UnitTypeId = UnitTypeId(4);

fn world_with(catalog: Catalog) -> World {
    World::new(
        SimulationConfig::default(),
        Arc::new(catalog),
        FactionRegistry::new(),
    )
    .unwrap()
}

fn entered(events: &[SimEvent]) -> Vec<Position> {
    events
        .iter()
        .filter_map(|e| match e {
            SimEvent::TileEntered { position, .. } => Some(*position),
            _ => None,
        })
        .collect()
}

/// Army of speed 7.5: 100 militia (speed 10) and one mage (speed 5)
fn mixed_column(world: &mut World, map: &TileMap) -> siegefield::core::types::ArmyId {
    world
        .spawn_army(map, KINGDOM, Position::new(0, 0), [(MILITIA, 100), (MAGE, 1)])
        .unwrap()
}

#[test]
fn test_plains_tile_takes_133ms_at_speed_7_5() {
    let map = TileMap::new(3, 1, TerrainKind::Plains);
    let mut world = world_with(Catalog::with_defaults());
    let mut ledger = Ledger::new();
    let army = mixed_column(&mut world, &map);
    assert_eq!(world.army(army).unwrap().speed(), 7.5);

    world
        .dispatch(&map, DispatchSource::Army(army), Position::new(2, 0))
        .unwrap();

    assert!(entered(&world.tick(133.0, &map, &mut ledger)).is_empty());
    assert_eq!(entered(&world.tick(1.0, &map, &mut ledger)), vec![Position::new(1, 0)]);
}

#[test]
fn test_road_tile_takes_67ms() {
    let map = TileMap::from_rows(&["==."]).unwrap();
    let mut world = world_with(Catalog::with_defaults());
    let mut ledger = Ledger::new();
    let army = mixed_column(&mut world, &map);
    world
        .dispatch(&map, DispatchSource::Army(army), Position::new(2, 0))
        .unwrap();

    assert!(entered(&world.tick(66.0, &map, &mut ledger)).is_empty());
    assert_eq!(entered(&world.tick(1.0, &map, &mut ledger)), vec![Position::new(1, 0)]);
}

#[test]
fn test_forest_tile_takes_267ms() {
    let map = TileMap::from_rows(&["f.."]).unwrap();
    let mut world = world_with(Catalog::with_defaults());
    let mut ledger = Ledger::new();
    let army = mixed_column(&mut world, &map);
    world
        .dispatch(&map, DispatchSource::Army(army), Position::new(2, 0))
        .unwrap();

    assert!(entered(&world.tick(266.0, &map, &mut ledger)).is_empty());
    assert_eq!(entered(&world.tick(1.0, &map, &mut ledger)), vec![Position::new(1, 0)]);
}

#[test]
fn test_large_tick_walks_several_tiles() {
    let map = TileMap::new(6, 1, TerrainKind::Plains);
    let mut world = world_with(Catalog::with_defaults());
    let mut ledger = Ledger::new();
    let army = world
        .spawn_army(&map, KINGDOM, Position::new(0, 0), [(MILITIA, 5)])
        .unwrap();
    let order = world
        .dispatch(&map, DispatchSource::Army(army), Position::new(5, 0))
        .unwrap();

    let events = world.tick(350.0, &map, &mut ledger);
    assert_eq!(
        entered(&events),
        vec![Position::new(1, 0), Position::new(2, 0), Position::new(3, 0)]
    );
    assert_eq!(world.order(order).unwrap().status, OrderStatus::Active);
    assert!((world.order(order).unwrap().elapsed_ms - 50.0).abs() < 1e-9);
}

#[test]
fn test_zero_speed_army_stalls() {
    let mut catalog = Catalog::new();
    catalog.add_faction(KINGDOM, "Kingdom");
    catalog
        .add_unit(UnitType {
            id: UnitTypeId(90),
            name: "Siege Tower".into(),
            faction: KINGDOM,
            power: 4.0,
            speed: 0.0,
            cost: 100,
            train_time_ms: 10_000.0,
            trained_at: BuildingKind::Barracks,
            ranged: false,
            spellcaster: false,
            anti_castle_multiplier: 3.0,
            special: None,
        })
        .unwrap();
    let map = TileMap::new(3, 1, TerrainKind::Plains);
    let mut world = world_with(catalog);
    let mut ledger = Ledger::new();

    let tower = world
        .spawn_army(&map, KINGDOM, Position::new(0, 0), [(UnitTypeId(90), 1)])
        .unwrap();
    let order = world
        .dispatch(&map, DispatchSource::Army(tower), Position::new(2, 0))
        .unwrap();

    for _ in 0..20 {
        world.tick(10_000.0, &map, &mut ledger);
    }
    assert_eq!(world.army(tower).unwrap().position, Position::new(0, 0));
    assert!(world.order(order).unwrap().is_active());
}

#[test]
fn test_route_detours_around_mountains() {
    let map = TileMap::from_rows(&[
        ".^.",
        "...",
    ])
    .unwrap();
    let mut world = world_with(Catalog::with_defaults());
    let mut ledger = Ledger::new();
    let army = world
        .spawn_army(&map, KINGDOM, Position::new(0, 0), [(MILITIA, 5)])
        .unwrap();
    world
        .dispatch(&map, DispatchSource::Army(army), Position::new(2, 0))
        .unwrap();

    let path = entered(&world.tick(1_000.0, &map, &mut ledger));
    assert_eq!(
        path,
        vec![Position::new(0, 1), Position::new(1, 1), Position::new(2, 1), Position::new(2, 0)]
    );
}

#[test]
fn test_redispatch_replaces_order() {
    let map = TileMap::new(5, 1, TerrainKind::Plains);
    let mut world = world_with(Catalog::with_defaults());
    let mut ledger = Ledger::new();
    let army = world
        .spawn_army(&map, KINGDOM, Position::new(2, 0), [(MILITIA, 5)])
        .unwrap();

    let east = world
        .dispatch(&map, DispatchSource::Army(army), Position::new(4, 0))
        .unwrap();
    let west = world
        .dispatch(&map, DispatchSource::Army(army), Position::new(0, 0))
        .unwrap();
    assert!(world.order(east).is_none());

    world.tick(1_000.0, &map, &mut ledger);
    assert_eq!(world.army(army).unwrap().position, Position::new(0, 0));
    assert!(world.order(west).is_none());
}
