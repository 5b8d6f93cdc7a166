//! Integration tests for combat driven through world ticks
//!
//! Armies are dispatched with real orders and fight when the movement
//! scheduler steps them onto an occupied tile:
//! - two-phase sieges that hold or capture
//! - field battles between armies meeting mid-route
//! - draws, alliances, and replay determinism
//! - own armies met on the way joining the march

use std::sync::Arc;

use siegefield::campaign::combat::CombatOutcome;
use siegefield::campaign::terrain::TerrainKind;
use siegefield::campaign::{DispatchSource, SimEvent, SpellTarget, TileMap, World};
use siegefield::castle::{BuildingKind, Ledger};
use siegefield::core::types::{ArmyId, CastleId, FactionId, Position};
use siegefield::core::FactionRegistry;
use siegefield::units::{Catalog, SpellEffect, UnitType, UnitTypeId};
use siegefield::SimulationConfig;

const KINGDOM: FactionId = FactionId(1);
const HORDE: FactionId = FactionId(2);
const MILITIA: UnitTypeId = UnitTypeId(1);
const RAIDER: UnitTypeId = UnitTypeId(11);
const SHAMAN: UnitTypeId = UnitTypeId(14);

fn new_world() -> World {
    World::new(
        SimulationConfig::default(),
        Arc::new(Catalog::with_defaults()),
        FactionRegistry::new(),
    )
    .unwrap()
}

fn plains(width: i32) -> TileMap {
    TileMap::new(width, 1, TerrainKind::Plains)
}

/// Level-0 castle at the east end of a 3-tile strip with a militia garrison
/// and militia reinforcements, and a raider army approaching from the west
fn siege_setup(garrison: u32, reinforcements: u32, raiders: u32) -> (World, TileMap, CastleId, ArmyId, ArmyId, ArmyId) {
    let map = plains(3);
    let mut world = new_world();
    let castle_pos = Position::new(2, 0);

    let castle = world.add_castle(&map, KINGDOM, castle_pos, 0).unwrap();
    let guard = world.spawn_army(&map, KINGDOM, castle_pos, [(MILITIA, garrison)]).unwrap();
    world.station_garrison(castle, guard).unwrap();
    let relief = world
        .spawn_army(&map, KINGDOM, castle_pos, [(MILITIA, reinforcements)])
        .unwrap();
    let attacker = world
        .spawn_army(&map, HORDE, Position::new(0, 0), [(RAIDER, raiders)])
        .unwrap();
    world
        .dispatch(&map, DispatchSource::Army(attacker), castle_pos)
        .unwrap();

    (world, map, castle, guard, relief, attacker)
}

#[test]
fn test_siege_castle_holds_after_losing_phase_one_lead() {
    let (mut world, map, castle, guard, relief, attacker) = siege_setup(10, 4, 10);
    let mut ledger = Ledger::new();

    let events = world.tick(1_000.0, &map, &mut ledger);

    let resolved = events
        .iter()
        .find_map(|e| match e {
            SimEvent::CombatResolved(result) => Some(result),
            _ => None,
        })
        .expect("siege resolved");
    assert_eq!(resolved.outcome, CombatOutcome::CastleHeld);
    let siege = resolved.siege.as_ref().unwrap();
    assert!((siege.phase_one.unwrap().survivors - 6.0).abs() < 1e-9);

    let c = world.castle(castle).unwrap();
    assert_eq!(c.owner, KINGDOM);
    assert_eq!(c.garrison, Some(guard));
    assert_eq!(world.army(guard).unwrap().count(MILITIA), 4);

    assert!(world.army(attacker).is_none());
    assert!(world.army(relief).is_none());
    assert!(events.contains(&SimEvent::ArmyEliminated {
        army: attacker,
        owner: HORDE
    }));
    assert!(world.order_for_army(attacker).is_none());
}

#[test]
fn test_siege_capture_transfers_ownership() {
    let (mut world, map, castle, guard, relief, attacker) = siege_setup(3, 2, 10);
    let mut ledger = Ledger::new();

    let events = world.tick(1_000.0, &map, &mut ledger);

    assert!(events.contains(&SimEvent::CastleCaptured {
        castle,
        from: KINGDOM,
        to: HORDE
    }));
    assert!(events.contains(&SimEvent::ArmyGarrisoned {
        army: attacker,
        castle
    }));

    let c = world.castle(castle).unwrap();
    assert_eq!(c.owner, HORDE);
    assert_eq!(c.garrison, Some(attacker));
    assert_eq!(world.army(attacker).unwrap().count(RAIDER), 5);
    assert!(world.army(guard).is_none());
    assert!(world.army(relief).is_none());
    assert!(world.order_for_army(attacker).is_none());
    assert!(world.armies_at(Position::new(2, 0)).is_empty());
}

#[test]
fn test_siege_event_order() {
    let (mut world, map, castle, _, _, _) = siege_setup(3, 2, 10);
    let mut ledger = Ledger::new();

    let names: Vec<&str> = world
        .tick(1_000.0, &map, &mut ledger)
        .iter()
        .map(|e| e.name())
        .filter(|n| *n != "tile-entered")
        .collect();

    assert_eq!(
        names,
        vec![
            "movement-started",
            "combat-initiated",
            "combat-resolved",
            "army-eliminated",
            "army-eliminated",
            "castle-captured",
            "army-garrisoned",
        ]
    );
    assert_eq!(world.castle(castle).unwrap().owner, HORDE);
}

#[test]
fn test_armies_meeting_mid_route_fight() {
    let map = plains(5);
    let mut world = new_world();
    let mut ledger = Ledger::new();

    let militia = world
        .spawn_army(&map, KINGDOM, Position::new(0, 0), [(MILITIA, 15)])
        .unwrap();
    let raiders = world
        .spawn_army(&map, HORDE, Position::new(4, 0), [(RAIDER, 8)])
        .unwrap();
    world
        .dispatch(&map, DispatchSource::Army(militia), Position::new(4, 0))
        .unwrap();
    world
        .dispatch(&map, DispatchSource::Army(raiders), Position::new(0, 0))
        .unwrap();

    let events = world.tick(1_000.0, &map, &mut ledger);

    let initiated = events
        .iter()
        .find_map(|e| match e {
            SimEvent::CombatInitiated { position, .. } => Some(*position),
            _ => None,
        })
        .expect("armies met");
    assert_eq!(initiated, Position::new(2, 0));

    // 15 vs 8: winner loses min(4.5, 4.0)
    assert_eq!(world.army(militia).unwrap().count(MILITIA), 11);
    assert!(world.army(raiders).is_none());

    // Paused for the rest of the tick, then carries on
    assert_eq!(world.army(militia).unwrap().position, Position::new(2, 0));
    world.tick(1_000.0, &map, &mut ledger);
    assert_eq!(world.army(militia).unwrap().position, Position::new(4, 0));
}

#[test]
fn test_equal_armies_draw_with_remnants() {
    let map = plains(2);
    let mut world = new_world();
    let mut ledger = Ledger::new();

    let mover = world
        .spawn_army(&map, KINGDOM, Position::new(0, 0), [(MILITIA, 10)])
        .unwrap();
    let holder = world
        .spawn_army(&map, HORDE, Position::new(1, 0), [(RAIDER, 10)])
        .unwrap();
    world
        .dispatch(&map, DispatchSource::Army(mover), Position::new(1, 0))
        .unwrap();

    let events = world.tick(1_000.0, &map, &mut ledger);

    assert!(events.iter().any(|e| matches!(
        e,
        SimEvent::CombatResolved(result) if result.is_draw()
    )));
    assert_eq!(world.army(mover).unwrap().count(MILITIA), 1);
    assert_eq!(world.army(holder).unwrap().count(RAIDER), 1);
}

#[test]
fn test_allies_share_tiles_without_fighting() {
    let map = plains(3);
    let mut world = new_world();
    let mut ledger = Ledger::new();
    world.ally(KINGDOM, HORDE);

    let mover = world
        .spawn_army(&map, KINGDOM, Position::new(0, 0), [(MILITIA, 5)])
        .unwrap();
    let host = world
        .spawn_army(&map, HORDE, Position::new(2, 0), [(RAIDER, 5)])
        .unwrap();
    world
        .dispatch(&map, DispatchSource::Army(mover), Position::new(2, 0))
        .unwrap();

    let events = world.tick(1_000.0, &map, &mut ledger);

    assert!(!events
        .iter()
        .any(|e| matches!(e, SimEvent::CombatInitiated { .. })));
    // Different owners never merge
    assert_eq!(world.armies_at(Position::new(2, 0)), vec![mover, host]);
}

#[test]
fn test_lopsided_battle_still_costs_the_winner() {
    let map = plains(2);
    let mut world = new_world();
    let mut ledger = Ledger::new();

    let mover = world
        .spawn_army(&map, KINGDOM, Position::new(0, 0), [(MILITIA, 15)])
        .unwrap();
    let holder = world
        .spawn_army(&map, HORDE, Position::new(1, 0), [(RAIDER, 1)])
        .unwrap();
    world
        .dispatch(&map, DispatchSource::Army(mover), Position::new(1, 0))
        .unwrap();

    world.tick(1_000.0, &map, &mut ledger);

    assert_eq!(world.army(mover).unwrap().count(MILITIA), 14);
    assert!(world.army(holder).is_none());
}

#[test]
fn test_garrison_of_allied_castle_stays_out_of_field_battle() {
    let mut catalog = Catalog::with_defaults();
    catalog.add_faction(FactionId(3), "Nomads");
    catalog
        .add_unit(UnitType {
            id: UnitTypeId(21),
            name: "Horseman".into(),
            faction: FactionId(3),
            power: 2.0,
            speed: 14.0,
            cost: 30,
            train_time_ms: 5000.0,
            trained_at: BuildingKind::Barracks,
            ranged: false,
            spellcaster: false,
            anti_castle_multiplier: 1.0,
            special: None,
        })
        .unwrap();
    let mut world = World::new(SimulationConfig::default(), Arc::new(catalog), FactionRegistry::new()).unwrap();
    let map = plains(3);
    let mut ledger = Ledger::new();
    world.ally(KINGDOM, HORDE);

    let castle_pos = Position::new(2, 0);
    let castle = world.add_castle(&map, HORDE, castle_pos, 0).unwrap();
    let guard = world.spawn_army(&map, HORDE, castle_pos, [(RAIDER, 6)]).unwrap();
    world.station_garrison(castle, guard).unwrap();
    let nomads = world
        .spawn_army(&map, FactionId(3), castle_pos, [(UnitTypeId(21), 4)])
        .unwrap();
    let mover = world
        .spawn_army(&map, KINGDOM, Position::new(0, 0), [(MILITIA, 10)])
        .unwrap();
    world
        .dispatch(&map, DispatchSource::Army(mover), castle_pos)
        .unwrap();

    let events = world.tick(1_000.0, &map, &mut ledger);

    // 10 militia against 8 nomad power; the raiders inside do not join
    let fought = events
        .iter()
        .find_map(|e| match e {
            SimEvent::CombatInitiated { armies, castle, .. } => Some((armies.clone(), *castle)),
            _ => None,
        })
        .expect("field battle");
    assert_eq!(fought, (vec![nomads, mover], None));
    assert_eq!(world.army(mover).unwrap().count(MILITIA), 7);
    assert!(world.army(nomads).is_none());
    assert_eq!(world.army(guard).unwrap().count(RAIDER), 6);
    assert_eq!(world.castle(castle).unwrap().owner, HORDE);
}

#[test]
fn test_own_army_on_route_joins_march() {
    let map = plains(5);
    let mut world = new_world();
    let mut ledger = Ledger::new();

    let mover = world
        .spawn_army(&map, KINGDOM, Position::new(0, 0), [(MILITIA, 5)])
        .unwrap();
    let host = world
        .spawn_army(&map, KINGDOM, Position::new(2, 0), [(MILITIA, 3)])
        .unwrap();
    world
        .dispatch(&map, DispatchSource::Army(mover), Position::new(4, 0))
        .unwrap();

    let events = world.tick(1_000.0, &map, &mut ledger);

    assert!(events.contains(&SimEvent::ArmiesMerged {
        into: mover,
        from: host
    }));
    assert!(world.army(host).is_none());
    let merged = world.army(mover).unwrap();
    assert_eq!(merged.position, Position::new(4, 0));
    assert_eq!(merged.count(MILITIA), 8);
    assert!(world.order_for_army(mover).is_none());
}

#[test]
fn test_own_castle_on_route_is_passed() {
    let map = plains(5);
    let mut world = new_world();
    let mut ledger = Ledger::new();

    let castle = world.add_castle(&map, KINGDOM, Position::new(2, 0), 0).unwrap();
    let guard = world
        .spawn_army(&map, KINGDOM, Position::new(2, 0), [(MILITIA, 4)])
        .unwrap();
    world.station_garrison(castle, guard).unwrap();
    let mover = world
        .spawn_army(&map, KINGDOM, Position::new(0, 0), [(MILITIA, 5)])
        .unwrap();
    world
        .dispatch(&map, DispatchSource::Army(mover), Position::new(4, 0))
        .unwrap();

    let events = world.tick(1_000.0, &map, &mut ledger);

    assert!(!events.iter().any(|e| matches!(
        e,
        SimEvent::ArmiesMerged { .. } | SimEvent::ArmyGarrisoned { .. }
    )));
    assert_eq!(world.army(mover).unwrap().position, Position::new(4, 0));
    assert_eq!(world.army(mover).unwrap().count(MILITIA), 5);
    assert_eq!(world.castle(castle).unwrap().garrison, Some(guard));
    assert_eq!(world.army(guard).unwrap().count(MILITIA), 4);
}

#[test]
fn test_spell_effects_consumed_by_combat() {
    let map = plains(2);
    let mut world = new_world();
    let mut ledger = Ledger::new();

    let mover = world
        .spawn_army(&map, HORDE, Position::new(0, 0), [(RAIDER, 6), (SHAMAN, 1)])
        .unwrap();
    let holder = world
        .spawn_army(&map, KINGDOM, Position::new(1, 0), [(MILITIA, 12)])
        .unwrap();

    // 12 militia halved to 6 vs 9 horde power
    world
        .cast_spell(&map, mover, SpellTarget::Army(holder), SpellEffect::Debuff(0.5))
        .unwrap();
    world
        .dispatch(&map, DispatchSource::Army(mover), Position::new(1, 0))
        .unwrap();
    world.tick(1_000.0, &map, &mut ledger);

    assert!(world.army(holder).is_none());
    let survivor = world.army(mover).unwrap();
    assert!(survivor.effects.is_empty());
    assert!(survivor.total_units() > 0);
}

#[test]
fn test_replay_is_deterministic() {
    fn run() -> siegefield::campaign::WorldSnapshot {
        let map = TileMap::from_rows(&[
            "..f..",
            ".h.=.",
            ".....",
        ])
        .unwrap();
        let mut world = new_world();
        let mut ledger = Ledger::new();
        let a = world
            .spawn_army(&map, KINGDOM, Position::new(0, 0), [(MILITIA, 9)])
            .unwrap();
        let b = world
            .spawn_army(&map, HORDE, Position::new(4, 2), [(RAIDER, 9)])
            .unwrap();
        let c = world
            .spawn_army(&map, HORDE, Position::new(4, 0), [(RAIDER, 3)])
            .unwrap();
        world.dispatch(&map, DispatchSource::Army(a), Position::new(4, 2)).unwrap();
        world.dispatch(&map, DispatchSource::Army(b), Position::new(0, 0)).unwrap();
        world.dispatch(&map, DispatchSource::Army(c), Position::new(0, 2)).unwrap();
        for _ in 0..40 {
            world.tick(100.0, &map, &mut ledger);
        }
        world.snapshot()
    }

    assert_eq!(run(), run());
}
