//! Property tests for army aggregates and field combat
//!
//! - power is the count-weighted sum, speed ignores counts
//! - merge and split conserve units
//! - a failed removal leaves the army untouched
//! - field battles never create units

use proptest::prelude::*;

use siegefield::campaign::combat::CombatResolver;
use siegefield::campaign::terrain::TerrainKind;
use siegefield::core::types::{ArmyId, FactionId, Position};
use siegefield::core::FactionRegistry;
use siegefield::units::{Army, Catalog, Composition, UnitTypeId};
use siegefield::SimulationConfig;

const KINGDOM: FactionId = FactionId(1);

fn composition() -> impl Strategy<Value = Vec<(u16, u32)>> {
    prop::collection::vec((1u16..=5, 0u32..200), 1..6)
}

fn army(id: u32, units: &[(u16, u32)], catalog: &Catalog) -> Army {
    Army::with_composition(
        ArmyId(id),
        KINGDOM,
        Position::new(0, 0),
        units.iter().map(|&(u, c)| (UnitTypeId(u), c)),
        catalog,
    )
    .unwrap()
}

proptest! {
    #[test]
    fn prop_power_is_weighted_sum(units in composition()) {
        let catalog = Catalog::with_defaults();
        let a = army(1, &units, &catalog);

        let expected: f64 = a
            .composition()
            .iter()
            .map(|(u, &c)| catalog.unit(*u).unwrap().power * c as f64)
            .sum();
        prop_assert!((a.power() - expected).abs() < 1e-9);
        prop_assert!(a.composition().values().all(|&c| c > 0));
    }

    #[test]
    fn prop_speed_ignores_counts(units in composition(), factor in 2u32..50) {
        let catalog = Catalog::with_defaults();
        let a = army(1, &units, &catalog);
        let scaled: Vec<(u16, u32)> = units.iter().map(|&(u, c)| (u, c * factor)).collect();
        let b = army(2, &scaled, &catalog);

        prop_assert_eq!(a.speed(), b.speed());
    }

    #[test]
    fn prop_merge_is_additive(left in composition(), right in composition()) {
        let catalog = Catalog::with_defaults();
        let mut a = army(1, &left, &catalog);
        let mut b = army(2, &right, &catalog);
        let units = a.total_units() + b.total_units();
        let power = a.power() + b.power();

        a.merge(&catalog, &mut b).unwrap();
        prop_assert_eq!(a.total_units(), units);
        prop_assert!((a.power() - power).abs() < 1e-6);
        prop_assert!(b.is_empty());
    }

    #[test]
    fn prop_split_partitions_units(units in composition(), take in 0u32..200) {
        let catalog = Catalog::with_defaults();
        let mut a = army(1, &units, &catalog);
        let before = a.clone();

        let request: Composition = a
            .composition()
            .iter()
            .map(|(&u, &c)| (u, take.min(c)))
            .collect();

        match a.split(&catalog, &request, ArmyId(9)) {
            Ok(split) => {
                for (unit, &count) in before.composition() {
                    prop_assert_eq!(a.count(*unit) + split.count(*unit), count);
                }
                prop_assert!((a.power() + split.power() - before.power()).abs() < 1e-6);
            }
            Err(_) => prop_assert_eq!(a, before),
        }
    }

    #[test]
    fn prop_failed_remove_is_noop(units in composition(), extra in 1u32..10) {
        let catalog = Catalog::with_defaults();
        let mut a = army(1, &units, &catalog);
        let before = a.clone();
        let (&unit, &held) = a.composition().iter().next().unwrap_or((&UnitTypeId(1), &0));

        prop_assert!(a.remove_units(&catalog, unit, held + extra).is_err());
        prop_assert_eq!(a, before);
    }

    #[test]
    fn prop_field_battle_never_creates_units(
        kingdom in 1u32..300,
        horde in 1u32..300,
    ) {
        let catalog = Catalog::with_defaults();
        let config = SimulationConfig::default();
        let factions = FactionRegistry::new();
        let resolver = CombatResolver::new(&catalog, &config, &factions);

        let mut armies = vec![
            army(1, &[(1, kingdom)], &catalog),
            Army::with_composition(
                ArmyId(2),
                FactionId(2),
                Position::new(0, 0),
                [(UnitTypeId(11), horde)],
                &catalog,
            )
            .unwrap(),
        ];
        let result = resolver
            .resolve_field(&mut armies, Position::new(0, 0), TerrainKind::Plains)
            .unwrap();

        prop_assert!(armies[0].total_units() <= kingdom);
        prop_assert!(armies[1].total_units() <= horde);
        prop_assert_eq!(
            result.total_units_lost(),
            kingdom + horde - armies[0].total_units() - armies[1].total_units()
        );
        if kingdom != horde {
            prop_assert!(armies.iter().filter(|a| a.is_empty()).count() == 1);
        }
    }
}
