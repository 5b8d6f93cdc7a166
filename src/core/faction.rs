//! Faction registry
//!
//! Armies and castles refer to their owner by `FactionId` only; everything
//! else about a faction is looked up here.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::core::types::FactionId;

/// A player faction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Faction {
    pub id: FactionId,
    pub name: String,
    pub allies: BTreeSet<FactionId>,
}

impl Faction {
    pub fn new(id: FactionId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            allies: BTreeSet::new(),
        }
    }
}

/// All factions taking part in the simulation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactionRegistry {
    factions: BTreeMap<FactionId, Faction>,
}

impl FactionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, faction: Faction) {
        self.factions.insert(faction.id, faction);
    }

    pub fn get(&self, id: FactionId) -> Option<&Faction> {
        self.factions.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Faction> {
        self.factions.values()
    }

    /// Declare a mutual alliance. Unknown factions are registered on the fly.
    pub fn ally(&mut self, a: FactionId, b: FactionId) {
        if a == b {
            return;
        }
        self.factions
            .entry(a)
            .or_insert_with(|| Faction::new(a, a.to_string()))
            .allies
            .insert(b);
        self.factions
            .entry(b)
            .or_insert_with(|| Faction::new(b, b.to_string()))
            .allies
            .insert(a);
    }

    /// Break a mutual alliance
    pub fn break_alliance(&mut self, a: FactionId, b: FactionId) {
        if let Some(f) = self.factions.get_mut(&a) {
            f.allies.remove(&b);
        }
        if let Some(f) = self.factions.get_mut(&b) {
            f.allies.remove(&a);
        }
    }

    /// Same faction or mutually allied
    pub fn are_allied(&self, a: FactionId, b: FactionId) -> bool {
        a == b
            || self
                .factions
                .get(&a)
                .is_some_and(|f| f.allies.contains(&b))
    }
}
