//! Treasury - per-faction gold ledger
//!
//! The simulation never owns the ledger; it is injected into every call
//! that spends or earns gold.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::core::error::{Result, SimError};
use crate::core::types::FactionId;

/// Cost checks and payments against a faction's funds
pub trait Treasury {
    /// Current gold held by a faction
    fn balance(&self, faction: FactionId) -> u32;

    /// Credit gold to a faction
    fn deposit(&mut self, faction: FactionId, amount: u32);

    /// Pay `amount` in full or not at all
    fn try_spend(&mut self, faction: FactionId, amount: u32) -> Result<()>;
}

/// In-memory ledger
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ledger {
    gold: AHashMap<FactionId, u32>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(mut self, faction: FactionId, amount: u32) -> Self {
        self.gold.insert(faction, amount);
        self
    }
}

impl Treasury for Ledger {
    fn balance(&self, faction: FactionId) -> u32 {
        self.gold.get(&faction).copied().unwrap_or(0)
    }

    fn deposit(&mut self, faction: FactionId, amount: u32) {
        let entry = self.gold.entry(faction).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    fn try_spend(&mut self, faction: FactionId, amount: u32) -> Result<()> {
        let available = self.balance(faction);
        if available < amount {
            return Err(SimError::InsufficientResources {
                faction,
                needed: amount,
                available,
            });
        }
        self.gold.insert(faction, available - amount);
        Ok(())
    }
}
