//! Simulation configuration with documented constants
//!
//! Tunables that several systems share live here. Per-building and
//! per-castle-level tables stay next to the code that uses them.

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, SimError};

/// Configuration for the simulation systems
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    // === MOVEMENT ===
    /// Time for a speed-1 army to cross a tile with movement modifier 1.0 (ms)
    ///
    /// Per-tile time is `base / (speed × modifier)`, so an army of speed 7.5
    /// crosses plains in 133.3ms and roads (modifier 2.0) in 66.7ms.
    pub base_time_per_tile_ms: f64,

    /// Upper bound on A* node expansions for a single route request
    ///
    /// Keeps a route request bounded even on very large grids. A search that
    /// hits the cap reports the destination as unreachable.
    pub max_path_expansions: usize,

    // === COMBAT ===
    /// Fraction of its own power the winner of a field battle can lose
    ///
    /// The winner loses `min(W × attacker_loss_fraction, L × defender_loss_fraction)`
    /// so victory always costs something but never more than the loser could inflict.
    pub attacker_loss_fraction: f64,

    /// Fraction of the loser's power that turns into winner losses
    pub defender_loss_fraction: f64,

    /// Fraction of power both sides lose in an exact-power draw
    ///
    /// The remaining fraction survives as proportional remnants.
    pub draw_loss_fraction: f64,

    // === CASTLES ===
    /// Growth factor for building upgrade costs: `base × growth^level`
    pub upgrade_cost_growth: f64,

    /// Wall hit points restored per second while no siege is resolved
    pub wall_repair_per_second: f64,

    // === SIGHT ===
    /// Sight radius in tiles before terrain vision modifiers
    pub base_sight_range: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            base_time_per_tile_ms: 1000.0,
            max_path_expansions: 100_000,

            attacker_loss_fraction: 0.3,
            defender_loss_fraction: 0.5,
            draw_loss_fraction: 0.9,

            upgrade_cost_growth: 1.5,
            wall_repair_per_second: 1.0,

            base_sight_range: 3,
        }
    }
}

impl SimulationConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.base_time_per_tile_ms <= 0.0 {
            return Err(format!(
                "base_time_per_tile_ms ({}) must be positive",
                self.base_time_per_tile_ms
            ));
        }

        for (name, value) in [
            ("attacker_loss_fraction", self.attacker_loss_fraction),
            ("defender_loss_fraction", self.defender_loss_fraction),
            ("draw_loss_fraction", self.draw_loss_fraction),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{} ({}) must be within [0, 1]", name, value));
            }
        }

        if self.upgrade_cost_growth < 1.0 {
            return Err(format!(
                "upgrade_cost_growth ({}) should be >= 1.0",
                self.upgrade_cost_growth
            ));
        }

        if self.max_path_expansions == 0 {
            return Err("max_path_expansions must be positive".into());
        }

        Ok(())
    }

    /// Parse and validate a config from TOML. Missing keys take defaults.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(content)?;
        config.validate().map_err(SimError::Config)?;
        Ok(config)
    }

    /// Load a config from a TOML file
    pub fn load_from_toml(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }
}
