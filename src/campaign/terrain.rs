//! Terrain table - static per-terrain movement, combat, and vision modifiers

use serde::{Deserialize, Serialize};

/// Largest movement modifier of any terrain; keeps the A* heuristic admissible
pub const MAX_MOVEMENT_MODIFIER: f64 = 2.0;

/// Terrain types affecting movement, combat, and visibility
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerrainKind {
    #[default]
    Plains,
    Road,
    Forest,
    Hills,
    Swamp,
    Desert,
    Mountains,
    Water,
}

impl TerrainKind {
    /// Movement speed multiplier; >1 is fast terrain, <1 slow
    pub fn movement_modifier(&self) -> f64 {
        match self {
            Self::Plains => 1.0,
            Self::Road => 2.0,
            Self::Forest => 0.5,
            Self::Hills => 0.5,
            Self::Swamp => 0.4,
            Self::Desert => 0.75,
            Self::Mountains | Self::Water => 0.0,
        }
    }

    /// Multiplier on the power of armies fighting on this tile
    pub fn combat_modifier(&self) -> f64 {
        match self {
            Self::Plains => 1.0,
            Self::Road => 1.0,
            Self::Forest => 1.2,
            Self::Hills => 1.25,
            Self::Swamp => 0.8,
            Self::Desert => 0.9,
            Self::Mountains | Self::Water => 1.0,
        }
    }

    /// Sight range multiplier
    pub fn vision_modifier(&self) -> f64 {
        match self {
            Self::Plains => 1.0,
            Self::Road => 1.0,
            Self::Forest => 0.5,
            Self::Hills => 1.5,
            Self::Swamp => 0.75,
            Self::Desert => 1.25,
            Self::Mountains => 2.0,
            Self::Water => 1.0,
        }
    }

    pub fn is_passable(&self) -> bool {
        !matches!(self, Self::Mountains | Self::Water)
    }

    /// Sight radius in tiles for an observer standing on this terrain
    pub fn sight_range(&self, base_range: u32) -> u32 {
        ((base_range as f64 * self.vision_modifier()).round() as u32).max(1)
    }

    /// ASCII glyph used by text maps
    pub fn glyph(&self) -> char {
        match self {
            Self::Plains => '.',
            Self::Road => '=',
            Self::Forest => 'f',
            Self::Hills => 'h',
            Self::Swamp => '~',
            Self::Desert => 'd',
            Self::Mountains => '^',
            Self::Water => 'w',
        }
    }

    pub fn from_glyph(c: char) -> Option<Self> {
        Some(match c {
            '.' => Self::Plains,
            '=' => Self::Road,
            'f' => Self::Forest,
            'h' => Self::Hills,
            '~' => Self::Swamp,
            'd' => Self::Desert,
            '^' => Self::Mountains,
            'w' => Self::Water,
            _ => return None,
        })
    }
}
