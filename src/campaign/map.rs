//! Tile map - the terrain grid armies move across
//!
//! The simulation reads terrain through the `WorldGrid` trait so callers can
//! inject their own map representation; `TileMap` is the built-in one.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::campaign::terrain::TerrainKind;
use crate::core::error::{Result, SimError};
use crate::core::types::Position;

/// Read-only terrain provider
pub trait WorldGrid {
    /// Terrain at a position, `None` outside the map
    fn terrain(&self, pos: Position) -> Option<TerrainKind>;

    fn contains(&self, pos: Position) -> bool {
        self.terrain(pos).is_some()
    }

    /// Inside the map and passable
    fn is_passable(&self, pos: Position) -> bool {
        self.terrain(pos).is_some_and(|t| t.is_passable())
    }

    /// Passable orthogonal neighbours in fixed order
    fn passable_neighbors(&self, pos: Position) -> Vec<Position> {
        pos.neighbors()
            .into_iter()
            .filter(|n| self.is_passable(*n))
            .collect()
    }
}

/// Rectangular grid stored row-major
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileMap {
    pub width: i32,
    pub height: i32,
    tiles: Vec<TerrainKind>,
}

impl TileMap {
    /// Create a map filled with one terrain
    pub fn new(width: i32, height: i32, fill: TerrainKind) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        Self {
            width,
            height,
            tiles: vec![fill; (width * height) as usize],
        }
    }

    /// Parse an ASCII map, one string per row (see `TerrainKind::glyph`)
    pub fn from_rows(rows: &[&str]) -> Result<Self> {
        let height = rows.len() as i32;
        let width = rows.first().map(|r| r.chars().count()).unwrap_or(0) as i32;
        let mut tiles = Vec::with_capacity((width * height) as usize);

        for (y, row) in rows.iter().enumerate() {
            if row.chars().count() as i32 != width {
                return Err(SimError::Validation(format!(
                    "map row {} has {} tiles, expected {}",
                    y,
                    row.chars().count(),
                    width
                )));
            }
            for c in row.chars() {
                let terrain = TerrainKind::from_glyph(c).ok_or_else(|| {
                    SimError::Validation(format!("unknown terrain glyph '{}' in row {}", c, y))
                })?;
                tiles.push(terrain);
            }
        }

        Ok(Self {
            width,
            height,
            tiles,
        })
    }

    /// Generate a map with varied terrain; identical seeds give identical maps
    pub fn generate(width: i32, height: i32, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut map = Self::new(width, height, TerrainKind::Plains);

        for tile in map.tiles.iter_mut() {
            *tile = match rng.gen_range(0..20) {
                0..=8 => TerrainKind::Plains,
                9..=11 => TerrainKind::Forest,
                12..=13 => TerrainKind::Hills,
                14 => TerrainKind::Swamp,
                15..=16 => TerrainKind::Desert,
                17 => TerrainKind::Road,
                18 => TerrainKind::Mountains,
                _ => TerrainKind::Water,
            };
        }

        map
    }

    fn index(&self, pos: Position) -> Option<usize> {
        if pos.x < 0 || pos.y < 0 || pos.x >= self.width || pos.y >= self.height {
            return None;
        }
        Some((pos.y * self.width + pos.x) as usize)
    }

    pub fn set(&mut self, pos: Position, terrain: TerrainKind) -> bool {
        match self.index(pos) {
            Some(i) => {
                self.tiles[i] = terrain;
                true
            }
            None => false,
        }
    }

    /// Render back to ASCII rows
    pub fn to_rows(&self) -> Vec<String> {
        (0..self.height)
            .map(|y| {
                (0..self.width)
                    .filter_map(|x| self.terrain(Position::new(x, y)))
                    .map(|t| t.glyph())
                    .collect()
            })
            .collect()
    }
}

impl WorldGrid for TileMap {
    fn terrain(&self, pos: Position) -> Option<TerrainKind> {
        self.index(pos).map(|i| self.tiles[i])
    }
}
