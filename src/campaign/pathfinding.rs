//! A* pathfinding over the terrain grid
//!
//! Stepping off tile `u` costs `base_time_per_tile / movement_modifier(u)`,
//! the same quantity the movement scheduler spends crossing it at speed 1.
//! The open set is ordered by estimated total cost, then by position, so
//! identical inputs always produce the identical route.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::campaign::map::WorldGrid;
use crate::campaign::terrain::MAX_MOVEMENT_MODIFIER;
use crate::core::config::SimulationConfig;
use crate::core::types::Position;

/// A computed route, origin and destination included
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub tiles: Vec<Position>,
    /// Travel time at speed 1 (ms)
    pub cost_ms: f64,
}

impl Route {
    pub fn origin(&self) -> Option<Position> {
        self.tiles.first().copied()
    }

    pub fn destination(&self) -> Option<Position> {
        self.tiles.last().copied()
    }

    /// Number of tile steps
    pub fn steps(&self) -> usize {
        self.tiles.len().saturating_sub(1)
    }
}

/// Node in the A* open set
#[derive(Debug, Clone, PartialEq, Eq)]
struct PathNode {
    pos: Position,
    f_cost: OrderedFloat<f64>,
}

impl Ord for PathNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap: lowest f first, then lowest position
        other
            .f_cost
            .cmp(&self.f_cost)
            .then_with(|| other.pos.cmp(&self.pos))
    }
}

impl PartialOrd for PathNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Cost of stepping off `from`; infinite on impassable or unknown tiles
pub fn step_cost(grid: &impl WorldGrid, from: Position, base_time_per_tile_ms: f64) -> f64 {
    match grid.terrain(from) {
        Some(t) if t.is_passable() && t.movement_modifier() > 0.0 => {
            base_time_per_tile_ms / t.movement_modifier()
        }
        _ => f64::INFINITY,
    }
}

/// Find the cheapest route from `start` to `goal`
///
/// Returns None when either end is impassable, no route exists, or the
/// search exceeds `config.max_path_expansions`.
pub fn find_path(
    grid: &impl WorldGrid,
    start: Position,
    goal: Position,
    config: &SimulationConfig,
) -> Option<Route> {
    if !grid.is_passable(start) || !grid.is_passable(goal) {
        return None;
    }

    if start == goal {
        return Some(Route {
            tiles: vec![start],
            cost_ms: 0.0,
        });
    }

    let base = config.base_time_per_tile_ms;
    let heuristic = |pos: Position| pos.distance(&goal) as f64 * base / MAX_MOVEMENT_MODIFIER;

    let mut open_set = BinaryHeap::new();
    let mut came_from: HashMap<Position, Position> = HashMap::new();
    let mut g_scores: HashMap<Position, f64> = HashMap::new();
    let mut closed_set: HashSet<Position> = HashSet::new();

    g_scores.insert(start, 0.0);
    open_set.push(PathNode {
        pos: start,
        f_cost: OrderedFloat(heuristic(start)),
    });

    while let Some(current) = open_set.pop() {
        if current.pos == goal {
            return Some(Route {
                tiles: reconstruct_path(&came_from, goal),
                cost_ms: g_scores.get(&goal).copied().unwrap_or(0.0),
            });
        }

        if !closed_set.insert(current.pos) {
            continue;
        }
        if closed_set.len() > config.max_path_expansions {
            tracing::warn!(
                "route search {} -> {} exceeded {} expansions",
                start,
                goal,
                config.max_path_expansions
            );
            return None;
        }

        let current_g = g_scores.get(&current.pos).copied().unwrap_or(f64::INFINITY);
        let move_cost = step_cost(grid, current.pos, base);
        if move_cost.is_infinite() {
            continue;
        }

        for neighbor in grid.passable_neighbors(current.pos) {
            if closed_set.contains(&neighbor) {
                continue;
            }

            let tentative_g = current_g + move_cost;
            let neighbor_g = g_scores.get(&neighbor).copied().unwrap_or(f64::INFINITY);

            if tentative_g < neighbor_g {
                came_from.insert(neighbor, current.pos);
                g_scores.insert(neighbor, tentative_g);
                open_set.push(PathNode {
                    pos: neighbor,
                    f_cost: OrderedFloat(tentative_g + heuristic(neighbor)),
                });
            }
        }
    }

    None // No path found
}

/// Reconstruct path from came_from map
fn reconstruct_path(came_from: &HashMap<Position, Position>, mut current: Position) -> Vec<Position> {
    let mut path = vec![current];
    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}

/// Travel time at speed 1 along a tile sequence
pub fn path_cost(grid: &impl WorldGrid, tiles: &[Position], base_time_per_tile_ms: f64) -> f64 {
    tiles
        .iter()
        .take(tiles.len().saturating_sub(1))
        .map(|pos| step_cost(grid, *pos, base_time_per_tile_ms))
        .sum()
}
