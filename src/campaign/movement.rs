//! Movement orders and the per-tile timing model
//!
//! An order walks its army along a precomputed route one tile at a time.
//! Crossing the current tile takes `base / (speed × modifier(current))`; the
//! elapsed time on the segment is spent when the army steps forward.
//!
//! The scheduler only owns order bookkeeping. The world drives `advance`
//! and runs the occupation check after every single-tile step.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::campaign::pathfinding::Route;
use crate::core::error::{Result, SimError};
use crate::core::types::{ArmyId, Millis, OrderId, Position};

/// Time to cross one tile; infinite when speed or modifier is not positive
pub fn tile_time_ms(base_time_per_tile_ms: Millis, speed: f64, movement_modifier: f64) -> Millis {
    let rate = speed * movement_modifier;
    if !rate.is_finite() || rate <= 0.0 {
        return f64::INFINITY;
    }
    base_time_per_tile_ms / rate
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Active,
    /// Held for the rest of the tick after combat
    Paused,
    Cancelled,
    Completed,
}

/// An in-flight movement order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementOrder {
    pub id: OrderId,
    pub army: ArmyId,
    pub origin: Position,
    pub destination: Position,
    /// Full route, origin first
    pub path: Vec<Position>,
    /// Index into `path` of the tile the army is standing on
    pub cursor: usize,
    /// Time spent on the current tile segment
    pub elapsed_ms: Millis,
    pub status: OrderStatus,
}

impl MovementOrder {
    pub fn new(id: OrderId, army: ArmyId, route: Route) -> Self {
        let origin = route.origin().unwrap_or_default();
        let destination = route.destination().unwrap_or(origin);
        Self {
            id,
            army,
            origin,
            destination,
            path: route.tiles,
            cursor: 0,
            elapsed_ms: 0.0,
            status: OrderStatus::Active,
        }
    }

    pub fn current_tile(&self) -> Option<Position> {
        self.path.get(self.cursor).copied()
    }

    pub fn next_tile(&self) -> Option<Position> {
        self.path.get(self.cursor + 1).copied()
    }

    /// Tiles left to walk
    pub fn remaining(&self) -> &[Position] {
        self.path.get(self.cursor + 1..).unwrap_or(&[])
    }

    pub fn is_active(&self) -> bool {
        self.status == OrderStatus::Active
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, OrderStatus::Cancelled | OrderStatus::Completed)
    }

    /// Spend one tile's worth of time and step forward if enough has
    /// accumulated. Returns the tile entered.
    pub fn try_step(&mut self, tile_time: Millis) -> Option<Position> {
        if !self.is_active() || !tile_time.is_finite() || self.elapsed_ms < tile_time {
            return None;
        }
        let next = self.next_tile()?;
        self.elapsed_ms -= tile_time;
        self.cursor += 1;
        Some(next)
    }
}

/// Active order set, iterated in creation order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MovementScheduler {
    orders: BTreeMap<OrderId, MovementOrder>,
    next_id: u32,
}

impl MovementScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new order for `army`. An existing order for the same army
    /// is cancelled and replaced.
    pub fn issue(&mut self, army: ArmyId, route: Route) -> OrderId {
        if let Some(previous) = self.order_for_army(army) {
            tracing::debug!("{} replaces {} for {}", OrderId(self.next_id + 1), previous, army);
            self.orders.remove(&previous);
        }
        self.next_id += 1;
        let id = OrderId(self.next_id);
        self.orders.insert(id, MovementOrder::new(id, army, route));
        id
    }

    /// Remove an order immediately. The army stays where it is.
    pub fn cancel(&mut self, id: OrderId) -> Result<MovementOrder> {
        let mut order = self.orders.remove(&id).ok_or(SimError::OrderNotFound(id))?;
        order.status = OrderStatus::Cancelled;
        Ok(order)
    }

    pub fn get(&self, id: OrderId) -> Option<&MovementOrder> {
        self.orders.get(&id)
    }

    pub fn get_mut(&mut self, id: OrderId) -> Option<&mut MovementOrder> {
        self.orders.get_mut(&id)
    }

    pub fn order_for_army(&self, army: ArmyId) -> Option<OrderId> {
        self.orders
            .values()
            .find(|o| o.army == army)
            .map(|o| o.id)
    }

    /// Order ids in creation order
    pub fn ids(&self) -> Vec<OrderId> {
        self.orders.keys().copied().collect()
    }

    pub fn orders(&self) -> impl Iterator<Item = &MovementOrder> {
        self.orders.values()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Start-of-tick bookkeeping: resume paused orders with a fresh segment,
    /// then add `delta` to every active order
    pub fn begin_tick(&mut self, delta: Millis) {
        for order in self.orders.values_mut() {
            if order.status == OrderStatus::Paused {
                order.status = OrderStatus::Active;
                order.elapsed_ms = 0.0;
            }
            if order.is_active() {
                order.elapsed_ms += delta.max(0.0);
            }
        }
    }

    /// Hold an army's order until the next tick
    pub fn pause_army(&mut self, army: ArmyId) {
        if let Some(order) = self.orders.values_mut().find(|o| o.army == army) {
            if order.is_active() {
                order.status = OrderStatus::Paused;
            }
        }
    }

    /// Drop whatever order an army has; returns it marked finished
    pub fn remove_army(&mut self, army: ArmyId, status: OrderStatus) -> Option<MovementOrder> {
        let id = self.order_for_army(army)?;
        let mut order = self.orders.remove(&id)?;
        order.status = status;
        Some(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(len: i32) -> Route {
        Route {
            tiles: (0..len).map(|x| Position::new(x, 0)).collect(),
            cost_ms: (len - 1) as f64 * 1000.0,
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.1
    }

    #[test]
    fn test_tile_time_by_terrain() {
        assert!(close(tile_time_ms(1000.0, 7.5, 1.0), 133.3));
        assert!(close(tile_time_ms(1000.0, 7.5, 2.0), 66.7));
        assert!(close(tile_time_ms(1000.0, 7.5, 0.5), 266.7));
    }

    #[test]
    fn test_zero_speed_stalls() {
        assert!(tile_time_ms(1000.0, 0.0, 1.0).is_infinite());
        assert!(tile_time_ms(1000.0, -3.0, 1.0).is_infinite());
        assert!(tile_time_ms(1000.0, 10.0, 0.0).is_infinite());

        let mut order = MovementOrder::new(OrderId(1), ArmyId(1), route(3));
        order.elapsed_ms = 1.0e12;
        assert_eq!(order.try_step(f64::INFINITY), None);
        assert_eq!(order.cursor, 0);
    }

    #[test]
    fn test_step_consumes_time() {
        let mut order = MovementOrder::new(OrderId(1), ArmyId(1), route(3));
        order.elapsed_ms = 250.0;
        assert_eq!(order.try_step(100.0), Some(Position::new(1, 0)));
        assert_eq!(order.try_step(100.0), Some(Position::new(2, 0)));
        assert_eq!(order.try_step(100.0), None);
        assert!(close(order.elapsed_ms, 50.0));
        assert!(order.remaining().is_empty());
    }

    #[test]
    fn test_step_needs_full_tile_time() {
        let mut order = MovementOrder::new(OrderId(1), ArmyId(1), route(2));
        order.elapsed_ms = 99.0;
        assert_eq!(order.try_step(100.0), None);
        order.elapsed_ms = 100.0;
        assert_eq!(order.try_step(100.0), Some(Position::new(1, 0)));
    }

    #[test]
    fn test_issue_replaces_existing_order() {
        let mut scheduler = MovementScheduler::new();
        let first = scheduler.issue(ArmyId(7), route(4));
        let second = scheduler.issue(ArmyId(7), route(2));
        assert_ne!(first, second);
        assert_eq!(scheduler.len(), 1);
        assert!(scheduler.get(first).is_none());
        assert_eq!(scheduler.order_for_army(ArmyId(7)), Some(second));
    }

    #[test]
    fn test_cancel_unknown_order() {
        let mut scheduler = MovementScheduler::new();
        assert!(matches!(
            scheduler.cancel(OrderId(3)),
            Err(SimError::OrderNotFound(OrderId(3)))
        ));
        let id = scheduler.issue(ArmyId(1), route(3));
        let cancelled = scheduler.cancel(id).unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_paused_order_resumes_with_fresh_segment() {
        let mut scheduler = MovementScheduler::new();
        let id = scheduler.issue(ArmyId(1), route(3));
        scheduler.begin_tick(60.0);
        scheduler.pause_army(ArmyId(1));
        assert_eq!(scheduler.get(id).unwrap().status, OrderStatus::Paused);

        scheduler.begin_tick(40.0);
        let order = scheduler.get(id).unwrap();
        assert!(order.is_active());
        assert_eq!(order.elapsed_ms, 40.0);
    }

    #[test]
    fn test_ids_in_creation_order() {
        let mut scheduler = MovementScheduler::new();
        let a = scheduler.issue(ArmyId(9), route(2));
        let b = scheduler.issue(ArmyId(3), route(2));
        assert_eq!(scheduler.ids(), vec![a, b]);
    }
}
