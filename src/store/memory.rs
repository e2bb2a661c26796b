use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use super::OrderStore;
use crate::domain::{now, sort_newest_first, Order, OrderCreate, OrderStatus};
use crate::error::{OrderError, Result};

/// In-process backend: a map behind a reader/writer lock plus an atomic id counter.
///
/// Each instance is independent, so tests can build as many isolated stores as
/// they need. The lock is never held across an `.await`.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<i64, Order>>,
    last_id: AtomicI64,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn collect_where(&self, keep: impl Fn(&Order) -> bool) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .read()
            .values()
            .filter(|order| keep(*order))
            .cloned()
            .collect();
        sort_newest_first(&mut orders);
        orders
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create(&self, params: OrderCreate) -> Result<Order> {
        let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
        let order = Order::from_create(id, params, now());

        self.orders.write().insert(id, order.clone());
        debug!(order_id = id, "Order stored in memory");
        Ok(order)
    }

    async fn get_by_id(&self, id: i64) -> Result<Order> {
        self.orders
            .read()
            .get(&id)
            .cloned()
            .ok_or(OrderError::NotFound(id))
    }

    async fn get_all(&self) -> Result<Vec<Order>> {
        Ok(self.collect_where(|_| true))
    }

    async fn get_by_user_id(&self, user_id: i64) -> Result<Vec<Order>> {
        Ok(self.collect_where(|order| order.user_id == user_id))
    }

    async fn get_by_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        Ok(self.collect_where(|order| order.status == status))
    }

    async fn get_recent(&self, limit: usize) -> Result<Vec<Order>> {
        let mut orders = self.collect_where(|_| true);
        orders.truncate(limit);
        Ok(orders)
    }

    async fn update_status(&self, id: i64, status: OrderStatus) -> Result<Order> {
        let mut orders = self.orders.write();
        let order = orders.get_mut(&id).ok_or(OrderError::NotFound(id))?;
        order.set_status(status, now());
        Ok(order.clone())
    }

    async fn transition_status(&self, id: i64, from: OrderStatus, to: OrderStatus) -> Result<Option<Order>> {
        let mut orders = self.orders.write();
        let order = orders.get_mut(&id).ok_or(OrderError::NotFound(id))?;
        if order.status != from {
            return Ok(None);
        }
        order.set_status(to, now());
        Ok(Some(order.clone()))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.orders
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or(OrderError::NotFound(id))
    }

    async fn search(&self, query: &str) -> Result<Vec<Order>> {
        let needle = query.to_lowercase();
        Ok(self.collect_where(|order| order.comment.to_lowercase().contains(&needle)))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.orders.read().len())
    }
}
