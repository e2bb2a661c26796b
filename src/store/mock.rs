//! # Scripted store
//!
//! Test double for exercising the service and the confirmation worker in
//! isolation. It delegates to a real [`InMemoryOrderStore`] but can be told to
//! fail selected operations, and it records every status transition it is
//! asked for so tests can assert on what the worker did.

use std::collections::HashSet;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{InMemoryOrderStore, OrderStore};
use crate::domain::{Order, OrderCreate, OrderStatus};
use crate::error::{OrderError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Create,
    Read,
    Transition,
}

#[derive(Debug, Default)]
pub struct ScriptedStore {
    inner: InMemoryOrderStore,
    failing: Mutex<HashSet<Op>>,
    transitions: Mutex<Vec<i64>>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later call of `op` fail with a storage error.
    pub fn fail(&self, op: Op) {
        self.failing.lock().insert(op);
    }

    pub fn recover(&self, op: Op) {
        self.failing.lock().remove(&op);
    }

    /// Ids passed to `transition_status`, in call order.
    pub fn transitions(&self) -> Vec<i64> {
        self.transitions.lock().clone()
    }

    fn check(&self, op: Op) -> Result<()> {
        if self.failing.lock().contains(&op) {
            return Err(OrderError::DatabaseError("scripted failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for ScriptedStore {
    async fn create(&self, params: OrderCreate) -> Result<Order> {
        self.check(Op::Create)?;
        self.inner.create(params).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Order> {
        self.check(Op::Read)?;
        self.inner.get_by_id(id).await
    }

    async fn get_all(&self) -> Result<Vec<Order>> {
        self.check(Op::Read)?;
        self.inner.get_all().await
    }

    async fn get_by_user_id(&self, user_id: i64) -> Result<Vec<Order>> {
        self.check(Op::Read)?;
        self.inner.get_by_user_id(user_id).await
    }

    async fn get_by_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        self.check(Op::Read)?;
        self.inner.get_by_status(status).await
    }

    async fn get_recent(&self, limit: usize) -> Result<Vec<Order>> {
        self.check(Op::Read)?;
        self.inner.get_recent(limit).await
    }

    async fn update_status(&self, id: i64, status: OrderStatus) -> Result<Order> {
        self.inner.update_status(id, status).await
    }

    async fn transition_status(&self, id: i64, from: OrderStatus, to: OrderStatus) -> Result<Option<Order>> {
        self.transitions.lock().push(id);
        self.check(Op::Transition)?;
        self.inner.transition_status(id, from, to).await
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.inner.delete(id).await
    }

    async fn search(&self, query: &str) -> Result<Vec<Order>> {
        self.check(Op::Read)?;
        self.inner.search(query).await
    }

    async fn count(&self) -> Result<usize> {
        self.inner.count().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fails_only_while_scripted() {
        let store = ScriptedStore::new();

        store.fail(Op::Create);
        let err = store.create(OrderCreate::new(1, 1, "x")).await.unwrap_err();
        assert_eq!(err, OrderError::DatabaseError("scripted failure".to_string()));

        store.recover(Op::Create);
        let order = store.create(OrderCreate::new(1, 1, "x")).await.unwrap();
        assert_eq!(order.id, 1);
    }
}
