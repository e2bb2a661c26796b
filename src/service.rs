use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

use crate::config::CoreConfig;
use crate::confirmation::{ConfirmationClient, ConfirmationWorker};
use crate::domain::{now, start_of_day, Order, OrderCreate, OrderStats, OrderStatus};
use crate::error::{OrderError, Result};
use crate::store::OrderStore;

/// Longest accepted comment, in characters, after trimming.
pub const MAX_COMMENT_LEN: usize = 500;
/// Shortest accepted search query, in characters.
pub const MIN_QUERY_LEN: usize = 2;
/// Used when a caller asks for a non-positive or oversized recent-orders page.
pub const DEFAULT_RECENT_LIMIT: usize = 10;
/// Signed because it is compared against the caller's raw `limit`.
pub const MAX_RECENT_LIMIT: i64 = 100;

/// Entry point for everything that reads or changes orders.
///
/// Validates caller input, delegates storage to the bound [`OrderStore`] and
/// owns the confirmation worker, which is spawned on construction. Must be
/// created inside a Tokio runtime.
pub struct OrderService {
    store: Arc<dyn OrderStore>,
    confirmations: ConfirmationClient,
    enqueue_timeout: Duration,
    worker: JoinHandle<()>,
}

impl OrderService {
    pub fn new(store: Arc<dyn OrderStore>, config: &CoreConfig) -> Self {
        let (worker, confirmations) = ConfirmationWorker::new(
            config.confirmation_queue_capacity,
            store.clone(),
            config.confirmation_delay,
        );
        let worker = tokio::spawn(worker.run());

        Self {
            store,
            confirmations,
            enqueue_timeout: config.enqueue_timeout,
            worker,
        }
    }

    /// Validates and stores a new order, then queues it for automatic confirmation.
    ///
    /// # Errors
    /// - `ValidationError` for a non-positive `user_id`/`car_id` or a comment
    ///   that is empty or longer than 500 characters once trimmed
    /// - `DatabaseError` if the store fails
    #[instrument(skip(self, comment))]
    pub async fn create_order(&self, user_id: i64, car_id: i64, comment: &str) -> Result<Order> {
        if user_id <= 0 {
            return Err(OrderError::validation("user_id must be positive"));
        }
        if car_id <= 0 {
            return Err(OrderError::validation("car_id must be positive"));
        }

        let comment = comment.trim();
        if comment.is_empty() {
            return Err(OrderError::validation("comment cannot be empty"));
        }
        if comment.chars().count() > MAX_COMMENT_LEN {
            return Err(OrderError::validation("comment too long (max 500 characters)"));
        }

        let order = self
            .store
            .create(OrderCreate::new(user_id, car_id, comment))
            .await?;
        info!(order_id = order.id, "Order created");

        // a full queue costs at most `enqueue_timeout`, after which the id waits in the overflow
        self.confirmations.enqueue(order.id, self.enqueue_timeout).await;

        Ok(order)
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, id: i64) -> Result<Order> {
        validate_order_id(id)?;
        self.store.get_by_id(id).await
    }

    #[instrument(skip(self))]
    pub async fn get_all_orders(&self) -> Result<Vec<Order>> {
        self.store.get_all().await
    }

    #[instrument(skip(self))]
    pub async fn get_user_orders(&self, user_id: i64) -> Result<Vec<Order>> {
        if user_id <= 0 {
            return Err(OrderError::validation("invalid user id"));
        }
        self.store.get_by_user_id(user_id).await
    }

    /// Sets any of the four known statuses.
    ///
    /// An explicit change made before the automatic confirmation fires wins
    /// over it: the worker only confirms orders that are still pending.
    #[instrument(skip(self))]
    pub async fn update_status(&self, id: i64, status: &str) -> Result<Order> {
        validate_order_id(id)?;
        let status: OrderStatus = status.parse()?;

        let order = self.store.update_status(id, status).await?;
        info!(status = %order.status, "Order status updated");
        Ok(order)
    }

    #[instrument(skip(self))]
    pub async fn delete_order(&self, id: i64) -> Result<()> {
        validate_order_id(id)?;
        self.store.delete(id).await?;
        info!("Order deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_orders_by_status(&self, status: &str) -> Result<Vec<Order>> {
        let status: OrderStatus = status.parse()?;
        self.store.get_by_status(status).await
    }

    /// Newest orders first. A `limit` outside `1..=100` falls back to 10.
    #[instrument(skip(self))]
    pub async fn get_recent_orders(&self, limit: i64) -> Result<Vec<Order>> {
        let limit = if limit <= 0 || limit > MAX_RECENT_LIMIT {
            debug!(limit, "Recent orders limit out of range, using default");
            DEFAULT_RECENT_LIMIT
        } else {
            limit as usize
        };
        self.store.get_recent(limit).await
    }

    /// Totals per status, the five most ordered cars and today's order count.
    #[instrument(skip(self))]
    pub async fn get_order_stats(&self) -> Result<OrderStats> {
        let orders = self.store.get_all().await?;
        let stats = OrderStats::collect(&orders, start_of_day(now()));
        debug!(
            total = stats.total,
            pending = stats.count(OrderStatus::Pending),
            today = stats.today,
            "Order stats computed"
        );
        Ok(stats)
    }

    /// Orders whose comment contains `query`, ignoring case.
    #[instrument(skip(self))]
    pub async fn search_orders(&self, query: &str) -> Result<Vec<Order>> {
        if query.chars().count() < MIN_QUERY_LEN {
            return Err(OrderError::validation("search query too short (min 2 characters)"));
        }
        self.store.search(&query.to_lowercase()).await
    }

    /// Closes the confirmation queue and waits for the worker to work through
    /// whatever is still queued.
    #[instrument(skip(self))]
    pub async fn shutdown(self) {
        drop(self.confirmations);
        if let Err(e) = self.worker.await {
            error!(error = ?e, "Confirmation worker ended abnormally");
        }
    }
}

fn validate_order_id(id: i64) -> Result<()> {
    if id <= 0 {
        return Err(OrderError::validation("invalid order id"));
    }
    Ok(())
}
