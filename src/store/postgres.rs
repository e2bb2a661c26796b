use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::{debug, error, info, instrument};

use super::OrderStore;
use crate::domain::{now, Order, OrderCreate, OrderStatus};
use crate::error::{OrderError, Result};

const ORDER_COLUMNS: &str = "id, user_id, car_id, comment, status, created_at, updated_at";

/// External backend: an `orders` collection in Postgres.
///
/// Ids come from a `BIGSERIAL` sequence, so they are monotonic and never
/// reused. Driver errors are logged in full and reported to callers as a
/// generic [`OrderError::DatabaseError`].
#[derive(Debug, Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    /// Connects, runs a liveness probe and makes sure the collection exists.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        connect_timeout: Duration,
    ) -> std::result::Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(connect_timeout)
            .connect(url)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;

        let store = Self { pool };
        store.ensure_schema().await?;
        info!("Connected to external order store");
        Ok(store)
    }

    async fn ensure_schema(&self) -> std::result::Result<(), sqlx::Error> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS orders (
                id          BIGSERIAL PRIMARY KEY,
                user_id     BIGINT      NOT NULL,
                car_id      BIGINT      NOT NULL,
                comment     TEXT        NOT NULL,
                status      TEXT        NOT NULL,
                created_at  TIMESTAMPTZ NOT NULL,
                updated_at  TIMESTAMPTZ NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS orders_created_at_idx ON orders (created_at DESC, id DESC)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    fn row_to_order(row: &PgRow) -> Result<Order> {
        let status: String = row.try_get("status").map_err(db_error("failed to decode order"))?;
        let status = status.parse::<OrderStatus>().map_err(|_| {
            error!(status = %status, "Stored order has an unknown status");
            OrderError::DatabaseError("failed to decode order".to_string())
        })?;

        Ok(Order {
            id: row.try_get("id").map_err(db_error("failed to decode order"))?,
            user_id: row.try_get("user_id").map_err(db_error("failed to decode order"))?,
            car_id: row.try_get("car_id").map_err(db_error("failed to decode order"))?,
            comment: row.try_get("comment").map_err(db_error("failed to decode order"))?,
            status,
            created_at: row.try_get("created_at").map_err(db_error("failed to decode order"))?,
            updated_at: row.try_get("updated_at").map_err(db_error("failed to decode order"))?,
        })
    }

    fn rows_to_orders(rows: &[PgRow]) -> Result<Vec<Order>> {
        rows.iter().map(Self::row_to_order).collect()
    }

    async fn exists(&self, id: i64) -> Result<bool> {
        let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM orders WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("failed to load order"))?;
        Ok(exists)
    }
}

/// Logs the driver error and replaces it with a generic description.
fn db_error(context: &'static str) -> impl Fn(sqlx::Error) -> OrderError {
    move |e| {
        error!(error = %e, context, "Order store query failed");
        OrderError::DatabaseError(context.to_string())
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    #[instrument(skip(self, params), fields(user_id = params.user_id, car_id = params.car_id))]
    async fn create(&self, params: OrderCreate) -> Result<Order> {
        let created_at = now();
        let status = params.status.unwrap_or_default();

        let (id,): (i64,) = sqlx::query_as(
            r"
            INSERT INTO orders (user_id, car_id, comment, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING id
            ",
        )
        .bind(params.user_id)
        .bind(params.car_id)
        .bind(&params.comment)
        .bind(status.as_str())
        .bind(created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("failed to create order"))?;

        debug!(order_id = id, "Order inserted");
        Ok(Order::from_create(id, params, created_at))
    }

    async fn get_by_id(&self, id: i64) -> Result<Order> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("failed to load order"))?;

        match row {
            Some(row) => Self::row_to_order(&row),
            None => Err(OrderError::NotFound(id)),
        }
    }

    async fn get_all(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("failed to load orders"))?;

        Self::rows_to_orders(&rows)
    }

    async fn get_by_user_id(&self, user_id: i64) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("failed to load orders"))?;

        Self::rows_to_orders(&rows)
    }

    async fn get_by_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE status = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("failed to load orders"))?;

        Self::rows_to_orders(&rows)
    }

    async fn get_recent(&self, limit: usize) -> Result<Vec<Order>> {
        #[allow(clippy::cast_possible_wrap)]
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id DESC LIMIT $1"
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("failed to load orders"))?;

        Self::rows_to_orders(&rows)
    }

    #[instrument(skip(self))]
    async fn update_status(&self, id: i64, status: OrderStatus) -> Result<Order> {
        let row = sqlx::query(&format!(
            r"
            UPDATE orders
            SET status = $1, updated_at = GREATEST($2, created_at)
            WHERE id = $3
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(status.as_str())
        .bind(now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("failed to update order"))?;

        match row {
            Some(row) => Self::row_to_order(&row),
            None => Err(OrderError::NotFound(id)),
        }
    }

    #[instrument(skip(self))]
    async fn transition_status(&self, id: i64, from: OrderStatus, to: OrderStatus) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            r"
            UPDATE orders
            SET status = $1, updated_at = GREATEST($2, created_at)
            WHERE id = $3 AND status = $4
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(to.as_str())
        .bind(now())
        .bind(id)
        .bind(from.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("failed to update order"))?;

        match row {
            Some(row) => Self::row_to_order(&row).map(Some),
            None => {
                if self.exists(id).await? {
                    Ok(None)
                } else {
                    Err(OrderError::NotFound(id))
                }
            }
        }
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("failed to delete order"))?;

        if result.rows_affected() == 0 {
            return Err(OrderError::NotFound(id));
        }
        Ok(())
    }

    async fn search(&self, query: &str) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE strpos(lower(comment), lower($1)) > 0
            ORDER BY created_at DESC, id DESC
            "
        ))
        .bind(query)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("failed to search orders"))?;

        Self::rows_to_orders(&rows)
    }

    async fn count(&self) -> Result<usize> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("failed to count orders"))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("External order store connection closed");
    }
}
