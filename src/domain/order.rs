use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::OrderError;

/// Lifecycle states an order can be in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl OrderStatus {
    /// Every status, in the order the statistics report them.
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Cancelled,
        OrderStatus::Completed,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;

    /// Parses the lowercase wire name. Anything else is a validation error
    /// that lists the allowed values.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                OrderError::ValidationError(
                    "invalid status. allowed: pending, confirmed, cancelled, completed".to_string(),
                )
            })
    }
}

/// A request to reserve a car, tracked through its status lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub car_id: i64,
    pub status: OrderStatus,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating a new order. The store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct OrderCreate {
    pub user_id: i64,
    pub car_id: i64,
    pub comment: String,
    /// Falls back to [`OrderStatus::Pending`] when unset.
    pub status: Option<OrderStatus>,
}

impl OrderCreate {
    pub fn new(user_id: i64, car_id: i64, comment: impl Into<String>) -> Self {
        Self {
            user_id,
            car_id,
            comment: comment.into(),
            status: None,
        }
    }
}

impl Order {
    /// Builds the stored record for a freshly allocated id.
    ///
    /// # Notes
    /// `created_at` and `updated_at` start out identical.
    pub fn from_create(id: i64, params: OrderCreate, now: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: params.user_id,
            car_id: params.car_id,
            status: params.status.unwrap_or_default(),
            comment: params.comment,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets a new status and refreshes `updated_at`, never moving it before `created_at`.
    pub fn set_status(&mut self, status: OrderStatus, now: DateTime<Utc>) {
        self.status = status;
        self.updated_at = now.max(self.created_at);
    }
}

/// Current UTC time at microsecond precision, the finest unit every backend keeps.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Sorts newest first; equal timestamps fall back to the higher id.
pub fn sort_newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn status_parses_only_the_known_vocabulary() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }

        let err = "shipped".parse::<OrderStatus>().unwrap_err();
        assert!(matches!(err, OrderError::ValidationError(_)));
        assert!(err.to_string().contains("pending, confirmed, cancelled, completed"));

        assert!("Pending".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&OrderStatus::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");
    }

    #[test]
    fn from_create_defaults_to_pending() {
        let at = now();
        let order = Order::from_create(7, OrderCreate::new(1, 5, "test"), at);

        assert_eq!(order.id, 7);
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.created_at, order.updated_at);
    }

    #[test]
    fn set_status_keeps_updated_at_after_created_at() {
        let at = now();
        let mut order = Order::from_create(1, OrderCreate::new(1, 1, "x"), at);

        order.set_status(OrderStatus::Completed, at - Duration::seconds(10));
        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.updated_at, order.created_at);

        order.set_status(OrderStatus::Cancelled, at + Duration::seconds(10));
        assert!(order.updated_at > order.created_at);
    }

    #[test]
    fn newest_first_breaks_ties_by_id() {
        let at = now();
        let mut orders = vec![
            Order::from_create(1, OrderCreate::new(1, 1, "a"), at),
            Order::from_create(2, OrderCreate::new(1, 1, "b"), at),
            Order::from_create(3, OrderCreate::new(1, 1, "c"), at - Duration::seconds(1)),
        ];
        sort_newest_first(&mut orders);

        let ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }
}
