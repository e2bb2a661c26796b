use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Order, OrderStatus};

/// How many cars the statistics rank.
pub const TOP_CARS_LIMIT: usize = 5;

/// Number of orders placed for one car.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarCount {
    pub car_id: i64,
    pub count: usize,
}

/// Aggregate view over the whole order set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStats {
    pub total: usize,
    pub pending: usize,
    pub confirmed: usize,
    pub cancelled: usize,
    pub completed: usize,
    pub top_cars: Vec<CarCount>,
    pub today: usize,
}

impl OrderStats {
    /// Folds `orders` in a single pass.
    ///
    /// `top_cars` is ranked by count; cars with equal counts keep the order in
    /// which they were first seen in `orders`. `today` counts orders created at
    /// or after `day_start`.
    pub fn collect(orders: &[Order], day_start: DateTime<Utc>) -> Self {
        let mut stats = OrderStats {
            total: orders.len(),
            ..Default::default()
        };

        let mut cars: Vec<CarCount> = Vec::new();
        let mut car_index: HashMap<i64, usize> = HashMap::new();

        for order in orders {
            *stats.count_mut(order.status) += 1;

            match car_index.get(&order.car_id) {
                Some(&i) => cars[i].count += 1,
                None => {
                    car_index.insert(order.car_id, cars.len());
                    cars.push(CarCount { car_id: order.car_id, count: 1 });
                }
            }

            if order.created_at >= day_start {
                stats.today += 1;
            }
        }

        // stable: ties stay in first-seen order
        cars.sort_by(|a, b| b.count.cmp(&a.count));
        cars.truncate(TOP_CARS_LIMIT);
        stats.top_cars = cars;

        stats
    }

    pub fn count(&self, status: OrderStatus) -> usize {
        match status {
            OrderStatus::Pending => self.pending,
            OrderStatus::Confirmed => self.confirmed,
            OrderStatus::Cancelled => self.cancelled,
            OrderStatus::Completed => self.completed,
        }
    }

    fn count_mut(&mut self, status: OrderStatus) -> &mut usize {
        match status {
            OrderStatus::Pending => &mut self.pending,
            OrderStatus::Confirmed => &mut self.confirmed,
            OrderStatus::Cancelled => &mut self.cancelled,
            OrderStatus::Completed => &mut self.completed,
        }
    }
}

/// Midnight UTC of the day containing `at`.
pub fn start_of_day(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .unwrap_or(at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{now, OrderCreate};
    use chrono::Duration;

    fn order(id: i64, car_id: i64, status: OrderStatus, created_at: DateTime<Utc>) -> Order {
        let mut params = OrderCreate::new(1, car_id, format!("order {id}"));
        params.status = Some(status);
        Order::from_create(id, params, created_at)
    }

    #[test]
    fn empty_set_is_all_zero() {
        let stats = OrderStats::collect(&[], now());
        assert_eq!(stats, OrderStats::default());
    }

    #[test]
    fn counts_statuses_cars_and_today() {
        let at = now();
        let day_start = start_of_day(at);
        let orders = vec![
            order(1, 10, OrderStatus::Pending, at),
            order(2, 20, OrderStatus::Confirmed, at),
            order(3, 20, OrderStatus::Confirmed, at),
            order(4, 30, OrderStatus::Cancelled, day_start - Duration::hours(1)),
            order(5, 20, OrderStatus::Completed, day_start - Duration::days(3)),
        ];

        let stats = OrderStats::collect(&orders, day_start);

        assert_eq!(stats.total, 5);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.confirmed, 2);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.today, 3);
        assert_eq!(
            stats.top_cars,
            vec![
                CarCount { car_id: 20, count: 3 },
                CarCount { car_id: 10, count: 1 },
                CarCount { car_id: 30, count: 1 },
            ]
        );

        let by_status: usize = OrderStatus::ALL.iter().map(|s| stats.count(*s)).sum();
        assert_eq!(by_status, stats.total);
    }

    #[test]
    fn order_created_exactly_at_midnight_counts_as_today() {
        let day_start = start_of_day(now());
        let stats = OrderStats::collect(&[order(1, 1, OrderStatus::Pending, day_start)], day_start);
        assert_eq!(stats.today, 1);
    }

    #[test]
    fn top_cars_keep_first_seen_order_on_ties_and_cap_at_five() {
        let at = now();
        let orders: Vec<Order> = [7, 3, 9, 1, 4, 8, 2]
            .iter()
            .enumerate()
            .map(|(i, car)| order(i as i64 + 1, *car, OrderStatus::Pending, at))
            .collect();

        let stats = OrderStats::collect(&orders, start_of_day(at));
        let cars: Vec<i64> = stats.top_cars.iter().map(|c| c.car_id).collect();
        assert_eq!(cars, vec![7, 3, 9, 1, 4]);
    }
}
