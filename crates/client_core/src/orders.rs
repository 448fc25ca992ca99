//! Aggregates derived from an establishment's order collection.

use std::collections::HashSet;

use shared::{domain::OrderBucket, protocol::OrderCollection};

pub const DEFAULT_ORDER_WINDOW_TOLERANCE: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OrderStats {
    pub amt_orders: usize,
    pub amt_customers: usize,
}

/// Counts orders across every bucket and the distinct customers who placed
/// them. Orders without a `uid` add to the order count only.
pub fn order_stats(collection: &OrderCollection) -> OrderStats {
    let mut customers = HashSet::new();
    let mut amt_orders = 0;
    for bucket in &collection.buckets {
        amt_orders += bucket.orders.len();
        customers.extend(bucket.orders.iter().filter_map(|order| order.uid));
    }
    OrderStats {
        amt_orders,
        amt_customers: customers.len(),
    }
}

/// Orders created within `[first_ts - tolerance, last_ts + tolerance]`,
/// still grouped under their bucket index. Buckets left empty are dropped
/// and each kept bucket's total is recomputed from its kept orders.
pub fn orders_between(
    collection: &OrderCollection,
    first_ts: f64,
    last_ts: f64,
    tolerance: f64,
) -> Vec<OrderBucket> {
    let from = first_ts - tolerance;
    let to = last_ts + tolerance;

    collection
        .buckets
        .iter()
        .filter_map(|bucket| {
            let orders: Vec<_> = bucket
                .orders
                .iter()
                .filter(|order| order.created_at >= from && order.created_at <= to)
                .cloned()
                .collect();
            if orders.is_empty() {
                return None;
            }
            Some(OrderBucket {
                index: bucket.index,
                total: orders.iter().map(|order| order.total).sum(),
                orders,
            })
        })
        .collect()
}

#[cfg(test)]
#[path = "tests/orders_tests.rs"]
mod tests;
