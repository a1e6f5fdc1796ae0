//! Seed command implementation.

use orderstore::storage::dynamodb::DynamoTableStore;
use orderstore::{OrderRecord, TableClient};

use super::error::Result;

const STATUSES: [&str; 3] = ["pending", "shipped", "delivered"];

/// Generates deterministic demo orders: `customers` partitions with
/// `orders_per_customer` orders each, statuses and attributes spread so
/// scans, partition queries, and the status index all have something to
/// chew on.
pub fn generate_demo_orders(customers: u32, orders_per_customer: u32) -> Vec<OrderRecord> {
    let mut orders = Vec::with_capacity((customers * orders_per_customer) as usize);

    for customer in 1..=customers {
        for order in 1..=orders_per_customer {
            let status = STATUSES[((customer + order) as usize) % STATUSES.len()];
            let record = OrderRecord::new(
                format!("cus-{customer:02}"),
                format!("ord-{order}"),
            )
            .with_status(status)
            .with_attr("quantity", i64::from((customer * order) % 7 + 1))
            .with_attr("channel", if order % 2 == 0 { "web" } else { "store" });
            orders.push(record);
        }
    }

    orders
}

/// Inserts the demo orders through the table client.
pub async fn seed_orders(
    client: &TableClient<DynamoTableStore>,
    orders: &[OrderRecord],
) -> Result<u32> {
    let mut inserted = 0;
    for order in orders {
        client.put(order).await?;
        inserted += 1;
    }
    Ok(inserted)
}
