use tracing::{error, info, Instrument};

use order_core::{setup_tracing, CoreConfig, OrderSystem};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Setup tracing once for the entire application
    setup_tracing();

    let config = CoreConfig::from_env()?;
    info!("Starting order core demo");

    let system = OrderSystem::start(&config).await;
    let orders = &system.order_service;
    info!(backend = %system.backend(), "Using order store");

    let span = tracing::info_span!("order_creation");
    let created = async {
        let mut created = Vec::new();
        for (user_id, car_id, comment) in [
            (1, 5, "Weekend trip, need a roof rack"),
            (2, 5, "Airport pickup"),
            (1, 7, "Long term rental, ask about discount"),
        ] {
            created.push(orders.create_order(user_id, car_id, comment).await?);
        }
        Ok::<_, order_core::OrderError>(created)
    }
    .instrument(span)
    .await?;

    info!(count = created.len(), "Orders created");

    // Rejected at the boundary, nothing is stored
    if let Err(e) = orders.create_order(0, 5, "no user").await {
        error!(error = %e, "Order rejected (expected)");
    }

    let stats = orders.get_order_stats().await?;
    info!(stats = %serde_json::to_string(&stats)?, "Order stats");

    let found = orders.search_orders("RENTAL").await?;
    info!(matches = found.len(), "Search finished");

    info!(
        delay_ms = config.confirmation_delay.as_millis() as u64,
        "Waiting for automatic confirmation"
    );
    tokio::time::sleep(config.confirmation_delay * created.len() as u32 + config.confirmation_delay).await;

    for order in orders.get_recent_orders(10).await? {
        info!(order_id = order.id, status = %order.status, car_id = order.car_id, "Recent order");
    }

    // Shutdown system gracefully
    system.shutdown().await;

    info!("Demo completed successfully");
    Ok(())
}
