use std::sync::Arc;

use tracing::{info, instrument};

use crate::config::CoreConfig;
use crate::service::OrderService;
use crate::store::{bind_store, OrderStore, StoreBackend};

/// Startup and shutdown for the whole order core.
///
/// **Startup order:**
/// 1. Probe the external store and bind a backend
/// 2. Build the service, which starts the confirmation worker
///
/// **Shutdown order:** the service first, so queued confirmations still reach
/// the store, then the store.
pub struct OrderSystem {
    pub order_service: OrderService,
    store: Arc<dyn OrderStore>,
    backend: StoreBackend,
}

impl OrderSystem {
    #[instrument(name = "order_system", skip(config))]
    pub async fn start(config: &CoreConfig) -> Self {
        info!("Starting order system");

        let (store, backend) = bind_store(config).await;
        let order_service = OrderService::new(store.clone(), config);

        info!(backend = %backend, "Order system started");
        Self {
            order_service,
            store,
            backend,
        }
    }

    /// Wires the system around an already bound store.
    pub fn with_store(store: Arc<dyn OrderStore>, backend: StoreBackend, config: &CoreConfig) -> Self {
        let order_service = OrderService::new(store.clone(), config);
        Self {
            order_service,
            store,
            backend,
        }
    }

    pub fn backend(&self) -> StoreBackend {
        self.backend
    }

    #[instrument(skip(self))]
    pub async fn shutdown(self) {
        info!("Shutting down order system");

        self.order_service.shutdown().await;
        self.store.close().await;

        info!("Order system shutdown complete");
    }
}
