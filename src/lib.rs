//! # Order core
//!
//! Accepts car orders, stores them, confirms them in the background and
//! answers aggregate queries over them.
//!
//! - [`domain`] - the order record, its status vocabulary and statistics
//! - [`store`] - the storage contract with an in-memory and a Postgres backend
//! - [`service`] - validation and orchestration, the only entry point for callers
//! - [`confirmation`] - the worker that moves new orders from pending to confirmed
//! - [`app_system`] - startup, shutdown and tracing setup
//!
//! ```no_run
//! use order_core::{CoreConfig, OrderSystem};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let config = CoreConfig::from_env()?;
//! let system = OrderSystem::start(&config).await;
//!
//! let _order = system.order_service.create_order(1, 5, "weekend rental").await?;
//! let stats = system.order_service.get_order_stats().await?;
//! assert_eq!(stats.total, 1);
//!
//! system.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod app_system;
pub mod config;
pub mod confirmation;
pub mod domain;
pub mod error;
pub mod service;
pub mod store;


pub use app_system::{setup_tracing, OrderSystem};
pub use config::CoreConfig;
pub use domain::{CarCount, Order, OrderStats, OrderStatus};
pub use error::{ConfigError, ErrorKind, OrderError};
pub use service::OrderService;
pub use store::{InMemoryOrderStore, OrderStore, PgOrderStore, StoreBackend};
