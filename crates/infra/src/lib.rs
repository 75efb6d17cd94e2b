//! Infrastructure layer: entity store, configuration, outbound notifications.

pub mod config;
pub mod notify;
pub mod store;

pub use config::{AppConfig, ConfigError, Environment};
pub use notify::{LogNotifier, Notification, NotificationQueue, Notifier};
pub use store::{Database, InMemoryDatabase, PgDatabase, StoreError, StoreResult, Transaction};
