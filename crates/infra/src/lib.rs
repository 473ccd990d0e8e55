//! Infrastructure layer: persistence, locking, config and the inventory service.

pub mod config;
pub mod locks;
pub mod service;
pub mod store;

pub use config::Settings;
pub use locks::{ProductGuard, ProductLocks};
pub use service::{InventoryService, SaleReceipt, ServiceError};
pub use store::{InMemoryInventoryStore, InventoryStore, SqliteInventoryStore, StoreError};
