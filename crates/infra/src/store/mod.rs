//! Product + ledger persistence.
//!
//! A store keeps two things per product: the current snapshot (batch list
//! included) and its append-only ledger. Writes go through [`InventoryStore::commit`],
//! which replaces the snapshot and appends ledger entries atomically, guarded by
//! an optimistic version check. An absent product is at version 0.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use lotstock_core::{ExpectedVersion, ProductId};
use lotstock_inventory::{NewTransaction, Pagination, Product, Transaction};

pub mod in_memory;
pub mod sqlite;

pub use in_memory::InMemoryInventoryStore;
pub use sqlite::SqliteInventoryStore;

/// Storage operation error.
///
/// These are infrastructure errors, as opposed to domain errors (validation,
/// stock shortfalls).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Optimistic concurrency check failed, or the backend reported a write race.
    #[error("optimistic concurrency check failed: {0}")]
    Conflict(String),

    /// A ledger entry referenced a product that does not exist.
    #[error("product {0} does not exist")]
    MissingProduct(ProductId),

    /// Stored data could not be decoded (batch list, tags, timestamps).
    #[error("corrupt stored data: {0}")]
    Corrupt(String),

    /// Connectivity or other backend failure.
    #[error("storage backend failure: {0}")]
    Backend(String),
}

pub trait InventoryStore: Send + Sync {
    /// Load one product. `Ok(None)` when it does not exist.
    fn load(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Load every product (unordered).
    fn list(&self) -> Result<Vec<Product>, StoreError>;

    /// Write the product snapshot and append `entries` in one atomic step.
    ///
    /// `expected` is checked against the stored version (0 when absent). Returns
    /// the appended entries with their assigned ids.
    fn commit(
        &self,
        product: &Product,
        expected: ExpectedVersion,
        entries: Vec<NewTransaction>,
    ) -> Result<Vec<Transaction>, StoreError>;

    /// Delete a product and its whole ledger.
    fn remove(&self, id: ProductId, expected: ExpectedVersion) -> Result<(), StoreError>;

    /// Append one ledger entry to an existing product.
    fn append(&self, entry: NewTransaction) -> Result<Transaction, StoreError>;

    /// Ledger of one product, newest first (ties: larger id first).
    fn history(
        &self,
        id: ProductId,
        page: Option<Pagination>,
    ) -> Result<Vec<Transaction>, StoreError>;

    /// Ledger entries of all products at or after `since`, newest first.
    fn transactions(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Transaction>, StoreError>;
}

impl<S> InventoryStore for Arc<S>
where
    S: InventoryStore + ?Sized,
{
    fn load(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        (**self).load(id)
    }

    fn list(&self) -> Result<Vec<Product>, StoreError> {
        (**self).list()
    }

    fn commit(
        &self,
        product: &Product,
        expected: ExpectedVersion,
        entries: Vec<NewTransaction>,
    ) -> Result<Vec<Transaction>, StoreError> {
        (**self).commit(product, expected, entries)
    }

    fn remove(&self, id: ProductId, expected: ExpectedVersion) -> Result<(), StoreError> {
        (**self).remove(id, expected)
    }

    fn append(&self, entry: NewTransaction) -> Result<Transaction, StoreError> {
        (**self).append(entry)
    }

    fn history(
        &self,
        id: ProductId,
        page: Option<Pagination>,
    ) -> Result<Vec<Transaction>, StoreError> {
        (**self).history(id, page)
    }

    fn transactions(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Transaction>, StoreError> {
        (**self).transactions(since)
    }
}

fn version_conflict(expected: ExpectedVersion, current: u64) -> StoreError {
    StoreError::Conflict(format!("expected {expected:?}, found {current}"))
}

fn ensure_ledger_target(product: &Product, entries: &[NewTransaction]) -> Result<(), StoreError> {
    match entries.iter().find(|e| e.product_id != product.id_typed()) {
        Some(stray) => Err(StoreError::Backend(format!(
            "ledger entry for {} committed with product {}",
            stray.product_id,
            product.id_typed()
        ))),
        None => Ok(()),
    }
}
