use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use lotstock_core::{AggregateRoot, ExpectedVersion, ProductId};
use lotstock_inventory::ledger::sort_newest_first;
use lotstock_inventory::{NewTransaction, Pagination, Product, ProductSnapshot, Transaction};

use super::{InventoryStore, StoreError, ensure_ledger_target, version_conflict};

#[derive(Debug, Default)]
struct State {
    products: HashMap<ProductId, ProductSnapshot>,
    ledger: Vec<Transaction>,
    last_id: u64,
}

impl State {
    fn version_of(&self, id: ProductId) -> u64 {
        self.products.get(&id).map(|p| p.version).unwrap_or(0)
    }

    fn push(&mut self, entry: NewTransaction) -> Transaction {
        self.last_id += 1;
        let stored = entry.with_id(self.last_id);
        self.ledger.push(stored.clone());
        stored
    }
}

/// In-memory inventory store.
///
/// Intended for tests/dev. One lock guards products and ledger together, so every
/// commit is atomic.
#[derive(Debug, Default)]
pub struct InMemoryInventoryStore {
    state: RwLock<State>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }
}

impl InventoryStore for InMemoryInventoryStore {
    fn load(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let state = self.read()?;
        Ok(state.products.get(&id).cloned().map(Product::from_snapshot))
    }

    fn list(&self) -> Result<Vec<Product>, StoreError> {
        let state = self.read()?;
        Ok(state
            .products
            .values()
            .cloned()
            .map(Product::from_snapshot)
            .collect())
    }

    fn commit(
        &self,
        product: &Product,
        expected: ExpectedVersion,
        entries: Vec<NewTransaction>,
    ) -> Result<Vec<Transaction>, StoreError> {
        ensure_ledger_target(product, &entries)?;

        let mut state = self.write()?;
        let current = state.version_of(product.id_typed());
        if !expected.matches(current) {
            return Err(version_conflict(expected, current));
        }
        if product.version() <= current {
            return Err(StoreError::Conflict(format!(
                "product version {} does not advance stored version {current}",
                product.version()
            )));
        }

        state.products.insert(product.id_typed(), product.snapshot());
        Ok(entries.into_iter().map(|e| state.push(e)).collect())
    }

    fn remove(&self, id: ProductId, expected: ExpectedVersion) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if !state.products.contains_key(&id) {
            return Err(StoreError::MissingProduct(id));
        }
        let current = state.version_of(id);
        if !expected.matches(current) {
            return Err(version_conflict(expected, current));
        }

        state.products.remove(&id);
        state.ledger.retain(|t| t.product_id != id);
        Ok(())
    }

    fn append(&self, entry: NewTransaction) -> Result<Transaction, StoreError> {
        let mut state = self.write()?;
        if !state.products.contains_key(&entry.product_id) {
            return Err(StoreError::MissingProduct(entry.product_id));
        }
        Ok(state.push(entry))
    }

    fn history(
        &self,
        id: ProductId,
        page: Option<Pagination>,
    ) -> Result<Vec<Transaction>, StoreError> {
        let state = self.read()?;
        let mut entries: Vec<Transaction> = state
            .ledger
            .iter()
            .filter(|t| t.product_id == id)
            .cloned()
            .collect();
        sort_newest_first(&mut entries);
        Ok(match page {
            Some(page) => page.apply(entries),
            None => entries,
        })
    }

    fn transactions(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Transaction>, StoreError> {
        let state = self.read()?;
        let mut entries: Vec<Transaction> = state
            .ledger
            .iter()
            .filter(|t| since.is_none_or(|since| t.occurred_at >= since))
            .cloned()
            .collect();
        sort_newest_first(&mut entries);
        Ok(entries)
    }
}
