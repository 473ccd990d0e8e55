//! Inventory service: the orchestration layer callers talk to.
//!
//! Every mutation follows the same pipeline:
//!
//! ```text
//! acquire per-product lock
//!   -> load current product
//!   -> decide (aggregate `handle`) and evolve a copy (`apply`)
//!   -> commit snapshot + ledger entries (atomic, version-checked)
//!   -> publish committed events on the bus
//! ```
//!
//! A sale that loses a version race against another writer is re-run from fresh
//! state, up to `locking.sell_retries` times. Updates never retry: their expected
//! version comes from the caller. Reports read without locking.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use thiserror::Error;
use tracing::{info, instrument, warn};

use lotstock_core::{AggregateRoot, DomainError, ExpectedVersion, ProductId, execute};
use lotstock_events::{Event, EventBus, EventEnvelope};
use lotstock_inventory::query::{self, Pagination, ProductFilter};
use lotstock_inventory::valuation::{self, ExpiringBatch, SalesHistory, ValuationSummary};
use lotstock_inventory::{
    BatchSelector, CreateProduct, DeleteProduct, NewTransaction, Product, ProductCommand,
    ProductDraft, ProductEvent, SellStock, StockSold, Transaction, TransactionKind, UpdateProduct,
};

use crate::config::{LockingSettings, ReportSettings};
use crate::locks::{ProductGuard, ProductLocks};
use crate::store::{InventoryStore, StoreError};

/// Errors surfaced to callers of the service.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid batch: {0}")]
    InvalidBatch(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("insufficient stock (requested {requested}, available {available})")]
    InsufficientStock { requested: i64, available: i64 },

    #[error("insufficient stock in batch {selector} (requested {requested}, available {available})")]
    InsufficientBatchStock {
        selector: BatchSelector,
        requested: i64,
        available: i64,
    },

    /// Concurrent modification or lock timeout.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Corrupt stored data or backend failure.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl ServiceError {
    /// Retrying the whole operation against fresh state may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Conflict(_))
    }
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                ServiceError::Validation(msg)
            }
            DomainError::InvalidBatch(msg) => ServiceError::InvalidBatch(msg),
            DomainError::NotFound(what) => ServiceError::NotFound(what),
            DomainError::InsufficientStock {
                requested,
                available,
            } => ServiceError::InsufficientStock {
                requested,
                available,
            },
            DomainError::InsufficientBatchStock {
                expiry,
                requested,
                available,
            } => ServiceError::InsufficientBatchStock {
                selector: BatchSelector(expiry),
                requested,
                available,
            },
            DomainError::Conflict(msg) => ServiceError::Conflict(msg),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) => ServiceError::Conflict(msg),
            StoreError::MissingProduct(id) => ServiceError::NotFound(format!("product {id}")),
            other @ (StoreError::Corrupt(_) | StoreError::Backend(_)) => {
                ServiceError::Storage(other.to_string())
            }
        }
    }
}

/// Outcome of a successful sale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleReceipt {
    pub product: Product,
    pub sold: StockSold,
    pub transaction: Transaction,
}

#[derive(Debug)]
pub struct InventoryService<S, B> {
    store: S,
    bus: B,
    locks: ProductLocks,
    locking: LockingSettings,
    reports: ReportSettings,
}

impl<S, B> InventoryService<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self::with_settings(store, bus, LockingSettings::default(), ReportSettings::default())
    }

    pub fn with_settings(
        store: S,
        bus: B,
        locking: LockingSettings,
        reports: ReportSettings,
    ) -> Self {
        Self {
            store,
            bus,
            locks: ProductLocks::new(),
            locking,
            reports,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<S, B> InventoryService<S, B>
where
    S: InventoryStore,
    B: EventBus<EventEnvelope<ProductEvent>>,
{
    /// Create a product. Returns it with its newly assigned id.
    #[instrument(skip(self, draft), fields(name = %draft.name), err)]
    pub fn create(&self, draft: ProductDraft) -> Result<Product, ServiceError> {
        let id = ProductId::new();
        let _guard = self.lock(id)?;

        let mut product = Product::empty(id);
        let command = ProductCommand::Create(CreateProduct {
            product_id: id,
            draft,
            occurred_at: Utc::now(),
        });
        self.commit(&mut product, &command)?;

        info!(product_id = %id, quantity = product.total_quantity(), "product created");
        Ok(product)
    }

    /// Replace the editable state of a product.
    ///
    /// `expected` is the version the caller read; a mismatch is a `Conflict`.
    #[instrument(skip(self, draft), err)]
    pub fn update(
        &self,
        id: ProductId,
        expected: ExpectedVersion,
        draft: ProductDraft,
    ) -> Result<Product, ServiceError> {
        let _guard = self.lock(id)?;

        let mut product = self.load_existing(id)?;
        let command = ProductCommand::Update(UpdateProduct {
            product_id: id,
            expected_version: expected,
            draft,
            occurred_at: Utc::now(),
        });
        self.commit(&mut product, &command)?;

        info!(product_id = %id, version = product.version(), "product updated");
        Ok(product)
    }

    /// Sell `quantity` units, in FEFO order or from the selected batch.
    #[instrument(skip(self), err)]
    pub fn sell(
        &self,
        id: ProductId,
        quantity: i64,
        selector: Option<BatchSelector>,
    ) -> Result<SaleReceipt, ServiceError> {
        let _guard = self.lock(id)?;

        let mut attempt: u32 = 0;
        loop {
            let mut product = self.load_existing(id)?;
            let command = ProductCommand::Sell(SellStock {
                product_id: id,
                quantity,
                selector,
                occurred_at: Utc::now(),
            });

            match self.commit(&mut product, &command) {
                Ok((events, mut stored)) => {
                    let sold = events
                        .into_iter()
                        .find_map(|e| match e {
                            ProductEvent::StockSold(sold) => Some(sold),
                            _ => None,
                        })
                        .ok_or_else(|| ServiceError::Storage("sale produced no event".into()))?;
                    let transaction = stored
                        .pop()
                        .ok_or_else(|| ServiceError::Storage("sale produced no ledger entry".into()))?;

                    info!(
                        product_id = %id,
                        quantity,
                        remaining = product.total_quantity(),
                        batches = sold.allocations.len(),
                        "stock sold"
                    );
                    return Ok(SaleReceipt {
                        product,
                        sold,
                        transaction,
                    });
                }
                Err(ServiceError::Conflict(reason)) if attempt < self.locking.sell_retries => {
                    attempt += 1;
                    warn!(product_id = %id, attempt, %reason, "sale lost a version race; retrying");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Delete a product and its ledger. The photo reference is released via the bus.
    #[instrument(skip(self), err)]
    pub fn delete(&self, id: ProductId) -> Result<(), ServiceError> {
        let _guard = self.lock(id)?;

        let product = self.load_existing(id)?;
        let base = product.version();
        let mut next = product.clone();
        let events = execute(
            &mut next,
            &ProductCommand::Delete(DeleteProduct {
                product_id: id,
                occurred_at: Utc::now(),
            }),
        )?;

        self.store.remove(id, ExpectedVersion::Exact(base))?;
        self.publish(id, base, &events);

        info!(product_id = %id, "product deleted");
        Ok(())
    }

    pub fn get(&self, id: ProductId) -> Result<Product, ServiceError> {
        self.load_existing(id)
    }

    /// Products matching `filter`, ordered by name.
    pub fn list(
        &self,
        filter: &ProductFilter,
        page: Option<Pagination>,
    ) -> Result<Vec<Product>, ServiceError> {
        let products = self.store.list()?;
        Ok(query::select(products, filter, page))
    }

    /// Ledger of one product, newest first.
    pub fn history(
        &self,
        id: ProductId,
        page: Option<Pagination>,
    ) -> Result<Vec<Transaction>, ServiceError> {
        self.load_existing(id)?;
        Ok(self.store.history(id, page)?)
    }

    /// Append a ledger entry for an existing product.
    #[instrument(skip(self), err)]
    pub fn record_transaction(
        &self,
        id: ProductId,
        quantity: i64,
        kind: TransactionKind,
        occurred_at: DateTime<Utc>,
    ) -> Result<Transaction, ServiceError> {
        let entry = NewTransaction::new(id, quantity, kind, occurred_at)?;
        let _guard = self.lock(id)?;
        Ok(self.store.append(entry)?)
    }

    pub fn total_value(&self) -> Result<ValuationSummary, ServiceError> {
        let products = self.store.list()?;
        let summary = valuation::total_value(&products);
        if summary.flagged > 0 {
            warn!(flagged = summary.flagged, "valuation skipped rows that could not be valued");
        }
        Ok(summary)
    }

    /// Batches expiring within `window_days` of `today` (configured default when
    /// `None`), already-expired ones included.
    pub fn expiring_within(
        &self,
        window_days: Option<i64>,
        today: NaiveDate,
    ) -> Result<Vec<ExpiringBatch>, ServiceError> {
        let days = window_days.unwrap_or(self.reports.expiry_window_days);
        if days < 0 {
            return Err(ServiceError::Validation(format!(
                "expiry window cannot be negative (got {days})"
            )));
        }
        let window = Duration::try_days(days)
            .ok_or_else(|| ServiceError::Validation(format!("expiry window too large ({days})")))?;

        let products = self.store.list()?;
        Ok(valuation::expiring_within(&products, window, today))
    }

    /// Products that sold out, most recent sale first.
    pub fn sold_out(&self) -> Result<Vec<Product>, ServiceError> {
        let products = self.store.list()?;
        Ok(valuation::sold_out(&products))
    }

    pub fn sales_history(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<SalesHistory, ServiceError> {
        let products = self.store.list()?;
        let transactions = self.store.transactions(since)?;
        Ok(valuation::sales_history(&products, &transactions, since))
    }

    fn lock(&self, id: ProductId) -> Result<ProductGuard<'_>, ServiceError> {
        self.locks
            .acquire(id, self.locking.timeout())
            .map_err(|err| {
                warn!(product_id = %id, timeout_ms = self.locking.timeout_ms, "product lock timed out");
                ServiceError::from(err)
            })
    }

    fn load_existing(&self, id: ProductId) -> Result<Product, ServiceError> {
        self.store
            .load(id)?
            .ok_or_else(|| ServiceError::NotFound(format!("product {id}")))
    }

    /// Decide + evolve a copy, commit it, then publish.
    ///
    /// `product` is only replaced once the store accepted the write.
    fn commit(
        &self,
        product: &mut Product,
        command: &ProductCommand,
    ) -> Result<(Vec<ProductEvent>, Vec<Transaction>), ServiceError> {
        let base = product.version();
        let mut next = product.clone();
        let events = execute(&mut next, command)?;

        let entries: Vec<NewTransaction> =
            events.iter().filter_map(ProductEvent::ledger_entry).collect();
        let stored = self
            .store
            .commit(&next, ExpectedVersion::Exact(base), entries)?;

        *product = next;
        self.publish(product.id_typed(), base, &events);
        Ok((events, stored))
    }

    /// Publish after commit. A bus failure is logged, not returned: the write
    /// already happened and the caller must not retry it.
    fn publish(&self, id: ProductId, base_version: u64, events: &[ProductEvent]) {
        for (offset, event) in (1u64..).zip(events) {
            let envelope = EventEnvelope::wrap(base_version + offset, event.clone());
            if let Err(err) = self.bus.publish(envelope) {
                warn!(
                    product_id = %id,
                    event_type = event.event_type(),
                    error = ?err,
                    "event publication failed after commit"
                );
            }
        }
    }
}
