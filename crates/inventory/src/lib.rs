//! Lot-tracked inventory domain (event-sourced aggregate, pure logic).
//!
//! This crate contains the business rules for batches, products, FEFO allocation,
//! the transaction ledger and the read-side valuation/expiry computations. It
//! performs no IO: persistence and locking live in `lotstock-infra`.

pub mod allocation;
pub mod batch;
pub mod catalog;
pub mod ledger;
pub mod product;
pub mod query;
pub mod valuation;

pub use allocation::{BatchAllocation, allocate, apply_allocations};
pub use batch::{Batch, BatchSelector};
pub use catalog::{Brand, Category, Style};
pub use ledger::{NewTransaction, Transaction, TransactionKind};
pub use product::{
    CreateProduct, DeleteProduct, Product, ProductCommand, ProductCreated, ProductDeleted,
    ProductDraft, ProductEvent, ProductMetadata, ProductSnapshot, ProductUpdated, SellStock,
    StockSold, UpdateProduct,
};
pub use query::{Pagination, ProductFilter};
pub use valuation::{
    ExpiringBatch, SaleLine, SalesHistory, ValuationFlag, ValuationRow, ValuationSummary,
};
