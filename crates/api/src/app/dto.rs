use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use lotstock_core::{AggregateRoot, DomainError};
use lotstock_infra::{SaleReceipt, ServiceError};
use lotstock_inventory::{
    Batch, BatchSelector, Pagination, Product, ProductDraft, ProductFilter, ProductMetadata,
    Transaction, TransactionKind,
};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    #[serde(default)]
    pub expiry: Option<NaiveDate>,
    pub quantity: i64,
}

/// Full editable state of a product (create and update).
#[derive(Debug, Deserialize)]
pub struct ProductRequest {
    pub name: String,
    pub unit_price: Decimal,
    #[serde(default)]
    pub batches: Vec<BatchRequest>,
    pub brand: String,
    pub style: String,
    pub category: String,
    #[serde(default)]
    pub photo: Option<String>,
    /// Version the caller read; required on update, ignored on create.
    #[serde(default)]
    pub version: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct SellRequest {
    pub quantity: i64,
    /// `YYYY-MM-DD` or `no-expiry`; omitted means FEFO.
    #[serde(default)]
    pub batch: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecordTransactionRequest {
    pub quantity: i64,
    pub kind: TransactionKind,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub brand: Option<String>,
    pub style: Option<String>,
    pub category: Option<String>,
    /// Case-insensitive name substring.
    pub q: Option<String>,
    pub in_stock: Option<bool>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExpiringQuery {
    pub days: Option<i64>,
    pub today: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SalesQuery {
    pub since: Option<DateTime<Utc>>,
}

// -------------------------
// Request mapping
// -------------------------

fn domain(err: DomainError) -> axum::response::Response {
    errors::service_error_to_response(ServiceError::from(err))
}

impl ProductRequest {
    pub fn into_draft(self) -> Result<ProductDraft, axum::response::Response> {
        let metadata = ProductMetadata {
            brand: self.brand.parse().map_err(domain)?,
            style: self.style.parse().map_err(domain)?,
            category: self.category.parse().map_err(domain)?,
            photo: self.photo,
        };
        Ok(ProductDraft {
            name: self.name,
            unit_price: self.unit_price,
            batches: self
                .batches
                .into_iter()
                .map(|b| Batch::new(b.expiry, b.quantity))
                .collect(),
            metadata,
        })
    }
}

impl SellRequest {
    pub fn selector(&self) -> Result<Option<BatchSelector>, axum::response::Response> {
        self.batch.as_deref().map(parse_selector).transpose()
    }
}

pub fn parse_selector(raw: &str) -> Result<BatchSelector, axum::response::Response> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("no-expiry") {
        return Ok(BatchSelector::no_expiry());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(BatchSelector::expiring)
        .map_err(|_| {
            errors::json_error(
                axum::http::StatusCode::BAD_REQUEST,
                "invalid_batch_selector",
                "batch must be YYYY-MM-DD or no-expiry",
            )
        })
}

impl ListQuery {
    pub fn filter(&self) -> Result<ProductFilter, axum::response::Response> {
        Ok(ProductFilter {
            brand: self.brand.as_deref().map(str::parse).transpose().map_err(domain)?,
            style: self.style.as_deref().map(str::parse).transpose().map_err(domain)?,
            category: self
                .category
                .as_deref()
                .map(str::parse)
                .transpose()
                .map_err(domain)?,
            name_contains: self.q.clone(),
            in_stock_only: self.in_stock.unwrap_or(false),
        })
    }

    pub fn page(&self) -> Pagination {
        Pagination::new(self.limit, self.offset)
    }
}

impl PageQuery {
    pub fn page(&self) -> Pagination {
        Pagination::new(self.limit, self.offset)
    }
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn product_to_json(p: &Product) -> serde_json::Value {
    let metadata = p.metadata();
    serde_json::json!({
        "id": p.id_typed().to_string(),
        "name": p.name(),
        "unit_price": p.unit_price().to_string(),
        "brand": metadata.brand.label(),
        "style": metadata.style.label(),
        "category": metadata.category.label(),
        "photo": metadata.photo,
        "batches": p.batches().iter().map(|b| serde_json::json!({
            "expiry": b.expiry.map(|d| d.to_string()),
            "quantity": b.quantity,
        })).collect::<Vec<_>>(),
        "total_quantity": p.total_quantity(),
        "created_at": p.created_at().map(|t| t.to_rfc3339()),
        "ever_sold": p.ever_sold(),
        "last_sold_at": p.last_sold_at().map(|t| t.to_rfc3339()),
        "version": p.version(),
    })
}

pub fn transaction_to_json(t: &Transaction) -> serde_json::Value {
    serde_json::json!({
        "id": t.id,
        "product_id": t.product_id.to_string(),
        "occurred_at": t.occurred_at.to_rfc3339(),
        "quantity": t.quantity,
        "kind": t.kind.as_str(),
    })
}

pub fn receipt_to_json(r: &SaleReceipt) -> serde_json::Value {
    serde_json::json!({
        "product": product_to_json(&r.product),
        "allocations": r.sold.allocations.iter().map(|a| serde_json::json!({
            "expiry": a.expiry.map(|d| d.to_string()),
            "quantity": a.quantity,
        })).collect::<Vec<_>>(),
        "transaction": transaction_to_json(&r.transaction),
    })
}
