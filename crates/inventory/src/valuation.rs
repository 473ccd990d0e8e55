//! Read-side reports: stock valuation, expiry horizon, sold-out and sales history.
//!
//! Everything here is a pure function over loaded products and ledger entries.
//! Valuation never fails: rows that cannot be valued are flagged and count as zero.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use lotstock_core::ProductId;

use crate::ledger::{self, Transaction, TransactionKind};
use crate::product::Product;

/// Why a row contributed zero to a total.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuationFlag {
    MissingPrice,
    NegativeQuantity,
    Overflow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuationRow {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i64,
    pub value: Decimal,
    pub flag: Option<ValuationFlag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuationSummary {
    pub rows: Vec<ValuationRow>,
    pub total: Decimal,
    pub flagged: usize,
}

fn line_value(unit_price: Decimal, quantity: i64) -> Result<Decimal, ValuationFlag> {
    if unit_price <= Decimal::ZERO {
        return Err(ValuationFlag::MissingPrice);
    }
    if quantity < 0 {
        return Err(ValuationFlag::NegativeQuantity);
    }
    unit_price
        .checked_mul(Decimal::from(quantity))
        .ok_or(ValuationFlag::Overflow)
}

/// `sum(unit_price * total_quantity)` with per-row detail.
pub fn total_value(products: &[Product]) -> ValuationSummary {
    let mut rows = Vec::with_capacity(products.len());
    let mut total = Decimal::ZERO;
    let mut flagged = 0;

    for product in products {
        let quantity = product.total_quantity();
        let valued = line_value(product.unit_price(), quantity).and_then(|value| {
            total
                .checked_add(value)
                .map(|next| (value, next))
                .ok_or(ValuationFlag::Overflow)
        });

        let (value, flag) = match valued {
            Ok((value, next)) => {
                total = next;
                (value, None)
            }
            Err(flag) => {
                flagged += 1;
                (Decimal::ZERO, Some(flag))
            }
        };

        rows.push(ValuationRow {
            product_id: product.id_typed(),
            name: product.name().to_string(),
            unit_price: product.unit_price(),
            quantity,
            value,
            flag,
        });
    }

    ValuationSummary {
        rows,
        total,
        flagged,
    }
}

/// One dated batch inside the reporting horizon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiringBatch {
    pub product_id: ProductId,
    pub name: String,
    pub expiry: NaiveDate,
    pub quantity: i64,
    /// Negative once the batch is past its expiry.
    pub days_left: i64,
    pub expired: bool,
}

/// Batches expiring on or before `today + window`, earliest first.
///
/// Already-expired batches are included and marked. Batches without expiry never
/// appear.
pub fn expiring_within(products: &[Product], window: Duration, today: NaiveDate) -> Vec<ExpiringBatch> {
    let horizon = today.checked_add_signed(window).unwrap_or(NaiveDate::MAX);

    let mut found: Vec<ExpiringBatch> = products
        .iter()
        .flat_map(|product| {
            product.batches().iter().filter_map(move |batch| {
                let expiry = batch.expiry?;
                if batch.is_exhausted() || !batch.expires_by(horizon) {
                    return None;
                }
                Some(ExpiringBatch {
                    product_id: product.id_typed(),
                    name: product.name().to_string(),
                    expiry,
                    quantity: batch.quantity,
                    days_left: (expiry - today).num_days(),
                    expired: expiry < today,
                })
            })
        })
        .collect();

    found.sort_by(|a, b| {
        a.expiry
            .cmp(&b.expiry)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.product_id.cmp(&b.product_id))
    });
    found
}

/// Products that sold at least once and have nothing left, most recent sale first.
pub fn sold_out(products: &[Product]) -> Vec<Product> {
    let mut rows: Vec<Product> = products
        .iter()
        .filter(|p| p.is_sold_out())
        .cloned()
        .collect();
    rows.sort_by(|a, b| {
        b.last_sold_at()
            .cmp(&a.last_sold_at())
            .then_with(|| a.name().cmp(b.name()))
    });
    rows
}

/// One sale joined with the product it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    pub transaction_id: u64,
    pub product_id: ProductId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
    pub quantity: i64,
    /// Current price of the product (the ledger does not record sale prices).
    pub unit_price: Decimal,
    pub amount: Decimal,
    pub flag: Option<ValuationFlag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesHistory {
    pub lines: Vec<SaleLine>,
    pub total_units: i64,
    pub total_amount: Decimal,
}

/// Sale lines (newest first) with grand totals.
///
/// Restocks are ignored, as are entries older than `since` and entries whose
/// product is not in `products`.
pub fn sales_history(
    products: &[Product],
    transactions: &[Transaction],
    since: Option<DateTime<Utc>>,
) -> SalesHistory {
    let by_id: HashMap<ProductId, &Product> =
        products.iter().map(|p| (p.id_typed(), p)).collect();

    let mut sales: Vec<Transaction> = transactions
        .iter()
        .filter(|t| t.kind == TransactionKind::Sale)
        .filter(|t| since.is_none_or(|since| t.occurred_at >= since))
        .cloned()
        .collect();
    ledger::sort_newest_first(&mut sales);

    let mut lines = Vec::with_capacity(sales.len());
    let mut total_units: i64 = 0;
    let mut total_amount = Decimal::ZERO;

    for sale in sales {
        let Some(product) = by_id.get(&sale.product_id) else {
            continue;
        };
        let priced = line_value(product.unit_price(), sale.quantity).and_then(|amount| {
            total_amount
                .checked_add(amount)
                .map(|next| (amount, next))
                .ok_or(ValuationFlag::Overflow)
        });
        let (amount, flag) = match priced {
            Ok((amount, next)) => {
                total_amount = next;
                (amount, None)
            }
            Err(flag) => (Decimal::ZERO, Some(flag)),
        };
        total_units = total_units.saturating_add(sale.quantity);

        lines.push(SaleLine {
            transaction_id: sale.id,
            product_id: sale.product_id,
            name: product.name().to_string(),
            occurred_at: sale.occurred_at,
            quantity: sale.quantity,
            unit_price: product.unit_price(),
            amount,
            flag,
        });
    }

    SalesHistory {
        lines,
        total_units,
        total_amount,
    }
}
