//! Batch (lot) value object and FEFO ordering.

use core::cmp::Ordering;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use lotstock_core::{DomainError, DomainResult, ValueObject};

/// A quantity of one product tied to an expiry date.
///
/// `expiry == None` means the lot has no tracked expiry; such lots are treated as
/// never expiring and are consumed last.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Batch {
    pub expiry: Option<NaiveDate>,
    pub quantity: i64,
}

impl ValueObject for Batch {}

impl Batch {
    pub fn new(expiry: Option<NaiveDate>, quantity: i64) -> Self {
        Self { expiry, quantity }
    }

    pub fn dated(expiry: NaiveDate, quantity: i64) -> Self {
        Self::new(Some(expiry), quantity)
    }

    pub fn without_expiry(quantity: i64) -> Self {
        Self::new(None, quantity)
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.quantity < 0 {
            return Err(DomainError::invalid_batch(format!(
                "quantity cannot be negative (batch {}, quantity {})",
                self.selector(),
                self.quantity
            )));
        }
        Ok(())
    }

    /// Exhausted batches are pruned on every write.
    pub fn is_exhausted(&self) -> bool {
        self.quantity == 0
    }

    pub fn selector(&self) -> BatchSelector {
        BatchSelector(self.expiry)
    }

    /// True when the batch expires on or before `date`.
    pub fn expires_by(&self, date: NaiveDate) -> bool {
        self.expiry.is_some_and(|expiry| expiry <= date)
    }
}

/// Identifies one batch of a product by its expiry key.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchSelector(pub Option<NaiveDate>);

impl BatchSelector {
    pub fn expiring(date: NaiveDate) -> Self {
        Self(Some(date))
    }

    pub fn no_expiry() -> Self {
        Self(None)
    }

    pub fn expiry(&self) -> Option<NaiveDate> {
        self.0
    }

    pub fn matches(&self, batch: &Batch) -> bool {
        batch.expiry == self.0
    }
}

impl core::fmt::Display for BatchSelector {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.0 {
            Some(date) => write!(f, "{date}"),
            None => f.write_str("no-expiry"),
        }
    }
}

/// Allocation ordering: earliest expiry first, batches without expiry last.
pub fn fefo_cmp(a: &Batch, b: &Batch) -> Ordering {
    match (a.expiry, b.expiry) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Indices of `batches` in consumption order.
///
/// The sort is stable, so equal keys keep their insertion order and allocation is
/// reproducible.
pub fn fefo_order(batches: &[Batch]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..batches.len()).collect();
    order.sort_by(|&a, &b| fefo_cmp(&batches[a], &batches[b]));
    order
}

pub fn total_quantity(batches: &[Batch]) -> i64 {
    batches.iter().map(|b| b.quantity).sum()
}

/// Validate a submitted batch list and bring it into canonical form.
///
/// - every batch must validate
/// - batches sharing an expiry key are merged (first occurrence keeps its position)
/// - exhausted batches are dropped
pub fn normalize(batches: &[Batch]) -> DomainResult<Vec<Batch>> {
    let mut merged: Vec<Batch> = Vec::with_capacity(batches.len());
    let mut total: i64 = 0;

    for batch in batches {
        batch.validate()?;
        total = total
            .checked_add(batch.quantity)
            .ok_or_else(|| DomainError::validation("total quantity is too large"))?;

        match merged.iter_mut().find(|m| m.expiry == batch.expiry) {
            Some(existing) => existing.quantity += batch.quantity,
            None => merged.push(*batch),
        }
    }

    merged.retain(|b| !b.is_exhausted());
    Ok(merged)
}

pub fn prune_exhausted(batches: &mut Vec<Batch>) {
    batches.retain(|b| !b.is_exhausted());
}

/// Resolve the batch list of a stored row.
///
/// Rows written before lot tracking only carry a scalar quantity. When no batch
/// list was stored at all, that quantity becomes one batch without expiry. A stored
/// list (even an empty one) is authoritative and the scalar is ignored. A negative
/// legacy quantity is rejected rather than read as empty stock.
pub fn from_storage(
    batches: Option<Vec<Batch>>,
    legacy_quantity: Option<i64>,
) -> DomainResult<Vec<Batch>> {
    match batches {
        Some(list) => Ok(list),
        None => match legacy_quantity {
            Some(quantity) if quantity < 0 => Err(DomainError::invalid_batch(format!(
                "legacy quantity {quantity} is negative"
            ))),
            Some(quantity) if quantity > 0 => Ok(vec![Batch::without_expiry(quantity)]),
            _ => Ok(Vec::new()),
        },
    }
}
