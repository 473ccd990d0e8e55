//! Transaction ledger entries (append-only audit of stock movements).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lotstock_core::{DomainError, DomainResult, Entity, ProductId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Restock,
    Sale,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionKind::Restock => "RESTOCK",
            TransactionKind::Sale => "SALE",
        }
    }

    /// Parse the stored representation; anything else is corrupt data.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "RESTOCK" => Some(TransactionKind::Restock),
            "SALE" => Some(TransactionKind::Sale),
            _ => None,
        }
    }
}

impl core::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ledger entry that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
    pub quantity: i64,
    pub kind: TransactionKind,
}

impl NewTransaction {
    pub fn new(
        product_id: ProductId,
        quantity: i64,
        kind: TransactionKind,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if quantity <= 0 {
            return Err(DomainError::validation(format!(
                "transaction quantity must be positive (got {quantity})"
            )));
        }
        Ok(Self {
            product_id,
            occurred_at,
            quantity,
            kind,
        })
    }

    pub fn with_id(self, id: u64) -> Transaction {
        Transaction {
            id,
            product_id: self.product_id,
            occurred_at: self.occurred_at,
            quantity: self.quantity,
            kind: self.kind,
        }
    }
}

/// A persisted ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: u64,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
    pub quantity: i64,
    pub kind: TransactionKind,
}

impl Entity for Transaction {
    type Id = u64;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// History order: newest first, ties broken by the larger (later) id.
pub fn sort_newest_first(entries: &mut [Transaction]) {
    entries.sort_by(|a, b| {
        b.occurred_at
            .cmp(&a.occurred_at)
            .then_with(|| b.id().cmp(&a.id()))
    });
}
