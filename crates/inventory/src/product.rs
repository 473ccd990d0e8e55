//! Product aggregate: owns its batches, decides sales and edits, emits events.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use lotstock_core::{
    Aggregate, AggregateRoot, DomainError, DomainResult, ExpectedVersion, ProductId, execute,
};
use lotstock_events::Event;

use crate::allocation::{self, BatchAllocation};
use crate::batch::{self, Batch, BatchSelector};
use crate::catalog::{Brand, Category, Style};
use crate::ledger::{NewTransaction, TransactionKind};

/// Classification and presentation data that carries no stock semantics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductMetadata {
    pub brand: Brand,
    pub style: Style,
    pub category: Category,
    /// Opaque reference owned by the photo/asset collaborator.
    pub photo: Option<String>,
}

/// The full editable state of a product, submitted wholesale on create and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub name: String,
    pub unit_price: Decimal,
    pub batches: Vec<Batch>,
    pub metadata: ProductMetadata,
}

impl ProductDraft {
    /// Validate and canonicalize: trimmed name, merged/pruned batches, blank photo dropped.
    fn validated(&self) -> DomainResult<ProductDraft> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if self.unit_price <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "unit price must be positive (got {})",
                self.unit_price
            )));
        }
        let batches = batch::normalize(&self.batches)?;
        let photo = self
            .metadata
            .photo
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        Ok(ProductDraft {
            name: name.to_string(),
            unit_price: self.unit_price,
            batches,
            metadata: ProductMetadata {
                photo,
                ..self.metadata.clone()
            },
        })
    }
}

/// Aggregate root: Product (owns its batches).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    name: String,
    unit_price: Decimal,
    metadata: ProductMetadata,
    batches: Vec<Batch>,
    total_quantity: i64,
    created_at: Option<DateTime<Utc>>,
    ever_sold: bool,
    last_sold_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Product {
    /// Create an empty, not-yet-created aggregate instance.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            name: String::new(),
            unit_price: Decimal::ZERO,
            metadata: ProductMetadata {
                brand: Brand::Other,
                style: Style::Other,
                category: Category::Other,
                photo: None,
            },
            batches: Vec::new(),
            total_quantity: 0,
            created_at: None,
            ever_sold: false,
            last_sold_at: None,
            version: 0,
            created: false,
        }
    }

    /// Create a product from a draft in one step.
    pub fn create(id: ProductId, draft: ProductDraft, at: DateTime<Utc>) -> DomainResult<Self> {
        let mut product = Self::empty(id);
        execute(
            &mut product,
            &ProductCommand::Create(CreateProduct {
                product_id: id,
                draft,
                occurred_at: at,
            }),
        )?;
        Ok(product)
    }

    /// Sell against this product, returning the allocation that was applied.
    pub fn sell(
        &mut self,
        quantity: i64,
        selector: Option<BatchSelector>,
        at: DateTime<Utc>,
    ) -> DomainResult<StockSold> {
        let command = ProductCommand::Sell(SellStock {
            product_id: self.id,
            quantity,
            selector,
            occurred_at: at,
        });
        execute(self, &command)?
            .into_iter()
            .find_map(|e| match e {
                ProductEvent::StockSold(sold) => Some(sold),
                _ => None,
            })
            .ok_or_else(|| DomainError::validation("sale produced no allocation"))
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit_price(&self) -> Decimal {
        self.unit_price
    }

    pub fn metadata(&self) -> &ProductMetadata {
        &self.metadata
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn total_quantity(&self) -> i64 {
        self.total_quantity
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn ever_sold(&self) -> bool {
        self.ever_sold
    }

    pub fn last_sold_at(&self) -> Option<DateTime<Utc>> {
        self.last_sold_at
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    /// Sold at least once and nothing left.
    pub fn is_sold_out(&self) -> bool {
        self.ever_sold && self.total_quantity == 0
    }

    pub fn snapshot(&self) -> ProductSnapshot {
        ProductSnapshot {
            id: self.id,
            name: self.name.clone(),
            unit_price: self.unit_price,
            metadata: self.metadata.clone(),
            batches: self.batches.clone(),
            total_quantity: self.total_quantity,
            created_at: self.created_at,
            ever_sold: self.ever_sold,
            last_sold_at: self.last_sold_at,
            version: self.version,
        }
    }

    /// Rehydrate from persisted state.
    ///
    /// The batch list is authoritative: the cached total is recomputed, never trusted.
    pub fn from_snapshot(snapshot: ProductSnapshot) -> Self {
        let batches: Vec<Batch> = snapshot
            .batches
            .into_iter()
            .filter(|b| !b.is_exhausted())
            .collect();
        Self {
            id: snapshot.id,
            name: snapshot.name,
            unit_price: snapshot.unit_price,
            metadata: snapshot.metadata,
            total_quantity: batch::total_quantity(&batches),
            batches,
            created_at: snapshot.created_at,
            ever_sold: snapshot.ever_sold,
            last_sold_at: snapshot.last_sold_at,
            version: snapshot.version,
            created: true,
        }
    }
}

/// Persisted form of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub name: String,
    pub unit_price: Decimal,
    pub metadata: ProductMetadata,
    pub batches: Vec<Batch>,
    pub total_quantity: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub ever_sold: bool,
    pub last_sold_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub product_id: ProductId,
    pub draft: ProductDraft,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateProduct (full replace of the editable state).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProduct {
    pub product_id: ProductId,
    /// The version the caller read the product at.
    pub expected_version: ExpectedVersion,
    pub draft: ProductDraft,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SellStock.
///
/// `selector == None` sells in FEFO order; `Some` sells from that batch only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellStock {
    pub product_id: ProductId,
    pub quantity: i64,
    pub selector: Option<BatchSelector>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteProduct {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    Create(CreateProduct),
    Update(UpdateProduct),
    Sell(SellStock),
    Delete(DeleteProduct),
}

/// Event: ProductCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Decimal,
    pub batches: Vec<Batch>,
    pub metadata: ProductMetadata,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdated {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Decimal,
    pub batches: Vec<Batch>,
    pub metadata: ProductMetadata,
    /// Photo reference that is no longer used after this update.
    pub replaced_photo: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockSold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSold {
    pub product_id: ProductId,
    pub quantity: i64,
    pub allocations: Vec<BatchAllocation>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDeleted {
    pub product_id: ProductId,
    pub photo: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductCreated(ProductCreated),
    ProductUpdated(ProductUpdated),
    StockSold(StockSold),
    ProductDeleted(ProductDeleted),
}

impl ProductEvent {
    /// Ledger entry implied by this event, if any.
    ///
    /// A create with stock restocks the total; a sale records the units sold.
    /// Updates are corrections and never touch the ledger.
    pub fn ledger_entry(&self) -> Option<NewTransaction> {
        match self {
            ProductEvent::ProductCreated(e) => NewTransaction::new(
                e.product_id,
                batch::total_quantity(&e.batches),
                TransactionKind::Restock,
                e.occurred_at,
            )
            .ok(),
            ProductEvent::StockSold(e) => NewTransaction::new(
                e.product_id,
                e.quantity,
                TransactionKind::Sale,
                e.occurred_at,
            )
            .ok(),
            ProductEvent::ProductUpdated(_) | ProductEvent::ProductDeleted(_) => None,
        }
    }

    /// Photo reference the asset collaborator may now release.
    pub fn released_photo(&self) -> Option<&str> {
        match self {
            ProductEvent::ProductUpdated(e) => e.replaced_photo.as_deref(),
            ProductEvent::ProductDeleted(e) => e.photo.as_deref(),
            _ => None,
        }
    }
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "inventory.product.created",
            ProductEvent::ProductUpdated(_) => "inventory.product.updated",
            ProductEvent::StockSold(_) => "inventory.product.stock_sold",
            ProductEvent::ProductDeleted(_) => "inventory.product.deleted",
        }
    }

    fn product_id(&self) -> ProductId {
        match self {
            ProductEvent::ProductCreated(e) => e.product_id,
            ProductEvent::ProductUpdated(e) => e.product_id,
            ProductEvent::StockSold(e) => e.product_id,
            ProductEvent::ProductDeleted(e) => e.product_id,
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductCreated(e) => e.occurred_at,
            ProductEvent::ProductUpdated(e) => e.occurred_at,
            ProductEvent::StockSold(e) => e.occurred_at,
            ProductEvent::ProductDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductCreated(e) => {
                self.id = e.product_id;
                self.name = e.name.clone();
                self.unit_price = e.unit_price;
                self.metadata = e.metadata.clone();
                self.set_batches(e.batches.clone());
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            ProductEvent::ProductUpdated(e) => {
                self.name = e.name.clone();
                self.unit_price = e.unit_price;
                self.metadata = e.metadata.clone();
                self.set_batches(e.batches.clone());
            }
            ProductEvent::StockSold(e) => {
                let remaining = allocation::apply_allocations(&self.batches, &e.allocations);
                self.set_batches(remaining);
                self.ever_sold = true;
                self.last_sold_at = Some(e.occurred_at);
            }
            ProductEvent::ProductDeleted(_) => {
                self.created = false;
            }
        }

        // +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::Create(cmd) => self.handle_create(cmd),
            ProductCommand::Update(cmd) => self.handle_update(cmd),
            ProductCommand::Sell(cmd) => self.handle_sell(cmd),
            ProductCommand::Delete(cmd) => self.handle_delete(cmd),
        }
    }
}

impl Product {
    fn set_batches(&mut self, mut batches: Vec<Batch>) {
        batch::prune_exhausted(&mut batches);
        self.total_quantity = batch::total_quantity(&batches);
        self.batches = batches;
    }

    fn ensure_created(&self) -> DomainResult<()> {
        if !self.created {
            return Err(DomainError::not_found(format!("product {}", self.id)));
        }
        Ok(())
    }

    fn ensure_product_id(&self, product_id: ProductId) -> DomainResult<()> {
        if self.id != product_id {
            return Err(DomainError::validation("product_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateProduct) -> DomainResult<Vec<ProductEvent>> {
        if self.created {
            return Err(DomainError::conflict("product already exists"));
        }
        self.ensure_product_id(cmd.product_id)?;

        let draft = cmd.draft.validated()?;
        if batch::total_quantity(&draft.batches) <= 0 {
            return Err(DomainError::validation(
                "a new product needs a positive total quantity",
            ));
        }

        Ok(vec![ProductEvent::ProductCreated(ProductCreated {
            product_id: cmd.product_id,
            name: draft.name,
            unit_price: draft.unit_price,
            batches: draft.batches,
            metadata: draft.metadata,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateProduct) -> DomainResult<Vec<ProductEvent>> {
        self.ensure_created()?;
        self.ensure_product_id(cmd.product_id)?;
        cmd.expected_version.check(self.version)?;

        let draft = cmd.draft.validated()?;
        let replaced_photo = match (&self.metadata.photo, &draft.metadata.photo) {
            (Some(old), new) if new.as_ref() != Some(old) => Some(old.clone()),
            _ => None,
        };

        Ok(vec![ProductEvent::ProductUpdated(ProductUpdated {
            product_id: cmd.product_id,
            name: draft.name,
            unit_price: draft.unit_price,
            batches: draft.batches,
            metadata: draft.metadata,
            replaced_photo,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_sell(&self, cmd: &SellStock) -> DomainResult<Vec<ProductEvent>> {
        self.ensure_created()?;
        self.ensure_product_id(cmd.product_id)?;

        let allocations = allocation::allocate(&self.batches, cmd.quantity, cmd.selector)?;

        Ok(vec![ProductEvent::StockSold(StockSold {
            product_id: cmd.product_id,
            quantity: cmd.quantity,
            allocations,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteProduct) -> DomainResult<Vec<ProductEvent>> {
        self.ensure_created()?;
        self.ensure_product_id(cmd.product_id)?;

        Ok(vec![ProductEvent::ProductDeleted(ProductDeleted {
            product_id: cmd.product_id,
            photo: self.metadata.photo.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn metadata() -> ProductMetadata {
        ProductMetadata {
            brand: Brand::Natura,
            style: Style::Perfumery,
            category: Category::BodyOil,
            photo: Some("photos/rose.jpg".to_string()),
        }
    }

    fn draft(name: &str, price: Decimal, batches: Vec<Batch>) -> ProductDraft {
        ProductDraft {
            name: name.to_string(),
            unit_price: price,
            batches,
            metadata: metadata(),
        }
    }

    fn rose_oil() -> Product {
        Product::create(
            ProductId::new(),
            draft("Rose Oil", dec!(49.90), vec![Batch::dated(d(2025, 3, 1), 4)]),
            at(0),
        )
        .unwrap()
    }

    fn update_cmd(product: &Product, draft: ProductDraft) -> ProductCommand {
        ProductCommand::Update(UpdateProduct {
            product_id: product.id_typed(),
            expected_version: ExpectedVersion::Exact(product.version()),
            draft,
            occurred_at: at(100),
        })
    }

    #[test]
    fn create_computes_total_and_emits_restock() {
        let id = ProductId::new();
        let mut product = Product::empty(id);
        let events = execute(
            &mut product,
            &ProductCommand::Create(CreateProduct {
                product_id: id,
                draft: draft(
                    "  Kaiak  ",
                    dec!(89.90),
                    vec![
                        Batch::dated(d(2025, 1, 1), 5),
                        Batch::without_expiry(0),
                        Batch::without_expiry(10),
                    ],
                ),
                occurred_at: at(0),
            }),
        )
        .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(product.name(), "Kaiak");
        assert_eq!(product.total_quantity(), 15);
        assert_eq!(
            product.batches(),
            &[Batch::dated(d(2025, 1, 1), 5), Batch::without_expiry(10)]
        );
        assert_eq!(product.version(), 1);
        assert_eq!(product.created_at(), Some(at(0)));

        let entry = events[0].ledger_entry().unwrap();
        assert_eq!(entry.kind, TransactionKind::Restock);
        assert_eq!(entry.quantity, 15);
    }

    #[test]
    fn create_rejects_bad_input() {
        let cases = vec![
            draft("   ", dec!(1), vec![Batch::without_expiry(1)]),
            draft("Soap", dec!(0), vec![Batch::without_expiry(1)]),
            draft("Soap", dec!(-3.50), vec![Batch::without_expiry(1)]),
            draft("Soap", dec!(1), vec![]),
            draft("Soap", dec!(1), vec![Batch::without_expiry(0)]),
        ];
        for bad in cases {
            let err = Product::create(ProductId::new(), bad, at(0)).unwrap_err();
            assert!(err.is_validation(), "unexpected error {err:?}");
        }

        let err = Product::create(
            ProductId::new(),
            draft("Soap", dec!(1), vec![Batch::dated(d(2025, 1, 1), -1)]),
            at(0),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvalidBatch(_)));
    }

    #[test]
    fn creating_twice_is_a_conflict() {
        let product = rose_oil();
        let err = product
            .handle(&ProductCommand::Create(CreateProduct {
                product_id: product.id_typed(),
                draft: draft("Rose Oil", dec!(49.90), vec![Batch::without_expiry(1)]),
                occurred_at: at(1),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn rose_oil_sells_out_then_refuses() {
        let mut product = rose_oil();

        let sold = product.sell(4, None, at(10)).unwrap();
        assert_eq!(
            sold.allocations,
            vec![BatchAllocation { expiry: Some(d(2025, 3, 1)), quantity: 4 }]
        );
        assert_eq!(product.total_quantity(), 0);
        assert!(product.batches().is_empty());
        assert!(product.ever_sold());
        assert!(product.is_sold_out());
        assert_eq!(product.last_sold_at(), Some(at(10)));

        let before = product.clone();
        let err = product.sell(1, None, at(20)).unwrap_err();
        assert_eq!(err, DomainError::InsufficientStock { requested: 1, available: 0 });
        assert_eq!(product, before);
    }

    #[test]
    fn over_sell_leaves_state_unchanged() {
        let mut product = Product::create(
            ProductId::new(),
            draft(
                "Lily",
                dec!(12),
                vec![
                    Batch::dated(d(2025, 1, 1), 5),
                    Batch::dated(d(2024, 6, 1), 3),
                    Batch::without_expiry(10),
                ],
            ),
            at(0),
        )
        .unwrap();
        let before = product.clone();

        assert!(matches!(
            product.sell(19, None, at(1)),
            Err(DomainError::InsufficientStock { requested: 19, available: 18 })
        ));
        assert_eq!(product, before);

        product.sell(6, None, at(2)).unwrap();
        assert_eq!(
            product.batches(),
            &[Batch::dated(d(2025, 1, 1), 2), Batch::without_expiry(10)]
        );
        assert_eq!(product.total_quantity(), 12);
    }

    #[test]
    fn sell_emits_one_sale_entry() {
        let product = rose_oil();
        let events = product
            .handle(&ProductCommand::Sell(SellStock {
                product_id: product.id_typed(),
                quantity: 3,
                selector: Some(BatchSelector::expiring(d(2025, 3, 1))),
                occurred_at: at(5),
            }))
            .unwrap();
        let entries: Vec<NewTransaction> =
            events.iter().filter_map(ProductEvent::ledger_entry).collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, TransactionKind::Sale);
        assert_eq!(entries[0].quantity, 3);
        assert_eq!(entries[0].occurred_at, at(5));
    }

    #[test]
    fn update_replaces_batches_without_ledger_entry() {
        let mut product = rose_oil();
        let mut replacement = draft(
            "Rose Oil Deluxe",
            dec!(59.90),
            vec![Batch::dated(d(2026, 1, 1), 2), Batch::dated(d(2026, 1, 1), 1)],
        );
        replacement.metadata.photo = Some("photos/rose-v2.jpg".to_string());

        let cmd = update_cmd(&product, replacement);
        let events = execute(&mut product, &cmd).unwrap();

        assert!(events[0].ledger_entry().is_none());
        assert_eq!(events[0].released_photo(), Some("photos/rose.jpg"));
        assert_eq!(product.batches(), &[Batch::dated(d(2026, 1, 1), 3)]);
        assert_eq!(product.total_quantity(), 3);
        assert_eq!(product.unit_price(), dec!(59.90));
        assert_eq!(product.version(), 2);
    }

    #[test]
    fn update_may_empty_the_batch_list() {
        let mut product = rose_oil();
        let cmd = update_cmd(&product, draft("Rose Oil", dec!(49.90), vec![]));
        execute(&mut product, &cmd).unwrap();
        assert_eq!(product.total_quantity(), 0);
        assert!(!product.is_sold_out());
    }

    #[test]
    fn update_keeping_the_photo_releases_nothing() {
        let mut product = rose_oil();
        let cmd = update_cmd(&product, draft("Rose Oil", dec!(45), vec![]));
        let events = execute(&mut product, &cmd).unwrap();
        assert_eq!(events[0].released_photo(), None);
    }

    #[test]
    fn stale_update_is_a_conflict() {
        let mut product = rose_oil();
        let stale = update_cmd(&product, draft("Rose Oil", dec!(49.90), vec![]));
        product.sell(1, None, at(3)).unwrap();

        let before = product.clone();
        assert!(matches!(
            execute(&mut product, &stale),
            Err(DomainError::Conflict(_))
        ));
        assert_eq!(product, before);
    }

    #[test]
    fn operations_on_missing_product_are_not_found() {
        let id = ProductId::new();
        let product = Product::empty(id);
        let sell = ProductCommand::Sell(SellStock {
            product_id: id,
            quantity: 1,
            selector: None,
            occurred_at: at(0),
        });
        let delete = ProductCommand::Delete(DeleteProduct {
            product_id: id,
            occurred_at: at(0),
        });
        assert!(matches!(product.handle(&sell), Err(DomainError::NotFound(_))));
        assert!(matches!(product.handle(&delete), Err(DomainError::NotFound(_))));
    }

    #[test]
    fn delete_releases_the_photo() {
        let mut product = rose_oil();
        let product_id = product.id_typed();
        let events = execute(
            &mut product,
            &ProductCommand::Delete(DeleteProduct {
                product_id,
                occurred_at: at(9),
            }),
        )
        .unwrap();
        assert_eq!(events[0].released_photo(), Some("photos/rose.jpg"));
        assert!(!product.is_created());
    }

    #[test]
    fn snapshot_restores_and_recomputes_total() {
        let mut product = rose_oil();
        product.sell(1, None, at(1)).unwrap();

        let mut snapshot = product.snapshot();
        assert_eq!(Product::from_snapshot(snapshot.clone()), product);

        snapshot.total_quantity = 999;
        snapshot.batches.push(Batch::without_expiry(0));
        let restored = Product::from_snapshot(snapshot);
        assert_eq!(restored.total_quantity(), 3);
        assert_eq!(restored.batches(), product.batches());
    }

    #[test]
    fn event_type_names() {
        let product = rose_oil();
        let events = product
            .handle(&ProductCommand::Sell(SellStock {
                product_id: product.id_typed(),
                quantity: 1,
                selector: None,
                occurred_at: at(7),
            }))
            .unwrap();
        assert_eq!(events[0].event_type(), "inventory.product.stock_sold");
        assert_eq!(events[0].occurred_at(), at(7));
        assert_eq!(events[0].product_id(), product.id_typed());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Sell { quantity: i64, guided: Option<usize> },
            Update(Vec<Batch>),
        }

        fn arb_batch() -> impl Strategy<Value = Batch> {
            (prop::option::of(0u64..400), 0i64..30).prop_map(|(days, qty)| {
                Batch::new(days.map(|n| d(2024, 1, 1) + chrono::Days::new(n)), qty)
            })
        }

        fn arb_op() -> impl Strategy<Value = Op> {
            prop_oneof![
                3 => (1i64..40, prop::option::of(0usize..4))
                    .prop_map(|(quantity, guided)| Op::Sell { quantity, guided }),
                1 => prop::collection::vec(arb_batch(), 0..5).prop_map(Op::Update),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 300,
                ..ProptestConfig::default()
            })]

            /// Property: the cached total always equals the sum of the batches,
            /// and a rejected command leaves the product untouched.
            #[test]
            fn total_matches_batches(
                initial in prop::collection::vec(arb_batch(), 1..5),
                ops in prop::collection::vec(arb_op(), 0..25),
            ) {
                let created = Product::create(
                    ProductId::new(),
                    draft("Prop", dec!(3.25), initial),
                    at(0),
                );
                let Ok(mut product) = created else {
                    return Ok(());
                };

                for (step, op) in ops.into_iter().enumerate() {
                    let when = at(step as i64 + 1);
                    let command = match op {
                        Op::Sell { quantity, guided } => ProductCommand::Sell(SellStock {
                            product_id: product.id_typed(),
                            quantity,
                            selector: guided
                                .and_then(|i| product.batches().get(i))
                                .map(Batch::selector),
                            occurred_at: when,
                        }),
                        Op::Update(batches) => ProductCommand::Update(UpdateProduct {
                            product_id: product.id_typed(),
                            expected_version: ExpectedVersion::Exact(product.version()),
                            draft: draft("Prop", dec!(3.25), batches),
                            occurred_at: when,
                        }),
                    };

                    let before = product.clone();
                    if execute(&mut product, &command).is_err() {
                        prop_assert_eq!(&product, &before);
                    }
                    prop_assert_eq!(
                        product.total_quantity(),
                        batch::total_quantity(product.batches())
                    );
                    prop_assert!(product.batches().iter().all(|b| b.quantity > 0));
                }
            }
        }
    }
}
