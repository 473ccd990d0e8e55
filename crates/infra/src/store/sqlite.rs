//! SQLite-backed inventory store.
//!
//! ## Layout
//!
//! - `products`: one row per product. Scalar fields, the batch list as JSON, the
//!   cached quantity and the optimistic-concurrency version.
//! - `transactions`: the ledger, integer auto-increment id, product id reference.
//!
//! Rows written before lot tracking have a NULL `batches` column; their scalar
//! `quantity` is loaded as a single batch without expiry. A batch column that
//! does not decode is reported as [`StoreError::Corrupt`], never as an empty list.
//!
//! ## Write transactions
//!
//! Every write runs inside `BEGIN IMMEDIATE`, so the database write lock is taken
//! before the version check and concurrent writers queue on the busy timeout
//! instead of failing on a read-to-write lock upgrade.
//!
//! ## Sync facade
//!
//! [`InventoryStore`] is synchronous. The runtime handle is captured in
//! [`SqliteInventoryStore::connect`] and every call blocks on it, so callers must
//! not be on an async worker thread (use `spawn_blocking` from async code).

use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Row, Sqlite};
use tokio::runtime::Handle;
use tracing::{instrument, warn};

use lotstock_core::{AggregateRoot, ExpectedVersion, ProductId};
use lotstock_inventory::batch::{self, Batch};
use lotstock_inventory::{
    Brand, Category, NewTransaction, Pagination, Product, ProductMetadata, ProductSnapshot, Style,
    Transaction, TransactionKind,
};

use super::{InventoryStore, StoreError, ensure_ledger_target, version_conflict};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS products (
        id           TEXT PRIMARY KEY,
        name         TEXT NOT NULL,
        unit_price   TEXT NOT NULL,
        brand        TEXT NOT NULL,
        style        TEXT NOT NULL,
        category     TEXT NOT NULL,
        photo        TEXT,
        batches      TEXT,
        quantity     INTEGER NOT NULL DEFAULT 0,
        created_at   TEXT,
        ever_sold    INTEGER NOT NULL DEFAULT 0,
        last_sold_at TEXT,
        version      INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS transactions (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        product_id  TEXT NOT NULL REFERENCES products(id) ON DELETE CASCADE,
        occurred_at TEXT NOT NULL,
        quantity    INTEGER NOT NULL CHECK (quantity > 0),
        kind        TEXT NOT NULL CHECK (kind IN ('RESTOCK', 'SALE'))
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_transactions_product
        ON transactions (product_id, occurred_at)
    "#,
];

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const PRODUCT_COLUMNS: &str = "id, name, unit_price, brand, style, category, photo, batches, \
     quantity, created_at, ever_sold, last_sold_at, version";

#[derive(Debug, Clone)]
pub struct SqliteInventoryStore {
    pool: SqlitePool,
    handle: Handle,
}

impl SqliteInventoryStore {
    /// Open (creating if needed) the database at `url` and ensure the schema.
    ///
    /// `sqlite::memory:` databases live as long as their connection, so they are
    /// kept open for the lifetime of the pool.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| map_sqlx_error("parse_url", e))?
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT);

        let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections.max(1));
        if url.contains(":memory:") {
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(|e| map_sqlx_error("migrate", e))?;
        }

        Ok(Self {
            pool,
            handle: Handle::current(),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn block_on<F: Future>(&self, fut: F) -> F::Output {
        self.handle.block_on(fut)
    }

    /// Acquire a connection and open a write transaction on it.
    async fn begin_immediate(&self) -> Result<PoolConnection<Sqlite>, StoreError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))?;
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(conn)
    }

    async fn load_async(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("load", e))?;
        row.as_ref().map(decode_product).transpose()
    }

    async fn list_async(&self) -> Result<Vec<Product>, StoreError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products");
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list", e))?;
        rows.iter().map(decode_product).collect()
    }

    #[instrument(
        skip(self, product, entries),
        fields(product_id = %product.id_typed(), version = product.version(), entries = entries.len()),
        err
    )]
    async fn commit_async(
        &self,
        product: &Product,
        expected: ExpectedVersion,
        entries: Vec<NewTransaction>,
    ) -> Result<Vec<Transaction>, StoreError> {
        let snapshot = product.snapshot();
        let batches_json = serde_json::to_string(&snapshot.batches)
            .map_err(|e| StoreError::Backend(format!("batch serialization failed: {e}")))?;

        let mut conn = self.begin_immediate().await?;
        let result = upsert(&mut conn, &snapshot, batches_json, expected, entries).await;
        finish(&mut conn, result).await
    }

    async fn remove_async(&self, id: ProductId, expected: ExpectedVersion) -> Result<(), StoreError> {
        let mut conn = self.begin_immediate().await?;
        let result = delete(&mut conn, id, expected).await;
        finish(&mut conn, result).await
    }

    async fn append_async(&self, entry: NewTransaction) -> Result<Transaction, StoreError> {
        let mut conn = self.begin_immediate().await?;
        let result = append(&mut conn, entry).await;
        finish(&mut conn, result).await
    }

    async fn history_async(
        &self,
        id: ProductId,
        page: Option<Pagination>,
    ) -> Result<Vec<Transaction>, StoreError> {
        // LIMIT -1 means "no limit" in SQLite.
        let (limit, offset) = match page {
            Some(p) => (i64::from(p.limit), i64::from(p.offset)),
            None => (-1, 0),
        };
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, occurred_at, quantity, kind
            FROM transactions
            WHERE product_id = ?
            ORDER BY occurred_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(id.to_string())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("history", e))?;
        rows.iter().map(decode_transaction).collect()
    }

    async fn transactions_async(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Transaction>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, occurred_at, quantity, kind
            FROM transactions
            WHERE ? IS NULL OR occurred_at >= ?
            ORDER BY occurred_at DESC, id DESC
            "#,
        )
        .bind(since.map(encode_timestamp))
        .bind(since.map(encode_timestamp))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("transactions", e))?;
        rows.iter().map(decode_transaction).collect()
    }
}

impl InventoryStore for SqliteInventoryStore {
    fn load(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        self.block_on(self.load_async(id))
    }

    fn list(&self) -> Result<Vec<Product>, StoreError> {
        self.block_on(self.list_async())
    }

    fn commit(
        &self,
        product: &Product,
        expected: ExpectedVersion,
        entries: Vec<NewTransaction>,
    ) -> Result<Vec<Transaction>, StoreError> {
        ensure_ledger_target(product, &entries)?;
        self.block_on(self.commit_async(product, expected, entries))
    }

    fn remove(&self, id: ProductId, expected: ExpectedVersion) -> Result<(), StoreError> {
        self.block_on(self.remove_async(id, expected))
    }

    fn append(&self, entry: NewTransaction) -> Result<Transaction, StoreError> {
        self.block_on(self.append_async(entry))
    }

    fn history(
        &self,
        id: ProductId,
        page: Option<Pagination>,
    ) -> Result<Vec<Transaction>, StoreError> {
        self.block_on(self.history_async(id, page))
    }

    fn transactions(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Transaction>, StoreError> {
        self.block_on(self.transactions_async(since))
    }
}

/// Commit on success, roll back on failure. The connection goes back to the pool
/// outside any transaction either way.
async fn finish<T>(
    conn: &mut SqliteConnection,
    result: Result<T, StoreError>,
) -> Result<T, StoreError> {
    let outcome = match result {
        Ok(value) => sqlx::query("COMMIT")
            .execute(&mut *conn)
            .await
            .map(|_| value)
            .map_err(|e| map_sqlx_error("commit_transaction", e)),
        Err(err) => Err(err),
    };
    if outcome.is_err() {
        if let Err(e) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
            warn!(error = %e, "rollback failed");
        }
    }
    outcome
}

async fn upsert(
    conn: &mut SqliteConnection,
    snapshot: &ProductSnapshot,
    batches_json: String,
    expected: ExpectedVersion,
    entries: Vec<NewTransaction>,
) -> Result<Vec<Transaction>, StoreError> {
    let current = current_version(conn, snapshot.id).await?.unwrap_or(0);
    if !expected.matches(current) {
        return Err(version_conflict(expected, current));
    }
    if snapshot.version <= current {
        return Err(StoreError::Conflict(format!(
            "product version {} does not advance stored version {current}",
            snapshot.version
        )));
    }

    sqlx::query(
        r#"
        INSERT INTO products (
            id, name, unit_price, brand, style, category, photo, batches,
            quantity, created_at, ever_sold, last_sold_at, version
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (id) DO UPDATE SET
            name = excluded.name,
            unit_price = excluded.unit_price,
            brand = excluded.brand,
            style = excluded.style,
            category = excluded.category,
            photo = excluded.photo,
            batches = excluded.batches,
            quantity = excluded.quantity,
            created_at = excluded.created_at,
            ever_sold = excluded.ever_sold,
            last_sold_at = excluded.last_sold_at,
            version = excluded.version
        "#,
    )
    .bind(snapshot.id.to_string())
    .bind(snapshot.name.as_str())
    .bind(snapshot.unit_price.to_string())
    .bind(snapshot.metadata.brand.label())
    .bind(snapshot.metadata.style.label())
    .bind(snapshot.metadata.category.label())
    .bind(snapshot.metadata.photo.as_deref())
    .bind(batches_json)
    .bind(snapshot.total_quantity)
    .bind(snapshot.created_at.map(encode_timestamp))
    .bind(i64::from(snapshot.ever_sold))
    .bind(snapshot.last_sold_at.map(encode_timestamp))
    .bind(to_db_version(snapshot.version)?)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("upsert_product", e))?;

    let mut stored = Vec::with_capacity(entries.len());
    for entry in entries {
        let id = insert_transaction(conn, &entry).await?;
        stored.push(entry.with_id(id));
    }
    Ok(stored)
}

async fn delete(
    conn: &mut SqliteConnection,
    id: ProductId,
    expected: ExpectedVersion,
) -> Result<(), StoreError> {
    let current = current_version(conn, id)
        .await?
        .ok_or(StoreError::MissingProduct(id))?;
    if !expected.matches(current) {
        return Err(version_conflict(expected, current));
    }

    sqlx::query("DELETE FROM transactions WHERE product_id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("delete_transactions", e))?;
    sqlx::query("DELETE FROM products WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("delete_product", e))?;
    Ok(())
}

async fn append(
    conn: &mut SqliteConnection,
    entry: NewTransaction,
) -> Result<Transaction, StoreError> {
    if current_version(conn, entry.product_id).await?.is_none() {
        return Err(StoreError::MissingProduct(entry.product_id));
    }
    let id = insert_transaction(conn, &entry).await?;
    Ok(entry.with_id(id))
}

async fn current_version(
    conn: &mut SqliteConnection,
    id: ProductId,
) -> Result<Option<u64>, StoreError> {
    let row = sqlx::query("SELECT version FROM products WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("check_version", e))?;

    row.map(|row| {
        let raw: i64 = row
            .try_get("version")
            .map_err(|e| StoreError::Corrupt(format!("version: {e}")))?;
        u64::try_from(raw).map_err(|_| StoreError::Corrupt(format!("negative version {raw}")))
    })
    .transpose()
}

async fn insert_transaction(
    conn: &mut SqliteConnection,
    entry: &NewTransaction,
) -> Result<u64, StoreError> {
    let result = sqlx::query(
        "INSERT INTO transactions (product_id, occurred_at, quantity, kind) VALUES (?, ?, ?, ?)",
    )
    .bind(entry.product_id.to_string())
    .bind(encode_timestamp(entry.occurred_at))
    .bind(entry.quantity)
    .bind(entry.kind.as_str())
    .execute(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("insert_transaction", e))?;

    u64::try_from(result.last_insert_rowid())
        .map_err(|_| StoreError::Backend("negative transaction id".to_string()))
}

/// Fixed-width UTC timestamps so text ordering matches time ordering.
fn encode_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn decode_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("{column} '{raw}': {e}")))
}

fn to_db_version(version: u64) -> Result<i64, StoreError> {
    i64::try_from(version).map_err(|_| StoreError::Backend(format!("version {version} too large")))
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name)
        .map_err(|e| StoreError::Corrupt(format!("column {name}: {e}")))
}

fn decode_product(row: &SqliteRow) -> Result<Product, StoreError> {
    let raw_id: String = column(row, "id")?;
    let id = ProductId::from_str(&raw_id)
        .map_err(|e| StoreError::Corrupt(format!("product id '{raw_id}': {e}")))?;

    let raw_price: String = column(row, "unit_price")?;
    let unit_price = Decimal::from_str(raw_price.trim()).unwrap_or_else(|e| {
        warn!(product_id = %id, price = %raw_price, error = %e, "unparsable stored price; valuing at zero");
        Decimal::ZERO
    });

    let tag = |name: &str| -> Result<String, StoreError> { column(row, name) };
    let brand = Brand::from_str(&tag("brand")?)
        .map_err(|e| StoreError::Corrupt(format!("product {id}: {e}")))?;
    let style = Style::from_str(&tag("style")?)
        .map_err(|e| StoreError::Corrupt(format!("product {id}: {e}")))?;
    let category = Category::from_str(&tag("category")?)
        .map_err(|e| StoreError::Corrupt(format!("product {id}: {e}")))?;

    let stored_batches: Option<String> = column(row, "batches")?;
    let decoded = stored_batches
        .map(|json| {
            serde_json::from_str::<Vec<Batch>>(&json)
                .map_err(|e| StoreError::Corrupt(format!("product {id} batch list: {e}")))
        })
        .transpose()?;
    if let Some(list) = &decoded {
        for b in list {
            b.validate()
                .map_err(|e| StoreError::Corrupt(format!("product {id}: {e}")))?;
        }
    }
    let legacy_quantity: i64 = column(row, "quantity")?;
    let batches = batch::from_storage(decoded, Some(legacy_quantity))
        .map_err(|e| StoreError::Corrupt(format!("product {id}: {e}")))?;

    let created_at = column::<Option<String>>(row, "created_at")?
        .map(|raw| decode_timestamp("created_at", &raw))
        .transpose()?;
    let last_sold_at = column::<Option<String>>(row, "last_sold_at")?
        .map(|raw| decode_timestamp("last_sold_at", &raw))
        .transpose()?;
    let ever_sold: i64 = column(row, "ever_sold")?;
    let raw_version: i64 = column(row, "version")?;
    let version = u64::try_from(raw_version)
        .map_err(|_| StoreError::Corrupt(format!("product {id}: negative version")))?;

    Ok(Product::from_snapshot(ProductSnapshot {
        id,
        name: column(row, "name")?,
        unit_price,
        metadata: ProductMetadata {
            brand,
            style,
            category,
            photo: column(row, "photo")?,
        },
        total_quantity: batch::total_quantity(&batches),
        batches,
        created_at,
        ever_sold: ever_sold != 0,
        last_sold_at,
        version,
    }))
}

fn decode_transaction(row: &SqliteRow) -> Result<Transaction, StoreError> {
    let raw_id: i64 = column(row, "id")?;
    let raw_product: String = column(row, "product_id")?;
    let raw_kind: String = column(row, "kind")?;
    let raw_at: String = column(row, "occurred_at")?;

    Ok(Transaction {
        id: u64::try_from(raw_id)
            .map_err(|_| StoreError::Corrupt(format!("transaction id {raw_id}")))?,
        product_id: ProductId::from_str(&raw_product)
            .map_err(|e| StoreError::Corrupt(format!("transaction product id: {e}")))?,
        occurred_at: decode_timestamp("occurred_at", &raw_at)?,
        quantity: column(row, "quantity")?,
        kind: TransactionKind::parse(&raw_kind)
            .ok_or_else(|| StoreError::Corrupt(format!("transaction kind '{raw_kind}'")))?,
    })
}

/// Map sqlx errors: write races (busy/locked, uniqueness) become `Conflict`,
/// everything else is a backend failure.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                // SQLITE_BUSY, SQLITE_LOCKED, SQLITE_BUSY_SNAPSHOT
                Some("5") | Some("6") | Some("517") => StoreError::Conflict(msg),
                // SQLITE_CONSTRAINT_PRIMARYKEY, SQLITE_CONSTRAINT_UNIQUE
                Some("1555") | Some("2067") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        other => StoreError::Backend(format!("sqlx error in {operation}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use lotstock_core::execute;
    use lotstock_inventory::{CreateProduct, ProductCommand, ProductDraft, SellStock};
    use rust_decimal_macros::dec;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap()
    }

    fn connect(rt: &tokio::runtime::Runtime) -> SqliteInventoryStore {
        rt.block_on(SqliteInventoryStore::connect("sqlite::memory:", 1))
            .unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn created(batches: Vec<Batch>) -> (Product, Vec<NewTransaction>) {
        let id = ProductId::new();
        let mut product = Product::empty(id);
        let events = execute(
            &mut product,
            &ProductCommand::Create(CreateProduct {
                product_id: id,
                draft: ProductDraft {
                    name: "Lily Eau de Parfum".to_string(),
                    unit_price: dec!(189.90),
                    batches,
                    metadata: ProductMetadata {
                        brand: Brand::Boticario,
                        style: Style::Women,
                        category: Category::EauDeParfum,
                        photo: Some("lily.jpg".to_string()),
                    },
                },
                occurred_at: at(0),
            }),
        )
        .unwrap();
        let entries = events.iter().filter_map(|e| e.ledger_entry()).collect();
        (product, entries)
    }

    fn exec(store: &SqliteInventoryStore, sql: &str) {
        store
            .block_on(sqlx::query(sql).execute(store.pool()))
            .unwrap();
    }

    #[test]
    fn commit_and_load_round_trip() {
        let rt = runtime();
        let store = connect(&rt);
        let (product, entries) = created(vec![
            Batch::dated(d(2025, 1, 1), 5),
            Batch::without_expiry(10),
        ]);

        let stored = store
            .commit(&product, ExpectedVersion::Exact(0), entries)
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].quantity, 15);

        let loaded = store.load(product.id_typed()).unwrap().unwrap();
        assert_eq!(loaded, product);
        assert_eq!(store.list().unwrap(), vec![product]);
    }

    #[test]
    fn sale_commit_checks_version_and_appends_ledger() {
        let rt = runtime();
        let store = connect(&rt);
        let (product, entries) = created(vec![Batch::dated(d(2025, 3, 1), 4)]);
        store
            .commit(&product, ExpectedVersion::Exact(0), entries)
            .unwrap();

        let mut sold = product.clone();
        let events = execute(
            &mut sold,
            &ProductCommand::Sell(SellStock {
                product_id: product.id_typed(),
                quantity: 4,
                selector: None,
                occurred_at: at(60),
            }),
        )
        .unwrap();
        let entries: Vec<NewTransaction> =
            events.iter().filter_map(|e| e.ledger_entry()).collect();

        assert!(matches!(
            store.commit(&sold, ExpectedVersion::Exact(5), entries.clone()),
            Err(StoreError::Conflict(_))
        ));
        store
            .commit(&sold, ExpectedVersion::Exact(1), entries)
            .unwrap();

        let loaded = store.load(product.id_typed()).unwrap().unwrap();
        assert!(loaded.is_sold_out());
        assert_eq!(loaded.last_sold_at(), Some(at(60)));

        let history = store.history(product.id_typed(), None).unwrap();
        let kinds: Vec<TransactionKind> = history.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![TransactionKind::Sale, TransactionKind::Restock]);
        assert_eq!(store.transactions(Some(at(30))).unwrap().len(), 1);
    }

    #[test]
    fn remove_cascades_ledger() {
        let rt = runtime();
        let store = connect(&rt);
        let (product, entries) = created(vec![Batch::without_expiry(2)]);
        store
            .commit(&product, ExpectedVersion::Exact(0), entries)
            .unwrap();

        store
            .remove(product.id_typed(), ExpectedVersion::Exact(1))
            .unwrap();
        assert!(store.load(product.id_typed()).unwrap().is_none());
        assert!(store.transactions(None).unwrap().is_empty());
        assert!(matches!(
            store.remove(product.id_typed(), ExpectedVersion::Any),
            Err(StoreError::MissingProduct(_))
        ));
    }

    #[test]
    fn legacy_row_loads_as_one_undated_batch() {
        let rt = runtime();
        let store = connect(&rt);
        let id = ProductId::new();
        exec(
            &store,
            &format!(
                "INSERT INTO products (id, name, unit_price, brand, style, category, quantity) \
                 VALUES ('{id}', 'Old Soap', '7.50', 'natura', 'Body & Bath', 'Bar Soap', 12)"
            ),
        );

        let product = store.load(id).unwrap().unwrap();
        assert_eq!(product.batches(), &[Batch::without_expiry(12)]);
        assert_eq!(product.total_quantity(), 12);
        assert_eq!(product.metadata().brand, Brand::Natura);
        assert_eq!(product.version(), 0);
    }

    #[test]
    fn negative_legacy_quantity_is_corrupt() {
        let rt = runtime();
        let store = connect(&rt);
        let id = ProductId::new();
        exec(
            &store,
            &format!(
                "INSERT INTO products (id, name, unit_price, brand, style, category, quantity) \
                 VALUES ('{id}', 'Old Soap', '7.50', 'natura', 'Body & Bath', 'Bar Soap', -5)"
            ),
        );

        assert!(matches!(store.load(id), Err(StoreError::Corrupt(_))));
        assert!(matches!(store.list(), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn corrupt_batch_list_fails_closed() {
        let rt = runtime();
        let store = connect(&rt);
        let id = ProductId::new();
        exec(
            &store,
            &format!(
                "INSERT INTO products (id, name, unit_price, brand, style, category, batches, quantity) \
                 VALUES ('{id}', 'Broken', '1', 'Avon', 'Makeup', 'Lips', '[{{\"expiry\": 5}}', 3)"
            ),
        );

        assert!(matches!(store.load(id), Err(StoreError::Corrupt(_))));
        assert!(matches!(store.list(), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn unknown_stored_tag_is_corrupt() {
        let rt = runtime();
        let store = connect(&rt);
        let id = ProductId::new();
        exec(
            &store,
            &format!(
                "INSERT INTO products (id, name, unit_price, brand, style, category, batches) \
                 VALUES ('{id}', 'Odd', '1', 'Acme', 'Makeup', 'Lips', '[]')"
            ),
        );
        assert!(matches!(store.load(id), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn malformed_price_loads_as_zero() {
        let rt = runtime();
        let store = connect(&rt);
        let id = ProductId::new();
        exec(
            &store,
            &format!(
                "INSERT INTO products (id, name, unit_price, brand, style, category, batches) \
                 VALUES ('{id}', 'Priceless', 'R$ 10,00', 'Avon', 'Makeup', 'Lips', '[]')"
            ),
        );
        let product = store.load(id).unwrap().unwrap();
        assert_eq!(product.unit_price(), Decimal::ZERO);
        assert!(product.batches().is_empty());
    }

    #[test]
    fn concurrent_writes_to_distinct_products_never_conflict() {
        let rt = runtime();
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("lotstock.db").display());
        let store = rt
            .block_on(SqliteInventoryStore::connect(&url, 8))
            .unwrap();

        let failures: Vec<StoreError> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|_| {
                    let store = &store;
                    scope.spawn(move || {
                        let mut failures = Vec::new();
                        for _ in 0..20 {
                            let (product, entries) = created(vec![Batch::without_expiry(3)]);
                            if let Err(e) = store.commit(&product, ExpectedVersion::Exact(0), entries) {
                                failures.push(e);
                                continue;
                            }

                            let mut sold = product.clone();
                            let events = execute(
                                &mut sold,
                                &ProductCommand::Sell(SellStock {
                                    product_id: product.id_typed(),
                                    quantity: 1,
                                    selector: None,
                                    occurred_at: at(5),
                                }),
                            )
                            .unwrap();
                            let entries = events.iter().filter_map(|e| e.ledger_entry()).collect();
                            if let Err(e) = store.commit(&sold, ExpectedVersion::Exact(1), entries) {
                                failures.push(e);
                            }
                        }
                        failures
                    })
                })
                .collect();
            workers
                .into_iter()
                .flat_map(|w| w.join().unwrap())
                .collect()
        });

        assert!(failures.is_empty(), "{failures:?}");
        let products = store.list().unwrap();
        assert_eq!(products.len(), 160);
        assert!(products.iter().all(|p| p.total_quantity() == 2));
        assert_eq!(store.transactions(None).unwrap().len(), 320);
    }

    #[test]
    fn history_pagination() {
        let rt = runtime();
        let store = connect(&rt);
        let (product, entries) = created(vec![Batch::without_expiry(9)]);
        let id = product.id_typed();
        store
            .commit(&product, ExpectedVersion::Exact(0), entries)
            .unwrap();
        for secs in [10, 20, 30] {
            store
                .append(NewTransaction::new(id, 1, TransactionKind::Sale, at(secs)).unwrap())
                .unwrap();
        }

        let page = store
            .history(id, Some(Pagination { limit: 2, offset: 1 }))
            .unwrap();
        let times: Vec<DateTime<Utc>> = page.iter().map(|t| t.occurred_at).collect();
        assert_eq!(times, vec![at(20), at(10)]);

        let orphan =
            NewTransaction::new(ProductId::new(), 1, TransactionKind::Sale, at(0)).unwrap();
        assert!(matches!(
            store.append(orphan),
            Err(StoreError::MissingProduct(_))
        ));
    }
}
