//! Metadata every published event carries.

use chrono::{DateTime, Utc};

use lotstock_core::ProductId;

/// A committed fact about one product.
///
/// Payloads are immutable once published. Consumers decode by `event_type`
/// and `schema_version`.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Dotted name, e.g. `inventory.product.stock_sold`.
    fn event_type(&self) -> &'static str;

    fn schema_version(&self) -> u32 {
        1
    }

    /// Product the event belongs to.
    fn product_id(&self) -> ProductId;

    /// Business time.
    fn occurred_at(&self) -> DateTime<Utc>;
}
