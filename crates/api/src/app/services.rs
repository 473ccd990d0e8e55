//! Service wiring for the HTTP layer.
//!
//! The inventory service is synchronous (per-product locks, store calls bridged
//! onto the runtime), so handlers hop onto the blocking pool via [`AppServices::run`].

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::Response;

use lotstock_events::{EventBus, EventEnvelope, InMemoryEventBus};
use lotstock_infra::config::{LockingSettings, ReportSettings};
use lotstock_infra::{
    InMemoryInventoryStore, InventoryService, InventoryStore, ServiceError, Settings,
    SqliteInventoryStore, StoreError,
};
use lotstock_inventory::ProductEvent;

use crate::app::errors;

pub type ProductBus = InMemoryEventBus<EventEnvelope<ProductEvent>>;
pub type Inventory = InventoryService<Arc<dyn InventoryStore>, Arc<ProductBus>>;

pub struct AppServices {
    inventory: Inventory,
}

impl AppServices {
    pub fn new(
        store: Arc<dyn InventoryStore>,
        bus: Arc<ProductBus>,
        locking: LockingSettings,
        reports: ReportSettings,
    ) -> Self {
        Self {
            inventory: InventoryService::with_settings(store, bus, locking, reports),
        }
    }

    /// In-memory wiring (dev/test).
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryInventoryStore::new()),
            Arc::new(ProductBus::new()),
            LockingSettings::default(),
            ReportSettings::default(),
        )
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn bus(&self) -> &Arc<ProductBus> {
        self.inventory.bus()
    }

    /// Run a service call on the blocking pool and map its error to a response.
    pub async fn run<T, F>(self: &Arc<Self>, f: F) -> Result<T, Response>
    where
        T: Send + 'static,
        F: FnOnce(&Inventory) -> Result<T, ServiceError> + Send + 'static,
    {
        let services = Arc::clone(self);
        match tokio::task::spawn_blocking(move || f(&services.inventory)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(errors::service_error_to_response(err)),
            Err(join) => {
                tracing::error!(error = %join, "service call panicked or was cancelled");
                Err(errors::json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal error",
                ))
            }
        }
    }
}

/// Production wiring: SQLite store from settings, in-process bus, photo listener.
pub async fn build_services(settings: &Settings) -> Result<Arc<AppServices>, StoreError> {
    let store = SqliteInventoryStore::connect(
        &settings.database.url,
        settings.database.max_connections,
    )
    .await?;
    tracing::info!(url = %settings.database.url, "inventory store ready");

    let bus = Arc::new(ProductBus::new());
    spawn_photo_listener(&bus);

    Ok(Arc::new(AppServices::new(
        Arc::new(store),
        bus,
        settings.locking.clone(),
        settings.reports.clone(),
    )))
}

/// Log photo references that products no longer use, for the asset collaborator.
///
/// Runs on a plain thread; it ends once the bus (and its senders) are dropped.
fn spawn_photo_listener(bus: &Arc<ProductBus>) {
    let subscription = bus.subscribe();
    let spawned = std::thread::Builder::new()
        .name("photo-listener".into())
        .spawn(move || {
            while let Ok(envelope) = subscription.recv() {
                if let Some(photo) = envelope.payload().released_photo() {
                    tracing::info!(
                        product_id = %envelope.product_id(),
                        photo,
                        "photo reference released"
                    );
                }
            }
        });
    if let Err(err) = spawned {
        tracing::warn!(error = %err, "photo listener not started");
    }
}
