use std::sync::Arc;

use axum::{Extension, Router};
use serde_json::Value as JsonValue;
use tokio::sync::broadcast;
use tower::ServiceBuilder;

use groupbuy_catalog::InMemoryCatalog;
use groupbuy_events::{EventBus, EventEnvelope, InMemoryEventBus};
use groupbuy_infra::audit::AuditTrail;
use groupbuy_infra::services::{
    CartService, ConsolidationService, FulfillmentService, LotService, TrackingService,
};
use groupbuy_infra::store::InMemoryEntityStore;

pub mod dto;
pub mod errors;
pub mod routes;

pub type Store = Arc<InMemoryEntityStore>;
pub type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
pub type Catalog = Arc<InMemoryCatalog>;

/// Realtime message broadcast to SSE subscribers.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RealtimeMessage {
    pub topic: String,
    pub payload: JsonValue,
}

/// All wired services plus the realtime fan-out.
pub struct AppServices {
    pub catalog: Catalog,
    pub carts: CartService<Store, Bus, Catalog>,
    pub consolidation: ConsolidationService<Store, Bus>,
    pub lots: LotService<Store, Bus>,
    pub fulfillment: FulfillmentService<Store, Bus>,
    pub tracking: TrackingService<Store>,
    pub audit: Arc<AuditTrail>,
    pub realtime_tx: broadcast::Sender<RealtimeMessage>,
}

fn build_services() -> Arc<AppServices> {
    // In-memory infra wiring (dev/test): store + bus + catalog + audit.
    let store: Store = Arc::new(InMemoryEntityStore::new());
    let bus: Bus = Arc::new(InMemoryEventBus::new());
    let catalog: Catalog = Arc::new(InMemoryCatalog::new());
    let audit = Arc::new(AuditTrail::new());

    // Realtime channel (SSE): lossy broadcast, no backpressure on the core.
    let (realtime_tx, _realtime_rx) = broadcast::channel::<RealtimeMessage>(256);

    // Background subscriber: bus -> audit trail + realtime fan-out.
    {
        let sub = bus.subscribe();
        let audit = audit.clone();
        let realtime_tx = realtime_tx.clone();
        tokio::task::spawn_blocking(move || {
            while let Ok(envelope) = sub.recv() {
                audit.apply_envelope(&envelope);
                let _ = realtime_tx.send(RealtimeMessage {
                    topic: envelope.event_type().to_string(),
                    payload: serde_json::json!({
                        "aggregate_type": envelope.aggregate_type(),
                        "aggregate_id": envelope.aggregate_id(),
                        "occurred_at": envelope.occurred_at(),
                        "payload": envelope.payload(),
                    }),
                });
            }
        });
    }

    Arc::new(AppServices {
        carts: CartService::new(store.clone(), bus.clone(), catalog.clone()),
        consolidation: ConsolidationService::new(store.clone(), bus.clone()),
        lots: LotService::new(store.clone(), bus.clone()),
        fulfillment: FulfillmentService::new(store.clone(), bus.clone()),
        tracking: TrackingService::new(store),
        catalog,
        audit,
        realtime_tx,
    })
}

/// Build the application router with freshly wired in-memory services.
pub fn build_app() -> Router {
    let services = build_services();

    Router::new()
        .merge(routes::products::router())
        .merge(routes::carts::router())
        .merge(routes::lots::router())
        .merge(routes::fulfillment::router())
        .merge(routes::tracking::router())
        .merge(routes::events::router())
        .merge(routes::system::router())
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
