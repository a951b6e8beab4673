//! Application services: the only mutation paths into the engine.
//!
//! Each operation follows the same pipeline: load the aggregate(s), run the
//! command (decide + evolve), commit one atomic batch against the entity
//! store, then publish the committed events to the bus. Publication is
//! fire-and-forget - the store is the source of truth and a failed publish
//! only costs subscribers a notification, so it is logged, not propagated.

pub mod carts;
pub mod consolidation;
pub mod fulfillment;
pub mod lots;
pub mod tracking;

pub use carts::CartService;
pub use consolidation::{ConsolidationOutcome, ConsolidationService};
pub use fulfillment::{FulfillmentService, PackageSpec};
pub use lots::LotService;
pub use tracking::TrackingService;

use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use groupbuy_core::AggregateId;
use groupbuy_events::{Event, EventBus, EventEnvelope};

/// Wrap decided events into bus envelopes.
///
/// `base_version` is the aggregate version before the events were applied;
/// envelope sequence numbers continue from it.
pub(crate) fn envelopes_for<E>(
    aggregate_id: AggregateId,
    aggregate_type: &str,
    base_version: u64,
    events: &[E],
) -> Vec<EventEnvelope<JsonValue>>
where
    E: Event + Serialize,
{
    events
        .iter()
        .enumerate()
        .map(|(idx, event)| {
            let payload = serde_json::to_value(event).unwrap_or(JsonValue::Null);
            EventEnvelope::new(
                Uuid::now_v7(),
                aggregate_id,
                aggregate_type,
                event.event_type(),
                base_version + idx as u64 + 1,
                event.occurred_at(),
                payload,
            )
        })
        .collect()
}

/// Publish committed envelopes, logging failures instead of surfacing them.
pub(crate) fn publish_all<B>(bus: &B, envelopes: Vec<EventEnvelope<JsonValue>>)
where
    B: EventBus<EventEnvelope<JsonValue>>,
{
    for envelope in envelopes {
        if let Err(e) = bus.publish(envelope) {
            tracing::warn!(error = ?e, "event publication failed");
        }
    }
}
