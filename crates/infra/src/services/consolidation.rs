use chrono::{Datelike, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use groupbuy_carts::{CartCommand, CartStatus, MarkTransferred};
use groupbuy_consolidation::{plan, LotTarget};
use groupbuy_core::{AggregateId, AggregateRoot, DomainResult, ExpectedVersion, TrackingKind};
use groupbuy_events::{execute, EventBus, EventEnvelope};
use groupbuy_lots::{Lot, LotCommand, LotId, OpenLot, SyncMembers};

use crate::store::{CommitBatch, EntityStore};

use super::{envelopes_for, publish_all};

/// What one recomputation pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConsolidationOutcome {
    pub lots_opened: usize,
    pub lots_updated: usize,
    pub carts_transferred: usize,
}

/// The consolidation engine's execution side.
///
/// Planning is pure (`groupbuy-consolidation`); this service feeds it the
/// committed carts and lots, then commits each supplier group as its own
/// batch - all-or-nothing per supplier, independent across suppliers.
/// Re-running with unchanged input commits nothing.
#[derive(Debug)]
pub struct ConsolidationService<S, B> {
    store: S,
    bus: B,
}

impl<S, B> ConsolidationService<S, B>
where
    S: EntityStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn recalculate_lots(&self) -> DomainResult<ConsolidationOutcome> {
        let now = Utc::now();
        let carts = self.store.carts()?;
        let lots = self.store.lots()?;
        let recomputation = plan(&carts, &lots);

        let mut outcome = ConsolidationOutcome::default();

        for group in &recomputation.groups {
            match group.target {
                LotTarget::New => {
                    let lot_id = LotId::new(AggregateId::new());
                    let tracking_number =
                        self.store.next_tracking(TrackingKind::Lot, now.year())?;
                    let mut lot = Lot::empty(lot_id);

                    let mut events = execute(
                        &mut lot,
                        &LotCommand::OpenLot(OpenLot {
                            lot_id,
                            supplier_id: group.supplier_id,
                            tracking_number,
                            occurred_at: now,
                        }),
                    )?;
                    events.extend(execute(
                        &mut lot,
                        &LotCommand::SyncMembers(SyncMembers {
                            lot_id,
                            members: group.members.clone(),
                            occurred_at: now,
                        }),
                    )?);

                    let envelopes = envelopes_for(lot_id.0, "lots.lot", 0, &events);
                    self.store.commit(
                        CommitBatch::default().put_lot(ExpectedVersion::Exact(0), lot),
                    )?;
                    publish_all(&self.bus, envelopes);

                    tracing::info!(%lot_id, supplier_id = %group.supplier_id, "lot opened");
                    outcome.lots_opened += 1;
                }
                LotTarget::Existing(lot_id) => {
                    let mut lot = match self.store.lot(lot_id)? {
                        Some(lot) => lot,
                        // Raced with a concurrent pass; the next run sees it.
                        None => continue,
                    };
                    let base_version = lot.version();
                    let events = execute(
                        &mut lot,
                        &LotCommand::SyncMembers(SyncMembers {
                            lot_id,
                            members: group.members.clone(),
                            occurred_at: now,
                        }),
                    )?;
                    if events.is_empty() {
                        continue;
                    }

                    let envelopes = envelopes_for(lot_id.0, "lots.lot", base_version, &events);
                    self.store.commit(
                        CommitBatch::default()
                            .put_lot(ExpectedVersion::Exact(base_version), lot),
                    )?;
                    publish_all(&self.bus, envelopes);

                    outcome.lots_updated += 1;
                }
            }
        }

        // Second pass: paid carts whose every item has been absorbed become
        // terminal.
        let claimed = recomputation.claimed_items(&lots);
        for cart in carts {
            if cart.status() != CartStatus::Paid || cart.items().is_empty() {
                continue;
            }
            if !cart.items().iter().all(|i| claimed.contains(&i.item_id)) {
                continue;
            }

            let cart_id = cart.id_typed();
            let mut cart = cart;
            let base_version = cart.version();
            let events = execute(
                &mut cart,
                &CartCommand::MarkTransferred(MarkTransferred {
                    cart_id,
                    occurred_at: now,
                }),
            )?;

            let envelopes = envelopes_for(cart_id.0, "carts.cart", base_version, &events);
            self.store.commit(
                CommitBatch::default().put_cart(ExpectedVersion::Exact(base_version), cart),
            )?;
            publish_all(&self.bus, envelopes);

            outcome.carts_transferred += 1;
        }

        tracing::info!(
            lots_opened = outcome.lots_opened,
            lots_updated = outcome.lots_updated,
            carts_transferred = outcome.carts_transferred,
            "consolidation pass complete"
        );
        Ok(outcome)
    }
}
