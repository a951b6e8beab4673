use chrono::Utc;
use serde_json::Value as JsonValue;

use groupbuy_core::{AggregateRoot, DomainError, DomainResult, ExpectedVersion};
use groupbuy_events::{execute, EventBus, EventEnvelope};
use groupbuy_lots::{Confirm, Lot, LotCommand, LotId, MarkReady, MoqReport, SendOrder};

use crate::store::{CommitBatch, EntityStore};

use super::{envelopes_for, publish_all};

/// Operator-facing lot lifecycle actions and the MOQ compliance query.
#[derive(Debug)]
pub struct LotService<S, B> {
    store: S,
    bus: B,
}

impl<S, B> LotService<S, B>
where
    S: EntityStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn lot(&self, lot_id: LotId) -> DomainResult<Lot> {
        self.store.lot(lot_id)?.ok_or(DomainError::NotFound)
    }

    pub fn lots(&self) -> DomainResult<Vec<Lot>> {
        Ok(self.store.lots()?)
    }

    /// Read-only MOQ compliance report for display and precondition checks.
    pub fn moq_status(&self, lot_id: LotId) -> DomainResult<MoqReport> {
        Ok(self.lot(lot_id)?.moq_report())
    }

    /// Promote to ready-to-order; fails with `MoqNotMet` while any product
    /// is short.
    pub fn mark_ready(&self, lot_id: LotId) -> DomainResult<()> {
        self.run(lot_id, |lot_id| {
            LotCommand::MarkReady(MarkReady {
                lot_id,
                occurred_at: Utc::now(),
            })
        })
    }

    /// Send the order to the supplier; freezes membership.
    pub fn send_order(&self, lot_id: LotId) -> DomainResult<()> {
        self.run(lot_id, |lot_id| {
            LotCommand::SendOrder(SendOrder {
                lot_id,
                occurred_at: Utc::now(),
            })
        })
    }

    /// Record the supplier's confirmation.
    pub fn confirm(&self, lot_id: LotId) -> DomainResult<()> {
        self.run(lot_id, |lot_id| {
            LotCommand::Confirm(Confirm {
                lot_id,
                occurred_at: Utc::now(),
            })
        })
    }

    fn run(&self, lot_id: LotId, make: impl FnOnce(LotId) -> LotCommand) -> DomainResult<()> {
        let mut lot = self.lot(lot_id)?;
        let base_version = lot.version();
        let events = execute(&mut lot, &make(lot_id))?;
        if events.is_empty() {
            return Ok(());
        }

        let envelopes = envelopes_for(lot_id.0, "lots.lot", base_version, &events);
        self.store.commit(
            CommitBatch::default().put_lot(ExpectedVersion::Exact(base_version), lot),
        )?;
        publish_all(&self.bus, envelopes);

        tracing::info!(%lot_id, "lot advanced");
        Ok(())
    }
}
