use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use groupbuy_carts::{CartId, CartItemId};
use groupbuy_catalog::{ProductId, SupplierId};
use groupbuy_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TrackingNumber};
use groupbuy_events::Event;

use crate::moq::MoqReport;

/// Lot identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LotId(pub AggregateId);

impl LotId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for LotId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Lot status lifecycle, strictly ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LotStatus {
    Pending,
    ReadyToOrder,
    OrderSent,
    ConfirmedByProvider,
    Packaged,
}

impl LotStatus {
    /// Open lots may still gain or lose members through recomputation.
    pub fn is_open(self) -> bool {
        self < LotStatus::OrderSent
    }
}

/// A lot's claim on one cart item.
///
/// A weak reference: the lot claims membership, the cart keeps owning the
/// item. `supplier_id` and `supplier_moq` come from the item's snapshot so
/// MOQ evaluation stays a pure function of lot state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotItem {
    pub cart_item_id: CartItemId,
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub supplier_id: SupplierId,
    pub quantity: u64,
    pub supplier_moq: u64,
}

/// Aggregate root: Lot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lot {
    id: LotId,
    tracking_number: Option<TrackingNumber>,
    supplier_id: Option<SupplierId>,
    status: LotStatus,
    members: Vec<LotItem>,
    scheduled_at: Option<DateTime<Utc>>,
    consolidated_at: Option<DateTime<Utc>>,
    order_sent_at: Option<DateTime<Utc>>,
    confirmed_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Lot {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: LotId) -> Self {
        Self {
            id,
            tracking_number: None,
            supplier_id: None,
            status: LotStatus::Pending,
            members: Vec::new(),
            scheduled_at: None,
            consolidated_at: None,
            order_sent_at: None,
            confirmed_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> LotId {
        self.id
    }

    pub fn tracking_number(&self) -> Option<&TrackingNumber> {
        self.tracking_number.as_ref()
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn status(&self) -> LotStatus {
        self.status
    }

    pub fn members(&self) -> &[LotItem] {
        &self.members
    }

    pub fn scheduled_at(&self) -> Option<DateTime<Utc>> {
        self.scheduled_at
    }

    pub fn consolidated_at(&self) -> Option<DateTime<Utc>> {
        self.consolidated_at
    }

    pub fn order_sent_at(&self) -> Option<DateTime<Utc>> {
        self.order_sent_at
    }

    pub fn confirmed_at(&self) -> Option<DateTime<Utc>> {
        self.confirmed_at
    }

    pub fn claims_item(&self, item_id: CartItemId) -> bool {
        self.members.iter().any(|m| m.cart_item_id == item_id)
    }

    /// Membership is frozen once the order has been sent to the supplier.
    pub fn is_membership_frozen(&self) -> bool {
        !self.status.is_open()
    }

    /// Per-product MOQ compliance (idempotent, read-only).
    pub fn moq_report(&self) -> MoqReport {
        MoqReport::for_members(self.id, &self.members)
    }
}

impl AggregateRoot for Lot {
    type Id = LotId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenLot (issued by the consolidation engine only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenLot {
    pub lot_id: LotId,
    pub supplier_id: SupplierId,
    pub tracking_number: TrackingNumber,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SyncMembers (the single recomputation path for membership).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMembers {
    pub lot_id: LotId,
    pub members: Vec<LotItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkReady (promotion gated on every product meeting its MOQ).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkReady {
    pub lot_id: LotId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SendOrder (explicit operator action; freezes membership).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOrder {
    pub lot_id: LotId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Confirm (supplier acknowledged the order).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirm {
    pub lot_id: LotId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkPackaged (issued by the packaging flow).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkPackaged {
    pub lot_id: LotId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LotCommand {
    OpenLot(OpenLot),
    SyncMembers(SyncMembers),
    MarkReady(MarkReady),
    SendOrder(SendOrder),
    Confirm(Confirm),
    MarkPackaged(MarkPackaged),
}

/// Event: LotOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotOpened {
    pub lot_id: LotId,
    pub supplier_id: SupplierId,
    pub tracking_number: TrackingNumber,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MembersSynced. Carries the full replacement membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembersSynced {
    pub lot_id: LotId,
    pub members: Vec<LotItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LotReady.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotReady {
    pub lot_id: LotId,
    pub from: LotStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderSent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSent {
    pub lot_id: LotId,
    pub from: LotStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LotConfirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotConfirmed {
    pub lot_id: LotId,
    pub from: LotStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LotPackaged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotPackaged {
    pub lot_id: LotId,
    pub from: LotStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LotEvent {
    LotOpened(LotOpened),
    MembersSynced(MembersSynced),
    LotReady(LotReady),
    OrderSent(OrderSent),
    LotConfirmed(LotConfirmed),
    LotPackaged(LotPackaged),
}

impl Event for LotEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LotEvent::LotOpened(_) => "lots.lot.opened",
            LotEvent::MembersSynced(_) => "lots.lot.members_synced",
            LotEvent::LotReady(_) => "lots.lot.ready_to_order",
            LotEvent::OrderSent(_) => "lots.lot.order_sent",
            LotEvent::LotConfirmed(_) => "lots.lot.confirmed_by_provider",
            LotEvent::LotPackaged(_) => "lots.lot.packaged",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LotEvent::LotOpened(e) => e.occurred_at,
            LotEvent::MembersSynced(e) => e.occurred_at,
            LotEvent::LotReady(e) => e.occurred_at,
            LotEvent::OrderSent(e) => e.occurred_at,
            LotEvent::LotConfirmed(e) => e.occurred_at,
            LotEvent::LotPackaged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Lot {
    type Command = LotCommand;
    type Event = LotEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LotEvent::LotOpened(e) => {
                self.id = e.lot_id;
                self.supplier_id = Some(e.supplier_id);
                self.tracking_number = Some(e.tracking_number.clone());
                self.status = LotStatus::Pending;
                self.members.clear();
                // Set exactly once, on first entry of the pending state.
                self.scheduled_at.get_or_insert(e.occurred_at);
                self.created = true;
            }
            LotEvent::MembersSynced(e) => {
                self.members = e.members.clone();
            }
            LotEvent::LotReady(e) => {
                self.status = LotStatus::ReadyToOrder;
                self.consolidated_at.get_or_insert(e.occurred_at);
            }
            LotEvent::OrderSent(e) => {
                self.status = LotStatus::OrderSent;
                self.order_sent_at.get_or_insert(e.occurred_at);
            }
            LotEvent::LotConfirmed(e) => {
                self.status = LotStatus::ConfirmedByProvider;
                self.confirmed_at.get_or_insert(e.occurred_at);
            }
            LotEvent::LotPackaged(_) => {
                self.status = LotStatus::Packaged;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            LotCommand::OpenLot(cmd) => self.handle_open(cmd),
            LotCommand::SyncMembers(cmd) => self.handle_sync_members(cmd),
            LotCommand::MarkReady(cmd) => self.handle_mark_ready(cmd),
            LotCommand::SendOrder(cmd) => self.handle_send_order(cmd),
            LotCommand::Confirm(cmd) => self.handle_confirm(cmd),
            LotCommand::MarkPackaged(cmd) => self.handle_mark_packaged(cmd),
        }
    }
}

impl Lot {
    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn ensure_lot_id(&self, lot_id: LotId) -> Result<(), DomainError> {
        if self.id != lot_id {
            return Err(DomainError::validation("lot_id mismatch"));
        }
        Ok(())
    }

    fn ensure_status(&self, expected: LotStatus, target: LotStatus) -> Result<(), DomainError> {
        if self.status != expected {
            return Err(DomainError::invalid_transition(
                "lot",
                format!("{:?}", self.status),
                format!("{target:?}"),
            ));
        }
        Ok(())
    }

    fn handle_open(&self, cmd: &OpenLot) -> Result<Vec<LotEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("lot already exists"));
        }

        Ok(vec![LotEvent::LotOpened(LotOpened {
            lot_id: cmd.lot_id,
            supplier_id: cmd.supplier_id,
            tracking_number: cmd.tracking_number.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_sync_members(&self, cmd: &SyncMembers) -> Result<Vec<LotEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_lot_id(cmd.lot_id)?;

        if self.is_membership_frozen() {
            return Err(DomainError::validation(
                "lot membership is frozen once the order has been sent",
            ));
        }

        let supplier_id = self
            .supplier_id
            .ok_or_else(|| DomainError::validation("lot has no supplier"))?;

        for member in &cmd.members {
            if member.supplier_id != supplier_id {
                return Err(DomainError::SupplierMismatch {
                    expected: *supplier_id.0.as_uuid(),
                    found: *member.supplier_id.0.as_uuid(),
                });
            }
        }

        let mut next = cmd.members.clone();
        next.sort_by_key(|m| m.cart_item_id);

        // Unchanged membership is a no-op so recomputation stays idempotent.
        if next == self.members {
            return Ok(vec![]);
        }

        Ok(vec![LotEvent::MembersSynced(MembersSynced {
            lot_id: cmd.lot_id,
            members: next,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_ready(&self, cmd: &MarkReady) -> Result<Vec<LotEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_lot_id(cmd.lot_id)?;
        self.ensure_status(LotStatus::Pending, LotStatus::ReadyToOrder)?;

        if self.members.is_empty() {
            return Err(DomainError::validation("cannot promote an empty lot"));
        }

        let report = self.moq_report();
        if !report.all_moq_met {
            return Err(DomainError::MoqNotMet {
                short_products: report.short_product_uuids(),
            });
        }

        Ok(vec![LotEvent::LotReady(LotReady {
            lot_id: cmd.lot_id,
            from: self.status,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_send_order(&self, cmd: &SendOrder) -> Result<Vec<LotEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_lot_id(cmd.lot_id)?;
        self.ensure_status(LotStatus::ReadyToOrder, LotStatus::OrderSent)?;

        Ok(vec![LotEvent::OrderSent(OrderSent {
            lot_id: cmd.lot_id,
            from: self.status,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_confirm(&self, cmd: &Confirm) -> Result<Vec<LotEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_lot_id(cmd.lot_id)?;
        self.ensure_status(LotStatus::OrderSent, LotStatus::ConfirmedByProvider)?;

        Ok(vec![LotEvent::LotConfirmed(LotConfirmed {
            lot_id: cmd.lot_id,
            from: self.status,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_packaged(&self, cmd: &MarkPackaged) -> Result<Vec<LotEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_lot_id(cmd.lot_id)?;
        self.ensure_status(LotStatus::ConfirmedByProvider, LotStatus::Packaged)?;

        Ok(vec![LotEvent::LotPackaged(LotPackaged {
            lot_id: cmd.lot_id,
            from: self.status,
            occurred_at: cmd.occurred_at,
        })])
    }
}
