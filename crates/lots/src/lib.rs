//! Lot domain module: supplier-scoped consolidation batches.
//!
//! Deterministic domain logic only (no IO, no HTTP, no storage). The
//! consolidation planner decides *what* a lot's membership should be; this
//! crate enforces *whether* and *how* a lot may change.

pub mod lot;
pub mod moq;

pub use lot::{
    Confirm, Lot, LotCommand, LotConfirmed, LotEvent, LotId, LotItem, LotOpened, LotPackaged,
    LotReady, LotStatus, MarkPackaged, MarkReady, MembersSynced, OpenLot, OrderSent, SendOrder,
    SyncMembers,
};
pub use moq::{MoqReport, ProductMoqStatus};
