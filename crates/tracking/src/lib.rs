//! Buyer-facing item stage projection.
//!
//! The single place that turns an item's lot/package/shipment chain into
//! one human-meaningful progress stage. Pure read side: it must only ever
//! see committed state, so the projection is a function, not a subscriber.

pub mod stage;

pub use stage::{project_stage, ItemStage, StageEvidence};
