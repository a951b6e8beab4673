//! Consolidation planner: pools paid cart items into supplier lots.
//!
//! Pure decision logic only. The planner reads the current carts and lots
//! and produces a [`ConsolidationPlan`] describing, per supplier, which lot
//! should hold which cart items. Executing the plan (allocating lot ids and
//! tracking numbers, committing, publishing) is the consolidation service's
//! job in the infrastructure layer.

pub mod planner;

pub use planner::{plan, ConsolidationPlan, LotTarget, SupplierGroup};
