use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use groupbuy_carts::{Cart, CartItemId};
use groupbuy_catalog::SupplierId;
use groupbuy_lots::{Lot, LotId, LotItem};

/// Which lot a supplier group's members should land in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LotTarget {
    /// The supplier already has one open lot; sync its membership.
    Existing(LotId),
    /// No open lot for this supplier; the executor must open one.
    New,
}

/// The desired membership of one supplier's lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierGroup {
    pub supplier_id: SupplierId,
    pub target: LotTarget,
    pub members: Vec<LotItem>,
}

/// The full recomputation result, suppliers in sorted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidationPlan {
    pub groups: Vec<SupplierGroup>,
}

impl ConsolidationPlan {
    /// Cart item ids claimed by this plan or already locked into frozen lots.
    pub fn claimed_items(&self, lots: &[Lot]) -> BTreeSet<CartItemId> {
        let mut claimed: BTreeSet<CartItemId> = self
            .groups
            .iter()
            .flat_map(|g| g.members.iter().map(|m| m.cart_item_id))
            .collect();
        for lot in lots.iter().filter(|l| l.is_membership_frozen()) {
            claimed.extend(lot.members().iter().map(|m| m.cart_item_id));
        }
        claimed
    }
}

/// Recompute supplier lot membership from the current carts and lots.
///
/// A pure function of its inputs: planning twice over unchanged state
/// yields an identical plan, and adding one paid cart item only ever adds
/// membership. The rules:
///
/// - Items are eligible once their cart is paid (or already transferred -
///   those items stay where they are claimed so membership never shrinks).
/// - Items claimed by a frozen lot (order already sent) are locked and
///   excluded from re-pooling.
/// - Per supplier, at most one open lot is targeted: the oldest by id.
///   Suppliers with no eligible items are left untouched.
/// - Members are sorted by cart item id so recomputation is byte-stable.
pub fn plan(carts: &[Cart], lots: &[Lot]) -> ConsolidationPlan {
    let locked: BTreeSet<CartItemId> = lots
        .iter()
        .filter(|l| l.is_membership_frozen())
        .flat_map(|l| l.members().iter().map(|m| m.cart_item_id))
        .collect();

    let mut by_supplier: BTreeMap<SupplierId, Vec<LotItem>> = BTreeMap::new();
    for cart in carts.iter().filter(|c| c.is_eligible_for_consolidation()) {
        for item in cart.items() {
            if locked.contains(&item.item_id) {
                continue;
            }
            by_supplier
                .entry(item.snapshot.supplier_id)
                .or_default()
                .push(LotItem {
                    cart_item_id: item.item_id,
                    cart_id: cart.id_typed(),
                    product_id: item.product_id,
                    supplier_id: item.snapshot.supplier_id,
                    quantity: item.quantity,
                    supplier_moq: item.snapshot.supplier_moq,
                });
        }
    }

    let groups = by_supplier
        .into_iter()
        .map(|(supplier_id, mut members)| {
            members.sort_by_key(|m| m.cart_item_id);

            // At most one open lot per supplier; pick the oldest by id so a
            // duplicate (which the engine never creates) cannot flap.
            let target = lots
                .iter()
                .filter(|l| l.supplier_id() == Some(supplier_id) && l.status().is_open())
                .map(|l| l.id_typed())
                .min()
                .map_or(LotTarget::New, LotTarget::Existing);

            SupplierGroup {
                supplier_id,
                target,
                members,
            }
        })
        .collect();

    ConsolidationPlan { groups }
}
