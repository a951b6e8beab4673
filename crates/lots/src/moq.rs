//! Per-product MOQ compliance reporting.
//!
//! The report backs both the operator-facing progress display and the
//! precondition check for promoting a lot to ready-to-order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use groupbuy_catalog::ProductId;

use crate::lot::{LotId, LotItem};

/// MOQ compliance for one product within a lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductMoqStatus {
    pub product_id: ProductId,
    pub total_quantity: u64,
    pub supplier_moq: u64,
    pub is_moq_met: bool,
    pub shortfall: u64,
}

/// Aggregate MOQ compliance for a lot, products sorted by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoqReport {
    pub lot_id: LotId,
    pub products: Vec<ProductMoqStatus>,
    pub all_moq_met: bool,
}

impl MoqReport {
    /// Build the report from a lot's membership.
    ///
    /// When members of the same product carry different snapshot MOQs (the
    /// catalog was edited between captures) the largest recorded threshold
    /// wins, so the lot never under-orders.
    pub fn for_members(lot_id: LotId, members: &[LotItem]) -> Self {
        let mut by_product: BTreeMap<ProductId, (u64, u64)> = BTreeMap::new();
        for m in members {
            let entry = by_product.entry(m.product_id).or_insert((0, 0));
            entry.0 += m.quantity;
            entry.1 = entry.1.max(m.supplier_moq);
        }

        let products: Vec<ProductMoqStatus> = by_product
            .into_iter()
            .map(|(product_id, (total_quantity, supplier_moq))| ProductMoqStatus {
                product_id,
                total_quantity,
                supplier_moq,
                is_moq_met: total_quantity >= supplier_moq,
                shortfall: supplier_moq.saturating_sub(total_quantity),
            })
            .collect();

        let all_moq_met = !products.is_empty() && products.iter().all(|p| p.is_moq_met);

        Self {
            lot_id,
            products,
            all_moq_met,
        }
    }

    /// Raw uuids of the products still short of their threshold.
    pub fn short_product_uuids(&self) -> Vec<Uuid> {
        self.products
            .iter()
            .filter(|p| !p.is_moq_met)
            .map(|p| *p.product_id.0.as_uuid())
            .collect()
    }
}
