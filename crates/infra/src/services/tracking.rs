use std::collections::BTreeSet;

use groupbuy_carts::CartItemId;
use groupbuy_core::{DomainError, DomainResult};
use groupbuy_fulfillment::{Package, PackageId, Shipment};
use groupbuy_tracking::{project_stage, ItemStage, StageEvidence};

use crate::store::EntityStore;

/// Buyer-facing stage queries.
///
/// Walks the committed item → lot → packages → shipments chain and hands it
/// to the pure projector. Absence of downstream data is not an error - an
/// item that exists but was never consolidated simply reports the lowest
/// stage.
#[derive(Debug)]
pub struct TrackingService<S> {
    store: S,
}

impl<S> TrackingService<S>
where
    S: EntityStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn item_stage(&self, cart_item_id: CartItemId) -> DomainResult<ItemStage> {
        let carts = self.store.carts()?;
        if !carts.iter().any(|c| c.item(cart_item_id).is_some()) {
            return Err(DomainError::NotFound);
        }

        let lots = self.store.lots()?;
        let lot = lots.iter().find(|l| l.claims_item(cart_item_id));

        let (packages, shipments): (Vec<Package>, Vec<Shipment>) = match lot {
            Some(lot) => {
                let packages: Vec<Package> = self
                    .store
                    .packages()?
                    .into_iter()
                    .filter(|p| p.lot_id() == Some(lot.id_typed()))
                    .collect();
                let package_ids: BTreeSet<PackageId> =
                    packages.iter().map(|p| p.id_typed()).collect();
                let shipments = self
                    .store
                    .shipments()?
                    .into_iter()
                    .filter(|s| s.package_ids().iter().any(|id| package_ids.contains(id)))
                    .collect();
                (packages, shipments)
            }
            None => (Vec::new(), Vec::new()),
        };

        Ok(project_stage(&StageEvidence {
            lot,
            packages: &packages,
            shipments: &shipments,
        }))
    }
}
