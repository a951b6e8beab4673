use serde::{Deserialize, Serialize};

use groupbuy_fulfillment::{Package, Shipment};
use groupbuy_lots::Lot;

/// The ordered buyer-facing progress stages.
///
/// `Ord` follows the precedence order, so "never regresses" is expressible
/// as plain `>=` over successive projections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStage {
    InCart,
    LotPending,
    OrderSent,
    Confirmed,
    Packaged,
    InTransit,
    Delivered,
}

/// Committed state reachable from one cart item.
///
/// `packages` are the packages of the item's lot; `shipments` are the
/// shipments carrying any of those packages. Both may be empty; `lot` is
/// `None` while the item has not been consolidated yet.
#[derive(Debug, Clone, Copy)]
pub struct StageEvidence<'a> {
    pub lot: Option<&'a Lot>,
    pub packages: &'a [Package],
    pub shipments: &'a [Shipment],
}

/// Derive the single highest stage supported by the evidence.
///
/// A monotonic watermark: as the chain advances, later evidence only ever
/// ranks higher, and absence of data yields the lowest stage rather than an
/// error.
pub fn project_stage(evidence: &StageEvidence<'_>) -> ItemStage {
    if evidence.shipments.iter().any(|s| s.arrived_at().is_some()) {
        return ItemStage::Delivered;
    }

    if evidence.shipments.iter().any(|s| s.started_at().is_some()) {
        return ItemStage::InTransit;
    }

    if !evidence.packages.is_empty() {
        return ItemStage::Packaged;
    }

    let Some(lot) = evidence.lot else {
        return ItemStage::InCart;
    };

    if lot.confirmed_at().is_some() {
        return ItemStage::Confirmed;
    }

    if lot.order_sent_at().is_some() {
        return ItemStage::OrderSent;
    }

    ItemStage::LotPending
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use groupbuy_carts::{CartId, CartItemId};
    use groupbuy_catalog::{ProductId, SupplierId};
    use groupbuy_core::{AggregateId, TrackingKind, TrackingNumber};
    use groupbuy_events::execute;
    use groupbuy_fulfillment::{
        AssembleShipment, CarrierId, CreatePackage, Depart, DestinationId, MarkArrived,
        MarkReadyForPickup, PackageCommand, PackageId, ShipmentCommand, ShipmentId,
    };
    use groupbuy_lots::{
        Confirm, LotCommand, LotId, LotItem, MarkReady, OpenLot, SendOrder, SyncMembers,
    };

    fn lot_with_member() -> Lot {
        let supplier = SupplierId::new(AggregateId::new());
        let lot_id = LotId::new(AggregateId::new());
        let mut lot = Lot::empty(lot_id);
        execute(
            &mut lot,
            &LotCommand::OpenLot(OpenLot {
                lot_id,
                supplier_id: supplier,
                tracking_number: TrackingNumber::new(TrackingKind::Lot, 2025, 1),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        execute(
            &mut lot,
            &LotCommand::SyncMembers(SyncMembers {
                lot_id,
                members: vec![LotItem {
                    cart_item_id: CartItemId::new(AggregateId::new()),
                    cart_id: CartId::new(AggregateId::new()),
                    product_id: ProductId::new(AggregateId::new()),
                    supplier_id: supplier,
                    quantity: 10,
                    supplier_moq: 10,
                }],
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        lot
    }

    fn advance_lot(lot: &mut Lot, commands: &[fn(LotId) -> LotCommand]) {
        for make in commands {
            execute(lot, &make(lot.id_typed())).unwrap();
        }
    }

    fn package_for(lot: &Lot) -> Package {
        let package_id = PackageId::new(AggregateId::new());
        let mut package = Package::empty(package_id);
        execute(
            &mut package,
            &PackageCommand::CreatePackage(CreatePackage {
                package_id,
                lot_id: lot.id_typed(),
                tracking_number: TrackingNumber::new(TrackingKind::Package, 2025, 1),
                weight_grams: 1_000,
                volume_cm3: 2_000,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        package
    }

    fn shipment_over(packages: &[Package]) -> Shipment {
        let shipment_id = ShipmentId::new(AggregateId::new());
        let mut shipment = Shipment::empty(shipment_id);
        execute(
            &mut shipment,
            &ShipmentCommand::AssembleShipment(AssembleShipment {
                shipment_id,
                tracking_number: TrackingNumber::new(TrackingKind::Shipment, 2025, 1),
                carrier_id: CarrierId::new(AggregateId::new()),
                destination: DestinationId::new(AggregateId::new()),
                package_ids: packages.iter().map(|p| p.id_typed()).collect(),
                eta: None,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        shipment
    }

    #[test]
    fn no_lot_projects_in_cart() {
        let stage = project_stage(&StageEvidence {
            lot: None,
            packages: &[],
            shipments: &[],
        });
        assert_eq!(stage, ItemStage::InCart);
    }

    #[test]
    fn pending_lot_projects_lot_pending() {
        let lot = lot_with_member();
        let stage = project_stage(&StageEvidence {
            lot: Some(&lot),
            packages: &[],
            shipments: &[],
        });
        assert_eq!(stage, ItemStage::LotPending);
    }

    #[test]
    fn order_sent_then_confirmed_rank_in_order() {
        let mut lot = lot_with_member();
        advance_lot(
            &mut lot,
            &[
                |id| LotCommand::MarkReady(MarkReady { lot_id: id, occurred_at: Utc::now() }),
                |id| LotCommand::SendOrder(SendOrder { lot_id: id, occurred_at: Utc::now() }),
            ],
        );
        let stage = project_stage(&StageEvidence {
            lot: Some(&lot),
            packages: &[],
            shipments: &[],
        });
        assert_eq!(stage, ItemStage::OrderSent);

        advance_lot(
            &mut lot,
            &[|id| LotCommand::Confirm(Confirm { lot_id: id, occurred_at: Utc::now() })],
        );
        let stage = project_stage(&StageEvidence {
            lot: Some(&lot),
            packages: &[],
            shipments: &[],
        });
        assert_eq!(stage, ItemStage::Confirmed);
    }

    #[test]
    fn a_package_outranks_lot_timestamps() {
        let mut lot = lot_with_member();
        advance_lot(
            &mut lot,
            &[
                |id| LotCommand::MarkReady(MarkReady { lot_id: id, occurred_at: Utc::now() }),
                |id| LotCommand::SendOrder(SendOrder { lot_id: id, occurred_at: Utc::now() }),
                |id| LotCommand::Confirm(Confirm { lot_id: id, occurred_at: Utc::now() }),
            ],
        );
        let package = package_for(&lot);
        let stage = project_stage(&StageEvidence {
            lot: Some(&lot),
            packages: std::slice::from_ref(&package),
            shipments: &[],
        });
        assert_eq!(stage, ItemStage::Packaged);
    }

    #[test]
    fn shipment_departure_and_arrival_rank_highest() {
        let lot = lot_with_member();
        let mut package = package_for(&lot);
        let package_id = package.id_typed();
        execute(
            &mut package,
            &PackageCommand::MarkReadyForPickup(MarkReadyForPickup {
                package_id,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        let mut shipment = shipment_over(std::slice::from_ref(&package));

        let shipment_id = shipment.id_typed();
        execute(
            &mut shipment,
            &ShipmentCommand::Depart(Depart {
                shipment_id,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        let packages = [package];
        let shipments = [shipment];
        let stage = project_stage(&StageEvidence {
            lot: Some(&lot),
            packages: &packages,
            shipments: &shipments,
        });
        assert_eq!(stage, ItemStage::InTransit);

        let mut shipment = shipments.into_iter().next().unwrap();
        let shipment_id = shipment.id_typed();
        execute(
            &mut shipment,
            &ShipmentCommand::MarkArrived(MarkArrived {
                shipment_id,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        let shipments = [shipment];
        let stage = project_stage(&StageEvidence {
            lot: Some(&lot),
            packages: &packages,
            shipments: &shipments,
        });
        assert_eq!(stage, ItemStage::Delivered);
    }

    #[test]
    fn stage_never_regresses_across_the_full_walk() {
        let mut lot = lot_with_member();
        let mut observed = vec![project_stage(&StageEvidence {
            lot: Some(&lot),
            packages: &[],
            shipments: &[],
        })];

        advance_lot(
            &mut lot,
            &[
                |id| LotCommand::MarkReady(MarkReady { lot_id: id, occurred_at: Utc::now() }),
                |id| LotCommand::SendOrder(SendOrder { lot_id: id, occurred_at: Utc::now() }),
            ],
        );
        observed.push(project_stage(&StageEvidence {
            lot: Some(&lot),
            packages: &[],
            shipments: &[],
        }));

        advance_lot(
            &mut lot,
            &[|id| LotCommand::Confirm(Confirm { lot_id: id, occurred_at: Utc::now() })],
        );
        observed.push(project_stage(&StageEvidence {
            lot: Some(&lot),
            packages: &[],
            shipments: &[],
        }));

        let mut package = package_for(&lot);
        observed.push(project_stage(&StageEvidence {
            lot: Some(&lot),
            packages: std::slice::from_ref(&package),
            shipments: &[],
        }));

        let package_id = package.id_typed();
        execute(
            &mut package,
            &PackageCommand::MarkReadyForPickup(MarkReadyForPickup {
                package_id,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        let mut shipment = shipment_over(std::slice::from_ref(&package));
        let shipment_id = shipment.id_typed();
        execute(
            &mut shipment,
            &ShipmentCommand::Depart(Depart {
                shipment_id,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        let packages = [package];
        observed.push(project_stage(&StageEvidence {
            lot: Some(&lot),
            packages: &packages,
            shipments: std::slice::from_ref(&shipment),
        }));

        let shipment_id = shipment.id_typed();
        execute(
            &mut shipment,
            &ShipmentCommand::MarkArrived(MarkArrived {
                shipment_id,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        observed.push(project_stage(&StageEvidence {
            lot: Some(&lot),
            packages: &packages,
            shipments: std::slice::from_ref(&shipment),
        }));

        assert!(observed.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*observed.last().unwrap(), ItemStage::Delivered);
    }

    mod proptest_suite {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 512,
                ..ProptestConfig::default()
            })]

            /// Property: strictly richer evidence never lowers the stage.
            #[test]
            fn richer_evidence_never_ranks_lower(
                has_lot in any::<bool>(),
                confirmed in any::<bool>(),
                sent in any::<bool>(),
                packaged in any::<bool>(),
            ) {
                let mut lot = lot_with_member();
                if sent {
                    advance_lot(&mut lot, &[
                        |id| LotCommand::MarkReady(MarkReady { lot_id: id, occurred_at: Utc::now() }),
                        |id| LotCommand::SendOrder(SendOrder { lot_id: id, occurred_at: Utc::now() }),
                    ]);
                }
                if sent && confirmed {
                    advance_lot(&mut lot, &[
                        |id| LotCommand::Confirm(Confirm { lot_id: id, occurred_at: Utc::now() }),
                    ]);
                }

                let packages = if packaged { vec![package_for(&lot)] } else { vec![] };
                let base = StageEvidence {
                    lot: has_lot.then_some(&lot),
                    packages: &[],
                    shipments: &[],
                };
                let richer = StageEvidence {
                    lot: has_lot.then_some(&lot),
                    packages: &packages,
                    shipments: &[],
                };
                prop_assert!(project_stage(&richer) >= project_stage(&base));
            }
        }
    }
}
