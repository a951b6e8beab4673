//! Integration tests for the full consolidation/fulfillment pipeline.
//!
//! Tests: Service → EntityStore → EventBus → AuditTrail
//!
//! Verifies:
//! - paid carts pool into supplier lots and the MOQ gate holds
//! - recomputation is idempotent and never shrinks membership
//! - packaging, shipment assembly and the status cascades are atomic
//! - the buyer-facing stage projection only ever moves forward

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Datelike, Utc};
    use serde_json::Value as JsonValue;

    use groupbuy_carts::{CartId, CartItemId, CartStatus};
    use groupbuy_catalog::{InMemoryCatalog, ProductId, ProductRecord, SupplierId};
    use groupbuy_core::{AggregateId, AggregateRoot, BuyerId, DomainError};
    use groupbuy_events::{EventBus, EventEnvelope, InMemoryEventBus};
    use groupbuy_fulfillment::{CarrierId, DestinationId, PackageStatus, ShipmentStatus};
    use groupbuy_lots::LotStatus;
    use groupbuy_tracking::ItemStage;

    use crate::audit::AuditTrail;
    use crate::services::{
        CartService, ConsolidationService, FulfillmentService, LotService, PackageSpec,
        TrackingService,
    };
    use crate::store::{EntityStore, InMemoryEntityStore};

    type Store = Arc<InMemoryEntityStore>;
    type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
    type Catalog = Arc<InMemoryCatalog>;

    struct TestCtx {
        store: Store,
        catalog: Catalog,
        carts: CartService<Store, Bus, Catalog>,
        consolidation: ConsolidationService<Store, Bus>,
        lots: LotService<Store, Bus>,
        fulfillment: FulfillmentService<Store, Bus>,
        tracking: TrackingService<Store>,
        audit: Arc<AuditTrail>,
    }

    fn setup() -> TestCtx {
        let store: Store = Arc::new(InMemoryEntityStore::new());
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let catalog: Catalog = Arc::new(InMemoryCatalog::new());
        let audit = Arc::new(AuditTrail::new());

        // Subscribe to the bus BEFORE any events are published.
        let audit_clone = audit.clone();
        let bus_clone = bus.clone();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<()>();
        std::thread::spawn(move || {
            let sub = bus_clone.subscribe();
            let _ = ready_tx.send(());
            while let Ok(envelope) = sub.recv() {
                audit_clone.apply_envelope(&envelope);
            }
        });
        // Ensure the subscriber is ready before returning (prevents missing
        // early events).
        let _ = ready_rx.recv_timeout(std::time::Duration::from_secs(1));

        TestCtx {
            carts: CartService::new(store.clone(), bus.clone(), catalog.clone()),
            consolidation: ConsolidationService::new(store.clone(), bus.clone()),
            lots: LotService::new(store.clone(), bus.clone()),
            fulfillment: FulfillmentService::new(store.clone(), bus.clone()),
            tracking: TrackingService::new(store.clone()),
            store,
            catalog,
            audit,
        }
    }

    /// Helper: wait a short time for the subscriber thread to drain.
    fn wait_for_processing() {
        std::thread::sleep(std::time::Duration::from_millis(50));
    }

    fn seed_product(ctx: &TestCtx, supplier_id: SupplierId, supplier_moq: u64) -> ProductRecord {
        let record = ProductRecord {
            product_id: ProductId::new(AggregateId::new()),
            supplier_id,
            name: "Raw cane sugar".to_string(),
            customer_unit: "kg".to_string(),
            customer_moq: 1,
            supplier_unit: "pallet".to_string(),
            supplier_moq,
            min_fraction_per_user: 1,
            price: 180,
            public_price: 220,
        };
        ctx.catalog.upsert(record.clone()).unwrap();
        record
    }

    fn paid_cart(ctx: &TestCtx, record: &ProductRecord, quantity: u64) -> (CartId, CartItemId) {
        let cart_id = ctx.carts.open_cart(BuyerId::new()).unwrap();
        let item_id = ctx
            .carts
            .add_item(cart_id, record.product_id, quantity)
            .unwrap();
        ctx.carts.begin_checkout(cart_id).unwrap();
        ctx.carts.record_payment(cart_id, true).unwrap();
        (cart_id, item_id)
    }

    /// Walk a freshly consolidated lot to confirmed-by-provider.
    fn confirm_lot(ctx: &TestCtx) -> groupbuy_lots::LotId {
        let lot = ctx.lots.lots().unwrap().pop().unwrap();
        let lot_id = lot.id_typed();
        ctx.lots.mark_ready(lot_id).unwrap();
        ctx.lots.send_order(lot_id).unwrap();
        ctx.lots.confirm(lot_id).unwrap();
        lot_id
    }

    #[test]
    fn two_paid_carts_pool_into_one_lot_meeting_moq() {
        let ctx = setup();
        let supplier = SupplierId::new(AggregateId::new());
        let record = seed_product(&ctx, supplier, 10);
        let (cart_a, _) = paid_cart(&ctx, &record, 6);
        let (cart_b, _) = paid_cart(&ctx, &record, 4);

        let outcome = ctx.consolidation.recalculate_lots().unwrap();
        assert_eq!(outcome.lots_opened, 1);
        assert_eq!(outcome.carts_transferred, 2);

        let lots = ctx.lots.lots().unwrap();
        assert_eq!(lots.len(), 1);
        let lot = &lots[0];
        assert_eq!(lot.supplier_id(), Some(supplier));
        assert_eq!(lot.members().len(), 2);

        let report = ctx.lots.moq_status(lot.id_typed()).unwrap();
        assert!(report.all_moq_met);
        assert_eq!(report.products.len(), 1);
        assert_eq!(report.products[0].total_quantity, 10);
        assert!(report.products[0].is_moq_met);

        ctx.lots.mark_ready(lot.id_typed()).unwrap();
        assert_eq!(
            ctx.lots.lot(lot.id_typed()).unwrap().status(),
            LotStatus::ReadyToOrder
        );

        // Both carts were fully absorbed.
        assert_eq!(
            ctx.carts.cart(cart_a).unwrap().status(),
            CartStatus::TransferredToLots
        );
        assert_eq!(
            ctx.carts.cart(cart_b).unwrap().status(),
            CartStatus::TransferredToLots
        );
    }

    #[test]
    fn lot_tracking_numbers_are_sequential() {
        let ctx = setup();
        let year = Utc::now().year();
        let supplier_a = SupplierId::new(AggregateId::new());
        let supplier_b = SupplierId::new(AggregateId::new());
        let record_a = seed_product(&ctx, supplier_a, 5);
        let record_b = seed_product(&ctx, supplier_b, 5);
        paid_cart(&ctx, &record_a, 5);
        paid_cart(&ctx, &record_b, 5);

        ctx.consolidation.recalculate_lots().unwrap();

        let lots = ctx.lots.lots().unwrap();
        let mut numbers: Vec<String> = lots
            .iter()
            .map(|l| l.tracking_number().unwrap().as_str().to_string())
            .collect();
        numbers.sort();
        assert_eq!(
            numbers,
            vec![
                format!("LOT-{year}-0001"),
                format!("LOT-{year}-0002"),
            ]
        );
    }

    #[test]
    fn recomputation_is_idempotent() {
        let ctx = setup();
        let supplier = SupplierId::new(AggregateId::new());
        let record = seed_product(&ctx, supplier, 10);
        paid_cart(&ctx, &record, 6);
        paid_cart(&ctx, &record, 4);

        ctx.consolidation.recalculate_lots().unwrap();
        let before = ctx.lots.lots().unwrap();

        let outcome = ctx.consolidation.recalculate_lots().unwrap();
        assert_eq!(outcome.lots_opened, 0);
        assert_eq!(outcome.lots_updated, 0);
        assert_eq!(outcome.carts_transferred, 0);

        let after = ctx.lots.lots().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn recomputation_only_adds_membership() {
        let ctx = setup();
        let supplier = SupplierId::new(AggregateId::new());
        let record = seed_product(&ctx, supplier, 100);
        let (_, first_item) = paid_cart(&ctx, &record, 6);

        ctx.consolidation.recalculate_lots().unwrap();
        let lot_before = ctx.lots.lots().unwrap().pop().unwrap();
        assert!(lot_before.claims_item(first_item));

        paid_cart(&ctx, &record, 4);
        ctx.consolidation.recalculate_lots().unwrap();

        let lot_after = ctx.lots.lot(lot_before.id_typed()).unwrap();
        assert!(lot_after.claims_item(first_item));
        assert_eq!(lot_after.members().len(), 2);
    }

    #[test]
    fn frozen_lot_membership_survives_recomputation() {
        let ctx = setup();
        let supplier = SupplierId::new(AggregateId::new());
        let record = seed_product(&ctx, supplier, 10);
        paid_cart(&ctx, &record, 10);

        ctx.consolidation.recalculate_lots().unwrap();
        let lot = ctx.lots.lots().unwrap().pop().unwrap();
        let lot_id = lot.id_typed();
        ctx.lots.mark_ready(lot_id).unwrap();
        ctx.lots.send_order(lot_id).unwrap();
        let frozen_members = ctx.lots.lot(lot_id).unwrap().members().to_vec();

        // A later buyer pays for the same product; the sent lot must not
        // change, the new item goes to a fresh lot.
        paid_cart(&ctx, &record, 10);
        let outcome = ctx.consolidation.recalculate_lots().unwrap();
        assert_eq!(outcome.lots_opened, 1);

        let sent = ctx.lots.lot(lot_id).unwrap();
        assert_eq!(sent.status(), LotStatus::OrderSent);
        assert_eq!(sent.members(), frozen_members.as_slice());

        assert_eq!(ctx.lots.lots().unwrap().len(), 2);
    }

    #[test]
    fn moq_gate_blocks_a_short_lot() {
        let ctx = setup();
        let supplier = SupplierId::new(AggregateId::new());
        let record = seed_product(&ctx, supplier, 10);
        paid_cart(&ctx, &record, 6);

        ctx.consolidation.recalculate_lots().unwrap();
        let lot_id = ctx.lots.lots().unwrap().pop().unwrap().id_typed();

        let report = ctx.lots.moq_status(lot_id).unwrap();
        assert!(!report.all_moq_met);
        assert_eq!(report.products[0].shortfall, 4);

        let err = ctx.lots.mark_ready(lot_id).unwrap_err();
        match err {
            DomainError::MoqNotMet { short_products } => {
                assert_eq!(short_products, vec![*record.product_id.0.as_uuid()]);
            }
            other => panic!("expected MoqNotMet, got {other:?}"),
        }
        assert_eq!(ctx.lots.lot(lot_id).unwrap().status(), LotStatus::Pending);
    }

    #[test]
    fn packaging_requires_a_confirmed_lot_and_advances_it() {
        let ctx = setup();
        let supplier = SupplierId::new(AggregateId::new());
        let record = seed_product(&ctx, supplier, 10);
        paid_cart(&ctx, &record, 10);
        ctx.consolidation.recalculate_lots().unwrap();
        let lot_id = ctx.lots.lots().unwrap().pop().unwrap().id_typed();

        let spec = PackageSpec {
            weight_grams: 9_000,
            volume_cm3: 30_000,
        };

        // Too early: the provider has not confirmed yet.
        let err = ctx.fulfillment.create_packages(lot_id, &[spec]).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));

        ctx.lots.mark_ready(lot_id).unwrap();
        ctx.lots.send_order(lot_id).unwrap();
        ctx.lots.confirm(lot_id).unwrap();

        let package_ids = ctx
            .fulfillment
            .create_packages(lot_id, &[spec, spec])
            .unwrap();
        assert_eq!(package_ids.len(), 2);
        assert_eq!(ctx.lots.lot(lot_id).unwrap().status(), LotStatus::Packaged);

        let year = Utc::now().year();
        let packages = ctx.fulfillment.packages_for_lot(lot_id).unwrap();
        let mut numbers: Vec<String> = packages
            .iter()
            .map(|p| p.tracking_number().unwrap().as_str().to_string())
            .collect();
        numbers.sort();
        assert_eq!(
            numbers,
            vec![
                format!("PKG-{year}-0001"),
                format!("PKG-{year}-0002"),
            ]
        );

        // Cutting more packages later is fine; the lot stays packaged.
        ctx.fulfillment.create_packages(lot_id, &[spec]).unwrap();
        assert_eq!(ctx.lots.lot(lot_id).unwrap().status(), LotStatus::Packaged);
    }

    #[test]
    fn shipment_assembly_names_the_unready_package_and_creates_nothing() {
        let ctx = setup();
        let supplier = SupplierId::new(AggregateId::new());
        let record = seed_product(&ctx, supplier, 10);
        paid_cart(&ctx, &record, 10);
        ctx.consolidation.recalculate_lots().unwrap();
        let lot_id = confirm_lot(&ctx);

        let spec = PackageSpec {
            weight_grams: 1_000,
            volume_cm3: 1_000,
        };
        let package_ids = ctx
            .fulfillment
            .create_packages(lot_id, &[spec, spec])
            .unwrap();
        ctx.fulfillment.mark_package_ready(package_ids[0]).unwrap();
        // package_ids[1] stays at Created.

        let err = ctx
            .fulfillment
            .assemble_shipment(
                CarrierId::new(AggregateId::new()),
                DestinationId::new(AggregateId::new()),
                package_ids.clone(),
                None,
            )
            .unwrap_err();
        match err {
            DomainError::PackageNotReady { package_ids: ids } => {
                assert_eq!(ids, vec![*package_ids[1].0.as_uuid()]);
            }
            other => panic!("expected PackageNotReady, got {other:?}"),
        }
        assert!(ctx.fulfillment.shipments().unwrap().is_empty());
    }

    #[test]
    fn cascades_force_member_packages_along() {
        let ctx = setup();
        let supplier = SupplierId::new(AggregateId::new());
        let record = seed_product(&ctx, supplier, 10);
        paid_cart(&ctx, &record, 10);
        ctx.consolidation.recalculate_lots().unwrap();
        let lot_id = confirm_lot(&ctx);

        let spec = PackageSpec {
            weight_grams: 1_000,
            volume_cm3: 1_000,
        };
        let package_ids = ctx
            .fulfillment
            .create_packages(lot_id, &[spec, spec])
            .unwrap();
        for id in &package_ids {
            ctx.fulfillment.mark_package_ready(*id).unwrap();
        }

        let shipment_id = ctx
            .fulfillment
            .assemble_shipment(
                CarrierId::new(AggregateId::new()),
                DestinationId::new(AggregateId::new()),
                package_ids.clone(),
                None,
            )
            .unwrap();

        ctx.fulfillment.depart(shipment_id).unwrap();
        let shipment = ctx.fulfillment.shipment(shipment_id).unwrap();
        assert_eq!(shipment.status(), ShipmentStatus::InTransit);
        assert!(shipment.started_at().is_some());
        for id in &package_ids {
            assert_eq!(
                ctx.fulfillment.package(*id).unwrap().status(),
                PackageStatus::InTransit
            );
        }

        ctx.fulfillment.mark_arrived(shipment_id).unwrap();
        let shipment = ctx.fulfillment.shipment(shipment_id).unwrap();
        assert_eq!(shipment.status(), ShipmentStatus::Arrived);
        assert!(shipment.arrived_at().is_some());
        for id in &package_ids {
            assert_eq!(
                ctx.fulfillment.package(*id).unwrap().status(),
                PackageStatus::Delivered
            );
        }

        ctx.fulfillment.close(shipment_id).unwrap();
        assert_eq!(
            ctx.fulfillment.shipment(shipment_id).unwrap().status(),
            ShipmentStatus::Closed
        );
    }

    #[test]
    fn closing_with_an_undelivered_package_fails_and_changes_nothing() {
        let ctx = setup();
        let supplier = SupplierId::new(AggregateId::new());
        let record = seed_product(&ctx, supplier, 10);
        paid_cart(&ctx, &record, 10);
        ctx.consolidation.recalculate_lots().unwrap();
        let lot_id = confirm_lot(&ctx);

        let spec = PackageSpec {
            weight_grams: 1_000,
            volume_cm3: 1_000,
        };
        let package_ids = ctx
            .fulfillment
            .create_packages(lot_id, &[spec, spec])
            .unwrap();
        for id in &package_ids {
            ctx.fulfillment.mark_package_ready(*id).unwrap();
        }
        let shipment_id = ctx
            .fulfillment
            .assemble_shipment(
                CarrierId::new(AggregateId::new()),
                DestinationId::new(AggregateId::new()),
                package_ids.clone(),
                None,
            )
            .unwrap();
        ctx.fulfillment.depart(shipment_id).unwrap();

        // Members are in transit, not delivered.
        let err = ctx.fulfillment.close(shipment_id).unwrap_err();
        match err {
            DomainError::PackagesNotDelivered { package_ids: ids } => {
                assert_eq!(ids.len(), 2);
            }
            other => panic!("expected PackagesNotDelivered, got {other:?}"),
        }
        assert_eq!(
            ctx.fulfillment.shipment(shipment_id).unwrap().status(),
            ShipmentStatus::InTransit
        );
    }

    #[test]
    fn item_stage_walks_forward_through_the_whole_chain() {
        let ctx = setup();
        let supplier = SupplierId::new(AggregateId::new());
        let record = seed_product(&ctx, supplier, 10);

        let cart_id = ctx.carts.open_cart(BuyerId::new()).unwrap();
        let item_id = ctx.carts.add_item(cart_id, record.product_id, 10).unwrap();
        let mut observed = vec![ctx.tracking.item_stage(item_id).unwrap()];
        assert_eq!(observed[0], ItemStage::InCart);

        ctx.carts.begin_checkout(cart_id).unwrap();
        ctx.carts.record_payment(cart_id, true).unwrap();
        ctx.consolidation.recalculate_lots().unwrap();
        observed.push(ctx.tracking.item_stage(item_id).unwrap());
        assert_eq!(*observed.last().unwrap(), ItemStage::LotPending);

        let lot_id = ctx.lots.lots().unwrap().pop().unwrap().id_typed();
        ctx.lots.mark_ready(lot_id).unwrap();
        // Ready-to-order has no buyer-visible evidence of its own.
        observed.push(ctx.tracking.item_stage(item_id).unwrap());
        assert_eq!(*observed.last().unwrap(), ItemStage::LotPending);

        ctx.lots.send_order(lot_id).unwrap();
        observed.push(ctx.tracking.item_stage(item_id).unwrap());
        assert_eq!(*observed.last().unwrap(), ItemStage::OrderSent);

        ctx.lots.confirm(lot_id).unwrap();
        observed.push(ctx.tracking.item_stage(item_id).unwrap());
        assert_eq!(*observed.last().unwrap(), ItemStage::Confirmed);

        let spec = PackageSpec {
            weight_grams: 1_000,
            volume_cm3: 1_000,
        };
        let package_ids = ctx.fulfillment.create_packages(lot_id, &[spec]).unwrap();
        observed.push(ctx.tracking.item_stage(item_id).unwrap());
        assert_eq!(*observed.last().unwrap(), ItemStage::Packaged);

        ctx.fulfillment.mark_package_ready(package_ids[0]).unwrap();
        let shipment_id = ctx
            .fulfillment
            .assemble_shipment(
                CarrierId::new(AggregateId::new()),
                DestinationId::new(AggregateId::new()),
                package_ids,
                None,
            )
            .unwrap();
        ctx.fulfillment.depart(shipment_id).unwrap();
        observed.push(ctx.tracking.item_stage(item_id).unwrap());
        assert_eq!(*observed.last().unwrap(), ItemStage::InTransit);

        ctx.fulfillment.mark_arrived(shipment_id).unwrap();
        observed.push(ctx.tracking.item_stage(item_id).unwrap());
        assert_eq!(*observed.last().unwrap(), ItemStage::Delivered);

        // Monotonic watermark across the full walk.
        assert!(observed.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn payment_failure_leaves_the_cart_out_of_consolidation() {
        let ctx = setup();
        let supplier = SupplierId::new(AggregateId::new());
        let record = seed_product(&ctx, supplier, 10);

        let cart_id = ctx.carts.open_cart(BuyerId::new()).unwrap();
        ctx.carts.add_item(cart_id, record.product_id, 10).unwrap();
        ctx.carts.begin_checkout(cart_id).unwrap();

        let status = ctx.carts.record_payment(cart_id, false).unwrap();
        assert_eq!(status, CartStatus::PendingPayment);

        let outcome = ctx.consolidation.recalculate_lots().unwrap();
        assert_eq!(outcome.lots_opened, 0);
        assert!(ctx.lots.lots().unwrap().is_empty());
    }

    #[test]
    fn deleting_a_draft_cart_removes_its_items() {
        let ctx = setup();
        let supplier = SupplierId::new(AggregateId::new());
        let record = seed_product(&ctx, supplier, 10);

        let cart_id = ctx.carts.open_cart(BuyerId::new()).unwrap();
        let item_id = ctx.carts.add_item(cart_id, record.product_id, 5).unwrap();
        ctx.carts.delete_draft(cart_id).unwrap();

        assert!(matches!(
            ctx.carts.cart(cart_id).unwrap_err(),
            DomainError::NotFound
        ));
        assert!(matches!(
            ctx.tracking.item_stage(item_id).unwrap_err(),
            DomainError::NotFound
        ));

        // Paid carts cannot be deleted.
        let (paid_id, _) = paid_cart(&ctx, &record, 10);
        assert!(ctx.carts.delete_draft(paid_id).is_err());
    }

    #[test]
    fn every_transition_lands_in_the_audit_trail() {
        let ctx = setup();
        let supplier = SupplierId::new(AggregateId::new());
        let record = seed_product(&ctx, supplier, 10);
        paid_cart(&ctx, &record, 10);
        ctx.consolidation.recalculate_lots().unwrap();
        let lot_id = ctx.lots.lots().unwrap().pop().unwrap().id_typed();
        ctx.lots.mark_ready(lot_id).unwrap();
        ctx.lots.send_order(lot_id).unwrap();

        wait_for_processing();

        let records = ctx.audit.recent(64);
        let types: Vec<&str> = records.iter().map(|r| r.event_type.as_str()).collect();
        for expected in [
            "carts.cart.opened",
            "carts.cart.item_added",
            "carts.cart.checkout_started",
            "carts.cart.payment_confirmed",
            "lots.lot.opened",
            "lots.lot.members_synced",
            "carts.cart.transferred",
            "lots.lot.ready_to_order",
            "lots.lot.order_sent",
        ] {
            assert!(types.contains(&expected), "missing {expected} in {types:?}");
        }
    }

    #[test]
    fn version_conflicts_surface_as_retryable_errors() {
        let ctx = setup();
        let supplier = SupplierId::new(AggregateId::new());
        let record = seed_product(&ctx, supplier, 10);
        paid_cart(&ctx, &record, 10);
        ctx.consolidation.recalculate_lots().unwrap();
        let lot_id = ctx.lots.lots().unwrap().pop().unwrap().id_typed();

        // Simulate a stale writer: commit a lot write with a wrong expected
        // version directly against the store.
        let lot = ctx.store.lot(lot_id).unwrap().unwrap();
        let err = ctx
            .store
            .commit(
                crate::store::CommitBatch::default().put_lot(
                    groupbuy_core::ExpectedVersion::Exact(lot.version() + 7),
                    lot,
                ),
            )
            .unwrap_err();
        let domain: DomainError = err.into();
        assert!(domain.is_retryable());
    }
}
