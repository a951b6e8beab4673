use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use groupbuy_core::{
    AggregateId, AggregateRoot, DomainError, DomainResult, ExpectedVersion, TrackingKind,
};
use groupbuy_events::{execute, EventBus, EventEnvelope};
use groupbuy_fulfillment::{
    AddPackage, AssembleShipment, CarrierId, Close, CreatePackage, Depart, DestinationId,
    ForceDelivered, ForceInTransit, MarkArrived, MarkDelivered, MarkInTransit,
    MarkReadyForPickup, Package, PackageCommand, PackageId, PackageStatus, Shipment,
    ShipmentCommand, ShipmentId,
};
use groupbuy_lots::{LotCommand, LotId, LotStatus, MarkPackaged};

use crate::store::{CommitBatch, EntityStore};

use super::{envelopes_for, publish_all};

/// Physical dimensions for one package to cut from a lot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSpec {
    pub weight_grams: u64,
    pub volume_cm3: u64,
}

/// Packaging and shipment operations, including the status cascades.
///
/// Cross-entity guards live here: an aggregate cannot see its siblings, so
/// readiness, exclusive claims and delivered-ness are checked against the
/// store before the commands run, and multi-entity writes go into a single
/// commit batch.
#[derive(Debug)]
pub struct FulfillmentService<S, B> {
    store: S,
    bus: B,
}

impl<S, B> FulfillmentService<S, B>
where
    S: EntityStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn package(&self, package_id: PackageId) -> DomainResult<Package> {
        self.store.package(package_id)?.ok_or(DomainError::NotFound)
    }

    pub fn packages(&self) -> DomainResult<Vec<Package>> {
        Ok(self.store.packages()?)
    }

    pub fn packages_for_lot(&self, lot_id: LotId) -> DomainResult<Vec<Package>> {
        Ok(self
            .store
            .packages()?
            .into_iter()
            .filter(|p| p.lot_id() == Some(lot_id))
            .collect())
    }

    pub fn shipment(&self, shipment_id: ShipmentId) -> DomainResult<Shipment> {
        self.store
            .shipment(shipment_id)?
            .ok_or(DomainError::NotFound)
    }

    pub fn shipments(&self) -> DomainResult<Vec<Shipment>> {
        Ok(self.store.shipments()?)
    }

    /// Cut packages from a confirmed lot. One combined operation: the
    /// package inserts and the lot's move to packaged commit together.
    pub fn create_packages(
        &self,
        lot_id: LotId,
        specs: &[PackageSpec],
    ) -> DomainResult<Vec<PackageId>> {
        if specs.is_empty() {
            return Err(DomainError::validation(
                "at least one package spec is required",
            ));
        }

        let mut lot = self
            .store
            .lot(lot_id)?
            .ok_or(DomainError::NotFound)?;
        let lot_base = lot.version();

        let lot_events = match lot.status() {
            LotStatus::ConfirmedByProvider => execute(
                &mut lot,
                &LotCommand::MarkPackaged(MarkPackaged {
                    lot_id,
                    occurred_at: Utc::now(),
                }),
            )?,
            // Already packaged: later packages may still be cut.
            LotStatus::Packaged => vec![],
            other => {
                return Err(DomainError::invalid_transition(
                    "lot",
                    format!("{other:?}"),
                    format!("{:?}", LotStatus::Packaged),
                ));
            }
        };

        let now = Utc::now();
        let mut batch = CommitBatch::default();
        let mut envelopes = envelopes_for(lot_id.0, "lots.lot", lot_base, &lot_events);
        if !lot_events.is_empty() {
            batch = batch.put_lot(ExpectedVersion::Exact(lot_base), lot);
        }

        let mut package_ids = Vec::with_capacity(specs.len());
        for spec in specs {
            let package_id = PackageId::new(AggregateId::new());
            let tracking_number = self
                .store
                .next_tracking(TrackingKind::Package, now.year())?;
            let mut package = Package::empty(package_id);
            let events = execute(
                &mut package,
                &PackageCommand::CreatePackage(CreatePackage {
                    package_id,
                    lot_id,
                    tracking_number,
                    weight_grams: spec.weight_grams,
                    volume_cm3: spec.volume_cm3,
                    occurred_at: now,
                }),
            )?;

            envelopes.extend(envelopes_for(
                package_id.0,
                "fulfillment.package",
                0,
                &events,
            ));
            batch = batch.put_package(ExpectedVersion::Exact(0), package);
            package_ids.push(package_id);
        }

        self.store.commit(batch)?;
        publish_all(&self.bus, envelopes);

        tracing::info!(%lot_id, count = package_ids.len(), "packages created");
        Ok(package_ids)
    }

    pub fn mark_package_ready(&self, package_id: PackageId) -> DomainResult<()> {
        self.run_package(package_id, |package_id| {
            PackageCommand::MarkReadyForPickup(MarkReadyForPickup {
                package_id,
                occurred_at: Utc::now(),
            })
        })
    }

    pub fn mark_package_in_transit(&self, package_id: PackageId) -> DomainResult<()> {
        self.run_package(package_id, |package_id| {
            PackageCommand::MarkInTransit(MarkInTransit {
                package_id,
                occurred_at: Utc::now(),
            })
        })
    }

    pub fn mark_package_delivered(&self, package_id: PackageId) -> DomainResult<()> {
        self.run_package(package_id, |package_id| {
            PackageCommand::MarkDelivered(MarkDelivered {
                package_id,
                occurred_at: Utc::now(),
            })
        })
    }

    /// Assemble a shipment over ready packages. All referenced packages
    /// must be ready for pickup and unclaimed; otherwise nothing is
    /// created.
    pub fn assemble_shipment(
        &self,
        carrier_id: CarrierId,
        destination: DestinationId,
        package_ids: Vec<PackageId>,
        eta: Option<DateTime<Utc>>,
    ) -> DomainResult<ShipmentId> {
        let mut not_ready = Vec::new();
        for package_id in &package_ids {
            let package = self.package(*package_id)?;
            if package.status() != PackageStatus::ReadyForPickup {
                not_ready.push(*package_id.0.as_uuid());
            }
        }
        if !not_ready.is_empty() {
            return Err(DomainError::PackageNotReady {
                package_ids: not_ready,
            });
        }

        self.ensure_unclaimed(&package_ids)?;

        let now = Utc::now();
        let shipment_id = ShipmentId::new(AggregateId::new());
        let tracking_number = self
            .store
            .next_tracking(TrackingKind::Shipment, now.year())?;
        let mut shipment = Shipment::empty(shipment_id);
        let events = execute(
            &mut shipment,
            &ShipmentCommand::AssembleShipment(AssembleShipment {
                shipment_id,
                tracking_number,
                carrier_id,
                destination,
                package_ids,
                eta,
                occurred_at: now,
            }),
        )?;

        let envelopes = envelopes_for(shipment_id.0, "fulfillment.shipment", 0, &events);
        self.store.commit(
            CommitBatch::default().put_shipment(ExpectedVersion::Exact(0), shipment),
        )?;
        publish_all(&self.bus, envelopes);

        tracing::info!(%shipment_id, "shipment assembled");
        Ok(shipment_id)
    }

    /// Add one more package to a still-assembling shipment.
    pub fn add_package(
        &self,
        shipment_id: ShipmentId,
        package_id: PackageId,
    ) -> DomainResult<()> {
        let package = self.package(package_id)?;
        if package.status() != PackageStatus::ReadyForPickup {
            return Err(DomainError::PackageNotReady {
                package_ids: vec![*package_id.0.as_uuid()],
            });
        }
        self.ensure_unclaimed(&[package_id])?;

        let mut shipment = self.shipment(shipment_id)?;
        let base_version = shipment.version();
        let events = execute(
            &mut shipment,
            &ShipmentCommand::AddPackage(AddPackage {
                shipment_id,
                package_id,
                occurred_at: Utc::now(),
            }),
        )?;

        let envelopes = envelopes_for(
            shipment_id.0,
            "fulfillment.shipment",
            base_version,
            &events,
        );
        self.store.commit(
            CommitBatch::default()
                .put_shipment(ExpectedVersion::Exact(base_version), shipment),
        )?;
        publish_all(&self.bus, envelopes);
        Ok(())
    }

    /// Depart: the shipment moves to in-transit and every member package is
    /// forced along with it, in one batch.
    pub fn depart(&self, shipment_id: ShipmentId) -> DomainResult<()> {
        self.cascade(shipment_id, CascadeKind::Depart)
    }

    /// Arrival: the shipment records `arrived_at` and every member package
    /// is forced to delivered, in one batch.
    pub fn mark_arrived(&self, shipment_id: ShipmentId) -> DomainResult<()> {
        self.cascade(shipment_id, CascadeKind::Arrive)
    }

    /// Close the shipment. Guarded from either in-transit or arrived:
    /// every member package must already be delivered, otherwise the close
    /// fails naming the stragglers and the shipment is untouched.
    pub fn close(&self, shipment_id: ShipmentId) -> DomainResult<()> {
        self.cascade(shipment_id, CascadeKind::Close)
    }

    fn cascade(&self, shipment_id: ShipmentId, kind: CascadeKind) -> DomainResult<()> {
        let mut shipment = self.shipment(shipment_id)?;
        let base_version = shipment.version();

        if kind == CascadeKind::Close {
            let undelivered: Vec<Uuid> = self
                .load_members(&shipment)?
                .iter()
                .filter(|p| p.status() != PackageStatus::Delivered)
                .map(|p| *p.id_typed().0.as_uuid())
                .collect();
            if !undelivered.is_empty() {
                return Err(DomainError::PackagesNotDelivered {
                    package_ids: undelivered,
                });
            }
        }

        let now = Utc::now();
        let command = match kind {
            CascadeKind::Depart => ShipmentCommand::Depart(Depart {
                shipment_id,
                occurred_at: now,
            }),
            CascadeKind::Arrive => ShipmentCommand::MarkArrived(MarkArrived {
                shipment_id,
                occurred_at: now,
            }),
            CascadeKind::Close => ShipmentCommand::Close(Close {
                shipment_id,
                occurred_at: now,
            }),
        };

        // Forced member writes only apply when the shipment itself moves:
        // depart forces in-transit, arrival forces delivered. Close never
        // forces anything - the guard above already proved delivery.
        let force_members = matches!(kind, CascadeKind::Depart | CascadeKind::Arrive);
        let force_delivered = kind == CascadeKind::Arrive;

        let events = execute(&mut shipment, &command)?;

        let mut batch = CommitBatch::default();
        let mut envelopes = envelopes_for(
            shipment_id.0,
            "fulfillment.shipment",
            base_version,
            &events,
        );

        if force_members {
            for mut package in self.load_members(&shipment)? {
                let package_id = package.id_typed();
                let package_base = package.version();
                let command = if force_delivered {
                    PackageCommand::ForceDelivered(ForceDelivered {
                        package_id,
                        occurred_at: now,
                    })
                } else {
                    PackageCommand::ForceInTransit(ForceInTransit {
                        package_id,
                        occurred_at: now,
                    })
                };
                let package_events = execute(&mut package, &command)?;
                if package_events.is_empty() {
                    continue;
                }

                envelopes.extend(envelopes_for(
                    package_id.0,
                    "fulfillment.package",
                    package_base,
                    &package_events,
                ));
                batch = batch.put_package(ExpectedVersion::Exact(package_base), package);
            }
        }

        batch = batch.put_shipment(ExpectedVersion::Exact(base_version), shipment);
        self.store.commit(batch)?;
        publish_all(&self.bus, envelopes);

        tracing::info!(%shipment_id, ?kind, "shipment advanced");
        Ok(())
    }

    fn load_members(&self, shipment: &Shipment) -> DomainResult<Vec<Package>> {
        shipment
            .package_ids()
            .iter()
            .map(|id| self.package(*id))
            .collect()
    }

    /// A package may be claimed by at most one active shipment.
    fn ensure_unclaimed(&self, package_ids: &[PackageId]) -> DomainResult<()> {
        let shipments = self.store.shipments()?;
        for package_id in package_ids {
            if let Some(holder) = shipments
                .iter()
                .find(|s| s.is_active() && s.carries(*package_id))
            {
                return Err(DomainError::conflict(format!(
                    "package {package_id} is already claimed by shipment {}",
                    holder.id_typed()
                )));
            }
        }
        Ok(())
    }

    fn run_package(
        &self,
        package_id: PackageId,
        make: impl FnOnce(PackageId) -> PackageCommand,
    ) -> DomainResult<()> {
        let mut package = self.package(package_id)?;
        let base_version = package.version();
        let events = execute(&mut package, &make(package_id))?;
        if events.is_empty() {
            return Ok(());
        }

        let envelopes = envelopes_for(
            package_id.0,
            "fulfillment.package",
            base_version,
            &events,
        );
        self.store.commit(
            CommitBatch::default().put_package(ExpectedVersion::Exact(base_version), package),
        )?;
        publish_all(&self.bus, envelopes);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CascadeKind {
    Depart,
    Arrive,
    Close,
}
