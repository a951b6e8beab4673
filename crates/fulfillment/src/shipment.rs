use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use groupbuy_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TrackingNumber};
use groupbuy_events::Event;

use crate::package::PackageId;

/// Shipment identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShipmentId(pub AggregateId);

impl ShipmentId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ShipmentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Carrier reference (collaborator-owned, opaque to the engine).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CarrierId(pub AggregateId);

impl CarrierId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

/// Destination address reference (collaborator-owned, opaque to the engine).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DestinationId(pub AggregateId);

impl DestinationId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

/// Shipment status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Assembling,
    InTransit,
    Arrived,
    Closed,
}

/// Aggregate root: Shipment.
///
/// Membership is fixed at assembly; later additions go through the explicit
/// `AddPackage` command while still assembling. Whether member packages are
/// actually ready, unclaimed or delivered is checked by the fulfillment
/// service - this aggregate cannot see its siblings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shipment {
    id: ShipmentId,
    tracking_number: Option<TrackingNumber>,
    carrier_id: Option<CarrierId>,
    destination: Option<DestinationId>,
    status: ShipmentStatus,
    package_ids: Vec<PackageId>,
    eta: Option<DateTime<Utc>>,
    started_at: Option<DateTime<Utc>>,
    arrived_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Shipment {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ShipmentId) -> Self {
        Self {
            id,
            tracking_number: None,
            carrier_id: None,
            destination: None,
            status: ShipmentStatus::Assembling,
            package_ids: Vec::new(),
            eta: None,
            started_at: None,
            arrived_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ShipmentId {
        self.id
    }

    pub fn tracking_number(&self) -> Option<&TrackingNumber> {
        self.tracking_number.as_ref()
    }

    pub fn carrier_id(&self) -> Option<CarrierId> {
        self.carrier_id
    }

    pub fn destination(&self) -> Option<DestinationId> {
        self.destination
    }

    pub fn status(&self) -> ShipmentStatus {
        self.status
    }

    pub fn package_ids(&self) -> &[PackageId] {
        &self.package_ids
    }

    pub fn carries(&self, package_id: PackageId) -> bool {
        self.package_ids.contains(&package_id)
    }

    pub fn eta(&self) -> Option<DateTime<Utc>> {
        self.eta
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn arrived_at(&self) -> Option<DateTime<Utc>> {
        self.arrived_at
    }

    /// A shipment holds its claim on member packages until it is closed.
    pub fn is_active(&self) -> bool {
        self.created && self.status != ShipmentStatus::Closed
    }
}

impl AggregateRoot for Shipment {
    type Id = ShipmentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: AssembleShipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssembleShipment {
    pub shipment_id: ShipmentId,
    pub tracking_number: TrackingNumber,
    pub carrier_id: CarrierId,
    pub destination: DestinationId,
    pub package_ids: Vec<PackageId>,
    pub eta: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddPackage (only while assembling).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddPackage {
    pub shipment_id: ShipmentId,
    pub package_id: PackageId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Depart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Depart {
    pub shipment_id: ShipmentId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkArrived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkArrived {
    pub shipment_id: ShipmentId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Close (from arrived, or directly from in-transit).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Close {
    pub shipment_id: ShipmentId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShipmentCommand {
    AssembleShipment(AssembleShipment),
    AddPackage(AddPackage),
    Depart(Depart),
    MarkArrived(MarkArrived),
    Close(Close),
}

/// Event: ShipmentAssembled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentAssembled {
    pub shipment_id: ShipmentId,
    pub tracking_number: TrackingNumber,
    pub carrier_id: CarrierId,
    pub destination: DestinationId,
    pub package_ids: Vec<PackageId>,
    pub eta: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PackageAddedToShipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageAddedToShipment {
    pub shipment_id: ShipmentId,
    pub package_id: PackageId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ShipmentDeparted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentDeparted {
    pub shipment_id: ShipmentId,
    pub from: ShipmentStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ShipmentArrived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentArrived {
    pub shipment_id: ShipmentId,
    pub from: ShipmentStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ShipmentClosed. When closing directly from in-transit this also
/// stamps `arrived_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentClosed {
    pub shipment_id: ShipmentId,
    pub from: ShipmentStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShipmentEvent {
    ShipmentAssembled(ShipmentAssembled),
    PackageAddedToShipment(PackageAddedToShipment),
    ShipmentDeparted(ShipmentDeparted),
    ShipmentArrived(ShipmentArrived),
    ShipmentClosed(ShipmentClosed),
}

impl Event for ShipmentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ShipmentEvent::ShipmentAssembled(_) => "fulfillment.shipment.assembled",
            ShipmentEvent::PackageAddedToShipment(_) => "fulfillment.shipment.package_added",
            ShipmentEvent::ShipmentDeparted(_) => "fulfillment.shipment.in_transit",
            ShipmentEvent::ShipmentArrived(_) => "fulfillment.shipment.arrived",
            ShipmentEvent::ShipmentClosed(_) => "fulfillment.shipment.closed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ShipmentEvent::ShipmentAssembled(e) => e.occurred_at,
            ShipmentEvent::PackageAddedToShipment(e) => e.occurred_at,
            ShipmentEvent::ShipmentDeparted(e) => e.occurred_at,
            ShipmentEvent::ShipmentArrived(e) => e.occurred_at,
            ShipmentEvent::ShipmentClosed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Shipment {
    type Command = ShipmentCommand;
    type Event = ShipmentEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ShipmentEvent::ShipmentAssembled(e) => {
                self.id = e.shipment_id;
                self.tracking_number = Some(e.tracking_number.clone());
                self.carrier_id = Some(e.carrier_id);
                self.destination = Some(e.destination);
                self.status = ShipmentStatus::Assembling;
                self.package_ids = e.package_ids.clone();
                self.eta = e.eta;
                self.created = true;
            }
            ShipmentEvent::PackageAddedToShipment(e) => {
                self.package_ids.push(e.package_id);
            }
            ShipmentEvent::ShipmentDeparted(e) => {
                self.status = ShipmentStatus::InTransit;
                self.started_at.get_or_insert(e.occurred_at);
            }
            ShipmentEvent::ShipmentArrived(e) => {
                self.status = ShipmentStatus::Arrived;
                self.arrived_at.get_or_insert(e.occurred_at);
            }
            ShipmentEvent::ShipmentClosed(e) => {
                self.status = ShipmentStatus::Closed;
                self.arrived_at.get_or_insert(e.occurred_at);
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ShipmentCommand::AssembleShipment(cmd) => self.handle_assemble(cmd),
            ShipmentCommand::AddPackage(cmd) => self.handle_add_package(cmd),
            ShipmentCommand::Depart(cmd) => self.handle_depart(cmd),
            ShipmentCommand::MarkArrived(cmd) => self.handle_mark_arrived(cmd),
            ShipmentCommand::Close(cmd) => self.handle_close(cmd),
        }
    }
}

impl Shipment {
    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn ensure_shipment_id(&self, shipment_id: ShipmentId) -> Result<(), DomainError> {
        if self.id != shipment_id {
            return Err(DomainError::validation("shipment_id mismatch"));
        }
        Ok(())
    }

    fn handle_assemble(&self, cmd: &AssembleShipment) -> Result<Vec<ShipmentEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("shipment already exists"));
        }

        if cmd.package_ids.is_empty() {
            return Err(DomainError::validation(
                "cannot assemble a shipment without packages",
            ));
        }

        let mut deduped = cmd.package_ids.clone();
        deduped.sort();
        deduped.dedup();
        if deduped.len() != cmd.package_ids.len() {
            return Err(DomainError::validation(
                "duplicate package ids in shipment assembly",
            ));
        }

        Ok(vec![ShipmentEvent::ShipmentAssembled(ShipmentAssembled {
            shipment_id: cmd.shipment_id,
            tracking_number: cmd.tracking_number.clone(),
            carrier_id: cmd.carrier_id,
            destination: cmd.destination,
            package_ids: cmd.package_ids.clone(),
            eta: cmd.eta,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_package(&self, cmd: &AddPackage) -> Result<Vec<ShipmentEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_shipment_id(cmd.shipment_id)?;

        if self.status != ShipmentStatus::Assembling {
            return Err(DomainError::validation(
                "packages can only be added while the shipment is assembling",
            ));
        }

        if self.carries(cmd.package_id) {
            return Err(DomainError::conflict(
                "package is already part of this shipment",
            ));
        }

        Ok(vec![ShipmentEvent::PackageAddedToShipment(
            PackageAddedToShipment {
                shipment_id: cmd.shipment_id,
                package_id: cmd.package_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_depart(&self, cmd: &Depart) -> Result<Vec<ShipmentEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_shipment_id(cmd.shipment_id)?;

        if self.status != ShipmentStatus::Assembling {
            return Err(DomainError::invalid_transition(
                "shipment",
                format!("{:?}", self.status),
                format!("{:?}", ShipmentStatus::InTransit),
            ));
        }

        Ok(vec![ShipmentEvent::ShipmentDeparted(ShipmentDeparted {
            shipment_id: cmd.shipment_id,
            from: self.status,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_arrived(&self, cmd: &MarkArrived) -> Result<Vec<ShipmentEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_shipment_id(cmd.shipment_id)?;

        if self.status != ShipmentStatus::InTransit {
            return Err(DomainError::invalid_transition(
                "shipment",
                format!("{:?}", self.status),
                format!("{:?}", ShipmentStatus::Arrived),
            ));
        }

        Ok(vec![ShipmentEvent::ShipmentArrived(ShipmentArrived {
            shipment_id: cmd.shipment_id,
            from: self.status,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_close(&self, cmd: &Close) -> Result<Vec<ShipmentEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_shipment_id(cmd.shipment_id)?;

        if !matches!(
            self.status,
            ShipmentStatus::InTransit | ShipmentStatus::Arrived
        ) {
            return Err(DomainError::invalid_transition(
                "shipment",
                format!("{:?}", self.status),
                format!("{:?}", ShipmentStatus::Closed),
            ));
        }

        Ok(vec![ShipmentEvent::ShipmentClosed(ShipmentClosed {
            shipment_id: cmd.shipment_id,
            from: self.status,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use groupbuy_core::TrackingKind;
    use groupbuy_events::execute;

    fn package_ids(n: usize) -> Vec<PackageId> {
        (0..n).map(|_| PackageId::new(AggregateId::new())).collect()
    }

    fn assemble(packages: Vec<PackageId>) -> Shipment {
        let shipment_id = ShipmentId::new(AggregateId::new());
        let mut shipment = Shipment::empty(shipment_id);
        execute(
            &mut shipment,
            &ShipmentCommand::AssembleShipment(AssembleShipment {
                shipment_id,
                tracking_number: TrackingNumber::new(TrackingKind::Shipment, 2025, 3),
                carrier_id: CarrierId::new(AggregateId::new()),
                destination: DestinationId::new(AggregateId::new()),
                package_ids: packages,
                eta: None,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        shipment
    }

    #[test]
    fn assembly_fixes_membership_and_starts_assembling() {
        let packages = package_ids(2);
        let shipment = assemble(packages.clone());
        assert_eq!(shipment.status(), ShipmentStatus::Assembling);
        assert_eq!(shipment.package_ids(), packages.as_slice());
        assert_eq!(
            shipment.tracking_number().unwrap().as_str(),
            "SHIP-2025-0003"
        );
    }

    #[test]
    fn assembly_without_packages_is_rejected() {
        let shipment = Shipment::empty(ShipmentId::new(AggregateId::new()));
        let err = shipment
            .handle(&ShipmentCommand::AssembleShipment(AssembleShipment {
                shipment_id: shipment.id_typed(),
                tracking_number: TrackingNumber::new(TrackingKind::Shipment, 2025, 4),
                carrier_id: CarrierId::new(AggregateId::new()),
                destination: DestinationId::new(AggregateId::new()),
                package_ids: vec![],
                eta: None,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn add_package_only_while_assembling() {
        let mut shipment = assemble(package_ids(1));
        let shipment_id = shipment.id_typed();
        let extra = PackageId::new(AggregateId::new());
        execute(
            &mut shipment,
            &ShipmentCommand::AddPackage(AddPackage {
                shipment_id,
                package_id: extra,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        assert!(shipment.carries(extra));

        execute(
            &mut shipment,
            &ShipmentCommand::Depart(Depart {
                shipment_id,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        let err = shipment
            .handle(&ShipmentCommand::AddPackage(AddPackage {
                shipment_id: shipment.id_typed(),
                package_id: PackageId::new(AggregateId::new()),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn depart_sets_started_at_once() {
        let mut shipment = assemble(package_ids(1));
        let shipment_id = shipment.id_typed();
        execute(
            &mut shipment,
            &ShipmentCommand::Depart(Depart {
                shipment_id,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        assert_eq!(shipment.status(), ShipmentStatus::InTransit);
        assert!(shipment.started_at().is_some());
        assert!(shipment.arrived_at().is_none());
    }

    #[test]
    fn close_directly_from_in_transit_stamps_arrived_at() {
        let mut shipment = assemble(package_ids(1));
        let shipment_id = shipment.id_typed();
        execute(
            &mut shipment,
            &ShipmentCommand::Depart(Depart {
                shipment_id,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        execute(
            &mut shipment,
            &ShipmentCommand::Close(Close {
                shipment_id,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        assert_eq!(shipment.status(), ShipmentStatus::Closed);
        assert!(shipment.arrived_at().is_some());
        assert!(!shipment.is_active());
    }

    #[test]
    fn closing_while_assembling_is_an_invalid_transition() {
        let shipment = assemble(package_ids(1));
        let err = shipment
            .handle(&ShipmentCommand::Close(Close {
                shipment_id: shipment.id_typed(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
    }
}
