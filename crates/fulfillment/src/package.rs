use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use groupbuy_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TrackingNumber};
use groupbuy_events::Event;
use groupbuy_lots::LotId;

/// Package identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageId(pub AggregateId);

impl PackageId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PackageId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Package status lifecycle, strictly ordered for the explicit path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageStatus {
    Created,
    ReadyForPickup,
    InTransit,
    Delivered,
}

/// Aggregate root: Package.
///
/// Belongs to exactly one lot. Advances either through explicit operator
/// steps (guarded) or through shipment cascades (forced).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    id: PackageId,
    tracking_number: Option<TrackingNumber>,
    lot_id: Option<LotId>,
    status: PackageStatus,
    weight_grams: u64,
    volume_cm3: u64,
    version: u64,
    created: bool,
}

impl Package {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PackageId) -> Self {
        Self {
            id,
            tracking_number: None,
            lot_id: None,
            status: PackageStatus::Created,
            weight_grams: 0,
            volume_cm3: 0,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PackageId {
        self.id
    }

    pub fn tracking_number(&self) -> Option<&TrackingNumber> {
        self.tracking_number.as_ref()
    }

    pub fn lot_id(&self) -> Option<LotId> {
        self.lot_id
    }

    pub fn status(&self) -> PackageStatus {
        self.status
    }

    pub fn weight_grams(&self) -> u64 {
        self.weight_grams
    }

    pub fn volume_cm3(&self) -> u64 {
        self.volume_cm3
    }
}

impl AggregateRoot for Package {
    type Id = PackageId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreatePackage (issued by the packaging flow).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePackage {
    pub package_id: PackageId,
    pub lot_id: LotId,
    pub tracking_number: TrackingNumber,
    pub weight_grams: u64,
    pub volume_cm3: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkReadyForPickup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkReadyForPickup {
    pub package_id: PackageId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkInTransit (explicit step, requires ready-for-pickup).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkInTransit {
    pub package_id: PackageId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkDelivered (explicit step, requires in-transit).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkDelivered {
    pub package_id: PackageId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ForceInTransit (shipment departure cascade; no guard on the
/// prior status).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForceInTransit {
    pub package_id: PackageId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ForceDelivered (shipment arrival cascade; no guard on the
/// prior status).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForceDelivered {
    pub package_id: PackageId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackageCommand {
    CreatePackage(CreatePackage),
    MarkReadyForPickup(MarkReadyForPickup),
    MarkInTransit(MarkInTransit),
    MarkDelivered(MarkDelivered),
    ForceInTransit(ForceInTransit),
    ForceDelivered(ForceDelivered),
}

/// Event: PackageCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageCreated {
    pub package_id: PackageId,
    pub lot_id: LotId,
    pub tracking_number: TrackingNumber,
    pub weight_grams: u64,
    pub volume_cm3: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PackageReadied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageReadied {
    pub package_id: PackageId,
    pub from: PackageStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PackageDeparted. Emitted by the explicit step and by the
/// departure cascade alike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDeparted {
    pub package_id: PackageId,
    pub from: PackageStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PackageDelivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDelivered {
    pub package_id: PackageId,
    pub from: PackageStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackageEvent {
    PackageCreated(PackageCreated),
    PackageReadied(PackageReadied),
    PackageDeparted(PackageDeparted),
    PackageDelivered(PackageDelivered),
}

impl Event for PackageEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PackageEvent::PackageCreated(_) => "fulfillment.package.created",
            PackageEvent::PackageReadied(_) => "fulfillment.package.ready_for_pickup",
            PackageEvent::PackageDeparted(_) => "fulfillment.package.in_transit",
            PackageEvent::PackageDelivered(_) => "fulfillment.package.delivered",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PackageEvent::PackageCreated(e) => e.occurred_at,
            PackageEvent::PackageReadied(e) => e.occurred_at,
            PackageEvent::PackageDeparted(e) => e.occurred_at,
            PackageEvent::PackageDelivered(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Package {
    type Command = PackageCommand;
    type Event = PackageEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PackageEvent::PackageCreated(e) => {
                self.id = e.package_id;
                self.lot_id = Some(e.lot_id);
                self.tracking_number = Some(e.tracking_number.clone());
                self.status = PackageStatus::Created;
                self.weight_grams = e.weight_grams;
                self.volume_cm3 = e.volume_cm3;
                self.created = true;
            }
            PackageEvent::PackageReadied(_) => {
                self.status = PackageStatus::ReadyForPickup;
            }
            PackageEvent::PackageDeparted(_) => {
                self.status = PackageStatus::InTransit;
            }
            PackageEvent::PackageDelivered(_) => {
                self.status = PackageStatus::Delivered;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PackageCommand::CreatePackage(cmd) => self.handle_create(cmd),
            PackageCommand::MarkReadyForPickup(cmd) => self.handle_mark_ready(cmd),
            PackageCommand::MarkInTransit(cmd) => self.handle_mark_in_transit(cmd),
            PackageCommand::MarkDelivered(cmd) => self.handle_mark_delivered(cmd),
            PackageCommand::ForceInTransit(cmd) => self.handle_force_in_transit(cmd),
            PackageCommand::ForceDelivered(cmd) => self.handle_force_delivered(cmd),
        }
    }
}

impl Package {
    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn ensure_package_id(&self, package_id: PackageId) -> Result<(), DomainError> {
        if self.id != package_id {
            return Err(DomainError::validation("package_id mismatch"));
        }
        Ok(())
    }

    fn ensure_status(
        &self,
        expected: PackageStatus,
        target: PackageStatus,
    ) -> Result<(), DomainError> {
        if self.status != expected {
            return Err(DomainError::invalid_transition(
                "package",
                format!("{:?}", self.status),
                format!("{target:?}"),
            ));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreatePackage) -> Result<Vec<PackageEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("package already exists"));
        }

        Ok(vec![PackageEvent::PackageCreated(PackageCreated {
            package_id: cmd.package_id,
            lot_id: cmd.lot_id,
            tracking_number: cmd.tracking_number.clone(),
            weight_grams: cmd.weight_grams,
            volume_cm3: cmd.volume_cm3,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_ready(&self, cmd: &MarkReadyForPickup) -> Result<Vec<PackageEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_package_id(cmd.package_id)?;
        self.ensure_status(PackageStatus::Created, PackageStatus::ReadyForPickup)?;

        Ok(vec![PackageEvent::PackageReadied(PackageReadied {
            package_id: cmd.package_id,
            from: self.status,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_in_transit(&self, cmd: &MarkInTransit) -> Result<Vec<PackageEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_package_id(cmd.package_id)?;
        self.ensure_status(PackageStatus::ReadyForPickup, PackageStatus::InTransit)?;

        Ok(vec![PackageEvent::PackageDeparted(PackageDeparted {
            package_id: cmd.package_id,
            from: self.status,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_delivered(&self, cmd: &MarkDelivered) -> Result<Vec<PackageEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_package_id(cmd.package_id)?;
        self.ensure_status(PackageStatus::InTransit, PackageStatus::Delivered)?;

        Ok(vec![PackageEvent::PackageDelivered(PackageDelivered {
            package_id: cmd.package_id,
            from: self.status,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_force_in_transit(&self, cmd: &ForceInTransit) -> Result<Vec<PackageEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_package_id(cmd.package_id)?;

        // Cascade overwrite: no guard, but already-in-transit is a no-op.
        if self.status == PackageStatus::InTransit {
            return Ok(vec![]);
        }

        Ok(vec![PackageEvent::PackageDeparted(PackageDeparted {
            package_id: cmd.package_id,
            from: self.status,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_force_delivered(&self, cmd: &ForceDelivered) -> Result<Vec<PackageEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_package_id(cmd.package_id)?;

        if self.status == PackageStatus::Delivered {
            return Ok(vec![]);
        }

        Ok(vec![PackageEvent::PackageDelivered(PackageDelivered {
            package_id: cmd.package_id,
            from: self.status,
            occurred_at: cmd.occurred_at,
        })])
    }
}
