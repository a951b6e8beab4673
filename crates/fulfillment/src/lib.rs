//! Fulfillment domain module: packages and shipments.
//!
//! A package is a physical unit cut from one lot; a shipment is a
//! carrier-assigned transport unit over packages, possibly spanning lots.
//! Shipment transitions cascade onto member packages - the cascade itself
//! is orchestrated by the fulfillment service so parent and children commit
//! in one batch; this crate only provides the per-entity state machines.

pub mod package;
pub mod shipment;

pub use package::{
    CreatePackage, ForceDelivered, ForceInTransit, MarkDelivered, MarkInTransit,
    MarkReadyForPickup, Package, PackageCommand, PackageCreated, PackageDelivered,
    PackageDeparted, PackageEvent, PackageId, PackageReadied, PackageStatus,
};
pub use shipment::{
    AddPackage, AssembleShipment, CarrierId, Close, Depart, DestinationId, MarkArrived,
    PackageAddedToShipment, Shipment, ShipmentArrived, ShipmentAssembled, ShipmentClosed,
    ShipmentCommand, ShipmentDeparted, ShipmentEvent, ShipmentId, ShipmentStatus,
};
