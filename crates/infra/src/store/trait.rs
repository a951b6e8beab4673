use thiserror::Error;

use groupbuy_carts::{Cart, CartId};
use groupbuy_core::{DomainError, ExpectedVersion, TrackingKind, TrackingNumber};
use groupbuy_fulfillment::{Package, PackageId, Shipment, ShipmentId};
use groupbuy_lots::{Lot, LotId};
use std::sync::Arc;

/// Entity store operation error.
///
/// Infrastructure failures only; business-rule failures never originate
/// here. `Conflict` marks a failed optimistic concurrency check and is
/// retryable after reloading; `Unavailable` marks backing-store trouble and
/// is retryable with backoff.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for DomainError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) => DomainError::Conflict(msg),
            StoreError::Unavailable(msg) => DomainError::Unavailable(msg),
        }
    }
}

/// One versioned write within a commit batch.
///
/// `expected` is the version the entity must still have at commit time -
/// `Exact(0)` for inserts. The written state is the aggregate after its
/// events were applied.
#[derive(Debug, Clone)]
pub enum EntityWrite {
    Cart {
        expected: ExpectedVersion,
        state: Cart,
    },
    Lot {
        expected: ExpectedVersion,
        state: Lot,
    },
    Package {
        expected: ExpectedVersion,
        state: Package,
    },
    Shipment {
        expected: ExpectedVersion,
        state: Shipment,
    },
    /// Remove a cart (draft deletion removes its items with it).
    RemoveCart {
        expected: ExpectedVersion,
        id: CartId,
    },
}

/// An atomic unit of work: every write applies, or none do.
#[derive(Debug, Clone, Default)]
pub struct CommitBatch {
    pub writes: Vec<EntityWrite>,
}

impl CommitBatch {
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn put_cart(mut self, expected: ExpectedVersion, state: Cart) -> Self {
        self.writes.push(EntityWrite::Cart { expected, state });
        self
    }

    pub fn put_lot(mut self, expected: ExpectedVersion, state: Lot) -> Self {
        self.writes.push(EntityWrite::Lot { expected, state });
        self
    }

    pub fn put_package(mut self, expected: ExpectedVersion, state: Package) -> Self {
        self.writes.push(EntityWrite::Package { expected, state });
        self
    }

    pub fn put_shipment(mut self, expected: ExpectedVersion, state: Shipment) -> Self {
        self.writes.push(EntityWrite::Shipment { expected, state });
        self
    }

    pub fn remove_cart(mut self, expected: ExpectedVersion, id: CartId) -> Self {
        self.writes.push(EntityWrite::RemoveCart { expected, id });
        self
    }
}

/// The four entity tables behind a transactional interface.
///
/// Implementations must:
/// - check every write's expected version before applying any
/// - apply all writes of a batch atomically (no partial writes observable)
/// - serialize concurrent commits touching the same entities
/// - allocate tracking sequences monotonically, never reusing them
pub trait EntityStore: Send + Sync {
    /// Apply a batch atomically. Fails the whole batch on the first
    /// version mismatch.
    fn commit(&self, batch: CommitBatch) -> Result<(), StoreError>;

    fn cart(&self, id: CartId) -> Result<Option<Cart>, StoreError>;
    fn carts(&self) -> Result<Vec<Cart>, StoreError>;

    fn lot(&self, id: LotId) -> Result<Option<Lot>, StoreError>;
    fn lots(&self) -> Result<Vec<Lot>, StoreError>;

    fn package(&self, id: PackageId) -> Result<Option<Package>, StoreError>;
    fn packages(&self) -> Result<Vec<Package>, StoreError>;

    fn shipment(&self, id: ShipmentId) -> Result<Option<Shipment>, StoreError>;
    fn shipments(&self) -> Result<Vec<Shipment>, StoreError>;

    /// Allocate the next tracking number of `kind` from the per-kind
    /// creation count.
    fn next_tracking(&self, kind: TrackingKind, year: i32)
        -> Result<TrackingNumber, StoreError>;
}

impl<S> EntityStore for Arc<S>
where
    S: EntityStore + ?Sized,
{
    fn commit(&self, batch: CommitBatch) -> Result<(), StoreError> {
        (**self).commit(batch)
    }

    fn cart(&self, id: CartId) -> Result<Option<Cart>, StoreError> {
        (**self).cart(id)
    }

    fn carts(&self) -> Result<Vec<Cart>, StoreError> {
        (**self).carts()
    }

    fn lot(&self, id: LotId) -> Result<Option<Lot>, StoreError> {
        (**self).lot(id)
    }

    fn lots(&self) -> Result<Vec<Lot>, StoreError> {
        (**self).lots()
    }

    fn package(&self, id: PackageId) -> Result<Option<Package>, StoreError> {
        (**self).package(id)
    }

    fn packages(&self) -> Result<Vec<Package>, StoreError> {
        (**self).packages()
    }

    fn shipment(&self, id: ShipmentId) -> Result<Option<Shipment>, StoreError> {
        (**self).shipment(id)
    }

    fn shipments(&self) -> Result<Vec<Shipment>, StoreError> {
        (**self).shipments()
    }

    fn next_tracking(
        &self,
        kind: TrackingKind,
        year: i32,
    ) -> Result<TrackingNumber, StoreError> {
        (**self).next_tracking(kind, year)
    }
}
