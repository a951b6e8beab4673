use std::collections::HashMap;
use std::sync::RwLock;

use groupbuy_carts::{Cart, CartId};
use groupbuy_core::{AggregateRoot, TrackingKind, TrackingNumber};
use groupbuy_fulfillment::{Package, PackageId, Shipment, ShipmentId};
use groupbuy_lots::{Lot, LotId};

use super::r#trait::{CommitBatch, EntityStore, EntityWrite, StoreError};

#[derive(Debug, Default)]
struct Tables {
    carts: HashMap<CartId, Cart>,
    lots: HashMap<LotId, Lot>,
    packages: HashMap<PackageId, Package>,
    shipments: HashMap<ShipmentId, Shipment>,
    lot_seq: u64,
    package_seq: u64,
    shipment_seq: u64,
}

impl Tables {
    fn current_version(&self, write: &EntityWrite) -> u64 {
        match write {
            EntityWrite::Cart { state, .. } => self
                .carts
                .get(&state.id_typed())
                .map(|c| c.version())
                .unwrap_or(0),
            EntityWrite::Lot { state, .. } => self
                .lots
                .get(&state.id_typed())
                .map(|l| l.version())
                .unwrap_or(0),
            EntityWrite::Package { state, .. } => self
                .packages
                .get(&state.id_typed())
                .map(|p| p.version())
                .unwrap_or(0),
            EntityWrite::Shipment { state, .. } => self
                .shipments
                .get(&state.id_typed())
                .map(|s| s.version())
                .unwrap_or(0),
            EntityWrite::RemoveCart { id, .. } => {
                self.carts.get(id).map(|c| c.version()).unwrap_or(0)
            }
        }
    }
}

/// In-memory entity store.
///
/// Intended for tests/dev and the reference API. A single `RwLock` is the
/// critical section: commits validate every expected version, then apply
/// all writes before releasing the guard, so readers never observe a
/// partial batch and commits touching the same entities serialize.
#[derive(Debug, Default)]
pub struct InMemoryEntityStore {
    tables: RwLock<Tables>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))
    }
}

impl EntityStore for InMemoryEntityStore {
    fn commit(&self, batch: CommitBatch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut tables = self
            .tables
            .write()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))?;

        // Validate every write before applying any.
        for (idx, write) in batch.writes.iter().enumerate() {
            let expected = match write {
                EntityWrite::Cart { expected, .. }
                | EntityWrite::Lot { expected, .. }
                | EntityWrite::Package { expected, .. }
                | EntityWrite::Shipment { expected, .. }
                | EntityWrite::RemoveCart { expected, .. } => *expected,
            };
            let current = tables.current_version(write);
            if !expected.matches(current) {
                return Err(StoreError::Conflict(format!(
                    "write {idx}: expected {expected:?}, found {current}"
                )));
            }
        }

        for write in batch.writes {
            match write {
                EntityWrite::Cart { state, .. } => {
                    tables.carts.insert(state.id_typed(), state);
                }
                EntityWrite::Lot { state, .. } => {
                    tables.lots.insert(state.id_typed(), state);
                }
                EntityWrite::Package { state, .. } => {
                    tables.packages.insert(state.id_typed(), state);
                }
                EntityWrite::Shipment { state, .. } => {
                    tables.shipments.insert(state.id_typed(), state);
                }
                EntityWrite::RemoveCart { id, .. } => {
                    tables.carts.remove(&id);
                }
            }
        }

        Ok(())
    }

    fn cart(&self, id: CartId) -> Result<Option<Cart>, StoreError> {
        Ok(self.read()?.carts.get(&id).cloned())
    }

    fn carts(&self) -> Result<Vec<Cart>, StoreError> {
        let mut all: Vec<Cart> = self.read()?.carts.values().cloned().collect();
        all.sort_by_key(|c| c.id_typed());
        Ok(all)
    }

    fn lot(&self, id: LotId) -> Result<Option<Lot>, StoreError> {
        Ok(self.read()?.lots.get(&id).cloned())
    }

    fn lots(&self) -> Result<Vec<Lot>, StoreError> {
        let mut all: Vec<Lot> = self.read()?.lots.values().cloned().collect();
        all.sort_by_key(|l| l.id_typed());
        Ok(all)
    }

    fn package(&self, id: PackageId) -> Result<Option<Package>, StoreError> {
        Ok(self.read()?.packages.get(&id).cloned())
    }

    fn packages(&self) -> Result<Vec<Package>, StoreError> {
        let mut all: Vec<Package> = self.read()?.packages.values().cloned().collect();
        all.sort_by_key(|p| p.id_typed());
        Ok(all)
    }

    fn shipment(&self, id: ShipmentId) -> Result<Option<Shipment>, StoreError> {
        Ok(self.read()?.shipments.get(&id).cloned())
    }

    fn shipments(&self) -> Result<Vec<Shipment>, StoreError> {
        let mut all: Vec<Shipment> = self.read()?.shipments.values().cloned().collect();
        all.sort_by_key(|s| s.id_typed());
        Ok(all)
    }

    fn next_tracking(
        &self,
        kind: TrackingKind,
        year: i32,
    ) -> Result<TrackingNumber, StoreError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))?;

        let counter = match kind {
            TrackingKind::Lot => &mut tables.lot_seq,
            TrackingKind::Package => &mut tables.package_seq,
            TrackingKind::Shipment => &mut tables.shipment_seq,
        };

        // One allocation per created record; a gap from an aborted commit
        // is fine, reuse is not.
        *counter += 1;
        Ok(TrackingNumber::new(kind, year, *counter))
    }
}
