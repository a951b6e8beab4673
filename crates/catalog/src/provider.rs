use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use groupbuy_core::{DomainError, DomainResult};

use crate::product::{ProductId, ProductRecord};

/// Read-only catalog boundary the engine consumes.
pub trait CatalogProvider: Send + Sync {
    /// Fetch one product record. `NotFound` if the catalog does not know it.
    fn product(&self, id: ProductId) -> DomainResult<ProductRecord>;
}

impl<C> CatalogProvider for Arc<C>
where
    C: CatalogProvider + ?Sized,
{
    fn product(&self, id: ProductId) -> DomainResult<ProductRecord> {
        (**self).product(id)
    }
}

/// In-memory catalog for tests/dev and the reference API.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    records: RwLock<HashMap<ProductId, ProductRecord>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record after validating it.
    pub fn upsert(&self, record: ProductRecord) -> DomainResult<()> {
        record.validate()?;
        let mut records = self
            .records
            .write()
            .map_err(|_| DomainError::unavailable("catalog lock poisoned"))?;
        records.insert(record.product_id, record);
        Ok(())
    }

    pub fn list(&self) -> Vec<ProductRecord> {
        match self.records.read() {
            Ok(records) => {
                let mut all: Vec<_> = records.values().cloned().collect();
                all.sort_by_key(|r| r.product_id);
                all
            }
            Err(_) => vec![],
        }
    }
}

impl CatalogProvider for InMemoryCatalog {
    fn product(&self, id: ProductId) -> DomainResult<ProductRecord> {
        let records = self
            .records
            .read()
            .map_err(|_| DomainError::unavailable("catalog lock poisoned"))?;
        records.get(&id).cloned().ok_or(DomainError::NotFound)
    }
}
