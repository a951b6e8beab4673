use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use groupbuy_core::{AggregateId, DomainError, DomainResult, ValueObject};

/// Product identifier (catalog-owned).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Supplier identifier (catalog-owned, opaque to the engine).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupplierId(pub AggregateId);

impl SupplierId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SupplierId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Catalog fact for one product, immutable per snapshot.
///
/// Quantities are expressed in base units; a buyer's quantity must be a
/// positive multiple of `min_fraction_per_user`. Prices are in the smallest
/// currency unit (e.g., cents).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub product_id: ProductId,
    pub supplier_id: SupplierId,
    pub name: String,
    /// Unit shown to buyers (e.g., "kg").
    pub customer_unit: String,
    /// Minimum quantity a single buyer must order.
    pub customer_moq: u64,
    /// Unit the supplier sells in (e.g., "pallet").
    pub supplier_unit: String,
    /// Threshold a lot must reach before the supplier will fulfil.
    pub supplier_moq: u64,
    /// Smallest quantity step a single buyer may contribute.
    pub min_fraction_per_user: u64,
    pub price: u64,
    pub public_price: u64,
}

impl ProductRecord {
    /// Validate catalog-side invariants before the record is served.
    pub fn validate(&self) -> DomainResult<()> {
        if self.min_fraction_per_user == 0 {
            return Err(DomainError::validation(
                "min_fraction_per_user must be at least 1",
            ));
        }
        if self.supplier_moq == 0 {
            return Err(DomainError::validation("supplier_moq must be at least 1"));
        }
        if self.customer_moq == 0 {
            return Err(DomainError::validation("customer_moq must be at least 1"));
        }
        Ok(())
    }

    /// Capture the pricing/threshold facts a cart item needs, frozen at
    /// `captured_at`.
    pub fn snapshot(&self, captured_at: DateTime<Utc>) -> ProductSnapshot {
        ProductSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            product_id: self.product_id,
            supplier_id: self.supplier_id,
            unit: self.customer_unit.clone(),
            price: self.price,
            public_price: self.public_price,
            customer_moq: self.customer_moq,
            min_fraction_per_user: self.min_fraction_per_user,
            supplier_moq: self.supplier_moq,
            captured_at,
        }
    }
}

/// Schema version stamped into every snapshot.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// Typed, versioned snapshot of a product at add-to-cart time.
///
/// Carried by the cart item so that price and pooling thresholds stay fixed
/// even when the catalog record is edited later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub schema_version: u32,
    pub product_id: ProductId,
    pub supplier_id: SupplierId,
    pub unit: String,
    pub price: u64,
    pub public_price: u64,
    pub customer_moq: u64,
    pub min_fraction_per_user: u64,
    pub supplier_moq: u64,
    pub captured_at: DateTime<Utc>,
}

impl ProductSnapshot {
    /// Whether a buyer-supplied quantity satisfies the divisibility and
    /// customer-minimum constraints captured in this snapshot.
    pub fn accepts_quantity(&self, quantity: u64) -> bool {
        quantity >= self.customer_moq
            && quantity % self.min_fraction_per_user == 0
    }
}

impl ValueObject for ProductSnapshot {}
