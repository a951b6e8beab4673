//! Domain error model.

use thiserror::Error;
use uuid::Uuid;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every variant except `Conflict` and `Unavailable` is a deterministic
/// business-rule failure: it is not retryable and must be surfaced to the
/// operator/buyer as-is. `Conflict` (stale version) and `Unavailable`
/// (backing store trouble) are eligible for caller-side retry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input, quantity not a
    /// multiple of the product's minimum fraction).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An attempted state change violates the ordered state machine.
    #[error("invalid {entity} transition: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    /// Promotion to ready-to-order attempted while at least one product in
    /// the lot is short of its supplier minimum order quantity.
    #[error("minimum order quantity not met for products {short_products:?}")]
    MoqNotMet { short_products: Vec<Uuid> },

    /// Shipment assembly referenced packages that are not ready for pickup.
    #[error("packages not ready for pickup: {package_ids:?}")]
    PackageNotReady { package_ids: Vec<Uuid> },

    /// Closing a shipment while member packages are still undelivered.
    #[error("packages not yet delivered: {package_ids:?}")]
    PackagesNotDelivered { package_ids: Vec<Uuid> },

    /// A cart item references a product of a different supplier than the
    /// lot it was assigned to. Defensive: unreachable through the
    /// consolidation path.
    #[error("supplier mismatch: lot belongs to {expected}, item belongs to {found}")]
    SupplierMismatch { expected: Uuid, found: Uuid },

    /// A referenced cart/lot/package/shipment/product does not exist.
    #[error("not found")]
    NotFound,

    /// Optimistic concurrency failure (stale version). Retryable after
    /// re-reading.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The backing store is unavailable. Retryable with backoff.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_transition(
        entity: &'static str,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self::InvalidTransition {
            entity,
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    /// Whether a caller may retry the failed operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::Unavailable(_))
    }
}
