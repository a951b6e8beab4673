//! Human-readable tracking numbers for lots, packages and shipments.
//!
//! The formats are consumed by downstream carrier integrations and
//! customer-facing displays and must stay bit-exact:
//! `LOT-<4-digit year>-<4-digit zero-padded sequence>`, likewise `PKG-` and
//! `SHIP-`. Sequences derive from a monotonically increasing per-kind
//! creation count and are never reused after deletion.

use serde::{Deserialize, Serialize};

use crate::value_object::ValueObject;

/// The kind of record a tracking number identifies.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingKind {
    Lot,
    Package,
    Shipment,
}

impl TrackingKind {
    pub fn prefix(self) -> &'static str {
        match self {
            TrackingKind::Lot => "LOT",
            TrackingKind::Package => "PKG",
            TrackingKind::Shipment => "SHIP",
        }
    }
}

/// A formatted tracking number, e.g. `LOT-2025-0001`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackingNumber(String);

impl TrackingNumber {
    /// Format a tracking number from its kind, year and sequence.
    ///
    /// Sequences wider than four digits render unpadded; they are still
    /// unique and monotonic.
    pub fn new(kind: TrackingKind, year: i32, sequence: u64) -> Self {
        Self(format!("{}-{:04}-{:04}", kind.prefix(), year, sequence))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for TrackingNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl ValueObject for TrackingNumber {}
