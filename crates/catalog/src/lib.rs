//! Catalog Provider boundary.
//!
//! The storefront catalog is an external collaborator: the engine only
//! reads product records through [`CatalogProvider`] and captures typed
//! snapshots of them at add-to-cart time. Catalog edits never retroactively
//! change historical pricing or pooling thresholds.

pub mod product;
pub mod provider;

pub use product::{ProductId, ProductRecord, ProductSnapshot, SupplierId, SNAPSHOT_SCHEMA_VERSION};
pub use provider::{CatalogProvider, InMemoryCatalog};
