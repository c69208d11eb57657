//! `registrar-core` — Shared domain types for the reconciliation engine.
//!
//! Types only: entity identities, attribute bags, patch geometry.
//! No IO, no engine logic.

pub mod entity;
pub mod geometry;

pub use entity::{AttrBag, EntityKind, RegistryEntity, UnrecognizedAttr};
pub use geometry::{multi_wkt, Polygon};
