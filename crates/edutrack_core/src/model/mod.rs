//! Study-tracking domain model.
//!
//! # Responsibility
//! - Define the document shapes mirrored from the per-user document store.
//! - Provide constructors that mint client-side identities.
//!
//! # Invariants
//! - Every entity carries a client-generated, globally unique string `id`.
//! - Papers and chapters have no storage identity of their own; they only
//!   exist embedded in a subject document.
//! - Wire field names are camelCase (`progressItems`, `isCompleted`, ...).

pub mod exam;
pub mod subject;

use uuid::Uuid;

/// Opaque identity shared by all entities.
///
/// Generated client-side; the store never assigns one on its own except when
/// duplicating a chapter.
pub type EntityId = String;

/// Mints a fresh UUID v4 identity string.
pub fn new_entity_id() -> EntityId {
    Uuid::new_v4().to_string()
}
