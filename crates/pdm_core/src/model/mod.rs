//! Domain model for versioned definition items.
//!
//! # Responsibility
//! - Define canonical data structures used by the resolver and the stores.
//! - Keep persisted and candidate shapes as two related records.
//!
//! # Invariants
//! - Persisted items are identified by a store-assigned `DefinitionItemId`.
//! - A lineage is the set of items sharing `(definition_id, tenant_id)`.

pub mod definition;
