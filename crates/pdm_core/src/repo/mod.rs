//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the store contract consumed by the definition service.
//! - Isolate SQLite query details from version resolution.
//!
//! # Invariants
//! - Every backend enforces lineage version uniqueness itself.
//! - Repository APIs return semantic errors (`NotFound`, `UniqueViolation`)
//!   in addition to DB transport errors.

pub mod definition_repo;
pub mod memory_repo;
