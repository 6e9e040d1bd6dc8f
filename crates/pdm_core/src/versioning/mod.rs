//! Version resolution building blocks.
//!
//! # Responsibility
//! - Compare payloads structurally (`compare`).
//! - Parse, order and increment version strings (`semver`).
//! - Plan the single store write for each version-control mode (`mode`).
//!
//! # Invariants
//! - Nothing in this module performs I/O.

pub mod compare;
pub mod mode;
pub mod semver;
