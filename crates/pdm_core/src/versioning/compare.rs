//! Structural payload comparison.

use crate::model::definition::{DefinitionItem, NonPersistedDefinitionItem};
use serde_json::Value;

/// Decides whether two definition payloads describe the same document.
///
/// Implementations compare payload content only; store-assigned fields
/// (`id`, timestamps) never take part.
pub trait PayloadComparator {
    fn payload_equal(&self, left: &Value, right: &Value) -> bool;

    /// Returns whether the candidate carries the same payload as a stored row.
    fn is_unchanged(&self, stored: &DefinitionItem, candidate: &NonPersistedDefinitionItem) -> bool {
        self.payload_equal(&stored.definition_payload, &candidate.definition_payload)
    }
}

/// Deep JSON equality. Object key order is irrelevant, array order is not.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralPayloadComparator;

impl PayloadComparator for StructuralPayloadComparator {
    fn payload_equal(&self, left: &Value, right: &Value) -> bool {
        left == right
    }
}
