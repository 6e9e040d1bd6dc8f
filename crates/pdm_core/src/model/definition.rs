//! Definition item domain model.
//!
//! # Responsibility
//! - Define the persisted and not-yet-persisted shapes of a definition item.
//! - Define the caller submission shape and candidate construction defaults.
//! - Define version-control policy names and lookup filters.
//!
//! # Invariants
//! - `(definition_id, tenant_id, version)` identifies at most one persisted item.
//! - A candidate always carries a resolved `definition_id` and `version`.
//! - `id` and timestamps are assigned by the store, never by callers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Version assigned to a candidate that does not carry one.
pub const DEFAULT_VERSION: &str = "1";

/// Store-assigned identity of a persisted definition item.
pub type DefinitionItemId = Uuid;

/// Persisted definition item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionItem {
    /// Identity assigned on insert.
    pub id: DefinitionItemId,
    /// Lineage key shared by all versions of one document.
    pub definition_id: String,
    /// Optional scoping key; `None` is the global scope.
    pub tenant_id: Option<String>,
    /// Semantic-version shaped token, unique within the lineage.
    pub version: String,
    pub name: Option<String>,
    pub purpose: Option<String>,
    /// Document content. Equality of two items is equality of this field.
    pub definition_payload: Value,
    /// Unix epoch milliseconds, set on insert.
    pub created_at: i64,
    /// Unix epoch milliseconds, refreshed on every update.
    pub last_updated_at: i64,
}

/// Candidate item that has not been written to a store yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonPersistedDefinitionItem {
    pub definition_id: String,
    pub tenant_id: Option<String>,
    pub version: String,
    pub name: Option<String>,
    pub purpose: Option<String>,
    pub definition_payload: Value,
}

impl NonPersistedDefinitionItem {
    /// Copies the mutable fields of this candidate onto a persisted row.
    ///
    /// `version` is left untouched; the caller decides how it changes.
    pub fn apply_to(&self, item: &mut DefinitionItem) {
        item.definition_id = self.definition_id.clone();
        item.tenant_id = self.tenant_id.clone();
        item.name = self.name.clone();
        item.purpose = self.purpose.clone();
        item.definition_payload = self.definition_payload.clone();
    }
}

/// Submission accepted by `persist_definition`.
///
/// Every key except the payload is optional. Missing keys are resolved when
/// the candidate is built, see [`DefinitionItemInput::definition_id`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionItemInput {
    /// Only honoured under `VersionControlMode::Overwrite`.
    pub id: Option<DefinitionItemId>,
    pub definition_id: Option<String>,
    pub tenant_id: Option<String>,
    pub version: Option<String>,
    pub name: Option<String>,
    pub purpose: Option<String>,
    pub definition_payload: Value,
}

impl DefinitionItemInput {
    /// Creates a submission carrying only a payload.
    pub fn from_payload(definition_payload: Value) -> Self {
        Self {
            definition_payload,
            ..Self::default()
        }
    }

    /// Resolves the lineage key: explicit `definition_id`, else the payload's
    /// own string `id` field.
    pub fn definition_id(&self) -> Option<String> {
        self.definition_id
            .as_deref()
            .or_else(|| payload_identifier(&self.definition_payload))
            .map(str::to_string)
    }

    /// Builds the fully defaulted candidate for this submission.
    pub fn to_candidate(
        &self,
        definition_id: String,
        default_version: &str,
    ) -> NonPersistedDefinitionItem {
        NonPersistedDefinitionItem {
            definition_id,
            tenant_id: normalize_tenant_id(self.tenant_id.as_deref()),
            version: self
                .version
                .clone()
                .unwrap_or_else(|| default_version.to_string()),
            name: self.name.clone(),
            purpose: self.purpose.clone(),
            definition_payload: self.definition_payload.clone(),
        }
    }
}

/// Maps a blank tenant onto the global scope (`None`).
///
/// Stores key uniqueness on the normalized value, so `Some("")` and `None`
/// share one version space.
pub fn normalize_tenant_id(tenant_id: Option<&str>) -> Option<String> {
    tenant_id
        .filter(|tenant_id| !tenant_id.trim().is_empty())
        .map(str::to_string)
}

/// Returns the payload's own identifier (`{"id": "..."}`), if it has one.
pub fn payload_identifier(payload: &Value) -> Option<&str> {
    payload
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.trim().is_empty())
}

/// Caller-selected policy for reconciling a changed submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VersionControlMode {
    /// Mutate the exact-version row in place (identity reuse allowed).
    Overwrite,
    /// Mutate the lineage maximum in place, keeping its version.
    OverwriteLatest,
    /// Insert at the given version; reject changes to an existing version.
    Manual,
    /// Append a new row with the major version bumped.
    #[default]
    AutoIncrementMajor,
    /// Append a new row with the minor version bumped.
    AutoIncrementMinor,
}

impl VersionControlMode {
    pub const ALL: [VersionControlMode; 5] = [
        Self::Overwrite,
        Self::OverwriteLatest,
        Self::Manual,
        Self::AutoIncrementMajor,
        Self::AutoIncrementMinor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Overwrite => "Overwrite",
            Self::OverwriteLatest => "OverwriteLatest",
            Self::Manual => "Manual",
            Self::AutoIncrementMajor => "AutoIncrementMajor",
            Self::AutoIncrementMinor => "AutoIncrementMinor",
        }
    }
}

impl Display for VersionControlMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a policy name does not match any [`VersionControlMode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVersionControlMode(pub String);

impl Display for UnknownVersionControlMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown version control mode: `{}`", self.0)
    }
}

impl Error for UnknownVersionControlMode {}

impl FromStr for VersionControlMode {
    type Err = UnknownVersionControlMode;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == value.trim())
            .ok_or_else(|| UnknownVersionControlMode(value.to_string()))
    }
}

/// Release field selector for version increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseField {
    Major,
    Minor,
}

impl Display for ReleaseField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Major => f.write_str("major"),
            Self::Minor => f.write_str("minor"),
        }
    }
}

/// One AND-combined lookup clause. Unset keys do not constrain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionFilterClause {
    pub id: Option<DefinitionItemId>,
    pub definition_id: Option<String>,
    pub tenant_id: Option<String>,
    pub version: Option<String>,
}

impl DefinitionFilterClause {
    /// Returns whether `item` satisfies every key set on this clause.
    pub fn matches(&self, item: &DefinitionItem) -> bool {
        self.id.map_or(true, |id| id == item.id)
            && self
                .definition_id
                .as_deref()
                .map_or(true, |value| value == item.definition_id)
            && self
                .tenant_id
                .as_deref()
                .map_or(true, |value| item.tenant_id.as_deref() == Some(value))
            && self
                .version
                .as_deref()
                .map_or(true, |value| value == item.version)
    }
}

/// OR-combined list of clauses. An empty filter matches every item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DefinitionFilter(pub Vec<DefinitionFilterClause>);

impl DefinitionFilter {
    /// Filter that matches every item.
    pub fn all() -> Self {
        Self(Vec::new())
    }

    pub fn single(clause: DefinitionFilterClause) -> Self {
        Self(vec![clause])
    }

    /// Filter that matches one whole lineage.
    pub fn lineage(definition_id: impl Into<String>, tenant_id: Option<String>) -> Self {
        Self::single(DefinitionFilterClause {
            definition_id: Some(definition_id.into()),
            tenant_id,
            ..DefinitionFilterClause::default()
        })
    }

    pub fn clauses(&self) -> &[DefinitionFilterClause] {
        &self.0
    }

    pub fn matches(&self, item: &DefinitionItem) -> bool {
        self.0.is_empty() || self.0.iter().any(|clause| clause.matches(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stored(definition_id: &str, tenant_id: Option<&str>, version: &str) -> DefinitionItem {
        DefinitionItem {
            id: Uuid::new_v4(),
            definition_id: definition_id.to_string(),
            tenant_id: tenant_id.map(str::to_string),
            version: version.to_string(),
            name: None,
            purpose: None,
            definition_payload: json!({"id": definition_id}),
            created_at: 0,
            last_updated_at: 0,
        }
    }

    #[test]
    fn definition_id_falls_back_to_payload_identifier() {
        let input = DefinitionItemInput::from_payload(json!({"id": "age-check"}));
        assert_eq!(input.definition_id().as_deref(), Some("age-check"));

        let explicit = DefinitionItemInput {
            definition_id: Some("explicit".to_string()),
            ..input
        };
        assert_eq!(explicit.definition_id().as_deref(), Some("explicit"));

        let anonymous = DefinitionItemInput::from_payload(json!({"purpose": "x"}));
        assert_eq!(anonymous.definition_id(), None);
    }

    #[test]
    fn candidate_defaults_version() {
        let input = DefinitionItemInput::from_payload(json!({"id": "a"}));
        let candidate = input.to_candidate("a".to_string(), DEFAULT_VERSION);
        assert_eq!(candidate.version, "1");
    }

    #[test]
    fn blank_tenant_is_the_global_scope() {
        let input = DefinitionItemInput {
            tenant_id: Some("  ".to_string()),
            ..DefinitionItemInput::from_payload(json!({"id": "a"}))
        };
        assert_eq!(input.to_candidate("a".to_string(), DEFAULT_VERSION).tenant_id, None);
        assert_eq!(normalize_tenant_id(Some("")), None);
        assert_eq!(normalize_tenant_id(Some("acme")).as_deref(), Some("acme"));
        assert_eq!(normalize_tenant_id(None), None);
    }

    #[test]
    fn mode_parses_known_names_and_rejects_others() {
        for mode in VersionControlMode::ALL {
            assert_eq!(mode.as_str().parse::<VersionControlMode>(), Ok(mode));
        }
        let err = "AutoIncrementPatch"
            .parse::<VersionControlMode>()
            .unwrap_err();
        assert_eq!(err.0, "AutoIncrementPatch");
        assert_eq!(
            VersionControlMode::default(),
            VersionControlMode::AutoIncrementMajor
        );
    }

    #[test]
    fn filter_is_or_across_clauses_and_and_within() {
        let a = stored("a", None, "1");
        let b = stored("b", Some("t1"), "2");

        let filter = DefinitionFilter(vec![
            DefinitionFilterClause {
                definition_id: Some("a".to_string()),
                version: Some("1".to_string()),
                ..Default::default()
            },
            DefinitionFilterClause {
                tenant_id: Some("t1".to_string()),
                ..Default::default()
            },
        ]);
        assert!(filter.matches(&a));
        assert!(filter.matches(&b));

        let narrow = DefinitionFilter::single(DefinitionFilterClause {
            definition_id: Some("a".to_string()),
            version: Some("2".to_string()),
            ..Default::default()
        });
        assert!(!narrow.matches(&a));
        assert!(DefinitionFilter::all().matches(&b));
    }
}
