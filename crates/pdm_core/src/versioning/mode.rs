//! Version-control mode handlers.
//!
//! # Responsibility
//! - Decide, per mode, which single store write reconciles a changed
//!   candidate with the existing lineage state.
//!
//! # Invariants
//! - Handlers never touch a store; they return exactly one planned write.
//! - Auto-increment modes always plan an insert, never an update.
//! - The first version of a lineage is stored as given, without increment.

use crate::model::definition::{
    DefinitionItem, NonPersistedDefinitionItem, ReleaseField, VersionControlMode, DEFAULT_VERSION,
};
use crate::versioning::semver::{VersionIncrementError, VersionIncrementer};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Inputs shared by every mode handler.
#[derive(Debug, Clone)]
pub struct WriteContext<'a> {
    /// Row matching the exact lookup keys of the submission.
    pub existing: Option<&'a DefinitionItem>,
    /// Lineage maximum (falls back to `existing`).
    pub latest: Option<&'a DefinitionItem>,
    /// Fully defaulted candidate.
    pub candidate: NonPersistedDefinitionItem,
    /// Version as submitted by the caller, before defaulting.
    pub explicit_version: Option<&'a str>,
}

/// The one store mutation a handler asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum PlannedWrite {
    Insert(NonPersistedDefinitionItem),
    Update(DefinitionItem),
}

/// Handler-level rejection of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteRejected {
    /// Manual mode found a differing row at the exact version.
    Conflict {
        definition_id: String,
        tenant_id: Option<String>,
        version: String,
    },
    /// The lineage maximum carries a version that cannot be incremented.
    VersionComputation(VersionIncrementError),
}

impl Display for WriteRejected {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Conflict {
                definition_id,
                tenant_id,
                version,
            } => write!(
                f,
                "cannot update definition {definition_id} for tenant {} version {version}: definition exists and manual version control is enabled",
                tenant_id.as_deref().unwrap_or("<global>")
            ),
            Self::VersionComputation(err) => write!(f, "{err}"),
        }
    }
}

impl Error for WriteRejected {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Conflict { .. } => None,
            Self::VersionComputation(err) => Some(err),
        }
    }
}

/// Dispatches to the handler for `mode`.
pub fn plan_write<I: VersionIncrementer + ?Sized>(
    mode: VersionControlMode,
    context: WriteContext<'_>,
    incrementer: &I,
) -> Result<PlannedWrite, WriteRejected> {
    match mode {
        VersionControlMode::Overwrite => Ok(plan_overwrite(context)),
        VersionControlMode::OverwriteLatest => Ok(plan_overwrite_latest(context)),
        VersionControlMode::Manual => plan_manual(context),
        VersionControlMode::AutoIncrementMajor => {
            plan_auto_increment(context, ReleaseField::Major, incrementer)
        }
        VersionControlMode::AutoIncrementMinor => {
            plan_auto_increment(context, ReleaseField::Minor, incrementer)
        }
    }
}

fn plan_overwrite(context: WriteContext<'_>) -> PlannedWrite {
    match context.existing {
        Some(existing) => {
            let mut target = existing.clone();
            context.candidate.apply_to(&mut target);
            target.version = match context.explicit_version {
                Some(version) => version.to_string(),
                None if !existing.version.is_empty() => existing.version.clone(),
                None => DEFAULT_VERSION.to_string(),
            };
            PlannedWrite::Update(target)
        }
        None => PlannedWrite::Insert(context.candidate),
    }
}

fn plan_overwrite_latest(context: WriteContext<'_>) -> PlannedWrite {
    match context.latest {
        Some(latest) => {
            let mut target = latest.clone();
            context.candidate.apply_to(&mut target);
            PlannedWrite::Update(target)
        }
        None => PlannedWrite::Insert(context.candidate),
    }
}

fn plan_manual(context: WriteContext<'_>) -> Result<PlannedWrite, WriteRejected> {
    if let Some(existing) = context.existing {
        return Err(WriteRejected::Conflict {
            definition_id: context.candidate.definition_id,
            tenant_id: context.candidate.tenant_id,
            version: existing.version.clone(),
        });
    }
    Ok(PlannedWrite::Insert(context.candidate))
}

fn plan_auto_increment<I: VersionIncrementer + ?Sized>(
    context: WriteContext<'_>,
    field: ReleaseField,
    incrementer: &I,
) -> Result<PlannedWrite, WriteRejected> {
    let mut candidate = context.candidate;
    if let Some(latest) = context.latest {
        candidate.version = incrementer
            .increment(&latest.version, field)
            .map_err(WriteRejected::VersionComputation)?;
    }
    Ok(PlannedWrite::Insert(candidate))
}

#[cfg(test)]
mod tests {
    use super::{plan_write, PlannedWrite, WriteContext, WriteRejected};
    use crate::model::definition::{
        DefinitionItem, NonPersistedDefinitionItem, ReleaseField, VersionControlMode,
    };
    use crate::versioning::semver::{SemverIncrementer, VersionIncrementError, VersionIncrementer};
    use serde_json::json;
    use uuid::Uuid;

    fn stored(version: &str, payload: serde_json::Value) -> DefinitionItem {
        DefinitionItem {
            id: Uuid::new_v4(),
            definition_id: "age-check".to_string(),
            tenant_id: None,
            version: version.to_string(),
            name: Some("old name".to_string()),
            purpose: None,
            definition_payload: payload,
            created_at: 1,
            last_updated_at: 1,
        }
    }

    fn candidate(version: &str) -> NonPersistedDefinitionItem {
        NonPersistedDefinitionItem {
            definition_id: "age-check".to_string(),
            tenant_id: None,
            version: version.to_string(),
            name: Some("new name".to_string()),
            purpose: Some("verify age".to_string()),
            definition_payload: json!({"id": "age-check", "rev": 2}),
        }
    }

    fn context<'a>(
        existing: Option<&'a DefinitionItem>,
        latest: Option<&'a DefinitionItem>,
        explicit_version: Option<&'a str>,
    ) -> WriteContext<'a> {
        WriteContext {
            existing,
            latest,
            candidate: candidate(explicit_version.unwrap_or("1")),
            explicit_version,
        }
    }

    struct FailingIncrementer;

    impl VersionIncrementer for FailingIncrementer {
        fn increment(
            &self,
            current: &str,
            field: ReleaseField,
        ) -> Result<String, VersionIncrementError> {
            Err(VersionIncrementError {
                version: current.to_string(),
                field,
            })
        }
    }

    #[test]
    fn overwrite_updates_existing_row_in_place() {
        let existing = stored("3", json!({"rev": 1}));
        let plan = plan_write(
            VersionControlMode::Overwrite,
            context(Some(&existing), Some(&existing), None),
            &SemverIncrementer,
        )
        .unwrap();

        let PlannedWrite::Update(updated) = plan else {
            panic!("expected update, got {plan:?}");
        };
        assert_eq!(updated.id, existing.id);
        assert_eq!(updated.version, "3");
        assert_eq!(updated.name.as_deref(), Some("new name"));
        assert_eq!(updated.definition_payload, json!({"id": "age-check", "rev": 2}));
    }

    #[test]
    fn overwrite_prefers_explicit_version() {
        let existing = stored("3", json!({"rev": 1}));
        let plan = plan_write(
            VersionControlMode::Overwrite,
            context(Some(&existing), Some(&existing), Some("3.1")),
            &SemverIncrementer,
        )
        .unwrap();
        assert!(matches!(plan, PlannedWrite::Update(item) if item.version == "3.1"));
    }

    #[test]
    fn overwrite_inserts_when_target_missing() {
        let plan = plan_write(
            VersionControlMode::Overwrite,
            context(None, None, None),
            &SemverIncrementer,
        )
        .unwrap();
        assert_eq!(plan, PlannedWrite::Insert(candidate("1")));
    }

    #[test]
    fn overwrite_latest_targets_latest_and_keeps_its_version() {
        let first = stored("1", json!({"rev": 1}));
        let second = stored("2", json!({"rev": 1}));
        let plan = plan_write(
            VersionControlMode::OverwriteLatest,
            context(Some(&first), Some(&second), Some("1")),
            &SemverIncrementer,
        )
        .unwrap();

        let PlannedWrite::Update(updated) = plan else {
            panic!("expected update, got {plan:?}");
        };
        assert_eq!(updated.id, second.id);
        assert_eq!(updated.version, "2");
        assert_eq!(updated.purpose.as_deref(), Some("verify age"));
    }

    #[test]
    fn manual_rejects_existing_version() {
        let existing = stored("2", json!({"rev": 1}));
        let err = plan_write(
            VersionControlMode::Manual,
            context(Some(&existing), Some(&existing), Some("2")),
            &SemverIncrementer,
        )
        .unwrap_err();
        assert_eq!(
            err,
            WriteRejected::Conflict {
                definition_id: "age-check".to_string(),
                tenant_id: None,
                version: "2".to_string(),
            }
        );
        let message = err.to_string();
        assert!(message.contains("age-check"));
        assert!(message.contains("version 2"));
    }

    #[test]
    fn manual_inserts_new_version() {
        let plan = plan_write(
            VersionControlMode::Manual,
            context(None, None, Some("5")),
            &SemverIncrementer,
        )
        .unwrap();
        assert!(matches!(plan, PlannedWrite::Insert(item) if item.version == "5"));
    }

    #[test]
    fn auto_increment_bumps_latest_version() {
        let latest = stored("1.2.0", json!({"rev": 1}));
        let major = plan_write(
            VersionControlMode::AutoIncrementMajor,
            context(Some(&latest), Some(&latest), None),
            &SemverIncrementer,
        )
        .unwrap();
        assert!(matches!(major, PlannedWrite::Insert(item) if item.version == "2.0.0"));

        let minor = plan_write(
            VersionControlMode::AutoIncrementMinor,
            context(Some(&latest), Some(&latest), None),
            &SemverIncrementer,
        )
        .unwrap();
        assert!(matches!(minor, PlannedWrite::Insert(item) if item.version == "1.3.0"));
    }

    #[test]
    fn auto_increment_does_not_bump_first_version() {
        let plan = plan_write(
            VersionControlMode::AutoIncrementMajor,
            context(None, None, None),
            &FailingIncrementer,
        )
        .unwrap();
        assert_eq!(plan, PlannedWrite::Insert(candidate("1")));
    }

    #[test]
    fn auto_increment_surfaces_increment_failure() {
        let latest = stored("draft", json!({"rev": 1}));
        let err = plan_write(
            VersionControlMode::AutoIncrementMinor,
            context(Some(&latest), Some(&latest), None),
            &SemverIncrementer,
        )
        .unwrap_err();
        assert_eq!(
            err,
            WriteRejected::VersionComputation(VersionIncrementError {
                version: "draft".to_string(),
                field: ReleaseField::Minor,
            })
        );
    }
}
