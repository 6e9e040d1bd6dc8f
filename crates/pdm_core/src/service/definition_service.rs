//! Definition use-case service and version resolver.
//!
//! # Responsibility
//! - Expose has/get/persist/delete entry points for definition items.
//! - Resolve each persist request into a no-op or exactly one store write.
//!
//! # Invariants
//! - Resubmitting an unchanged payload never mutates the store.
//! - A caller-supplied `id` is only honoured under `Overwrite`.
//! - No lock spans the read-modify-write sequence; concurrent writers are
//!   arbitrated by the store's lineage version uniqueness, and the loser sees
//!   `RepoError::UniqueViolation` without a retry.
//! - Errors are returned to the caller, never swallowed.

use crate::config::ServiceConfig;
use crate::model::definition::{
    DefinitionFilter, DefinitionFilterClause, DefinitionItem, DefinitionItemId,
    DefinitionItemInput, ReleaseField, UnknownVersionControlMode, VersionControlMode,
};
use crate::repo::definition_repo::{DefinitionRepository, RepoError};
use crate::versioning::compare::{PayloadComparator, StructuralPayloadComparator};
use crate::versioning::mode::{plan_write, PlannedWrite, WriteContext, WriteRejected};
use crate::versioning::semver::{SemverIncrementer, VersionIncrementer};
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Operation names exposed upward for RPC/REST bindings.
pub const PDM_METHODS: &[&str] = &[
    "pdmHasDefinition",
    "pdmHasDefinitions",
    "pdmGetDefinition",
    "pdmGetDefinitions",
    "pdmPersistDefinition",
    "pdmDeleteDefinition",
    "pdmDeleteDefinitions",
];

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service error for definition use-cases.
#[derive(Debug)]
pub enum ServiceError {
    /// Manual mode refused to change an existing version.
    Conflict {
        definition_id: String,
        tenant_id: Option<String>,
        version: String,
    },
    /// Policy name does not match any known mode.
    InvalidPolicy(String),
    /// The lineage maximum carries a version that cannot be incremented.
    VersionComputation {
        version: String,
        field: ReleaseField,
    },
    /// Neither an explicit `definition_id` nor a payload `id` was supplied.
    MissingDefinitionId,
    /// Store failure, passed through unchanged.
    Repo(RepoError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Conflict {
                definition_id,
                tenant_id,
                version,
            } => write!(
                f,
                "cannot update definition {definition_id} for tenant {} version {version} because definition exists and manual version control is enabled",
                tenant_id.as_deref().unwrap_or("<global>")
            ),
            Self::InvalidPolicy(name) => write!(f, "unknown version control mode: `{name}`"),
            Self::VersionComputation { version, field } => {
                write!(f, "could not increment {field} version on `{version}`")
            }
            Self::MissingDefinitionId => write!(
                f,
                "definition id is missing and the payload carries no `id` field"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<UnknownVersionControlMode> for ServiceError {
    fn from(value: UnknownVersionControlMode) -> Self {
        Self::InvalidPolicy(value.0)
    }
}

impl From<WriteRejected> for ServiceError {
    fn from(value: WriteRejected) -> Self {
        match value {
            WriteRejected::Conflict {
                definition_id,
                tenant_id,
                version,
            } => Self::Conflict {
                definition_id,
                tenant_id,
                version,
            },
            WriteRejected::VersionComputation(err) => Self::VersionComputation {
                version: err.version,
                field: err.field,
            },
        }
    }
}

/// Per-request persist options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistOptions {
    /// Falls back to `ServiceConfig::default_mode` when unset.
    pub version_control_mode: Option<VersionControlMode>,
}

impl PersistOptions {
    pub fn with_mode(mode: VersionControlMode) -> Self {
        Self {
            version_control_mode: Some(mode),
        }
    }
}

/// Definition service facade over a repository and versioning collaborators.
pub struct DefinitionService<R, C = StructuralPayloadComparator, I = SemverIncrementer> {
    repo: R,
    comparator: C,
    incrementer: I,
    config: ServiceConfig,
}

impl<R: DefinitionRepository> DefinitionService<R> {
    /// Creates a service with default collaborators and configuration.
    pub fn new(repo: R) -> Self {
        Self::with_config(repo, ServiceConfig::default())
    }

    pub fn with_config(repo: R, config: ServiceConfig) -> Self {
        Self::with_collaborators(
            repo,
            StructuralPayloadComparator,
            SemverIncrementer,
            config,
        )
    }
}

impl<R, C, I> DefinitionService<R, C, I>
where
    R: DefinitionRepository,
    C: PayloadComparator,
    I: VersionIncrementer,
{
    /// Creates a service with injected comparator and incrementer.
    pub fn with_collaborators(repo: R, comparator: C, incrementer: I, config: ServiceConfig) -> Self {
        Self {
            repo,
            comparator,
            incrementer,
            config,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn has_definition(&self, id: DefinitionItemId) -> ServiceResult<bool> {
        Ok(self.repo.has_item(id)?)
    }

    pub fn has_definitions(&self, filter: &DefinitionFilter) -> ServiceResult<bool> {
        Ok(self.repo.has_items(filter)?)
    }

    /// Gets one item; a missing id surfaces as `RepoError::NotFound`.
    pub fn get_definition(&self, id: DefinitionItemId) -> ServiceResult<DefinitionItem> {
        Ok(self.repo.get_item(id)?)
    }

    /// Lists matching items, highest version first.
    pub fn get_definitions(&self, filter: &DefinitionFilter) -> ServiceResult<Vec<DefinitionItem>> {
        Ok(self.repo.get_items(filter)?)
    }

    /// Deletes one item. Returns `true` once the store acknowledged it.
    pub fn delete_definition(&self, id: DefinitionItemId) -> ServiceResult<bool> {
        self.repo.delete_item(id)?;
        info!("event=definition_delete module=service status=ok item_id={id}");
        Ok(true)
    }

    /// Deletes every matching item and returns the count.
    pub fn delete_definitions(&self, filter: &DefinitionFilter) -> ServiceResult<usize> {
        let deleted = self.repo.delete_items(filter)?;
        info!(
            "event=definition_delete_many module=service status=ok clauses={} deleted={deleted}",
            filter.clauses().len()
        );
        Ok(deleted)
    }

    /// Persists a submission using a policy given by name.
    ///
    /// # Errors
    /// - `InvalidPolicy` when `mode_name` is not a known mode.
    pub fn persist_definition_with_mode_name(
        &self,
        input: &DefinitionItemInput,
        mode_name: Option<&str>,
    ) -> ServiceResult<DefinitionItem> {
        let options = PersistOptions {
            version_control_mode: mode_name
                .map(str::parse::<VersionControlMode>)
                .transpose()?,
        };
        self.persist_definition(input, Some(&options))
    }

    /// Persists a submission according to its version-control mode.
    ///
    /// # Contract
    /// - Unchanged payload at the matched row: returns that row, no write.
    /// - Otherwise performs exactly one insert or update, chosen by the mode.
    /// - Lookups without an explicit version match the lineage maximum.
    pub fn persist_definition(
        &self,
        input: &DefinitionItemInput,
        options: Option<&PersistOptions>,
    ) -> ServiceResult<DefinitionItem> {
        let mode = options
            .and_then(|options| options.version_control_mode)
            .unwrap_or(self.config.default_mode);
        let definition_id = input
            .definition_id()
            .ok_or(ServiceError::MissingDefinitionId)?;
        let id = input.id.filter(|_| mode == VersionControlMode::Overwrite);
        let explicit_version = input.version.as_deref();
        let candidate = input.to_candidate(definition_id.clone(), &self.config.initial_version);

        let exact = DefinitionFilterClause {
            id,
            definition_id: Some(definition_id.clone()),
            tenant_id: candidate.tenant_id.clone(),
            version: input.version.clone(),
        };
        let existing = self.first_in_lineage(exact.clone(), &candidate.tenant_id)?;

        let latest = match (&existing, explicit_version) {
            (Some(existing), Some(_)) => {
                let lineage = DefinitionFilterClause {
                    version: None,
                    ..exact
                };
                Some(
                    self.first_in_lineage(lineage, &candidate.tenant_id)?
                        .unwrap_or_else(|| existing.clone()),
                )
            }
            _ => existing.clone(),
        };

        let existing = match existing {
            Some(existing) if self.comparator.is_unchanged(&existing, &candidate) => {
                debug!(
                    "event=definition_persist module=service status=unchanged mode={mode} definition_id={} version={}",
                    existing.definition_id, existing.version
                );
                return Ok(existing);
            }
            other => other,
        };

        let context = WriteContext {
            existing: existing.as_ref(),
            latest: latest.as_ref(),
            candidate,
            explicit_version,
        };
        let planned = plan_write(mode, context, &self.incrementer).map_err(|err| {
            warn!(
                "event=definition_persist module=service status=rejected mode={mode} definition_id={definition_id} error={err}"
            );
            ServiceError::from(err)
        })?;

        let (action, result) = match planned {
            PlannedWrite::Insert(item) => ("insert", self.repo.add_item(&item)),
            PlannedWrite::Update(item) => ("update", self.repo.update_item(&item)),
        };
        match result {
            Ok(stored) => {
                info!(
                    "event=definition_persist module=service status=ok mode={mode} action={action} definition_id={} version={} item_id={}",
                    stored.definition_id, stored.version, stored.id
                );
                Ok(stored)
            }
            Err(err) => {
                warn!(
                    "event=definition_persist module=service status=error mode={mode} action={action} definition_id={definition_id} error={err}"
                );
                Err(err.into())
            }
        }
    }

    /// Returns the highest-version match within the submission's tenant scope.
    ///
    /// An unset clause key is unconstrained in the store, so global-scope
    /// lookups drop rows that belong to a tenant.
    fn first_in_lineage(
        &self,
        clause: DefinitionFilterClause,
        tenant_id: &Option<String>,
    ) -> ServiceResult<Option<DefinitionItem>> {
        Ok(self
            .repo
            .get_items(&DefinitionFilter::single(clause))?
            .into_iter()
            .find(|item| item.tenant_id == *tenant_id))
    }
}

#[cfg(test)]
mod tests {
    use super::{DefinitionService, PersistOptions, ServiceError, PDM_METHODS};
    use crate::model::definition::{DefinitionItemInput, VersionControlMode};
    use crate::repo::memory_repo::InMemoryDefinitionRepository;
    use serde_json::json;

    #[test]
    fn method_registry_lists_every_operation() {
        assert_eq!(PDM_METHODS.len(), 7);
        assert!(PDM_METHODS.contains(&"pdmPersistDefinition"));
    }

    #[test]
    fn unknown_mode_name_is_invalid_policy() {
        let service = DefinitionService::new(InMemoryDefinitionRepository::new());
        let input = DefinitionItemInput::from_payload(json!({"id": "age-check"}));
        let err = service
            .persist_definition_with_mode_name(&input, Some("AutoIncrementPatch"))
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidPolicy(name) if name == "AutoIncrementPatch"));
        assert!(service.repository().is_empty());
    }

    #[test]
    fn missing_definition_id_is_rejected() {
        let service = DefinitionService::new(InMemoryDefinitionRepository::new());
        let input = DefinitionItemInput::from_payload(json!({"name": "anonymous"}));
        let err = service.persist_definition(&input, None).unwrap_err();
        assert!(matches!(err, ServiceError::MissingDefinitionId));
    }

    #[test]
    fn id_is_discarded_outside_overwrite() {
        let service = DefinitionService::new(InMemoryDefinitionRepository::new());
        let first = service
            .persist_definition(
                &DefinitionItemInput::from_payload(json!({"id": "age-check", "rev": 1})),
                None,
            )
            .unwrap();

        let resubmitted = DefinitionItemInput {
            id: Some(first.id),
            ..DefinitionItemInput::from_payload(json!({"id": "age-check", "rev": 2}))
        };
        let second = service
            .persist_definition(
                &resubmitted,
                Some(&PersistOptions::with_mode(VersionControlMode::AutoIncrementMinor)),
            )
            .unwrap();
        assert_ne!(second.id, first.id);
        assert_eq!(second.version, "1.1");
        assert_eq!(service.repository().len(), 2);
    }
}
