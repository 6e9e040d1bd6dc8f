//! Versioned definition item management.
//! This crate is the single source of truth for lineage versioning rules.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod versioning;

pub use config::{ConfigError, LoggingConfig, ServiceConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::definition::{
    DefinitionFilter, DefinitionFilterClause, DefinitionItem, DefinitionItemId,
    DefinitionItemInput, NonPersistedDefinitionItem, ReleaseField, UnknownVersionControlMode,
    VersionControlMode, DEFAULT_VERSION,
};
pub use repo::definition_repo::{
    DefinitionRepository, RepoError, RepoResult, SqliteDefinitionRepository,
};
pub use repo::memory_repo::InMemoryDefinitionRepository;
pub use service::definition_service::{
    DefinitionService, PersistOptions, ServiceError, ServiceResult, PDM_METHODS,
};
pub use versioning::compare::{PayloadComparator, StructuralPayloadComparator};
pub use versioning::semver::{
    compare_versions, SemverIncrementer, VersionIncrementError, VersionIncrementer,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
