//! Definition item repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide keyed and filtered CRUD over canonical `definition_items` storage.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - `(definition_id, tenant_id, version)` is unique; a competing write is
//!   rejected with `RepoError::UniqueViolation`, never retried.
//! - `get_items` returns items ordered by version, highest first.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::definition::{
    normalize_tenant_id, DefinitionFilter, DefinitionItem, DefinitionItemId,
    NonPersistedDefinitionItem,
};
use crate::versioning::semver::compare_versions;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

const DEFINITION_SELECT_SQL: &str = "SELECT
    id,
    definition_id,
    tenant_id,
    version,
    name,
    purpose,
    definition_payload,
    created_at,
    last_updated_at
FROM definition_items";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for definition persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    NotFound(DefinitionItemId),
    /// Another row already holds this lineage version.
    UniqueViolation {
        definition_id: String,
        tenant_id: Option<String>,
        version: String,
    },
    /// Connection has not been migrated to the schema this binary expects.
    SchemaNotReady {
        db_version: u32,
        expected: u32,
    },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "definition item not found: {id}"),
            Self::UniqueViolation {
                definition_id,
                tenant_id,
                version,
            } => write!(
                f,
                "definition {definition_id} for tenant {} already has version {version}",
                tenant_id.as_deref().unwrap_or("<global>")
            ),
            Self::SchemaNotReady {
                db_version,
                expected,
            } => write!(
                f,
                "database schema version {db_version} does not match expected {expected}"
            ),
            Self::InvalidData(message) => {
                write!(f, "invalid persisted definition data: {message}")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Storage contract consumed by the definition service.
pub trait DefinitionRepository {
    fn has_item(&self, id: DefinitionItemId) -> RepoResult<bool>;
    fn has_items(&self, filter: &DefinitionFilter) -> RepoResult<bool>;
    /// Fails with `RepoError::NotFound` when absent.
    fn get_item(&self, id: DefinitionItemId) -> RepoResult<DefinitionItem>;
    /// Returns matches ordered by version, highest first.
    fn get_items(&self, filter: &DefinitionFilter) -> RepoResult<Vec<DefinitionItem>>;
    /// Inserts a candidate, assigning identity and timestamps.
    ///
    /// A blank `tenant_id` is stored as the global scope.
    fn add_item(&self, item: &NonPersistedDefinitionItem) -> RepoResult<DefinitionItem>;
    /// Replaces every mutable column of the row identified by `item.id`.
    fn update_item(&self, item: &DefinitionItem) -> RepoResult<DefinitionItem>;
    fn delete_item(&self, id: DefinitionItemId) -> RepoResult<()>;
    /// Returns the number of deleted rows.
    fn delete_items(&self, filter: &DefinitionFilter) -> RepoResult<usize>;
}

impl<R: DefinitionRepository + ?Sized> DefinitionRepository for &R {
    fn has_item(&self, id: DefinitionItemId) -> RepoResult<bool> {
        (**self).has_item(id)
    }

    fn has_items(&self, filter: &DefinitionFilter) -> RepoResult<bool> {
        (**self).has_items(filter)
    }

    fn get_item(&self, id: DefinitionItemId) -> RepoResult<DefinitionItem> {
        (**self).get_item(id)
    }

    fn get_items(&self, filter: &DefinitionFilter) -> RepoResult<Vec<DefinitionItem>> {
        (**self).get_items(filter)
    }

    fn add_item(&self, item: &NonPersistedDefinitionItem) -> RepoResult<DefinitionItem> {
        (**self).add_item(item)
    }

    fn update_item(&self, item: &DefinitionItem) -> RepoResult<DefinitionItem> {
        (**self).update_item(item)
    }

    fn delete_item(&self, id: DefinitionItemId) -> RepoResult<()> {
        (**self).delete_item(id)
    }

    fn delete_items(&self, filter: &DefinitionFilter) -> RepoResult<usize> {
        (**self).delete_items(filter)
    }
}

/// Orders items by version, highest first. Ties keep their relative order.
pub fn sort_latest_first(items: &mut [DefinitionItem]) {
    items.sort_by(|left, right| compare_versions(&right.version, &left.version));
}

/// Current wall-clock time as Unix epoch milliseconds.
pub(crate) fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
        })
}

/// SQLite-backed definition repository.
pub struct SqliteDefinitionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDefinitionRepository<'conn> {
    /// Constructs a repository from a connection opened via `open_db*`.
    ///
    /// # Errors
    /// - `SchemaNotReady` when migrations have not been applied.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let db_version =
            conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
        let expected = latest_version();
        if db_version != expected {
            return Err(RepoError::SchemaNotReady {
                db_version,
                expected,
            });
        }
        Ok(Self { conn })
    }
}

impl DefinitionRepository for SqliteDefinitionRepository<'_> {
    fn has_item(&self, id: DefinitionItemId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM definition_items WHERE id = ?1);",
            [id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn has_items(&self, filter: &DefinitionFilter) -> RepoResult<bool> {
        let (where_sql, bind_values) = filter_to_sql(filter);
        let exists: i64 = self.conn.query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM definition_items WHERE {where_sql});"),
            params_from_iter(bind_values),
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn get_item(&self, id: DefinitionItemId) -> RepoResult<DefinitionItem> {
        let mut stmt = self
            .conn
            .prepare(&format!("{DEFINITION_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => parse_definition_row(row),
            None => Err(RepoError::NotFound(id)),
        }
    }

    fn get_items(&self, filter: &DefinitionFilter) -> RepoResult<Vec<DefinitionItem>> {
        let (where_sql, bind_values) = filter_to_sql(filter);
        let mut stmt = self.conn.prepare(&format!(
            "{DEFINITION_SELECT_SQL} WHERE {where_sql} ORDER BY rowid ASC;"
        ))?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut items = Vec::new();

        while let Some(row) = rows.next()? {
            items.push(parse_definition_row(row)?);
        }

        sort_latest_first(&mut items);
        Ok(items)
    }

    fn add_item(&self, item: &NonPersistedDefinitionItem) -> RepoResult<DefinitionItem> {
        let id = Uuid::new_v4();
        let tenant_id = normalize_tenant_id(item.tenant_id.as_deref());
        let payload = serialize_payload(&item.definition_payload)?;
        let now = now_epoch_ms();

        self.conn
            .execute(
                "INSERT INTO definition_items (
                    id,
                    definition_id,
                    tenant_id,
                    version,
                    name,
                    purpose,
                    definition_payload,
                    created_at,
                    last_updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8);",
                params![
                    id.to_string(),
                    item.definition_id.as_str(),
                    tenant_id.as_deref(),
                    item.version.as_str(),
                    item.name.as_deref(),
                    item.purpose.as_deref(),
                    payload,
                    now,
                ],
            )
            .map_err(|err| {
                map_constraint_error(err, &item.definition_id, &tenant_id, &item.version)
            })?;

        self.get_item(id)
    }

    fn update_item(&self, item: &DefinitionItem) -> RepoResult<DefinitionItem> {
        let tenant_id = normalize_tenant_id(item.tenant_id.as_deref());
        let payload = serialize_payload(&item.definition_payload)?;

        let changed = self
            .conn
            .execute(
                "UPDATE definition_items
                 SET
                    definition_id = ?1,
                    tenant_id = ?2,
                    version = ?3,
                    name = ?4,
                    purpose = ?5,
                    definition_payload = ?6,
                    last_updated_at = ?7
                 WHERE id = ?8;",
                params![
                    item.definition_id.as_str(),
                    tenant_id.as_deref(),
                    item.version.as_str(),
                    item.name.as_deref(),
                    item.purpose.as_deref(),
                    payload,
                    now_epoch_ms(),
                    item.id.to_string(),
                ],
            )
            .map_err(|err| {
                map_constraint_error(err, &item.definition_id, &tenant_id, &item.version)
            })?;

        if changed == 0 {
            return Err(RepoError::NotFound(item.id));
        }

        self.get_item(item.id)
    }

    fn delete_item(&self, id: DefinitionItemId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM definition_items WHERE id = ?1;", [id.to_string()])?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }

    fn delete_items(&self, filter: &DefinitionFilter) -> RepoResult<usize> {
        let (where_sql, bind_values) = filter_to_sql(filter);
        let changed = self.conn.execute(
            &format!("DELETE FROM definition_items WHERE {where_sql};"),
            params_from_iter(bind_values),
        )?;
        Ok(changed)
    }
}

/// Renders a filter as a SQL predicate with positional bind values.
fn filter_to_sql(filter: &DefinitionFilter) -> (String, Vec<Value>) {
    if filter.clauses().is_empty() {
        return ("1 = 1".to_string(), Vec::new());
    }

    let mut groups = Vec::with_capacity(filter.clauses().len());
    let mut bind_values: Vec<Value> = Vec::new();

    for clause in filter.clauses() {
        let mut conditions: Vec<&str> = Vec::new();
        if let Some(id) = clause.id {
            conditions.push("id = ?");
            bind_values.push(Value::Text(id.to_string()));
        }
        if let Some(definition_id) = &clause.definition_id {
            conditions.push("definition_id = ?");
            bind_values.push(Value::Text(definition_id.clone()));
        }
        if let Some(tenant_id) = &clause.tenant_id {
            conditions.push("tenant_id = ?");
            bind_values.push(Value::Text(tenant_id.clone()));
        }
        if let Some(version) = &clause.version {
            conditions.push("version = ?");
            bind_values.push(Value::Text(version.clone()));
        }

        if conditions.is_empty() {
            groups.push("1 = 1".to_string());
        } else {
            groups.push(format!("({})", conditions.join(" AND ")));
        }
    }

    (groups.join(" OR "), bind_values)
}

fn map_constraint_error(
    err: rusqlite::Error,
    definition_id: &str,
    tenant_id: &Option<String>,
    version: &str,
) -> RepoError {
    let is_unique_violation = matches!(
        &err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation
                && failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    );
    if is_unique_violation {
        return RepoError::UniqueViolation {
            definition_id: definition_id.to_string(),
            tenant_id: tenant_id.clone(),
            version: version.to_string(),
        };
    }
    RepoError::from(err)
}

fn serialize_payload(payload: &serde_json::Value) -> RepoResult<String> {
    serde_json::to_string(payload)
        .map_err(|err| RepoError::InvalidData(format!("payload is not serializable: {err}")))
}

fn parse_definition_row(row: &Row<'_>) -> RepoResult<DefinitionItem> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{id_text}` in definition_items.id"))
    })?;

    let payload_text: String = row.get("definition_payload")?;
    let definition_payload = serde_json::from_str(&payload_text).map_err(|err| {
        RepoError::InvalidData(format!(
            "invalid json in definition_items.definition_payload for {id}: {err}"
        ))
    })?;

    Ok(DefinitionItem {
        id,
        definition_id: row.get("definition_id")?,
        tenant_id: row.get("tenant_id")?,
        version: row.get("version")?,
        name: row.get("name")?,
        purpose: row.get("purpose")?,
        definition_payload,
        created_at: row.get("created_at")?,
        last_updated_at: row.get("last_updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::filter_to_sql;
    use crate::model::definition::{DefinitionFilter, DefinitionFilterClause};
    use rusqlite::types::Value;

    #[test]
    fn empty_filter_matches_everything() {
        let (sql, binds) = filter_to_sql(&DefinitionFilter::all());
        assert_eq!(sql, "1 = 1");
        assert!(binds.is_empty());
    }

    #[test]
    fn clauses_are_or_joined_with_and_conditions() {
        let filter = DefinitionFilter(vec![
            DefinitionFilterClause {
                definition_id: Some("a".to_string()),
                version: Some("2".to_string()),
                ..Default::default()
            },
            DefinitionFilterClause {
                tenant_id: Some("t".to_string()),
                ..Default::default()
            },
        ]);
        let (sql, binds) = filter_to_sql(&filter);
        assert_eq!(sql, "(definition_id = ? AND version = ?) OR (tenant_id = ?)");
        assert_eq!(
            binds,
            vec![
                Value::Text("a".to_string()),
                Value::Text("2".to_string()),
                Value::Text("t".to_string()),
            ]
        );
    }
}
