//! In-memory implementation of [`DefinitionRepository`].
//!
//! First-class backend for tests and embedded callers that do not need
//! durability. Semantics match the SQLite backend, including the lineage
//! version uniqueness check.

use crate::model::definition::{
    normalize_tenant_id, DefinitionFilter, DefinitionItem, DefinitionItemId,
    NonPersistedDefinitionItem,
};
use crate::repo::definition_repo::{
    now_epoch_ms, sort_latest_first, DefinitionRepository, RepoError, RepoResult,
};
use std::cell::RefCell;
use uuid::Uuid;

/// Insertion-ordered item store.
#[derive(Debug, Default)]
pub struct InMemoryDefinitionRepository {
    items: RefCell<Vec<DefinitionItem>>,
}

impl InMemoryDefinitionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    fn ensure_version_free(
        items: &[DefinitionItem],
        definition_id: &str,
        tenant_id: &Option<String>,
        version: &str,
        except: Option<DefinitionItemId>,
    ) -> RepoResult<()> {
        let taken = items.iter().any(|item| {
            Some(item.id) != except
                && item.definition_id == definition_id
                && item.tenant_id == *tenant_id
                && item.version == version
        });
        if taken {
            return Err(RepoError::UniqueViolation {
                definition_id: definition_id.to_string(),
                tenant_id: tenant_id.clone(),
                version: version.to_string(),
            });
        }
        Ok(())
    }
}

impl DefinitionRepository for InMemoryDefinitionRepository {
    fn has_item(&self, id: DefinitionItemId) -> RepoResult<bool> {
        Ok(self.items.borrow().iter().any(|item| item.id == id))
    }

    fn has_items(&self, filter: &DefinitionFilter) -> RepoResult<bool> {
        Ok(self.items.borrow().iter().any(|item| filter.matches(item)))
    }

    fn get_item(&self, id: DefinitionItemId) -> RepoResult<DefinitionItem> {
        self.items
            .borrow()
            .iter()
            .find(|item| item.id == id)
            .cloned()
            .ok_or(RepoError::NotFound(id))
    }

    fn get_items(&self, filter: &DefinitionFilter) -> RepoResult<Vec<DefinitionItem>> {
        let mut matches: Vec<DefinitionItem> = self
            .items
            .borrow()
            .iter()
            .filter(|item| filter.matches(item))
            .cloned()
            .collect();
        sort_latest_first(&mut matches);
        Ok(matches)
    }

    fn add_item(&self, item: &NonPersistedDefinitionItem) -> RepoResult<DefinitionItem> {
        let mut items = self.items.borrow_mut();
        let tenant_id = normalize_tenant_id(item.tenant_id.as_deref());
        Self::ensure_version_free(&items, &item.definition_id, &tenant_id, &item.version, None)?;

        let now = now_epoch_ms();
        let stored = DefinitionItem {
            id: Uuid::new_v4(),
            definition_id: item.definition_id.clone(),
            tenant_id,
            version: item.version.clone(),
            name: item.name.clone(),
            purpose: item.purpose.clone(),
            definition_payload: item.definition_payload.clone(),
            created_at: now,
            last_updated_at: now,
        };
        items.push(stored.clone());
        Ok(stored)
    }

    fn update_item(&self, item: &DefinitionItem) -> RepoResult<DefinitionItem> {
        let mut items = self.items.borrow_mut();
        let position = items
            .iter()
            .position(|stored| stored.id == item.id)
            .ok_or(RepoError::NotFound(item.id))?;
        let tenant_id = normalize_tenant_id(item.tenant_id.as_deref());
        Self::ensure_version_free(
            &items,
            &item.definition_id,
            &tenant_id,
            &item.version,
            Some(item.id),
        )?;

        let created_at = items[position].created_at;
        let updated = DefinitionItem {
            tenant_id,
            created_at,
            last_updated_at: now_epoch_ms(),
            ..item.clone()
        };
        items[position] = updated.clone();
        Ok(updated)
    }

    fn delete_item(&self, id: DefinitionItemId) -> RepoResult<()> {
        let mut items = self.items.borrow_mut();
        let position = items
            .iter()
            .position(|item| item.id == id)
            .ok_or(RepoError::NotFound(id))?;
        items.remove(position);
        Ok(())
    }

    fn delete_items(&self, filter: &DefinitionFilter) -> RepoResult<usize> {
        let mut items = self.items.borrow_mut();
        let before = items.len();
        items.retain(|item| !filter.matches(item));
        Ok(before - items.len())
    }
}
