//! In-memory implementations of the [ports](crate::ports).
//!
//! Used by tests across the workspace and by the API server when it runs
//! without a database. Locks are never held across an await point.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::codec::{BulkModificationDiffRecord, BulkModificationRecord};
use crate::error::CoreError;
use crate::filter::{SearchCombinator, SearchFilter, SearchFilterGroup, SearchOperation};
use crate::ports::{
    BulkModificationStore, PropertyService, ResourceSearch, ResourceSnapshot, ResourceValueStore,
    ResourceWrite, ResourceWriteOutcome,
};
use crate::property::{Property, PropertyKey, PropertyPoolMask};
use crate::standard_value::StandardValue;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<DbId, BulkModificationRecord>>,
    diffs: RwLock<BTreeMap<DbId, Vec<BulkModificationDiffRecord>>>,
    next_id: AtomicI64,
    next_diff_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BulkModificationStore for MemoryStore {
    async fn get(&self, id: DbId) -> Result<Option<BulkModificationRecord>, CoreError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<BulkModificationRecord>, CoreError> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn insert(
        &self,
        mut record: BulkModificationRecord,
    ) -> Result<BulkModificationRecord, CoreError> {
        record.id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.records.write().await.insert(record.id, record.clone());
        Ok(record)
    }

    async fn save(&self, record: &BulkModificationRecord) -> Result<(), CoreError> {
        let mut records = self.records.write().await;
        match records.get_mut(&record.id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(CoreError::NotFound {
                entity: "BulkModification",
                id: record.id,
            }),
        }
    }

    async fn delete(&self, id: DbId) -> Result<bool, CoreError> {
        self.diffs.write().await.remove(&id);
        Ok(self.records.write().await.remove(&id).is_some())
    }

    async fn replace_diffs(
        &self,
        bulk_modification_id: DbId,
        diffs: Vec<BulkModificationDiffRecord>,
    ) -> Result<Vec<BulkModificationDiffRecord>, CoreError> {
        let stored: Vec<BulkModificationDiffRecord> = diffs
            .into_iter()
            .map(|mut d| {
                d.id = self.next_diff_id.fetch_add(1, Ordering::SeqCst) + 1;
                d.bulk_modification_id = bulk_modification_id;
                d
            })
            .collect();
        self.diffs
            .write()
            .await
            .insert(bulk_modification_id, stored.clone());
        Ok(stored)
    }

    async fn get_diffs(
        &self,
        bulk_modification_id: DbId,
    ) -> Result<Vec<BulkModificationDiffRecord>, CoreError> {
        Ok(self
            .diffs
            .read()
            .await
            .get(&bulk_modification_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_diffs(&self, diffs: &[BulkModificationDiffRecord]) -> Result<(), CoreError> {
        let mut all = self.diffs.write().await;
        for diff in diffs {
            let existing = all
                .get_mut(&diff.bulk_modification_id)
                .and_then(|list| list.iter_mut().find(|d| d.id == diff.id))
                .ok_or(CoreError::NotFound {
                    entity: "BulkModificationDiff",
                    id: diff.id,
                })?;
            *existing = diff.clone();
        }
        Ok(())
    }

    async fn delete_diffs(&self, bulk_modification_id: DbId) -> Result<(), CoreError> {
        self.diffs.write().await.remove(&bulk_modification_id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct MemoryResource {
    path: String,
    values: HashMap<PropertyKey, StandardValue>,
}

/// Property catalog, resource search and resource values in one place.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    properties: RwLock<Vec<Property>>,
    resources: RwLock<BTreeMap<DbId, MemoryResource>>,
    failing_writes: RwLock<HashSet<DbId>>,
    property_fetches: AtomicUsize,
    searches: AtomicUsize,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryCatalog {
    pub fn with_properties(properties: Vec<Property>) -> Self {
        Self {
            properties: RwLock::new(properties),
            ..Default::default()
        }
    }

    pub async fn add_property(&self, property: Property) {
        self.properties.write().await.push(property);
    }

    pub async fn remove_property(&self, key: PropertyKey) {
        self.properties.write().await.retain(|p| p.key() != key);
    }

    pub async fn add_resource(
        &self,
        id: DbId,
        path: &str,
        values: impl IntoIterator<Item = (PropertyKey, StandardValue)>,
    ) {
        self.resources.write().await.insert(
            id,
            MemoryResource {
                path: path.to_string(),
                values: values.into_iter().collect(),
            },
        );
    }

    pub async fn value(&self, id: DbId, key: PropertyKey) -> Option<StandardValue> {
        self.resources
            .read()
            .await
            .get(&id)
            .and_then(|r| r.values.get(&key).cloned())
    }

    /// Make every later write to `id` fail.
    pub async fn fail_writes_for(&self, id: DbId) {
        self.failing_writes.write().await.insert(id);
    }

    pub async fn clear_write_failures(&self) {
        self.failing_writes.write().await.clear();
    }

    pub fn property_fetches(&self) -> usize {
        self.property_fetches.load(Ordering::SeqCst)
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PropertyService for MemoryCatalog {
    async fn get_properties(&self, mask: PropertyPoolMask) -> Result<Vec<Property>, CoreError> {
        self.property_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .properties
            .read()
            .await
            .iter()
            .filter(|p| mask.contains(p.pool.mask()))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ResourceSearch for MemoryCatalog {
    async fn search(&self, filter: &SearchFilterGroup) -> Result<Vec<DbId>, CoreError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .resources
            .read()
            .await
            .iter()
            .filter(|(_, resource)| group_matches(filter, resource))
            .map(|(id, _)| *id)
            .collect())
    }
}

#[async_trait]
impl ResourceValueStore for MemoryCatalog {
    async fn read_values(
        &self,
        resource_ids: &[DbId],
        keys: &[PropertyKey],
    ) -> Result<Vec<ResourceSnapshot>, CoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let resources = self.resources.read().await;
        Ok(resource_ids
            .iter()
            .filter_map(|id| {
                let resource = resources.get(id)?;
                Some(ResourceSnapshot {
                    id: *id,
                    path: resource.path.clone(),
                    values: keys
                        .iter()
                        .filter_map(|k| resource.values.get(k).map(|v| (*k, v.clone())))
                        .collect(),
                })
            })
            .collect())
    }

    async fn write_values(
        &self,
        writes: Vec<ResourceWrite>,
    ) -> Result<Vec<ResourceWriteOutcome>, CoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing_writes.read().await.clone();
        let mut resources = self.resources.write().await;
        Ok(writes
            .into_iter()
            .map(|write| {
                if failing.contains(&write.resource_id) {
                    return ResourceWriteOutcome::failed(write.resource_id, "Resource is locked");
                }
                let Some(resource) = resources.get_mut(&write.resource_id) else {
                    return ResourceWriteOutcome::failed(write.resource_id, "Resource not found");
                };
                for (key, value) in write.values {
                    match value {
                        Some(value) => resource.values.insert(key, value),
                        None => resource.values.remove(&key),
                    };
                }
                ResourceWriteOutcome::ok(write.resource_id)
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Filter evaluation
// ---------------------------------------------------------------------------

fn group_matches(group: &SearchFilterGroup, resource: &MemoryResource) -> bool {
    if group.is_vacuous() {
        return true;
    }
    let mut children = group
        .filters
        .iter()
        .filter(|f| !f.disabled)
        .map(|f| filter_matches(f, resource))
        .chain(
            group
                .groups
                .iter()
                .filter(|g| !g.is_vacuous())
                .map(|g| group_matches(g, resource)),
        );
    match group.combinator {
        SearchCombinator::And => children.all(|m| m),
        SearchCombinator::Or => children.any(|m| m),
    }
}

fn filter_matches(filter: &SearchFilter, resource: &MemoryResource) -> bool {
    let (Some(key), Some(operation)) = (filter.property_key(), filter.operation) else {
        return true;
    };
    let actual = resource.values.get(&key).map(StandardValue::to_text);
    let expected = filter.value.as_deref().map(|raw| match serde_json::from_str(raw) {
        Ok(Value::String(s)) => s,
        Ok(other) => other.to_string(),
        Err(_) => raw.to_string(),
    });

    match (operation, actual.as_deref(), expected.as_deref()) {
        (SearchOperation::IsNull, actual, _) => actual.is_none(),
        (SearchOperation::IsNotNull, actual, _) => actual.is_some(),
        (SearchOperation::Equals, actual, expected) => actual == expected,
        (SearchOperation::NotEquals, actual, expected) => actual != expected,
        (SearchOperation::Contains, Some(a), Some(e)) => a.contains(e),
        (SearchOperation::NotContains, Some(a), Some(e)) => !a.contains(e),
        (SearchOperation::NotContains, None, _) => true,
        (SearchOperation::StartsWith, Some(a), Some(e)) => a.starts_with(e),
        (SearchOperation::EndsWith, Some(a), Some(e)) => a.ends_with(e),
        (SearchOperation::Contains | SearchOperation::StartsWith | SearchOperation::EndsWith, ..) => {
            false
        }
        (op, ..) => {
            tracing::warn!(?op, "Search operation not supported in memory, matching everything");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::BulkModificationState;
    use crate::property::{PropertyPool, PropertyType};
    use chrono::Utc;

    const TITLE: PropertyKey = PropertyKey {
        pool: PropertyPool::Reserved,
        id: 1,
    };

    fn record() -> BulkModificationRecord {
        BulkModificationRecord {
            id: 0,
            name: "bm".into(),
            is_active: true,
            state: BulkModificationState::Created,
            filter: None,
            processes: None,
            variables: None,
            filtered_resource_ids: None,
            created_at: Utc::now(),
            filtered_at: None,
            calculated_at: None,
            applied_at: None,
            reverted_at: None,
        }
    }

    fn diff(resource_id: DbId) -> BulkModificationDiffRecord {
        BulkModificationDiffRecord {
            id: 0,
            bulk_modification_id: 0,
            resource_id,
            resource_path: format!("/r/{resource_id}"),
            diffs: "[]".into(),
            applied: false,
        }
    }

    #[tokio::test]
    async fn store_assigns_ids_and_replaces_diffs() {
        let store = MemoryStore::new();
        let a = store.insert(record()).await.unwrap();
        let b = store.insert(record()).await.unwrap();
        assert_eq!((a.id, b.id), (1, 2));

        let first = store.replace_diffs(a.id, vec![diff(1), diff(2)]).await.unwrap();
        assert_eq!(first.len(), 2);
        let second = store.replace_diffs(a.id, vec![diff(3)]).await.unwrap();
        let stored = store.get_diffs(a.id).await.unwrap();
        assert_eq!(stored, second);
        assert_eq!(stored[0].bulk_modification_id, a.id);

        assert!(store.delete(a.id).await.unwrap());
        assert!(store.get_diffs(a.id).await.unwrap().is_empty());
        assert!(!store.delete(a.id).await.unwrap());
    }

    #[tokio::test]
    async fn save_requires_existing_record() {
        let store = MemoryStore::new();
        assert!(store.save(&record()).await.is_err());
    }

    #[tokio::test]
    async fn catalog_filters_properties_by_mask() {
        let catalog = MemoryCatalog::with_properties(vec![
            Property {
                pool: PropertyPool::Reserved,
                id: 1,
                name: "Title".into(),
                property_type: PropertyType::SingleLineText,
            },
            Property {
                pool: PropertyPool::Custom,
                id: 1,
                name: "Tag".into(),
                property_type: PropertyType::Tags,
            },
        ]);
        let custom = catalog.get_properties(PropertyPoolMask::CUSTOM).await.unwrap();
        assert_eq!(custom.len(), 1);
        assert_eq!(custom[0].pool, PropertyPool::Custom);
        assert_eq!(catalog.property_fetches(), 1);
    }

    #[tokio::test]
    async fn search_evaluates_filters() {
        let catalog = MemoryCatalog::default();
        catalog
            .add_resource(1, "/a", [(TITLE, StandardValue::String("Alien".into()))])
            .await;
        catalog
            .add_resource(2, "/b", [(TITLE, StandardValue::String("Heat".into()))])
            .await;
        catalog.add_resource(3, "/c", []).await;

        let contains = SearchFilterGroup {
            filters: vec![SearchFilter {
                property_pool: Some(TITLE.pool),
                property_id: Some(TITLE.id),
                operation: Some(SearchOperation::Contains),
                value: Some("\"lie\"".into()),
                disabled: false,
            }],
            ..Default::default()
        };
        assert_eq!(catalog.search(&contains).await.unwrap(), vec![1]);
        assert_eq!(
            catalog.search(&SearchFilterGroup::default()).await.unwrap(),
            vec![1, 2, 3]
        );
    }

    #[tokio::test]
    async fn writes_report_per_resource_outcomes() {
        let catalog = MemoryCatalog::default();
        catalog.add_resource(1, "/a", []).await;
        catalog.add_resource(2, "/b", []).await;
        catalog.fail_writes_for(2).await;

        let value = StandardValue::String("x".into());
        let outcomes = catalog
            .write_values(vec![
                ResourceWrite {
                    resource_id: 1,
                    values: vec![(TITLE, Some(value.clone()))],
                },
                ResourceWrite {
                    resource_id: 2,
                    values: vec![(TITLE, Some(value.clone()))],
                },
            ])
            .await
            .unwrap();
        assert!(outcomes[0].is_ok());
        assert!(!outcomes[1].is_ok());
        assert_eq!(catalog.value(1, TITLE).await, Some(value));
        assert_eq!(catalog.value(2, TITLE).await, None);
    }
}
