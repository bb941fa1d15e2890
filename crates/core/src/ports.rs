//! Boundaries to the outside world.
//!
//! The engine never talks to a database or a remote service directly. The
//! property catalog, resource search, resource values and the engine's own
//! persistence are all reached through these traits, so the same engine
//! runs against PostgreSQL and HTTP adapters in production and against
//! [`memory`](crate::memory) adapters in tests.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::codec::{BulkModificationDiffRecord, BulkModificationRecord};
use crate::error::CoreError;
use crate::filter::SearchFilterGroup;
use crate::property::{Property, PropertyKey, PropertyPoolMask};
use crate::standard_value::StandardValue;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Resource values
// ---------------------------------------------------------------------------

/// Current values of one resource, restricted to the requested properties.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResourceSnapshot {
    pub id: DbId,
    pub path: String,
    pub values: HashMap<PropertyKey, StandardValue>,
}

impl ResourceSnapshot {
    pub fn value(&self, key: PropertyKey) -> Option<StandardValue> {
        self.values.get(&key).cloned()
    }
}

/// New values for one resource. All values of a resource are written
/// together and succeed or fail together.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceWrite {
    pub resource_id: DbId,
    pub values: Vec<(PropertyKey, Option<StandardValue>)>,
}

/// Result of writing one resource. `error` is `None` on success.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceWriteOutcome {
    pub resource_id: DbId,
    pub error: Option<String>,
}

impl ResourceWriteOutcome {
    pub fn ok(resource_id: DbId) -> Self {
        Self {
            resource_id,
            error: None,
        }
    }

    pub fn failed(resource_id: DbId, error: impl Into<String>) -> Self {
        Self {
            resource_id,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

// ---------------------------------------------------------------------------
// Catalog ports
// ---------------------------------------------------------------------------

#[async_trait]
pub trait PropertyService: Send + Sync {
    /// Every property in the pools of `mask`, in one call.
    async fn get_properties(&self, mask: PropertyPoolMask) -> Result<Vec<Property>, CoreError>;
}

#[async_trait]
pub trait ResourceSearch: Send + Sync {
    /// Ids of the resources matching `filter`, in a stable order.
    async fn search(&self, filter: &SearchFilterGroup) -> Result<Vec<DbId>, CoreError>;
}

#[async_trait]
pub trait ResourceValueStore: Send + Sync {
    /// Current values of `keys` for each resource in `resource_ids`.
    /// Resources that no longer exist are omitted.
    async fn read_values(
        &self,
        resource_ids: &[DbId],
        keys: &[PropertyKey],
    ) -> Result<Vec<ResourceSnapshot>, CoreError>;

    /// Write every resource in one batch. An `Err` means the batch itself
    /// could not be sent; per-resource failures are reported as outcomes.
    async fn write_values(
        &self,
        writes: Vec<ResourceWrite>,
    ) -> Result<Vec<ResourceWriteOutcome>, CoreError>;
}

// ---------------------------------------------------------------------------
// Engine persistence
// ---------------------------------------------------------------------------

/// Persistence of bulk modifications in their record form. Records are
/// converted to and from domain models by [`codec`](crate::codec), which
/// needs the property catalog to do so.
#[async_trait]
pub trait BulkModificationStore: Send + Sync {
    async fn get(&self, id: DbId) -> Result<Option<BulkModificationRecord>, CoreError>;

    async fn list(&self) -> Result<Vec<BulkModificationRecord>, CoreError>;

    /// Persist a new modification; the store assigns the id.
    async fn insert(
        &self,
        record: BulkModificationRecord,
    ) -> Result<BulkModificationRecord, CoreError>;

    async fn save(&self, record: &BulkModificationRecord) -> Result<(), CoreError>;

    /// Delete a modification together with its diffs. Returns whether it
    /// existed.
    async fn delete(&self, id: DbId) -> Result<bool, CoreError>;

    /// Atomically replace every diff of a modification. Ids are assigned
    /// by the store.
    async fn replace_diffs(
        &self,
        bulk_modification_id: DbId,
        diffs: Vec<BulkModificationDiffRecord>,
    ) -> Result<Vec<BulkModificationDiffRecord>, CoreError>;

    /// Diffs of a modification ordered by id.
    async fn get_diffs(
        &self,
        bulk_modification_id: DbId,
    ) -> Result<Vec<BulkModificationDiffRecord>, CoreError>;

    /// Update existing diffs in place (the `applied` flag).
    async fn save_diffs(&self, diffs: &[BulkModificationDiffRecord]) -> Result<(), CoreError>;

    async fn delete_diffs(&self, bulk_modification_id: DbId) -> Result<(), CoreError>;
}
