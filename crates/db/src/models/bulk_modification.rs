//! Bulk modification rows.
//!
//! Maps to the `bulk_modifications` and `bulk_modification_diffs` tables.

use serde::Serialize;
use sqlx::FromRow;

use curio_core::codec::{BulkModificationDiffRecord, BulkModificationRecord};
use curio_core::error::CoreError;
use curio_core::lifecycle::BulkModificationState;
use curio_core::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A row from the `bulk_modifications` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BulkModificationRow {
    pub id: DbId,
    pub name: String,
    pub is_active: bool,
    pub status: String,
    pub filter: Option<String>,
    pub processes: Option<String>,
    pub variables: Option<String>,
    pub filtered_resource_ids: Option<String>,
    pub created_at: Timestamp,
    pub filtered_at: Option<Timestamp>,
    pub calculated_at: Option<Timestamp>,
    pub applied_at: Option<Timestamp>,
    pub reverted_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

impl TryFrom<BulkModificationRow> for BulkModificationRecord {
    type Error = CoreError;

    fn try_from(row: BulkModificationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            is_active: row.is_active,
            state: BulkModificationState::from_str_value(&row.status)?,
            filter: row.filter,
            processes: row.processes,
            variables: row.variables,
            filtered_resource_ids: row.filtered_resource_ids,
            created_at: row.created_at,
            filtered_at: row.filtered_at,
            calculated_at: row.calculated_at,
            applied_at: row.applied_at,
            reverted_at: row.reverted_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Diffs
// ---------------------------------------------------------------------------

/// A row from the `bulk_modification_diffs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BulkModificationDiffRow {
    pub id: DbId,
    pub bulk_modification_id: DbId,
    pub resource_id: DbId,
    pub resource_path: String,
    pub diffs: String,
    pub applied: bool,
}

impl From<BulkModificationDiffRow> for BulkModificationDiffRecord {
    fn from(row: BulkModificationDiffRow) -> Self {
        Self {
            id: row.id,
            bulk_modification_id: row.bulk_modification_id,
            resource_id: row.resource_id,
            resource_path: row.resource_path,
            diffs: row.diffs,
            applied: row.applied,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
