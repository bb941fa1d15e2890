//! Repository for the `bulk_modifications` table.

use sqlx::PgPool;
use curio_core::codec::BulkModificationRecord;
use curio_core::types::DbId;

use crate::models::bulk_modification::BulkModificationRow;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, name, is_active, status, filter, processes, variables, \
    filtered_resource_ids, created_at, filtered_at, calculated_at, applied_at, \
    reverted_at, updated_at";

/// Provides CRUD operations for bulk modifications.
pub struct BulkModificationRepo;

impl BulkModificationRepo {
    /// Insert a new bulk modification, returning the created row. The id
    /// of `record` is ignored.
    pub async fn create(
        pool: &PgPool,
        record: &BulkModificationRecord,
    ) -> Result<BulkModificationRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO bulk_modifications \
                (name, is_active, status, filter, processes, variables, \
                 filtered_resource_ids, created_at, filtered_at, calculated_at, \
                 applied_at, reverted_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, BulkModificationRow>(&query)
            .bind(&record.name)
            .bind(record.is_active)
            .bind(record.state.as_str())
            .bind(&record.filter)
            .bind(&record.processes)
            .bind(&record.variables)
            .bind(&record.filtered_resource_ids)
            .bind(record.created_at)
            .bind(record.filtered_at)
            .bind(record.calculated_at)
            .bind(record.applied_at)
            .bind(record.reverted_at)
            .fetch_one(pool)
            .await
    }

    /// Find a single bulk modification by ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<BulkModificationRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM bulk_modifications WHERE id = $1");
        sqlx::query_as::<_, BulkModificationRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all bulk modifications, oldest first.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<BulkModificationRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM bulk_modifications ORDER BY id ASC");
        sqlx::query_as::<_, BulkModificationRow>(&query)
            .fetch_all(pool)
            .await
    }

    /// Overwrite every mutable column. Returns `None` if the row is gone.
    pub async fn update(
        pool: &PgPool,
        record: &BulkModificationRecord,
    ) -> Result<Option<BulkModificationRow>, sqlx::Error> {
        let query = format!(
            "UPDATE bulk_modifications SET \
                name = $2, is_active = $3, status = $4, filter = $5, processes = $6, \
                variables = $7, filtered_resource_ids = $8, filtered_at = $9, \
                calculated_at = $10, applied_at = $11, reverted_at = $12, \
                updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, BulkModificationRow>(&query)
            .bind(record.id)
            .bind(&record.name)
            .bind(record.is_active)
            .bind(record.state.as_str())
            .bind(&record.filter)
            .bind(&record.processes)
            .bind(&record.variables)
            .bind(&record.filtered_resource_ids)
            .bind(record.filtered_at)
            .bind(record.calculated_at)
            .bind(record.applied_at)
            .bind(record.reverted_at)
            .fetch_optional(pool)
            .await
    }

    /// Delete a bulk modification; its diffs go with it (`ON DELETE CASCADE`).
    /// Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM bulk_modifications WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
