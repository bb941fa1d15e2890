//! Repository for the `bulk_modification_diffs` table.

use sqlx::{PgPool, Postgres, Transaction};
use curio_core::codec::BulkModificationDiffRecord;
use curio_core::types::DbId;

use crate::models::bulk_modification::BulkModificationDiffRow;

const COLUMNS: &str = "id, bulk_modification_id, resource_id, resource_path, diffs, applied";

/// Provides operations on the diffs of a bulk modification.
pub struct BulkModificationDiffRepo;

impl BulkModificationDiffRepo {
    /// Replace every diff of a bulk modification in one transaction.
    /// Returned rows keep the order of `diffs`.
    pub async fn replace_for_bulk_modification(
        pool: &PgPool,
        bulk_modification_id: DbId,
        diffs: &[BulkModificationDiffRecord],
    ) -> Result<Vec<BulkModificationDiffRow>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM bulk_modification_diffs WHERE bulk_modification_id = $1")
            .bind(bulk_modification_id)
            .execute(&mut *tx)
            .await?;

        let mut rows = Vec::with_capacity(diffs.len());
        for diff in diffs {
            rows.push(Self::insert_inner(&mut tx, bulk_modification_id, diff).await?);
        }

        tx.commit().await?;
        Ok(rows)
    }

    async fn insert_inner(
        tx: &mut Transaction<'_, Postgres>,
        bulk_modification_id: DbId,
        diff: &BulkModificationDiffRecord,
    ) -> Result<BulkModificationDiffRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO bulk_modification_diffs \
                (bulk_modification_id, resource_id, resource_path, diffs, applied) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, BulkModificationDiffRow>(&query)
            .bind(bulk_modification_id)
            .bind(diff.resource_id)
            .bind(&diff.resource_path)
            .bind(&diff.diffs)
            .bind(diff.applied)
            .fetch_one(&mut **tx)
            .await
    }

    /// Diffs of a bulk modification in insertion order.
    pub async fn list_for_bulk_modification(
        pool: &PgPool,
        bulk_modification_id: DbId,
    ) -> Result<Vec<BulkModificationDiffRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM bulk_modification_diffs \
             WHERE bulk_modification_id = $1 \
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, BulkModificationDiffRow>(&query)
            .bind(bulk_modification_id)
            .fetch_all(pool)
            .await
    }

    /// Set the `applied` flag of the given diffs in one statement.
    pub async fn set_applied(
        pool: &PgPool,
        ids: &[DbId],
        applied: bool,
    ) -> Result<u64, sqlx::Error> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result =
            sqlx::query("UPDATE bulk_modification_diffs SET applied = $2 WHERE id = ANY($1)")
                .bind(ids)
                .bind(applied)
                .execute(pool)
                .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_for_bulk_modification(
        pool: &PgPool,
        bulk_modification_id: DbId,
    ) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM bulk_modification_diffs WHERE bulk_modification_id = $1")
                .bind(bulk_modification_id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected())
    }
}
