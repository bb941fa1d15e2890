//! [`BulkModificationStore`] backed by PostgreSQL.

use async_trait::async_trait;
use curio_core::codec::{BulkModificationDiffRecord, BulkModificationRecord};
use curio_core::error::CoreError;
use curio_core::ports::BulkModificationStore;
use curio_core::types::DbId;

use crate::repositories::{BulkModificationDiffRepo, BulkModificationRepo};
use crate::DbPool;

#[derive(Clone)]
pub struct PgBulkModificationStore {
    pool: DbPool,
}

impl PgBulkModificationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

/// Database failures surface to the engine as internal errors; the detail
/// is logged here and not forwarded to clients.
fn db_error(err: sqlx::Error) -> CoreError {
    tracing::error!(error = %err, "Bulk modification store query failed");
    CoreError::Internal(format!("Database error: {err}"))
}

#[async_trait]
impl BulkModificationStore for PgBulkModificationStore {
    async fn get(&self, id: DbId) -> Result<Option<BulkModificationRecord>, CoreError> {
        BulkModificationRepo::find_by_id(&self.pool, id)
            .await
            .map_err(db_error)?
            .map(BulkModificationRecord::try_from)
            .transpose()
    }

    async fn list(&self) -> Result<Vec<BulkModificationRecord>, CoreError> {
        BulkModificationRepo::list_all(&self.pool)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(BulkModificationRecord::try_from)
            .collect()
    }

    async fn insert(
        &self,
        record: BulkModificationRecord,
    ) -> Result<BulkModificationRecord, CoreError> {
        let row = BulkModificationRepo::create(&self.pool, &record)
            .await
            .map_err(db_error)?;
        BulkModificationRecord::try_from(row)
    }

    async fn save(&self, record: &BulkModificationRecord) -> Result<(), CoreError> {
        BulkModificationRepo::update(&self.pool, record)
            .await
            .map_err(db_error)?
            .ok_or(CoreError::NotFound {
                entity: "BulkModification",
                id: record.id,
            })?;
        Ok(())
    }

    async fn delete(&self, id: DbId) -> Result<bool, CoreError> {
        BulkModificationRepo::delete(&self.pool, id)
            .await
            .map_err(db_error)
    }

    async fn replace_diffs(
        &self,
        bulk_modification_id: DbId,
        diffs: Vec<BulkModificationDiffRecord>,
    ) -> Result<Vec<BulkModificationDiffRecord>, CoreError> {
        let rows = BulkModificationDiffRepo::replace_for_bulk_modification(
            &self.pool,
            bulk_modification_id,
            &diffs,
        )
        .await
        .map_err(db_error)?;
        tracing::debug!(bulk_modification_id, count = rows.len(), "Replaced diffs");
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_diffs(
        &self,
        bulk_modification_id: DbId,
    ) -> Result<Vec<BulkModificationDiffRecord>, CoreError> {
        let rows =
            BulkModificationDiffRepo::list_for_bulk_modification(&self.pool, bulk_modification_id)
                .await
                .map_err(db_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn save_diffs(&self, diffs: &[BulkModificationDiffRecord]) -> Result<(), CoreError> {
        let (applied, pending): (Vec<&BulkModificationDiffRecord>, Vec<&BulkModificationDiffRecord>) =
            diffs.iter().partition(|d| d.applied);
        let applied: Vec<DbId> = applied.iter().map(|d| d.id).collect();
        let pending: Vec<DbId> = pending.iter().map(|d| d.id).collect();

        BulkModificationDiffRepo::set_applied(&self.pool, &applied, true)
            .await
            .map_err(db_error)?;
        BulkModificationDiffRepo::set_applied(&self.pool, &pending, false)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn delete_diffs(&self, bulk_modification_id: DbId) -> Result<(), CoreError> {
        BulkModificationDiffRepo::delete_for_bulk_modification(&self.pool, bulk_modification_id)
            .await
            .map_err(db_error)?;
        Ok(())
    }
}
