//! Bulk modification service: the lifecycle operations.
//!
//! Every transition follows the same shape: load, validate the transition
//! against the state table, call each external collaborator at most once,
//! and only then write to the store. A transition whose future is dropped
//! before the final writes leaves stored state untouched.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::task::JoinSet;

use crate::aggregate::aggregate_pools;
use crate::bulk_modification::{validate_name, BulkModification, BulkModificationPatch};
use crate::codec::{
    decode_record, diff_property_keys, diff_to_record, diffs_from_map, diffs_to_domain,
    fetch_property_map, retain_decodable_steps, to_domain_model, to_domain_models, to_record,
    BulkModificationDiffRecord, BulkModificationRecord,
};
use crate::diff::{ApplyReport, BulkModificationDiff, CalculationPlan, ResourceDiff, ResourceFailure};
use crate::error::CoreError;
use crate::lifecycle::BulkModificationState;
use crate::ports::{
    BulkModificationStore, PropertyService, ResourceSearch, ResourceSnapshot, ResourceValueStore,
    ResourceWrite, ResourceWriteOutcome,
};
use crate::process::Process;
use crate::property::{PropertyMap, PropertyPoolMask};
use crate::types::DbId;

/// Default number of tasks diff computation is split across.
pub const DEFAULT_CALCULATE_WORKERS: usize = 4;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on concurrent diff computation tasks.
    pub calculate_workers: usize,
    /// Default for `throw_if_missing` when a calculation does not say.
    pub strict_preview: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            calculate_workers: DEFAULT_CALCULATE_WORKERS,
            strict_preview: false,
        }
    }
}

/// Result of a calculation.
#[derive(Debug, Clone, Serialize)]
pub struct CalculationSummary {
    pub bulk_modification: BulkModification,
    /// Resources with at least one changed property.
    pub changed_resources: usize,
    /// Processes dropped because their property no longer exists.
    pub dropped_processes: usize,
}

#[derive(Clone)]
pub struct BulkModificationService {
    store: Arc<dyn BulkModificationStore>,
    properties: Arc<dyn PropertyService>,
    search: Arc<dyn ResourceSearch>,
    values: Arc<dyn ResourceValueStore>,
    config: EngineConfig,
}

impl BulkModificationService {
    pub fn new(
        store: Arc<dyn BulkModificationStore>,
        properties: Arc<dyn PropertyService>,
        search: Arc<dyn ResourceSearch>,
        values: Arc<dyn ResourceValueStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            properties,
            search,
            values,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Definitions
    // -----------------------------------------------------------------------

    pub async fn create(&self, name: &str) -> Result<BulkModification, CoreError> {
        validate_name(name).map_err(CoreError::Validation)?;
        let bm = BulkModification::new(0, name.trim().to_string(), Utc::now());
        let record = self.store.insert(to_record(&bm)).await?;
        tracing::info!(id = record.id, name = %record.name, "Created bulk modification");
        to_domain_model(record, self.properties.as_ref()).await
    }

    pub async fn get(&self, id: DbId) -> Result<BulkModification, CoreError> {
        let record = self.load_record(id).await?;
        to_domain_model(record, self.properties.as_ref()).await
    }

    async fn load_record(&self, id: DbId) -> Result<BulkModificationRecord, CoreError> {
        self.store.get(id).await?.ok_or(CoreError::NotFound {
            entity: "BulkModification",
            id,
        })
    }

    /// Load a definition without resolving its steps. Transitions that
    /// fetch properties themselves finish the decode against that fetch.
    async fn load_raw(&self, id: DbId) -> Result<BulkModification, CoreError> {
        Ok(decode_record(self.load_record(id).await?))
    }

    /// One aggregated fetch covering the definition and `extra`, after
    /// which the definition's stored steps are filtered against it.
    async fn resolve(
        &self,
        bm: &mut BulkModification,
        extra: PropertyPoolMask,
    ) -> Result<PropertyMap, CoreError> {
        let mask = aggregate_pools(
            bm.filter.as_ref(),
            bm.processes.as_deref(),
            bm.variables.as_deref(),
        ) | extra;
        let properties = fetch_property_map(self.properties.as_ref(), mask).await?;
        retain_decodable_steps(bm, &properties);
        Ok(properties)
    }

    pub async fn list(&self) -> Result<Vec<BulkModification>, CoreError> {
        let records = self.store.list().await?;
        to_domain_models(records, self.properties.as_ref()).await
    }

    pub async fn patch(
        &self,
        id: DbId,
        patch: BulkModificationPatch,
    ) -> Result<BulkModification, CoreError> {
        let mut bm = self.get(id).await?;
        let stale = bm.apply_patch(patch)?;
        if stale {
            self.store.delete_diffs(id).await?;
        }
        self.store.save(&to_record(&bm)).await?;
        tracing::info!(id, state = %bm.state, cleared_diffs = stale, "Updated bulk modification");
        Ok(bm)
    }

    pub async fn delete(&self, id: DbId) -> Result<(), CoreError> {
        if !self.store.delete(id).await? {
            return Err(CoreError::NotFound {
                entity: "BulkModification",
                id,
            });
        }
        tracing::info!(id, "Deleted bulk modification");
        Ok(())
    }

    pub async fn duplicate(&self, id: DbId) -> Result<BulkModification, CoreError> {
        let source = self.get(id).await?;
        let copy = source.duplicate(0, Utc::now());
        let record = self.store.insert(to_record(&copy)).await?;
        tracing::info!(source = id, id = record.id, "Duplicated bulk modification");
        Ok(BulkModification { id: record.id, ..copy })
    }

    // -----------------------------------------------------------------------
    // Filter
    // -----------------------------------------------------------------------

    /// Run the saved filter once and store the matching ids in order.
    /// Re-filtering a calculated modification discards its diffs.
    pub async fn filter(&self, id: DbId) -> Result<BulkModification, CoreError> {
        let mut bm = self.get(id).await?;
        bm.state.transition(BulkModificationState::Filtered)?;
        let filter = bm.filter.clone().ok_or_else(|| {
            CoreError::Validation("Bulk modification has no filter to run".to_string())
        })?;

        let ids = self.search.search(&filter).await?;

        if bm.state == BulkModificationState::Calculated {
            self.store.delete_diffs(id).await?;
        }
        bm.move_to(BulkModificationState::Filtered, Utc::now())?;
        bm.filtered_resource_ids = Some(ids);
        self.store.save(&to_record(&bm)).await?;
        tracing::info!(id, resources = bm.filtered_resource_ids().len(), "Filtered bulk modification");
        Ok(bm)
    }

    // -----------------------------------------------------------------------
    // Calculate
    // -----------------------------------------------------------------------

    /// Compute the diffs of every filtered resource and replace the stored
    /// diffs with them.
    ///
    /// `throw_if_missing` defaults to the configured strictness. When strict,
    /// a process or variable bound to a property that no longer exists
    /// fails the calculation before anything is read; otherwise such
    /// processes are dropped and such variables resolve to absent.
    pub async fn calculate(
        &self,
        id: DbId,
        throw_if_missing: Option<bool>,
    ) -> Result<CalculationSummary, CoreError> {
        let mut bm = self.load_raw(id).await?;
        bm.state.transition(BulkModificationState::Calculated)?;
        let strict = throw_if_missing.unwrap_or(self.config.strict_preview);

        let properties = self.resolve(&mut bm, PropertyPoolMask::empty()).await?;

        let missing = properties.missing(bm.referenced_properties().iter());
        if strict && !missing.is_empty() {
            tracing::warn!(id, missing = missing.len(), "Calculation aborted, properties missing");
            return Err(CoreError::MissingProperties { missing });
        }

        let (processes, dropped): (Vec<Process>, Vec<Process>) = bm
            .processes()
            .iter()
            .cloned()
            .partition(|p| properties.contains(p.property_key()));
        for process in &dropped {
            tracing::warn!(id, property = %process.property_key(), "Dropping process for missing property");
        }

        let plan = Arc::new(CalculationPlan::new(
            properties,
            processes,
            bm.variables().to_vec(),
            Utc::now(),
        ));
        let ids = bm.filtered_resource_ids().to_vec();
        let keys = plan.read_keys();
        let snapshots = if ids.is_empty() || keys.is_empty() || plan.processes().is_empty() {
            Vec::new()
        } else {
            let read = self.values.read_values(&ids, &keys).await?;
            order_snapshots(&ids, read)
        };

        let computed = compute_diffs(Arc::clone(&plan), snapshots, self.config.calculate_workers).await?;
        let diffs: Vec<BulkModificationDiffRecord> = computed
            .into_iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(snapshot, entries)| {
                diff_to_record(&BulkModificationDiff {
                    id: 0,
                    bulk_modification_id: id,
                    resource_id: snapshot.id,
                    resource_path: snapshot.path,
                    diffs: entries,
                    applied: false,
                })
            })
            .collect();
        let changed_resources = diffs.len();

        self.store.replace_diffs(id, diffs).await?;
        bm.move_to(BulkModificationState::Calculated, Utc::now())?;
        self.store.save(&to_record(&bm)).await?;

        tracing::info!(
            id,
            resources = ids.len(),
            changed_resources,
            dropped_processes = dropped.len(),
            "Calculated bulk modification"
        );
        Ok(CalculationSummary {
            bulk_modification: bm,
            changed_resources,
            dropped_processes: dropped.len(),
        })
    }

    /// Stored diffs, ordered as calculated. Entries that no longer decode
    /// are left out.
    pub async fn get_diffs(
        &self,
        id: DbId,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<Vec<BulkModificationDiff>, CoreError> {
        if self.store.get(id).await?.is_none() {
            return Err(CoreError::NotFound {
                entity: "BulkModification",
                id,
            });
        }
        let records: Vec<BulkModificationDiffRecord> = self
            .store
            .get_diffs(id)
            .await?
            .into_iter()
            .skip(offset)
            .take(limit.unwrap_or(usize::MAX))
            .collect();
        diffs_to_domain(records, self.properties.as_ref(), false).await
    }

    // -----------------------------------------------------------------------
    // Apply / revert
    // -----------------------------------------------------------------------

    /// Write every diff's new values in one batch.
    ///
    /// Each resource succeeds or fails as a unit. Succeeded diffs are
    /// flagged as applied. If every resource fails the modification stays
    /// `Calculated` and an error is returned; otherwise it becomes
    /// `Applied` and the report lists the failures.
    pub async fn apply(&self, id: DbId) -> Result<ApplyReport, CoreError> {
        let mut bm = self.load_raw(id).await?;
        bm.state.transition(BulkModificationState::Applied)?;

        let (mut records, diffs) = self.load_diffs_strict(&mut bm).await?;
        let writes: Vec<ResourceWrite> = diffs
            .iter()
            .filter(|d| !d.diffs.is_empty())
            .map(|d| ResourceWrite {
                resource_id: d.resource_id,
                values: d.diffs.iter().map(|e| (e.property_key(), e.new_value.clone())).collect(),
            })
            .collect();

        let report = self.write(writes).await?;
        if report.is_total_failure() {
            tracing::warn!(id, failed = report.failed.len(), "Apply failed for every resource");
            return Err(CoreError::External(format!(
                "Failed to apply changes to all {} resources",
                report.failed.len()
            )));
        }

        let changed = mark_applied(&mut records, &report.succeeded, true);
        self.store.save_diffs(&changed).await?;
        bm.move_to(BulkModificationState::Applied, Utc::now())?;
        self.store.save(&to_record(&bm)).await?;
        tracing::info!(
            id,
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "Applied bulk modification"
        );
        Ok(report)
    }

    /// Write the old values of every applied diff back. Only allowed from
    /// `Applied`; the same partial-failure rules as [`apply`](Self::apply).
    pub async fn revert(&self, id: DbId) -> Result<ApplyReport, CoreError> {
        let mut bm = self.load_raw(id).await?;
        bm.state.transition(BulkModificationState::Reverted)?;

        let (mut records, diffs) = self.load_diffs_strict(&mut bm).await?;
        let writes: Vec<ResourceWrite> = diffs
            .iter()
            .filter(|d| d.applied && !d.diffs.is_empty())
            .map(|d| ResourceWrite {
                resource_id: d.resource_id,
                values: d
                    .diffs
                    .iter()
                    .map(|e: &ResourceDiff| (e.property_key(), e.old_value.clone()))
                    .collect(),
            })
            .collect();

        let report = self.write(writes).await?;
        if report.is_total_failure() {
            tracing::warn!(id, failed = report.failed.len(), "Revert failed for every resource");
            return Err(CoreError::External(format!(
                "Failed to revert changes on all {} resources",
                report.failed.len()
            )));
        }

        let changed = mark_applied(&mut records, &report.succeeded, false);
        self.store.save_diffs(&changed).await?;
        bm.move_to(BulkModificationState::Reverted, Utc::now())?;
        self.store.save(&to_record(&bm)).await?;
        tracing::info!(
            id,
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "Reverted bulk modification"
        );
        Ok(report)
    }

    /// Stored diffs decoded strictly, sharing one property fetch with the
    /// definition.
    async fn load_diffs_strict(
        &self,
        bm: &mut BulkModification,
    ) -> Result<(Vec<BulkModificationDiffRecord>, Vec<BulkModificationDiff>), CoreError> {
        let records = self.store.get_diffs(bm.id).await?;
        let diff_pools: PropertyPoolMask = diff_property_keys(&records).iter().map(|k| k.pool).collect();
        let properties = self.resolve(bm, diff_pools).await?;
        let diffs = diffs_from_map(records.clone(), &properties, true)?;
        Ok((records, diffs))
    }

    /// One batched write. An empty batch makes no call.
    async fn write(&self, writes: Vec<ResourceWrite>) -> Result<ApplyReport, CoreError> {
        if writes.is_empty() {
            return Ok(ApplyReport::default());
        }
        let requested: Vec<DbId> = writes.iter().map(|w| w.resource_id).collect();
        let outcomes: HashMap<DbId, ResourceWriteOutcome> = self
            .values
            .write_values(writes)
            .await?
            .into_iter()
            .map(|o| (o.resource_id, o))
            .collect();

        let mut report = ApplyReport::default();
        for resource_id in requested {
            match outcomes.get(&resource_id) {
                Some(outcome) if outcome.is_ok() => report.succeeded.push(resource_id),
                Some(outcome) => report.failed.push(ResourceFailure {
                    resource_id,
                    error: outcome.error.clone().unwrap_or_default(),
                }),
                None => report.failed.push(ResourceFailure {
                    resource_id,
                    error: "No outcome reported for resource".to_string(),
                }),
            }
        }
        Ok(report)
    }
}

/// Reorder snapshots to follow `ids`; ids without a snapshot are skipped.
fn order_snapshots(ids: &[DbId], snapshots: Vec<ResourceSnapshot>) -> Vec<ResourceSnapshot> {
    let mut by_id: HashMap<DbId, ResourceSnapshot> =
        snapshots.into_iter().map(|s| (s.id, s)).collect();
    ids.iter().filter_map(|id| by_id.remove(id)).collect()
}

/// Set `applied` on the records of the given resources, returning the
/// records that changed.
fn mark_applied(
    records: &mut [BulkModificationDiffRecord],
    resource_ids: &[DbId],
    applied: bool,
) -> Vec<BulkModificationDiffRecord> {
    records
        .iter_mut()
        .filter(|r| resource_ids.contains(&r.resource_id) && r.applied != applied)
        .map(|r| {
            r.applied = applied;
            r.clone()
        })
        .collect()
}

/// Run the plan over every snapshot, split into at most `workers` chunks.
/// Output order matches input order.
async fn compute_diffs(
    plan: Arc<CalculationPlan>,
    snapshots: Vec<ResourceSnapshot>,
    workers: usize,
) -> Result<Vec<(ResourceSnapshot, Vec<ResourceDiff>)>, CoreError> {
    if snapshots.is_empty() {
        return Ok(Vec::new());
    }
    let chunk_size = snapshots.len().div_ceil(workers.max(1));

    let mut chunks: Vec<Vec<ResourceSnapshot>> = Vec::new();
    let mut rest = snapshots;
    while !rest.is_empty() {
        let tail = rest.split_off(chunk_size.min(rest.len()));
        chunks.push(rest);
        rest = tail;
    }

    let mut set = JoinSet::new();
    for (index, chunk) in chunks.into_iter().enumerate() {
        let plan = Arc::clone(&plan);
        set.spawn(async move {
            let computed: Vec<(ResourceSnapshot, Vec<ResourceDiff>)> = chunk
                .into_iter()
                .map(|snapshot| {
                    let diffs = plan.compute(&snapshot);
                    (snapshot, diffs)
                })
                .collect();
            (index, computed)
        });
    }

    let mut results: Vec<(usize, Vec<(ResourceSnapshot, Vec<ResourceDiff>)>)> = Vec::new();
    while let Some(joined) = set.join_next().await {
        let chunk = joined.map_err(|e| CoreError::Internal(format!("Diff worker failed: {e}")))?;
        results.push(chunk);
    }
    results.sort_by_key(|(index, _)| *index);
    Ok(results.into_iter().flat_map(|(_, chunk)| chunk).collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
