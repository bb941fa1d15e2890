//! Text persistence of bulk modifications and their diffs.
//!
//! Filter, processes, variables and filtered resource ids are stored as
//! four independent JSON text blobs; each one decodes on its own and a
//! blob that fails to decode is treated as absent. Step lists are nested
//! JSON strings inside the process and variable blobs, so a corrupt step
//! list never takes the rest of the definition down with it.
//!
//! Decoding step payloads and diff values needs the declared type of each
//! referenced property. All properties for a batch of records are fetched
//! with one aggregated call to the [`PropertyService`].

use serde::{Deserialize, Serialize};

use crate::aggregate::aggregate_pools;
use crate::bulk_modification::BulkModification;
use crate::diff::{BulkModificationDiff, ResourceDiff};
use crate::error::CoreError;
use crate::filter::SearchFilterGroup;
use crate::lifecycle::BulkModificationState;
use crate::ports::PropertyService;
use crate::process::variable::Variable;
use crate::process::{retain_decodable, Process, Step};
use crate::property::{PropertyKey, PropertyMap, PropertyPool, PropertyPoolMask};
use crate::standard_value::{deserialize_text, serialize_text};
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Persisted form of a [`BulkModification`].
#[derive(Debug, Clone, PartialEq)]
pub struct BulkModificationRecord {
    pub id: DbId,
    pub name: String,
    pub is_active: bool,
    pub state: BulkModificationState,
    pub filter: Option<String>,
    pub processes: Option<String>,
    pub variables: Option<String>,
    pub filtered_resource_ids: Option<String>,
    pub created_at: Timestamp,
    pub filtered_at: Option<Timestamp>,
    pub calculated_at: Option<Timestamp>,
    pub applied_at: Option<Timestamp>,
    pub reverted_at: Option<Timestamp>,
}

/// Persisted form of a [`BulkModificationDiff`]. `diffs` is a JSON array
/// of property changes whose values are serialized standard-value text.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkModificationDiffRecord {
    pub id: DbId,
    pub bulk_modification_id: DbId,
    pub resource_id: DbId,
    pub resource_path: String,
    pub diffs: String,
    pub applied: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcessBlob {
    property_pool: PropertyPool,
    property_id: i32,
    #[serde(default)]
    steps: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VariableBlob {
    key: String,
    name: String,
    property_pool: PropertyPool,
    property_id: i32,
    #[serde(default)]
    preprocesses: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceDiffBlob {
    property_pool: PropertyPool,
    property_id: i32,
    #[serde(default)]
    old_value: Option<String>,
    #[serde(default)]
    new_value: Option<String>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn encode<T: Serialize + ?Sized>(value: &T, what: &'static str) -> Option<String> {
    match serde_json::to_string(value) {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::warn!(what, error = %e, "Failed to encode value, storing nothing");
            None
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(text: Option<&str>, what: &'static str, id: DbId) -> Option<T> {
    let text = text?;
    match serde_json::from_str(text) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(what, id, error = %e, "Stored blob does not decode, treating as absent");
            None
        }
    }
}

/// Steps decode one element at a time; a malformed element is dropped
/// without taking its siblings with it.
fn decode_steps(text: Option<&str>, id: DbId) -> Vec<Step> {
    let elements: Vec<serde_json::Value> = decode(text, "steps", id).unwrap_or_default();
    elements
        .into_iter()
        .enumerate()
        .filter_map(|(index, element)| match serde_json::from_value::<Step>(element) {
            Ok(step) => Some(step),
            Err(e) => {
                tracing::warn!(id, index, error = %e, "Dropping stored step that does not decode");
                None
            }
        })
        .collect()
}

/// Fetch every property in `mask` and index it. An empty mask makes no call.
pub async fn fetch_property_map(
    property_service: &dyn PropertyService,
    mask: PropertyPoolMask,
) -> Result<PropertyMap, CoreError> {
    if mask.is_empty() {
        return Ok(PropertyMap::default());
    }
    let properties = property_service.get_properties(mask).await?;
    Ok(PropertyMap::from_properties(properties))
}

// ---------------------------------------------------------------------------
// Bulk modifications
// ---------------------------------------------------------------------------

pub fn to_record(bm: &BulkModification) -> BulkModificationRecord {
    let processes = bm.processes.as_ref().map(|processes| {
        processes
            .iter()
            .map(|p| ProcessBlob {
                property_pool: p.property_pool,
                property_id: p.property_id,
                steps: encode(&p.steps, "steps"),
            })
            .collect::<Vec<_>>()
    });
    let variables = bm.variables.as_ref().map(|variables| {
        variables
            .iter()
            .map(|v| VariableBlob {
                key: v.key.clone(),
                name: v.name.clone(),
                property_pool: v.property_pool,
                property_id: v.property_id,
                preprocesses: encode(&v.preprocesses, "preprocesses"),
            })
            .collect::<Vec<_>>()
    });

    BulkModificationRecord {
        id: bm.id,
        name: bm.name.clone(),
        is_active: bm.is_active,
        state: bm.state,
        filter: bm.filter.as_ref().and_then(|f| encode(f, "filter")),
        processes: processes.and_then(|p| encode(&p, "processes")),
        variables: variables.and_then(|v| encode(&v, "variables")),
        filtered_resource_ids: bm
            .filtered_resource_ids
            .as_ref()
            .and_then(|ids| encode(ids, "filtered_resource_ids")),
        created_at: bm.created_at,
        filtered_at: bm.filtered_at,
        calculated_at: bm.calculated_at,
        applied_at: bm.applied_at,
        reverted_at: bm.reverted_at,
    }
}

/// Decode records into domain models with a single property fetch.
///
/// Steps whose payload does not decode against the resolved property's
/// options kind are dropped. Processes and variables whose property no
/// longer exists keep their raw steps, so they surface as missing when the
/// modification is next calculated.
pub async fn to_domain_models(
    records: Vec<BulkModificationRecord>,
    property_service: &dyn PropertyService,
) -> Result<Vec<BulkModification>, CoreError> {
    let mut models: Vec<BulkModification> = records.into_iter().map(decode_record).collect();

    let mask = models
        .iter()
        .map(|bm| {
            aggregate_pools(
                bm.filter.as_ref(),
                bm.processes.as_deref(),
                bm.variables.as_deref(),
            )
        })
        .fold(PropertyPoolMask::empty(), |acc, mask| acc | mask);
    let properties = fetch_property_map(property_service, mask).await?;

    for bm in &mut models {
        retain_decodable_steps(bm, &properties);
    }
    Ok(models)
}

/// Drop the stored steps that do not decode against their resolved
/// property. Processes and variables whose property is absent from
/// `properties` keep their raw steps.
pub fn retain_decodable_steps(bm: &mut BulkModification, properties: &PropertyMap) {
    for process in bm.processes.iter_mut().flatten() {
        if let Some(property) = properties.get(process.property_key()) {
            process.steps = retain_decodable(property.property_type, std::mem::take(&mut process.steps));
        }
    }
    for variable in bm.variables.iter_mut().flatten() {
        if let Some(property) = properties.get(variable.property_key()) {
            variable.preprocesses = retain_decodable(
                property.property_type,
                std::mem::take(&mut variable.preprocesses),
            );
        }
    }
}

pub async fn to_domain_model(
    record: BulkModificationRecord,
    property_service: &dyn PropertyService,
) -> Result<BulkModification, CoreError> {
    let id = record.id;
    to_domain_models(vec![record], property_service)
        .await?
        .pop()
        .ok_or_else(|| CoreError::Internal(format!("Bulk modification {id} vanished while decoding")))
}

/// Structural decode of one record, without consulting property types.
/// Steps are kept raw; pair with [`retain_decodable_steps`] once the
/// properties are known.
pub fn decode_record(record: BulkModificationRecord) -> BulkModification {
    let id = record.id;
    let filter: Option<SearchFilterGroup> = decode(record.filter.as_deref(), "filter", id);
    let processes = decode::<Vec<ProcessBlob>>(record.processes.as_deref(), "processes", id).map(
        |blobs| {
            blobs
                .into_iter()
                .map(|b| Process {
                    property_pool: b.property_pool,
                    property_id: b.property_id,
                    steps: decode_steps(b.steps.as_deref(), id),
                })
                .collect()
        },
    );
    let variables = decode::<Vec<VariableBlob>>(record.variables.as_deref(), "variables", id).map(
        |blobs| {
            blobs
                .into_iter()
                .map(|b| Variable {
                    key: b.key,
                    name: b.name,
                    property_pool: b.property_pool,
                    property_id: b.property_id,
                    preprocesses: decode_steps(b.preprocesses.as_deref(), id),
                })
                .collect()
        },
    );
    let filtered_resource_ids = decode(
        record.filtered_resource_ids.as_deref(),
        "filtered_resource_ids",
        id,
    );

    BulkModification {
        id,
        name: record.name,
        is_active: record.is_active,
        state: record.state,
        filter,
        processes,
        variables,
        filtered_resource_ids,
        created_at: record.created_at,
        filtered_at: record.filtered_at,
        calculated_at: record.calculated_at,
        applied_at: record.applied_at,
        reverted_at: record.reverted_at,
    }
}

// ---------------------------------------------------------------------------
// Diffs
// ---------------------------------------------------------------------------

pub fn diff_to_record(diff: &BulkModificationDiff) -> BulkModificationDiffRecord {
    let blobs: Vec<ResourceDiffBlob> = diff
        .diffs
        .iter()
        .map(|d| ResourceDiffBlob {
            property_pool: d.property_pool,
            property_id: d.property_id,
            old_value: serialize_text(&d.old_value),
            new_value: serialize_text(&d.new_value),
        })
        .collect();
    BulkModificationDiffRecord {
        id: diff.id,
        bulk_modification_id: diff.bulk_modification_id,
        resource_id: diff.resource_id,
        resource_path: diff.resource_path.clone(),
        diffs: encode(&blobs, "diffs").unwrap_or_else(|| "[]".to_string()),
        applied: diff.applied,
    }
}

/// Decode diff records with a single property fetch. Entries whose
/// property is gone, whose type has no value type, or whose values do not
/// decode are dropped; in strict mode a missing property fails the whole
/// batch instead.
pub async fn diffs_to_domain(
    records: Vec<BulkModificationDiffRecord>,
    property_service: &dyn PropertyService,
    throw_if_missing: bool,
) -> Result<Vec<BulkModificationDiff>, CoreError> {
    let decoded = decode_diff_blobs(records);
    let keys = blob_keys(&decoded);
    let properties = prepare_property_map(&keys, property_service, throw_if_missing).await?;
    Ok(resolve_diffs(decoded, &properties))
}

/// Decode diff records against properties the caller already fetched.
/// Used when one fetch has to cover more than the diffs themselves.
pub fn diffs_from_map(
    records: Vec<BulkModificationDiffRecord>,
    properties: &PropertyMap,
    throw_if_missing: bool,
) -> Result<Vec<BulkModificationDiff>, CoreError> {
    let decoded = decode_diff_blobs(records);
    if throw_if_missing {
        let missing = properties.missing(&blob_keys(&decoded));
        if !missing.is_empty() {
            return Err(CoreError::MissingProperties { missing });
        }
    }
    Ok(resolve_diffs(decoded, properties))
}

/// Every property referenced by the entries of `records`.
pub fn diff_property_keys(records: &[BulkModificationDiffRecord]) -> Vec<PropertyKey> {
    records
        .iter()
        .flat_map(|record| {
            decode::<Vec<ResourceDiffBlob>>(Some(record.diffs.as_str()), "diffs", record.id)
                .unwrap_or_default()
                .into_iter()
                .map(|b| PropertyKey::new(b.property_pool, b.property_id))
        })
        .collect()
}

fn decode_diff_blobs(
    records: Vec<BulkModificationDiffRecord>,
) -> Vec<(BulkModificationDiffRecord, Vec<ResourceDiffBlob>)> {
    records
        .into_iter()
        .map(|record| {
            let blobs = decode(Some(record.diffs.as_str()), "diffs", record.id).unwrap_or_default();
            (record, blobs)
        })
        .collect()
}

fn blob_keys(decoded: &[(BulkModificationDiffRecord, Vec<ResourceDiffBlob>)]) -> Vec<PropertyKey> {
    decoded
        .iter()
        .flat_map(|(_, blobs)| {
            blobs
                .iter()
                .map(|b| PropertyKey::new(b.property_pool, b.property_id))
        })
        .collect()
}

fn resolve_diffs(
    decoded: Vec<(BulkModificationDiffRecord, Vec<ResourceDiffBlob>)>,
    properties: &PropertyMap,
) -> Vec<BulkModificationDiff> {
    decoded
        .into_iter()
        .map(|(record, blobs)| {
            let diffs = blobs
                .into_iter()
                .filter_map(|blob| decode_resource_diff(blob, properties, record.id))
                .collect();
            BulkModificationDiff {
                id: record.id,
                bulk_modification_id: record.bulk_modification_id,
                resource_id: record.resource_id,
                resource_path: record.resource_path,
                diffs,
                applied: record.applied,
            }
        })
        .collect()
}

fn decode_resource_diff(
    blob: ResourceDiffBlob,
    properties: &PropertyMap,
    record_id: DbId,
) -> Option<ResourceDiff> {
    let key = PropertyKey::new(blob.property_pool, blob.property_id);
    let Some(value_type) = properties.get(key).and_then(|p| p.value_type()) else {
        tracing::warn!(record_id, property = %key, "Dropping diff for missing or unsupported property");
        return None;
    };
    let old_value = deserialize_text(value_type, blob.old_value.as_deref());
    let new_value = deserialize_text(value_type, blob.new_value.as_deref());
    match (old_value, new_value) {
        (Ok(old_value), Ok(new_value)) => Some(ResourceDiff::new(
            blob.property_pool,
            blob.property_id,
            old_value,
            new_value,
        )),
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(record_id, property = %key, error = %e, "Dropping diff whose values do not decode");
            None
        }
    }
}

/// Fetch the properties behind `keys` in one call. In strict mode a
/// missing property is an error asking the caller to run the preview again.
pub async fn prepare_property_map(
    keys: &[PropertyKey],
    property_service: &dyn PropertyService,
    throw_if_missing: bool,
) -> Result<PropertyMap, CoreError> {
    let mask: PropertyPoolMask = keys.iter().map(|k| k.pool).collect();
    let properties = fetch_property_map(property_service, mask).await?;
    if throw_if_missing {
        let missing = properties.missing(keys);
        if !missing.is_empty() {
            return Err(CoreError::MissingProperties { missing });
        }
    }
    Ok(properties)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
