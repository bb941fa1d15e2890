//! Wire types of the catalog HTTP API.
//!
//! Property values travel as `{ "valueType": "<type>", "value": <json> }`
//! so they can be decoded without knowing the property's declared type.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use curio_core::filter::SearchFilterGroup;
use curio_core::ports::{ResourceSnapshot, ResourceWrite, ResourceWriteOutcome};
use curio_core::property::{PropertyKey, PropertyPool};
use curio_core::standard_value::{StandardValue, StandardValueType};
use curio_core::types::DbId;

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedValue {
    pub value_type: StandardValueType,
    pub value: Value,
}

impl TypedValue {
    pub fn from_standard(value: &StandardValue) -> Self {
        Self {
            value_type: value.value_type(),
            value: value.to_json(),
        }
    }

    /// `None` when the payload does not match its declared type.
    pub fn to_standard(&self) -> Option<StandardValue> {
        StandardValue::from_json(self.value_type, &self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyValue {
    pub property_pool: PropertyPool,
    pub property_id: i32,
    /// Absent clears the value on write and means "no value" on read.
    #[serde(default)]
    pub value: Option<TypedValue>,
}

impl PropertyValue {
    pub fn key(&self) -> PropertyKey {
        PropertyKey::new(self.property_pool, self.property_id)
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct SearchRequest<'a> {
    pub filter: &'a SearchFilterGroup,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub resource_ids: Vec<DbId>,
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuesQuery<'a> {
    pub resource_ids: &'a [DbId],
    pub properties: Vec<PropertyRef>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRef {
    pub property_pool: PropertyPool,
    pub property_id: i32,
}

impl From<PropertyKey> for PropertyRef {
    fn from(key: PropertyKey) -> Self {
        Self {
            property_pool: key.pool,
            property_id: key.id,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceValues {
    pub id: DbId,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub values: Vec<PropertyValue>,
}

impl ResourceValues {
    /// Values that fail to decode are dropped with a warning.
    pub fn into_snapshot(self) -> ResourceSnapshot {
        let id = self.id;
        let values = self
            .values
            .into_iter()
            .filter_map(|pv| {
                let key = pv.key();
                let typed = pv.value?;
                match typed.to_standard() {
                    Some(value) => Some((key, value)),
                    None => {
                        tracing::warn!(resource_id = id, property = %key, value_type = %typed.value_type, "Dropping undecodable catalog value");
                        None
                    }
                }
            })
            .collect();
        ResourceSnapshot {
            id,
            path: self.path,
            values,
        }
    }
}

// ---------------------------------------------------------------------------
// Write
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceValuesWrite {
    pub resource_id: DbId,
    pub values: Vec<PropertyValue>,
}

impl From<ResourceWrite> for ResourceValuesWrite {
    fn from(write: ResourceWrite) -> Self {
        Self {
            resource_id: write.resource_id,
            values: write
                .values
                .into_iter()
                .map(|(key, value)| PropertyValue {
                    property_pool: key.pool,
                    property_id: key.id,
                    value: value.as_ref().map(TypedValue::from_standard),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WriteRequest {
    pub writes: Vec<ResourceValuesWrite>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResult {
    pub resource_id: DbId,
    #[serde(default)]
    pub error: Option<String>,
}

impl From<WriteResult> for ResourceWriteOutcome {
    fn from(result: WriteResult) -> Self {
        Self {
            resource_id: result.resource_id,
            error: result.error,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WriteResponse {
    pub results: Vec<WriteResult>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
