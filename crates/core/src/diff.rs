//! Per-resource value changes and how they are computed.

use serde::{Deserialize, Serialize};

use crate::ports::ResourceSnapshot;
use crate::process::variable::{resolve_variables, Variable};
use crate::process::{execute_steps, Process, ProcessContext};
use crate::property::{PropertyKey, PropertyMap, PropertyPool};
use crate::standard_value::{normalize, values_equal, StandardValue};
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// Old and new value of one property on one resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDiff {
    pub property_pool: PropertyPool,
    pub property_id: i32,
    pub old_value: Option<StandardValue>,
    pub new_value: Option<StandardValue>,
}

impl ResourceDiff {
    pub fn new(
        property_pool: PropertyPool,
        property_id: i32,
        old_value: Option<StandardValue>,
        new_value: Option<StandardValue>,
    ) -> Self {
        Self {
            property_pool,
            property_id,
            old_value,
            new_value,
        }
    }

    pub fn property_key(&self) -> PropertyKey {
        PropertyKey::new(self.property_pool, self.property_id)
    }
}

/// All changes a bulk modification makes to one resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkModificationDiff {
    pub id: DbId,
    pub bulk_modification_id: DbId,
    pub resource_id: DbId,
    /// Resource path at calculation time, for display.
    pub resource_path: String,
    pub diffs: Vec<ResourceDiff>,
    /// Set once the new values were written successfully.
    pub applied: bool,
}

/// A resource whose write failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceFailure {
    pub resource_id: DbId,
    pub error: String,
}

/// Outcome of an apply or revert.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ApplyReport {
    pub succeeded: Vec<DbId>,
    pub failed: Vec<ResourceFailure>,
}

impl ApplyReport {
    pub fn is_total_failure(&self) -> bool {
        self.succeeded.is_empty() && !self.failed.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Computation
// ---------------------------------------------------------------------------

/// Everything needed to compute diffs, fixed before any resource is read.
///
/// Processes must already be restricted to properties present in
/// `properties`. The plan is immutable and shared across workers.
#[derive(Debug, Clone)]
pub struct CalculationPlan {
    properties: PropertyMap,
    processes: Vec<Process>,
    variables: Vec<Variable>,
    now: Timestamp,
}

impl CalculationPlan {
    pub fn new(
        properties: PropertyMap,
        processes: Vec<Process>,
        variables: Vec<Variable>,
        now: Timestamp,
    ) -> Self {
        Self {
            properties,
            processes,
            variables,
            now,
        }
    }

    pub fn processes(&self) -> &[Process] {
        &self.processes
    }

    /// Properties to read per resource: process targets then variable
    /// sources, first occurrence wins.
    pub fn read_keys(&self) -> Vec<PropertyKey> {
        let mut keys: Vec<PropertyKey> = Vec::new();
        let all = self
            .processes
            .iter()
            .map(Process::property_key)
            .chain(self.variables.iter().map(Variable::property_key));
        for key in all {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    /// Changes the plan makes to one resource, in first-target order.
    ///
    /// Processes targeting the same property chain: a later process starts
    /// from the earlier one's output. A property whose final value equals
    /// its current value under standard-value equality yields no entry.
    pub fn compute(&self, snapshot: &ResourceSnapshot) -> Vec<ResourceDiff> {
        let mut ctx = ProcessContext::new(self.now);
        resolve_variables(
            &self.variables,
            &self.properties,
            |key| snapshot.value(key),
            &mut ctx,
        );

        let mut working: Vec<(PropertyKey, Option<StandardValue>)> = Vec::new();
        for process in &self.processes {
            let key = process.property_key();
            let Some(property) = self.properties.get(key) else {
                continue;
            };
            let slot = match working.iter().position(|(k, _)| *k == key) {
                Some(i) => i,
                None => {
                    working.push((key, normalize(snapshot.value(key))));
                    working.len() - 1
                }
            };
            let current = working[slot].1.take();
            working[slot].1 = execute_steps(property.property_type, current, &process.steps, &ctx);
        }

        working
            .into_iter()
            .filter_map(|(key, new_value)| {
                let old_value = normalize(snapshot.value(key));
                (!values_equal(&old_value, &new_value))
                    .then(|| ResourceDiff::new(key.pool, key.id, old_value, new_value))
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::decimal::DecimalOperation;
    use crate::process::text::TextOperation;
    use crate::process::Step;
    use crate::property::{Property, PropertyType};
    use chrono::Utc;
    use serde_json::json;

    const TITLE: PropertyKey = PropertyKey {
        pool: PropertyPool::Reserved,
        id: 1,
    };
    const SCORE: PropertyKey = PropertyKey {
        pool: PropertyPool::Custom,
        id: 2,
    };

    fn properties() -> PropertyMap {
        PropertyMap::from_properties(vec![
            Property {
                pool: TITLE.pool,
                id: TITLE.id,
                name: "Title".into(),
                property_type: PropertyType::SingleLineText,
            },
            Property {
                pool: SCORE.pool,
                id: SCORE.id,
                name: "Score".into(),
                property_type: PropertyType::Number,
            },
        ])
    }

    fn process(key: PropertyKey, steps: Vec<Step>) -> Process {
        Process {
            property_pool: key.pool,
            property_id: key.id,
            steps,
        }
    }

    fn snapshot(title: &str, score: Option<f64>) -> ResourceSnapshot {
        let mut s = ResourceSnapshot {
            id: 1,
            path: "/m/1".into(),
            ..Default::default()
        };
        s.values.insert(TITLE, StandardValue::String(title.into()));
        if let Some(score) = score {
            s.values.insert(SCORE, StandardValue::Decimal(score));
        }
        s
    }

    #[test]
    fn changed_property_produces_diff() {
        let plan = CalculationPlan::new(
            properties(),
            vec![process(
                TITLE,
                vec![Step::new(TextOperation::AddToEnd.code(), json!({"suffix": " (remastered)"}))],
            )],
            vec![],
            Utc::now(),
        );
        let diffs = plan.compute(&snapshot("Movie", None));
        assert_eq!(
            diffs,
            vec![ResourceDiff::new(
                TITLE.pool,
                TITLE.id,
                Some(StandardValue::String("Movie".into())),
                Some(StandardValue::String("Movie (remastered)".into())),
            )]
        );
    }

    #[test]
    fn unchanged_value_produces_nothing() {
        let plan = CalculationPlan::new(
            properties(),
            vec![process(
                SCORE,
                vec![Step::new(DecimalOperation::Multiply.code(), json!({"value": 1}))],
            )],
            vec![],
            Utc::now(),
        );
        assert!(plan.compute(&snapshot("x", Some(4.0))).is_empty());
    }

    #[test]
    fn processes_on_same_property_chain() {
        let plan = CalculationPlan::new(
            properties(),
            vec![
                process(SCORE, vec![Step::new(DecimalOperation::Add.code(), json!({"value": 1}))]),
                process(TITLE, vec![Step::new(TextOperation::Delete.code(), json!(null))]),
                process(
                    SCORE,
                    vec![Step::new(DecimalOperation::Multiply.code(), json!({"value": 10}))],
                ),
            ],
            vec![],
            Utc::now(),
        );
        let diffs = plan.compute(&snapshot("t", Some(1.0)));
        assert_eq!(diffs.len(), 2);
        assert_eq!(diffs[0].property_key(), SCORE);
        assert_eq!(diffs[0].new_value, Some(StandardValue::Decimal(20.0)));
        assert_eq!(diffs[1].property_key(), TITLE);
        assert_eq!(diffs[1].new_value, None);
    }

    #[test]
    fn variables_feed_processes() {
        let plan = CalculationPlan::new(
            properties(),
            vec![process(
                SCORE,
                vec![Step::new(
                    DecimalOperation::SetWithFixedValue.code(),
                    json!({"value": {"variable": "len"}}),
                )],
            )],
            vec![Variable {
                key: "len".into(),
                name: "Title".into(),
                property_pool: TITLE.pool,
                property_id: TITLE.id,
                preprocesses: vec![Step::new(
                    TextOperation::SetWithFixedValue.code(),
                    json!({"value": "7"}),
                )],
            }],
            Utc::now(),
        );
        let diffs = plan.compute(&snapshot("t", None));
        assert_eq!(diffs[0].new_value, Some(StandardValue::Decimal(7.0)));
        assert_eq!(diffs[0].old_value, None);
    }

    #[test]
    fn read_keys_are_deduplicated() {
        let plan = CalculationPlan::new(
            properties(),
            vec![process(TITLE, vec![]), process(TITLE, vec![])],
            vec![Variable {
                key: "v".into(),
                name: "v".into(),
                property_pool: SCORE.pool,
                property_id: SCORE.id,
                preprocesses: vec![],
            }],
            Utc::now(),
        );
        assert_eq!(plan.read_keys(), vec![TITLE, SCORE]);
    }

    #[test]
    fn report_total_failure() {
        let mut report = ApplyReport::default();
        assert!(!report.is_total_failure());
        report.failed.push(ResourceFailure {
            resource_id: 1,
            error: "locked".into(),
        });
        assert!(report.is_total_failure());
        report.succeeded.push(2);
        assert!(!report.is_total_failure());
    }
}
