//! Bulk modification definitions and their editing rules.
//!
//! A bulk modification owns its filter, processes and variables by value.
//! Diffs live in the store and are owned through the modification's id.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::filter::SearchFilterGroup;
use crate::lifecycle::BulkModificationState;
use crate::process::variable::Variable;
use crate::process::Process;
use crate::property::PropertyKey;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum length of a bulk modification name.
pub const MAX_NAME_LENGTH: usize = 200;

/// Suffix appended to the name of a duplicated modification.
pub const COPY_SUFFIX: &str = " (copy)";

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkModification {
    pub id: DbId,
    pub name: String,
    pub is_active: bool,
    pub state: BulkModificationState,
    pub filter: Option<SearchFilterGroup>,
    pub processes: Option<Vec<Process>>,
    pub variables: Option<Vec<Variable>>,
    pub filtered_resource_ids: Option<Vec<DbId>>,
    pub created_at: Timestamp,
    pub filtered_at: Option<Timestamp>,
    pub calculated_at: Option<Timestamp>,
    pub applied_at: Option<Timestamp>,
    pub reverted_at: Option<Timestamp>,
}

impl BulkModification {
    pub fn new(id: DbId, name: String, now: Timestamp) -> Self {
        Self {
            id,
            name,
            is_active: true,
            state: BulkModificationState::Created,
            filter: None,
            processes: None,
            variables: None,
            filtered_resource_ids: None,
            created_at: now,
            filtered_at: None,
            calculated_at: None,
            applied_at: None,
            reverted_at: None,
        }
    }

    pub fn processes(&self) -> &[Process] {
        self.processes.as_deref().unwrap_or_default()
    }

    pub fn variables(&self) -> &[Variable] {
        self.variables.as_deref().unwrap_or_default()
    }

    pub fn filtered_resource_ids(&self) -> &[DbId] {
        self.filtered_resource_ids.as_deref().unwrap_or_default()
    }

    /// Every property the definition reads or writes, excluding the filter.
    pub fn referenced_properties(&self) -> Vec<PropertyKey> {
        self.processes()
            .iter()
            .map(Process::property_key)
            .chain(self.variables().iter().map(Variable::property_key))
            .collect()
    }

    /// Move to `to`, stamping the matching timestamp. Invalid transitions
    /// leave the modification untouched.
    pub fn move_to(&mut self, to: BulkModificationState, now: Timestamp) -> Result<(), CoreError> {
        self.state = self.state.transition(to)?;
        match to {
            BulkModificationState::Created => {}
            BulkModificationState::Filtered => {
                self.filtered_at = Some(now);
                self.calculated_at = None;
            }
            BulkModificationState::Calculated => self.calculated_at = Some(now),
            BulkModificationState::Applied => self.applied_at = Some(now),
            BulkModificationState::Reverted => self.reverted_at = Some(now),
        }
        Ok(())
    }

    /// A fresh `Created` copy of the definition.
    pub fn duplicate(&self, id: DbId, now: Timestamp) -> Self {
        let mut copy = Self::new(id, format!("{}{COPY_SUFFIX}", self.name), now);
        copy.is_active = self.is_active;
        copy.filter = self.filter.clone();
        copy.processes = self.processes.clone();
        copy.variables = self.variables.clone();
        copy
    }

    /// Apply an edit, enforcing the editing rules:
    ///
    /// * name and active flag can always change;
    /// * a new filter resets the modification to `Created`;
    /// * new processes or variables send a `Calculated` modification back
    ///   to `Filtered`;
    /// * `Applied` and `Reverted` definitions are frozen.
    ///
    /// Returns whether existing diffs are now stale.
    pub fn apply_patch(&mut self, patch: BulkModificationPatch) -> Result<bool, CoreError> {
        if let Some(name) = &patch.name {
            validate_name(name).map_err(CoreError::Validation)?;
        }
        let edits_filter = patch.filter.is_some();
        let edits_pipeline = patch.processes.is_some() || patch.variables.is_some();

        if (edits_filter || edits_pipeline) && !self.state.is_editable() {
            return Err(CoreError::Lifecycle {
                from: self.state,
                to: if edits_filter {
                    BulkModificationState::Created
                } else {
                    BulkModificationState::Filtered
                },
            });
        }

        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(is_active) = patch.is_active {
            self.is_active = is_active;
        }

        let mut stale = false;
        if let Some(filter) = patch.filter {
            self.filter = filter;
            self.filtered_resource_ids = None;
            self.filtered_at = None;
            self.calculated_at = None;
            stale = self.state != BulkModificationState::Created;
            self.state = BulkModificationState::Created;
        }
        if edits_pipeline {
            if let Some(processes) = patch.processes {
                self.processes = Some(processes);
            }
            if let Some(variables) = patch.variables {
                self.variables = Some(variables);
            }
            if self.state == BulkModificationState::Calculated {
                self.state = BulkModificationState::Filtered;
                self.calculated_at = None;
                stale = true;
            }
        }
        Ok(stale)
    }
}

/// A partial update. `filter: Some(None)` clears the filter.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BulkModificationPatch {
    pub name: Option<String>,
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub filter: Option<Option<SearchFilterGroup>>,
    pub processes: Option<Vec<Process>>,
    pub variables: Option<Vec<Variable>>,
}

fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a bulk modification name.
pub fn validate_name(name: &str) -> Result<(), String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Name must not be empty".to_string());
    }
    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(format!("Name exceeds maximum length of {MAX_NAME_LENGTH}"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::PropertyPool;
    use assert_matches::assert_matches;
    use chrono::Utc;

    fn sample() -> BulkModification {
        let mut bm = BulkModification::new(1, "Retitle".into(), Utc::now());
        bm.processes = Some(vec![Process {
            property_pool: PropertyPool::Custom,
            property_id: 3,
            steps: vec![],
        }]);
        bm
    }

    fn calculated() -> BulkModification {
        let mut bm = sample();
        let now = Utc::now();
        bm.move_to(BulkModificationState::Filtered, now).unwrap();
        bm.move_to(BulkModificationState::Calculated, now).unwrap();
        bm.filtered_resource_ids = Some(vec![1, 2]);
        bm
    }

    // -- move_to ------------------------------------------------------------

    #[test]
    fn move_to_stamps_timestamps() {
        let bm = calculated();
        assert_eq!(bm.state, BulkModificationState::Calculated);
        assert!(bm.filtered_at.is_some());
        assert!(bm.calculated_at.is_some());
    }

    #[test]
    fn invalid_move_is_rejected_without_mutation() {
        let mut bm = calculated();
        let before = bm.clone();
        assert_matches!(
            bm.move_to(BulkModificationState::Reverted, Utc::now()),
            Err(CoreError::Lifecycle { .. })
        );
        assert_eq!(bm, before);
    }

    // -- apply_patch --------------------------------------------------------

    #[test]
    fn patching_filter_resets_to_created() {
        let mut bm = calculated();
        let stale = bm
            .apply_patch(BulkModificationPatch {
                filter: Some(Some(SearchFilterGroup::default())),
                ..Default::default()
            })
            .unwrap();
        assert!(stale);
        assert_eq!(bm.state, BulkModificationState::Created);
        assert!(bm.filtered_resource_ids.is_none());
        assert!(bm.calculated_at.is_none());
    }

    #[test]
    fn patching_processes_of_calculated_goes_back_to_filtered() {
        let mut bm = calculated();
        let stale = bm
            .apply_patch(BulkModificationPatch {
                processes: Some(vec![]),
                ..Default::default()
            })
            .unwrap();
        assert!(stale);
        assert_eq!(bm.state, BulkModificationState::Filtered);
        assert_eq!(bm.filtered_resource_ids(), &[1, 2]);
    }

    #[test]
    fn renaming_is_always_allowed() {
        let mut bm = calculated();
        bm.move_to(BulkModificationState::Applied, Utc::now()).unwrap();
        let stale = bm
            .apply_patch(BulkModificationPatch {
                name: Some("  Renamed ".into()),
                is_active: Some(false),
                ..Default::default()
            })
            .unwrap();
        assert!(!stale);
        assert_eq!(bm.name, "Renamed");
        assert!(!bm.is_active);
    }

    #[test]
    fn applied_definition_is_frozen() {
        let mut bm = calculated();
        bm.move_to(BulkModificationState::Applied, Utc::now()).unwrap();
        assert_matches!(
            bm.apply_patch(BulkModificationPatch {
                variables: Some(vec![]),
                ..Default::default()
            }),
            Err(CoreError::Lifecycle {
                from: BulkModificationState::Applied,
                ..
            })
        );
    }

    #[test]
    fn empty_name_is_rejected() {
        let mut bm = sample();
        assert_matches!(
            bm.apply_patch(BulkModificationPatch {
                name: Some("   ".into()),
                ..Default::default()
            }),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn patch_distinguishes_cleared_filter_from_untouched() {
        let cleared: BulkModificationPatch = serde_json::from_str(r#"{"filter": null}"#).unwrap();
        assert_eq!(cleared.filter, Some(None));
        let untouched: BulkModificationPatch = serde_json::from_str("{}").unwrap();
        assert_eq!(untouched.filter, None);
    }

    // -- duplicate ----------------------------------------------------------

    #[test]
    fn duplicate_copies_definition_only() {
        let bm = calculated();
        let copy = bm.duplicate(2, Utc::now());
        assert_eq!(copy.id, 2);
        assert_eq!(copy.name, "Retitle (copy)");
        assert_eq!(copy.state, BulkModificationState::Created);
        assert_eq!(copy.processes, bm.processes);
        assert!(copy.filtered_resource_ids.is_none());
        assert!(copy.filtered_at.is_none());
    }

    #[test]
    fn name_validation() {
        assert!(validate_name("ok").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name(&"x".repeat(MAX_NAME_LENGTH + 1)).is_err());
    }
}
