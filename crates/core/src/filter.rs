//! Resource search filter tree.
//!
//! Only the data model lives here; executing a filter against stored
//! resources is the job of an external [`ResourceSearch`](crate::ports::ResourceSearch).
//! The engine needs the tree for two things: persisting it and extracting
//! its leaf filters so their property pools can be aggregated.

use serde::{Deserialize, Serialize};

use crate::property::{PropertyKey, PropertyPool};

/// Boolean operator joining a group's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum SearchCombinator {
    #[default]
    And = 1,
    Or = 2,
}

impl TryFrom<i32> for SearchCombinator {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::And),
            2 => Ok(Self::Or),
            _ => Err(format!("Invalid combinator {value}. Must be 1 (and) or 2 (or)")),
        }
    }
}

impl From<SearchCombinator> for i32 {
    fn from(c: SearchCombinator) -> Self {
        c as i32
    }
}

/// Comparison applied by a leaf filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchOperation {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    NotStartsWith,
    EndsWith,
    NotEndsWith,
    GreaterThan,
    LessThan,
    GreaterThanOrEquals,
    LessThanOrEquals,
    IsNull,
    IsNotNull,
    In,
    NotIn,
    Matches,
    NotMatches,
}

/// A leaf filter on one property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_pool: Option<PropertyPool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<SearchOperation>,
    /// Serialized comparison value, interpreted by the search executor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default)]
    pub disabled: bool,
}

impl SearchFilter {
    /// The property this filter reads, if both parts are set.
    pub fn property_key(&self) -> Option<PropertyKey> {
        Some(PropertyKey::new(self.property_pool?, self.property_id?))
    }
}

/// A boolean group of filters and nested groups.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilterGroup {
    #[serde(default)]
    pub combinator: SearchCombinator,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<SearchFilterGroup>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<SearchFilter>,
    #[serde(default)]
    pub disabled: bool,
}

impl SearchFilterGroup {
    /// Collect leaf filters depth-first in declaration order: a group's own
    /// filters come before those of its child groups.
    ///
    /// With `include_disabled == false`, disabled groups contribute nothing
    /// (neither their filters nor any descendant's) and disabled leaves are
    /// skipped.
    pub fn extract_leaf_filters(&self, include_disabled: bool) -> Vec<&SearchFilter> {
        let mut leaves = Vec::new();
        self.collect_leaves(include_disabled, &mut leaves);
        leaves
    }

    fn collect_leaves<'a>(&'a self, include_disabled: bool, out: &mut Vec<&'a SearchFilter>) {
        if self.disabled && !include_disabled {
            return;
        }
        out.extend(
            self.filters
                .iter()
                .filter(|f| include_disabled || !f.disabled),
        );
        for group in &self.groups {
            group.collect_leaves(include_disabled, out);
        }
    }

    /// A group with no enabled children places no constraint on resources.
    /// Such a group is treated as vacuously true regardless of combinator.
    pub fn is_vacuous(&self) -> bool {
        self.disabled
            || (self.filters.iter().all(|f| f.disabled)
                && self.groups.iter().all(SearchFilterGroup::is_vacuous))
    }
}
