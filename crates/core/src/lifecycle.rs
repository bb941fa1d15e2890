//! Bulk modification lifecycle.
//!
//! ```text
//! Created -> Filtered -> Calculated -> Applied -> Reverted
//!              ^  |  ^       |
//!              +--+  +-------+  (re-filter and re-calculate)
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkModificationState {
    #[default]
    Created,
    Filtered,
    Calculated,
    Applied,
    Reverted,
}

impl BulkModificationState {
    pub const ALL: [BulkModificationState; 5] = [
        Self::Created,
        Self::Filtered,
        Self::Calculated,
        Self::Applied,
        Self::Reverted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Filtered => "filtered",
            Self::Calculated => "calculated",
            Self::Applied => "applied",
            Self::Reverted => "reverted",
        }
    }

    pub fn from_str_value(s: &str) -> Result<Self, CoreError> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown bulk modification state: {s}")))
    }

    /// Whether `self -> to` is in the transition table.
    pub fn can_transition_to(self, to: Self) -> bool {
        use BulkModificationState::*;
        matches!(
            (self, to),
            (Created, Filtered)
                | (Filtered, Filtered)
                | (Filtered, Calculated)
                | (Calculated, Filtered)
                | (Calculated, Calculated)
                | (Calculated, Applied)
                | (Applied, Reverted)
        )
    }

    /// Validate a transition, returning the target state.
    pub fn transition(self, to: Self) -> Result<Self, CoreError> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(CoreError::Lifecycle { from: self, to })
        }
    }

    /// Whether the definition (filter, processes, variables) can still be
    /// edited.
    pub fn is_editable(self) -> bool {
        !matches!(self, Self::Applied | Self::Reverted)
    }
}

impl fmt::Display for BulkModificationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
