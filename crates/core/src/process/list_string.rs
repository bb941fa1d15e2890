//! List operations for multiple-choice and attachment properties.

use serde::{Deserialize, Serialize};

use crate::process::text::{self, TextOperation, TextProcessOptions};
use crate::process::value::ProcessValue;
use crate::process::ProcessContext;
use crate::standard_value::{StandardValue, StandardValueType};

/// List-of-string operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStringOperation {
    Delete = 1,
    SetWithFixedValue = 2,
    Append = 3,
    Prepend = 4,
    RemoveItems = 5,
    ModifyItems = 6,
}

impl ListStringOperation {
    pub const ALL: [ListStringOperation; 6] = [
        Self::Delete,
        Self::SetWithFixedValue,
        Self::Append,
        Self::Prepend,
        Self::RemoveItems,
        Self::ModifyItems,
    ];

    pub const CODES: &'static [i32] = &[1, 2, 3, 4, 5, 6];

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.code() == code)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListStringProcessOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<ProcessValue>,
    /// Text operation applied to every item by `ModifyItems`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_operation: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_options: Option<TextProcessOptions>,
}

pub fn execute(
    op: ListStringOperation,
    options: &ListStringProcessOptions,
    current: Option<StandardValue>,
    ctx: &ProcessContext,
) -> Option<StandardValue> {
    let items = as_list(current);
    let value = || {
        options
            .value
            .as_ref()
            .and_then(|v| v.resolve(StandardValueType::ListString, ctx))
            .map(|v| as_list(Some(v)))
            .unwrap_or_default()
    };

    let result = match op {
        ListStringOperation::Delete => return None,
        ListStringOperation::SetWithFixedValue => value(),
        ListStringOperation::Append => {
            let mut items = items;
            for item in value() {
                if !items.contains(&item) {
                    items.push(item);
                }
            }
            items
        }
        ListStringOperation::Prepend => {
            let mut head: Vec<String> = Vec::new();
            for item in value() {
                if !items.contains(&item) && !head.contains(&item) {
                    head.push(item);
                }
            }
            head.extend(items);
            head
        }
        ListStringOperation::RemoveItems => {
            let remove = value();
            items.into_iter().filter(|item| !remove.contains(item)).collect()
        }
        ListStringOperation::ModifyItems => {
            let Some(text_op) = options.text_operation.and_then(TextOperation::from_code) else {
                tracing::warn!(
                    text_operation = ?options.text_operation,
                    "Item modification without a valid text operation, value left unchanged"
                );
                return StandardValue::ListString(items).normalize();
            };
            let text_options = options.text_options.clone().unwrap_or_default();
            items
                .into_iter()
                .filter_map(|item| text::transform(text_op, &text_options, Some(item), ctx))
                .collect()
        }
    };
    StandardValue::ListString(result).normalize()
}

fn as_list(value: Option<StandardValue>) -> Vec<String> {
    match value.and_then(|v| v.convert_to(StandardValueType::ListString)) {
        Some(StandardValue::ListString(items)) => items,
        _ => Vec::new(),
    }
}
