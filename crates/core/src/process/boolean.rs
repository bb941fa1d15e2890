use crate::process::value::ValueProcessOptions;
use crate::process::ProcessContext;
use crate::standard_value::{StandardValue, StandardValueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOperation {
    Delete = 1,
    SetWithFixedValue = 2,
    Toggle = 3,
}

impl BooleanOperation {
    pub const ALL: [BooleanOperation; 3] = [Self::Delete, Self::SetWithFixedValue, Self::Toggle];

    pub const CODES: &'static [i32] = &[1, 2, 3];

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.code() == code)
    }
}

/// `Toggle` on an absent value yields `true`.
pub fn execute(
    op: BooleanOperation,
    options: &ValueProcessOptions,
    current: Option<StandardValue>,
    ctx: &ProcessContext,
) -> Option<StandardValue> {
    match op {
        BooleanOperation::Delete => None,
        BooleanOperation::SetWithFixedValue => options.resolve(StandardValueType::Boolean, ctx),
        BooleanOperation::Toggle => {
            let current = match current.and_then(|v| v.convert_to(StandardValueType::Boolean)) {
                Some(StandardValue::Boolean(b)) => b,
                _ => false,
            };
            Some(StandardValue::Boolean(!current))
        }
    }
}
