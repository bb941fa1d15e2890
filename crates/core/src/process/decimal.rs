//! Numeric operations for number, percentage and rating properties.

use serde::{Deserialize, Serialize};

use crate::process::value::ProcessValue;
use crate::process::ProcessContext;
use crate::standard_value::{StandardValue, StandardValueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecimalOperation {
    Delete = 1,
    SetWithFixedValue = 2,
    Add = 3,
    Subtract = 4,
    Multiply = 5,
    Divide = 6,
    Round = 7,
}

impl DecimalOperation {
    pub const ALL: [DecimalOperation; 7] = [
        Self::Delete,
        Self::SetWithFixedValue,
        Self::Add,
        Self::Subtract,
        Self::Multiply,
        Self::Divide,
        Self::Round,
    ];

    pub const CODES: &'static [i32] = &[1, 2, 3, 4, 5, 6, 7];

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.code() == code)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DecimalProcessOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<ProcessValue>,
    /// Digits kept by `Round`. Defaults to 0.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decimal_places: Option<u32>,
}

/// Arithmetic treats an absent current value as 0. An absent operand leaves
/// the value unchanged, as does division by zero.
pub fn execute(
    op: DecimalOperation,
    options: &DecimalProcessOptions,
    current: Option<StandardValue>,
    ctx: &ProcessContext,
) -> Option<StandardValue> {
    let current = match current.and_then(|v| v.convert_to(StandardValueType::Decimal)) {
        Some(StandardValue::Decimal(d)) => Some(d),
        _ => None,
    };
    let operand = || match options
        .value
        .as_ref()
        .and_then(|v| v.resolve(StandardValueType::Decimal, ctx))
    {
        Some(StandardValue::Decimal(d)) => Some(d),
        _ => None,
    };
    let base = current.unwrap_or(0.0);

    let result = match op {
        DecimalOperation::Delete => None,
        DecimalOperation::SetWithFixedValue => operand(),
        DecimalOperation::Add => operand().map(|x| base + x).or(current),
        DecimalOperation::Subtract => operand().map(|x| base - x).or(current),
        DecimalOperation::Multiply => operand().map(|x| base * x).or(current),
        DecimalOperation::Divide => match operand() {
            Some(x) if x != 0.0 => Some(base / x),
            Some(_) => {
                tracing::warn!("Division by zero, value left unchanged");
                current
            }
            None => current,
        },
        DecimalOperation::Round => {
            let places = options.decimal_places.unwrap_or(0).min(15) as i32;
            current.map(|d| {
                let factor = 10f64.powi(places);
                (d * factor).round() / factor
            })
        }
    };
    result.and_then(|d| StandardValue::Decimal(d).normalize())
}
