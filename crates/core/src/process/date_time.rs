//! Date and date-time operations.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::process::value::ProcessValue;
use crate::process::ProcessContext;
use crate::standard_value::{StandardValue, StandardValueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateTimeOperation {
    Delete = 1,
    SetWithFixedValue = 2,
    SetToNow = 3,
    AddDuration = 4,
    SubtractDuration = 5,
}

impl DateTimeOperation {
    pub const ALL: [DateTimeOperation; 5] = [
        Self::Delete,
        Self::SetWithFixedValue,
        Self::SetToNow,
        Self::AddDuration,
        Self::SubtractDuration,
    ];

    pub const CODES: &'static [i32] = &[1, 2, 3, 4, 5];

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.code() == code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    #[default]
    Days,
    Weeks,
}

impl TimeUnit {
    fn duration(self, amount: i64) -> Option<Duration> {
        match self {
            Self::Seconds => Duration::try_seconds(amount),
            Self::Minutes => Duration::try_minutes(amount),
            Self::Hours => Duration::try_hours(amount),
            Self::Days => Duration::try_days(amount),
            Self::Weeks => Duration::try_weeks(amount),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DateTimeProcessOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<ProcessValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<TimeUnit>,
}

/// `SetToNow` reads the clock captured in the context, so every resource
/// in one calculation gets the same instant. Durations are not applied to
/// absent values.
pub fn execute(
    op: DateTimeOperation,
    options: &DateTimeProcessOptions,
    current: Option<StandardValue>,
    ctx: &ProcessContext,
) -> Option<StandardValue> {
    let current = match current.and_then(|v| v.convert_to(StandardValueType::DateTime)) {
        Some(StandardValue::DateTime(dt)) => Some(dt),
        _ => None,
    };

    let result = match op {
        DateTimeOperation::Delete => None,
        DateTimeOperation::SetWithFixedValue => {
            return options
                .value
                .as_ref()
                .and_then(|v| v.resolve(StandardValueType::DateTime, ctx));
        }
        DateTimeOperation::SetToNow => Some(ctx.now()),
        DateTimeOperation::AddDuration | DateTimeOperation::SubtractDuration => {
            let delta = options
                .amount
                .and_then(|amount| options.unit.unwrap_or_default().duration(amount));
            match (current, delta) {
                (Some(dt), Some(delta)) if op == DateTimeOperation::AddDuration => {
                    dt.checked_add_signed(delta).or(current)
                }
                (Some(dt), Some(delta)) => dt.checked_sub_signed(delta).or(current),
                _ => current,
            }
        }
    };
    result.map(StandardValue::DateTime)
}
