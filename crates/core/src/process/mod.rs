//! Per-property transformation pipelines.
//!
//! A [`Process`] targets one property and carries an ordered list of
//! [`Step`]s. Each step stores an operation code and its raw options
//! payload; the payload is decoded fresh on every execution against the
//! options kind the [registry](crate::registry) assigns to the target
//! property's declared type. Steps that fail to decode are skipped and the
//! value passes through unchanged.

pub mod boolean;
pub mod date_time;
pub mod decimal;
pub mod link;
pub mod list_string;
pub mod tags;
pub mod text;
pub mod value;
pub mod variable;

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::property::{PropertyKey, PropertyPool, PropertyType};
use crate::registry::{self, ProcessorDescriptor};
use crate::standard_value::StandardValue;
use crate::types::Timestamp;

use self::date_time::DateTimeProcessOptions;
use self::decimal::DecimalProcessOptions;
use self::list_string::ListStringProcessOptions;
use self::text::TextProcessOptions;
use self::value::ValueProcessOptions;

// ---------------------------------------------------------------------------
// Stored model
// ---------------------------------------------------------------------------

/// One transformation unit. `operation` is meaningful only relative to the
/// target property's type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub operation: i32,
    #[serde(default)]
    pub options: Value,
}

impl Step {
    pub fn new(operation: i32, options: Value) -> Self {
        Self { operation, options }
    }
}

/// An ordered pipeline of steps applied to one property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Process {
    pub property_pool: PropertyPool,
    pub property_id: i32,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Process {
    pub fn property_key(&self) -> PropertyKey {
        PropertyKey::new(self.property_pool, self.property_id)
    }
}

// ---------------------------------------------------------------------------
// Decoded model
// ---------------------------------------------------------------------------

/// Typed options, one variant per [`OptionsKind`](crate::registry::OptionsKind).
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOptions {
    Text(TextProcessOptions),
    ListString(ListStringProcessOptions),
    Decimal(DecimalProcessOptions),
    Boolean(ValueProcessOptions),
    DateTime(DateTimeProcessOptions),
    Link(ValueProcessOptions),
    Tags(ValueProcessOptions),
}

/// A step whose payload decoded against its target type.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedStep {
    pub operation: i32,
    pub options: ProcessOptions,
}

/// Values shared by every step of one execution: resolved variables and
/// the clock reading used by time-based operations.
#[derive(Debug, Clone)]
pub struct ProcessContext {
    variables: HashMap<String, Option<StandardValue>>,
    now: Timestamp,
}

impl Default for ProcessContext {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl ProcessContext {
    pub fn new(now: Timestamp) -> Self {
        Self {
            variables: HashMap::new(),
            now,
        }
    }

    /// Resolved value of a variable. Unknown keys and variables that
    /// resolved to nothing both read as `None`.
    pub fn variable(&self, key: &str) -> Option<&StandardValue> {
        self.variables.get(key).and_then(Option::as_ref)
    }

    pub fn set_variable(&mut self, key: impl Into<String>, value: Option<StandardValue>) {
        self.variables.insert(key.into(), value);
    }

    pub fn now(&self) -> Timestamp {
        self.now
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode one step against a descriptor. Unsupported operation codes and
/// payloads that do not fit the options kind yield `None`.
pub fn decode_step(descriptor: &ProcessorDescriptor, step: &Step) -> Option<DecodedStep> {
    if !descriptor.supports(step.operation) {
        tracing::warn!(
            operation = step.operation,
            options_kind = ?descriptor.options_kind,
            "Skipping step with unsupported operation"
        );
        return None;
    }
    match descriptor.options_kind.decode(&step.options) {
        Ok(options) => Some(DecodedStep {
            operation: step.operation,
            options,
        }),
        Err(e) => {
            tracing::warn!(
                operation = step.operation,
                options_kind = ?descriptor.options_kind,
                error = %e,
                "Skipping step whose options do not decode"
            );
            None
        }
    }
}

/// Decode every step for a property type, dropping the ones that fail.
pub fn decode_steps(property_type: PropertyType, steps: &[Step]) -> Vec<DecodedStep> {
    match registry::descriptor(property_type) {
        Some(descriptor) => steps
            .iter()
            .filter_map(|step| decode_step(descriptor, step))
            .collect(),
        None => Vec::new(),
    }
}

/// Keep only the stored steps that decode for a property type.
pub fn retain_decodable(property_type: PropertyType, steps: Vec<Step>) -> Vec<Step> {
    match registry::descriptor(property_type) {
        Some(descriptor) => steps
            .into_iter()
            .filter(|step| decode_step(descriptor, step).is_some())
            .collect(),
        None => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Run `steps` in order against `initial` for a property of `property_type`.
///
/// Each step is decoded against the registry descriptor of the property
/// type; a step that fails to decode is skipped. With no decodable step
/// the initial value is returned unchanged.
pub fn execute_steps(
    property_type: PropertyType,
    initial: Option<StandardValue>,
    steps: &[Step],
    ctx: &ProcessContext,
) -> Option<StandardValue> {
    let Some(descriptor) = registry::descriptor(property_type) else {
        if !steps.is_empty() {
            tracing::warn!(
                ?property_type,
                steps = steps.len(),
                "Property type has no bulk modification processor, skipping steps"
            );
        }
        return initial;
    };

    steps.iter().fold(initial, |current, step| {
        match decode_step(descriptor, step) {
            Some(decoded) => execute_decoded(&decoded, current, ctx),
            None => current,
        }
    })
}

/// Run one decoded step.
pub fn execute_decoded(
    step: &DecodedStep,
    current: Option<StandardValue>,
    ctx: &ProcessContext,
) -> Option<StandardValue> {
    let next = match &step.options {
        ProcessOptions::Text(options) => match text::TextOperation::from_code(step.operation) {
            Some(op) => text::execute(op, options, current, ctx),
            None => current,
        },
        ProcessOptions::ListString(options) => {
            match list_string::ListStringOperation::from_code(step.operation) {
                Some(op) => list_string::execute(op, options, current, ctx),
                None => current,
            }
        }
        ProcessOptions::Decimal(options) => {
            match decimal::DecimalOperation::from_code(step.operation) {
                Some(op) => decimal::execute(op, options, current, ctx),
                None => current,
            }
        }
        ProcessOptions::Boolean(options) => {
            match boolean::BooleanOperation::from_code(step.operation) {
                Some(op) => boolean::execute(op, options, current, ctx),
                None => current,
            }
        }
        ProcessOptions::DateTime(options) => {
            match date_time::DateTimeOperation::from_code(step.operation) {
                Some(op) => date_time::execute(op, options, current, ctx),
                None => current,
            }
        }
        ProcessOptions::Link(options) => match link::LinkOperation::from_code(step.operation) {
            Some(op) => link::execute(op, options, current, ctx),
            None => current,
        },
        ProcessOptions::Tags(options) => match tags::TagsOperation::from_code(step.operation) {
            Some(op) => tags::execute(op, options, current, ctx),
            None => current,
        },
    };
    next.and_then(StandardValue::normalize)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text(s: &str) -> Option<StandardValue> {
        Some(StandardValue::String(s.to_string()))
    }

    #[test]
    fn append_suffix_step() {
        let steps = vec![Step::new(
            text::TextOperation::AddToEnd.code(),
            json!({"suffix": " (remastered)"}),
        )];
        let out = execute_steps(
            PropertyType::SingleLineText,
            text("Movie"),
            &steps,
            &ProcessContext::default(),
        );
        assert_eq!(out, text("Movie (remastered)"));
    }

    #[test]
    fn steps_run_in_declared_order() {
        let steps = vec![
            Step::new(text::TextOperation::AddToStart.code(), json!({"value": "["})),
            Step::new(text::TextOperation::AddToEnd.code(), json!({"value": "]"})),
            Step::new(
                text::TextOperation::ReplaceFromAnyPosition.code(),
                json!({"find": "a", "replace": "o"}),
            ),
        ];
        let out = execute_steps(
            PropertyType::MultilineText,
            text("banana"),
            &steps,
            &ProcessContext::default(),
        );
        assert_eq!(out, text("[bonono]"));
    }

    #[test]
    fn zero_decodable_steps_leave_value_unchanged() {
        let steps = vec![
            Step::new(99, json!({})),
            Step::new(text::TextOperation::AddToEnd.code(), json!("not an object")),
        ];
        let out = execute_steps(
            PropertyType::SingleLineText,
            text("keep"),
            &steps,
            &ProcessContext::default(),
        );
        assert_eq!(out, text("keep"));
    }

    #[test]
    fn undecodable_step_behaves_as_if_omitted() {
        let good_a = Step::new(text::TextOperation::AddToStart.code(), json!({"value": "a-"}));
        let bad = Step::new(text::TextOperation::RemoveFromEnd.code(), json!({"count": "x"}));
        let good_b = Step::new(text::TextOperation::AddToEnd.code(), json!({"value": "-b"}));
        let ctx = ProcessContext::default();

        let with_bad = execute_steps(
            PropertyType::SingleLineText,
            text("mid"),
            &[good_a.clone(), bad, good_b.clone()],
            &ctx,
        );
        let without_bad = execute_steps(
            PropertyType::SingleLineText,
            text("mid"),
            &[good_a, good_b],
            &ctx,
        );
        assert_eq!(with_bad, without_bad);
        assert_eq!(with_bad, text("a-mid-b"));
    }

    #[test]
    fn unsupported_property_type_returns_initial() {
        let steps = vec![Step::new(1, json!({}))];
        let out = execute_steps(
            PropertyType::Formula,
            text("=1+1"),
            &steps,
            &ProcessContext::default(),
        );
        assert_eq!(out, text("=1+1"));
    }

    #[test]
    fn registry_type_wins_over_payload_shape() {
        // A text-shaped payload on a number property is read as decimal options.
        let steps = vec![Step::new(
            decimal::DecimalOperation::Add.code(),
            json!({"value": "2.5"}),
        )];
        let out = execute_steps(
            PropertyType::Number,
            Some(StandardValue::Decimal(1.0)),
            &steps,
            &ProcessContext::default(),
        );
        assert_eq!(out, Some(StandardValue::Decimal(3.5)));
    }

    #[test]
    fn retain_decodable_filters_stored_steps() {
        let steps = vec![
            Step::new(1, Value::Null),
            Step::new(42, json!({})),
            Step::new(2, json!({"value": "x"})),
        ];
        let kept = retain_decodable(PropertyType::SingleLineText, steps);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].operation, 1);
        assert_eq!(kept[1].operation, 2);
        assert!(retain_decodable(PropertyType::Formula, kept).is_empty());
    }

    #[test]
    fn step_serializes_as_tagged_object() {
        let step = Step::new(4, json!({"value": "x"}));
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json, json!({"operation": 4, "options": {"value": "x"}}));
    }

    #[test]
    fn context_variables_read_absent_for_unknown_keys() {
        let mut ctx = ProcessContext::default();
        ctx.set_variable("a", text("1"));
        ctx.set_variable("b", None);
        assert_eq!(ctx.variable("a"), text("1").as_ref());
        assert_eq!(ctx.variable("b"), None);
        assert_eq!(ctx.variable("c"), None);
    }
}
