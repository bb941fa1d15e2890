//! Values carried inside step options.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::process::ProcessContext;
use crate::standard_value::{StandardValue, StandardValueType};

/// Either a literal JSON value or a reference to a resolved variable.
///
/// Serialized as the literal itself, or as `{"variable": "<key>"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProcessValue {
    Variable { variable: String },
    Fixed(Value),
}

impl ProcessValue {
    pub fn fixed(value: impl Into<Value>) -> Self {
        Self::Fixed(value.into())
    }

    pub fn variable(key: impl Into<String>) -> Self {
        Self::Variable {
            variable: key.into(),
        }
    }

    /// Resolve to a standard value of `target` type.
    ///
    /// Literals are decoded directly against the target type, falling back
    /// to their natural JSON type followed by a conversion. Variables read
    /// from the context and are converted; an unknown variable is absent.
    pub fn resolve(&self, target: StandardValueType, ctx: &ProcessContext) -> Option<StandardValue> {
        match self {
            Self::Variable { variable } => ctx
                .variable(variable)
                .cloned()
                .and_then(|value| value.convert_to(target)),
            Self::Fixed(json) => StandardValue::from_json(target, json)
                .or_else(|| natural(json).and_then(|value| value.convert_to(target))),
        }
    }

    /// Resolve as plain text. Absent values read as `None`.
    pub fn resolve_text(&self, ctx: &ProcessContext) -> Option<String> {
        self.resolve(StandardValueType::String, ctx)
            .map(|value| value.to_text())
    }
}

fn natural(json: &Value) -> Option<StandardValue> {
    let value_type = match json {
        Value::Null => return None,
        Value::String(_) => StandardValueType::String,
        Value::Number(_) => StandardValueType::Decimal,
        Value::Bool(_) => StandardValueType::Boolean,
        Value::Array(_) => StandardValueType::ListString,
        Value::Object(_) => StandardValueType::Link,
    };
    StandardValue::from_json(value_type, json)
}

/// Options for operations that only need a single value (boolean, link,
/// tags).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValueProcessOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<ProcessValue>,
}

impl ValueProcessOptions {
    pub fn resolve(&self, target: StandardValueType, ctx: &ProcessContext) -> Option<StandardValue> {
        self.value.as_ref().and_then(|v| v.resolve(target, ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn variable_reference_is_recognised() {
        let v: ProcessValue = serde_json::from_value(json!({"variable": "title"})).unwrap();
        assert_eq!(v, ProcessValue::variable("title"));
        let v: ProcessValue = serde_json::from_value(json!({"text": "t"})).unwrap();
        assert!(matches!(v, ProcessValue::Fixed(_)));
    }

    #[test]
    fn fixed_values_convert_to_target() {
        let ctx = ProcessContext::default();
        assert_eq!(
            ProcessValue::fixed(5).resolve(StandardValueType::String, &ctx),
            Some(StandardValue::String("5".into()))
        );
        assert_eq!(
            ProcessValue::fixed("2.5").resolve(StandardValueType::Decimal, &ctx),
            Some(StandardValue::Decimal(2.5))
        );
        assert_eq!(
            ProcessValue::fixed(json!(["a", "b"])).resolve(StandardValueType::String, &ctx),
            Some(StandardValue::String("a, b".into()))
        );
        assert_eq!(
            ProcessValue::fixed("x").resolve(StandardValueType::Decimal, &ctx),
            None
        );
    }

    #[test]
    fn variables_resolve_from_context() {
        let mut ctx = ProcessContext::default();
        ctx.set_variable("n", Some(StandardValue::Decimal(3.0)));
        assert_eq!(
            ProcessValue::variable("n").resolve_text(&ctx),
            Some("3".to_string())
        );
        assert_eq!(ProcessValue::variable("missing").resolve_text(&ctx), None);
    }
}
