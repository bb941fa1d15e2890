//! Standard values: the normalized in-memory representation of a property
//! value, independent of how it was serialized.
//!
//! Two serialized forms can describe the same logical value (`1` and `1.0`,
//! `""` and `null`), so comparisons always go through [`values_equal`],
//! which compares normalized standard values rather than JSON text.

use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Timestamp;

/// Separator used when joining list items into a single string.
pub const LIST_SEPARATOR: &str = ", ";

/// Separator between a tag's group and name in text form.
pub const TAG_GROUP_SEPARATOR: char = ':';

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The shape of a [`StandardValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StandardValueType {
    String,
    ListString,
    Decimal,
    Boolean,
    DateTime,
    Link,
    ListTag,
}

impl StandardValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::ListString => "list_string",
            Self::Decimal => "decimal",
            Self::Boolean => "boolean",
            Self::DateTime => "date_time",
            Self::Link => "link",
            Self::ListTag => "list_tag",
        }
    }
}

impl std::fmt::Display for StandardValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A hyperlink value. Either part may be absent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LinkValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A tag, optionally scoped by a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub name: String,
}

impl TagValue {
    pub fn new(group: Option<&str>, name: &str) -> Self {
        Self {
            group: group.map(str::to_string),
            name: name.to_string(),
        }
    }

    /// Parse `group:name` or a bare `name`.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        match text.split_once(TAG_GROUP_SEPARATOR) {
            Some((group, name)) if !name.trim().is_empty() => {
                let group = group.trim();
                Some(Self::new(
                    (!group.is_empty()).then_some(group),
                    name.trim(),
                ))
            }
            _ => Some(Self::new(None, text)),
        }
    }
}

impl std::fmt::Display for TagValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.group {
            Some(group) => write!(f, "{group}{TAG_GROUP_SEPARATOR}{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// A type-correct property value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StandardValue {
    String(String),
    ListString(Vec<String>),
    Decimal(f64),
    Boolean(bool),
    DateTime(Timestamp),
    Link(LinkValue),
    ListTag(Vec<TagValue>),
}

// ---------------------------------------------------------------------------
// Normalization and equality
// ---------------------------------------------------------------------------

impl StandardValue {
    pub fn value_type(&self) -> StandardValueType {
        match self {
            Self::String(_) => StandardValueType::String,
            Self::ListString(_) => StandardValueType::ListString,
            Self::Decimal(_) => StandardValueType::Decimal,
            Self::Boolean(_) => StandardValueType::Boolean,
            Self::DateTime(_) => StandardValueType::DateTime,
            Self::Link(_) => StandardValueType::Link,
            Self::ListTag(_) => StandardValueType::ListTag,
        }
    }

    /// Collapse empty values to `None`.
    pub fn normalize(self) -> Option<Self> {
        match self {
            Self::String(s) if s.is_empty() => None,
            Self::ListString(items) => {
                let items: Vec<String> = items.into_iter().filter(|s| !s.is_empty()).collect();
                (!items.is_empty()).then_some(Self::ListString(items))
            }
            Self::Decimal(d) if !d.is_finite() => None,
            Self::Link(link) => {
                let text = link.text.filter(|t| !t.is_empty());
                let url = link.url.filter(|u| !u.is_empty());
                if text.is_none() && url.is_none() {
                    None
                } else {
                    Some(Self::Link(LinkValue { text, url }))
                }
            }
            Self::ListTag(tags) => {
                let tags: Vec<TagValue> = tags.into_iter().filter(|t| !t.name.is_empty()).collect();
                (!tags.is_empty()).then_some(Self::ListTag(tags))
            }
            other => Some(other),
        }
    }

    /// Text rendering used when converting to string-shaped values.
    pub fn to_text(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::ListString(items) => items.join(LIST_SEPARATOR),
            Self::Decimal(d) => d.to_string(),
            Self::Boolean(b) => b.to_string(),
            Self::DateTime(dt) => dt.to_rfc3339(),
            Self::Link(link) => link
                .url
                .clone()
                .or_else(|| link.text.clone())
                .unwrap_or_default(),
            Self::ListTag(tags) => tags
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(LIST_SEPARATOR),
        }
    }

    /// JSON form of the value, as stored in serialized diffs.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Normalize an optional value.
pub fn normalize(value: Option<StandardValue>) -> Option<StandardValue> {
    value.and_then(StandardValue::normalize)
}

/// Standard-value equality: normalized values compared structurally.
pub fn values_equal(a: &Option<StandardValue>, b: &Option<StandardValue>) -> bool {
    normalize(a.clone()) == normalize(b.clone())
}

// ---------------------------------------------------------------------------
// Typed decoding
// ---------------------------------------------------------------------------

impl StandardValue {
    /// Decode a JSON value into the given standard value type.
    ///
    /// Returns `None` for `null` and for shapes that cannot represent the
    /// requested type. Scalars are accepted where a lossless reading exists
    /// (a number for a string, a single string for a list).
    pub fn from_json(value_type: StandardValueType, json: &Value) -> Option<Self> {
        let value = match (value_type, json) {
            (_, Value::Null) => return None,
            (StandardValueType::String, Value::String(s)) => Self::String(s.clone()),
            (StandardValueType::String, Value::Number(n)) => Self::String(n.to_string()),
            (StandardValueType::String, Value::Bool(b)) => Self::String(b.to_string()),
            (StandardValueType::ListString, Value::Array(items)) => Self::ListString(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => Some(s.clone()),
                        Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    })
                    .collect::<Option<Vec<_>>>()?,
            ),
            (StandardValueType::ListString, Value::String(s)) => Self::ListString(vec![s.clone()]),
            (StandardValueType::Decimal, Value::Number(n)) => Self::Decimal(n.as_f64()?),
            (StandardValueType::Decimal, Value::String(s)) => Self::Decimal(parse_decimal(s)?),
            (StandardValueType::Boolean, Value::Bool(b)) => Self::Boolean(*b),
            (StandardValueType::Boolean, Value::String(s)) => Self::Boolean(parse_bool(s)?),
            (StandardValueType::Boolean, Value::Number(n)) => Self::Boolean(n.as_f64()? != 0.0),
            (StandardValueType::DateTime, Value::String(s)) => Self::DateTime(parse_date_time(s)?),
            (StandardValueType::Link, Value::Object(_)) => {
                Self::Link(serde_json::from_value(json.clone()).ok()?)
            }
            (StandardValueType::Link, Value::String(s)) => Self::Link(LinkValue {
                text: None,
                url: Some(s.clone()),
            }),
            (StandardValueType::ListTag, Value::Array(items)) => Self::ListTag(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => TagValue::parse(s),
                        Value::Object(_) => serde_json::from_value(item.clone()).ok(),
                        _ => None,
                    })
                    .collect::<Option<Vec<_>>>()?,
            ),
            _ => return None,
        };
        value.normalize()
    }

    /// Convert into another standard value type, or `None` if no sensible
    /// conversion exists.
    pub fn convert_to(self, target: StandardValueType) -> Option<Self> {
        if self.value_type() == target {
            return self.normalize();
        }
        let converted = match (self, target) {
            (Self::ListString(items), StandardValueType::ListTag) => {
                Self::ListTag(items.iter().filter_map(|s| TagValue::parse(s)).collect())
            }
            (Self::ListTag(tags), StandardValueType::ListString) => {
                Self::ListString(tags.iter().map(ToString::to_string).collect())
            }
            (Self::ListString(items), StandardValueType::Decimal) if items.len() == 1 => {
                Self::Decimal(parse_decimal(&items[0])?)
            }
            (Self::Decimal(d), StandardValueType::Boolean) => Self::Boolean(d != 0.0),
            (Self::Boolean(b), StandardValueType::Decimal) => {
                Self::Decimal(if b { 1.0 } else { 0.0 })
            }
            (value, StandardValueType::String) => Self::String(value.to_text()),
            (value, StandardValueType::ListString) => Self::ListString(split_list(&value.to_text())),
            (Self::String(s), StandardValueType::Decimal) => Self::Decimal(parse_decimal(&s)?),
            (Self::String(s), StandardValueType::Boolean) => Self::Boolean(parse_bool(&s)?),
            (Self::String(s), StandardValueType::DateTime) => {
                Self::DateTime(parse_date_time(&s)?)
            }
            (Self::String(s), StandardValueType::Link) => Self::Link(LinkValue {
                text: None,
                url: Some(s),
            }),
            (Self::String(s), StandardValueType::ListTag) => {
                Self::ListTag(split_list(&s).iter().filter_map(|t| TagValue::parse(t)).collect())
            }
            _ => return None,
        };
        converted.normalize()
    }
}

// ---------------------------------------------------------------------------
// Text serialization
// ---------------------------------------------------------------------------

/// Serialize a value as JSON text; absent values serialize to `None`.
pub fn serialize_text(value: &Option<StandardValue>) -> Option<String> {
    value
        .as_ref()
        .map(|v| serde_json::to_string(v).unwrap_or_else(|_| "null".to_string()))
}

/// Decode JSON text produced by [`serialize_text`] against a value type.
///
/// `None` text and JSON `null` decode to `Ok(None)`. Text that is not JSON,
/// or JSON that does not fit the type, is an error.
pub fn deserialize_text(
    value_type: StandardValueType,
    text: Option<&str>,
) -> Result<Option<StandardValue>, String> {
    let Some(text) = text else {
        return Ok(None);
    };
    let json: Value =
        serde_json::from_str(text).map_err(|e| format!("Invalid value JSON: {e}"))?;
    if json.is_null() {
        return Ok(None);
    }
    match StandardValue::from_json(value_type, &json) {
        Some(value) => Ok(Some(value)),
        // Empty containers normalize away; they are absent, not malformed.
        None if is_empty_json(&json) => Ok(None),
        None => Err(format!("Value {json} is not a valid {value_type}")),
    }
}

fn is_empty_json(json: &Value) -> bool {
    match json {
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.values().all(|v| v.is_null() || v == ""),
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Scalar parsing helpers
// ---------------------------------------------------------------------------

fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_decimal(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|d| d.is_finite())
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, or a bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_date_time(text: &str) -> Option<Timestamp> {
    let text = text.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
