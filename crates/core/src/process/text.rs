//! Text operations for single-line, multiline and single-choice properties.
//!
//! Positions and counts are measured in characters, not bytes.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::process::value::ProcessValue;
use crate::process::ProcessContext;
use crate::standard_value::{StandardValue, StandardValueType};

/// Text operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextOperation {
    Delete = 1,
    SetWithFixedValue = 2,
    AddToStart = 3,
    AddToEnd = 4,
    AddToAnyPosition = 5,
    RemoveFromStart = 6,
    RemoveFromEnd = 7,
    RemoveFromAnyPosition = 8,
    ReplaceFromStart = 9,
    ReplaceFromEnd = 10,
    ReplaceFromAnyPosition = 11,
    ReplaceWithRegex = 12,
}

impl TextOperation {
    pub const ALL: [TextOperation; 12] = [
        Self::Delete,
        Self::SetWithFixedValue,
        Self::AddToStart,
        Self::AddToEnd,
        Self::AddToAnyPosition,
        Self::RemoveFromStart,
        Self::RemoveFromEnd,
        Self::RemoveFromAnyPosition,
        Self::ReplaceFromStart,
        Self::ReplaceFromEnd,
        Self::ReplaceFromAnyPosition,
        Self::ReplaceWithRegex,
    ];

    pub const CODES: &'static [i32] = &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.code() == code)
    }
}

/// Options shared by every text operation. Each operation reads only the
/// fields it needs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextProcessOptions {
    /// Text to set or insert. Also accepted as `prefix` or `suffix`.
    #[serde(alias = "prefix", alias = "suffix", skip_serializing_if = "Option::is_none")]
    pub value: Option<ProcessValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    /// Measure `index` from the end of the text.
    pub reversed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub find: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replace: Option<ProcessValue>,
}

pub fn execute(
    op: TextOperation,
    options: &TextProcessOptions,
    current: Option<StandardValue>,
    ctx: &ProcessContext,
) -> Option<StandardValue> {
    let text = current
        .and_then(|v| v.convert_to(StandardValueType::String))
        .map(|v| v.to_text());
    transform(op, options, text, ctx).map(StandardValue::String)
}

/// Apply a text operation to plain text. Also used per item by list
/// operations.
pub fn transform(
    op: TextOperation,
    options: &TextProcessOptions,
    current: Option<String>,
    ctx: &ProcessContext,
) -> Option<String> {
    let value = || options.value.as_ref().and_then(|v| v.resolve_text(ctx));

    match op {
        TextOperation::Delete => None,
        TextOperation::SetWithFixedValue => value(),
        TextOperation::AddToStart => match value() {
            Some(prefix) => Some(prefix + current.as_deref().unwrap_or_default()),
            None => current,
        },
        TextOperation::AddToEnd => match value() {
            Some(suffix) => Some(current.unwrap_or_default() + &suffix),
            None => current,
        },
        TextOperation::AddToAnyPosition => match value() {
            Some(insert) => {
                let mut chars: Vec<char> = current.unwrap_or_default().chars().collect();
                let at = position(chars.len(), options.index.unwrap_or(0), options.reversed);
                chars.splice(at..at, insert.chars());
                Some(chars.into_iter().collect())
            }
            None => current,
        },
        TextOperation::RemoveFromStart => {
            let (Some(text), Some(count)) = (current.as_deref(), options.count) else {
                return current;
            };
            Some(text.chars().skip(count).collect())
        }
        TextOperation::RemoveFromEnd => {
            let (Some(text), Some(count)) = (current.as_deref(), options.count) else {
                return current;
            };
            let len = text.chars().count();
            Some(text.chars().take(len.saturating_sub(count)).collect())
        }
        TextOperation::RemoveFromAnyPosition => {
            let (Some(text), Some(count)) = (current.as_deref(), options.count) else {
                return current;
            };
            let mut chars: Vec<char> = text.chars().collect();
            let at = position(chars.len(), options.index.unwrap_or(0), options.reversed);
            let (start, end) = if options.reversed {
                (at.saturating_sub(count), at)
            } else {
                (at, (at + count).min(chars.len()))
            };
            chars.drain(start..end);
            Some(chars.into_iter().collect())
        }
        TextOperation::ReplaceFromStart
        | TextOperation::ReplaceFromEnd
        | TextOperation::ReplaceFromAnyPosition => {
            let (Some(text), Some(find)) = (current.as_deref(), options.find.as_deref()) else {
                return current;
            };
            if find.is_empty() {
                return current;
            }
            let replacement = replacement(options, ctx);
            let replaced = match op {
                TextOperation::ReplaceFromStart => text.replacen(find, &replacement, 1),
                TextOperation::ReplaceFromEnd => match text.rfind(find) {
                    Some(at) => format!("{}{}{}", &text[..at], replacement, &text[at + find.len()..]),
                    None => text.to_string(),
                },
                _ => text.replace(find, &replacement),
            };
            Some(replaced)
        }
        TextOperation::ReplaceWithRegex => {
            let (Some(text), Some(pattern)) = (current.as_deref(), options.find.as_deref()) else {
                return current;
            };
            match Regex::new(pattern) {
                Ok(re) => Some(re.replace_all(text, replacement(options, ctx).as_str()).into_owned()),
                Err(e) => {
                    tracing::warn!(pattern, error = %e, "Invalid replacement pattern, value left unchanged");
                    current
                }
            }
        }
    }
}

fn replacement(options: &TextProcessOptions, ctx: &ProcessContext) -> String {
    options
        .replace
        .as_ref()
        .and_then(|v| v.resolve_text(ctx))
        .unwrap_or_default()
}

/// Character offset for `index`, counted from the end when `reversed`,
/// clamped to the text.
fn position(len: usize, index: usize, reversed: bool) -> usize {
    let index = index.min(len);
    if reversed {
        len - index
    } else {
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(op: TextOperation, options: serde_json::Value, current: Option<&str>) -> Option<String> {
        let options: TextProcessOptions = serde_json::from_value(options).unwrap();
        transform(
            op,
            &options,
            current.map(str::to_string),
            &ProcessContext::default(),
        )
    }

    #[test]
    fn codes_match_declaration() {
        for op in TextOperation::ALL {
            assert_eq!(TextOperation::from_code(op.code()), Some(op));
        }
        assert_eq!(TextOperation::CODES.len(), TextOperation::ALL.len());
        assert_eq!(TextOperation::from_code(0), None);
    }

    #[test]
    fn delete_and_set() {
        assert_eq!(run(TextOperation::Delete, json!({}), Some("x")), None);
        assert_eq!(
            run(TextOperation::SetWithFixedValue, json!({"value": "y"}), Some("x")),
            Some("y".into())
        );
        assert_eq!(run(TextOperation::SetWithFixedValue, json!({}), Some("x")), None);
    }

    #[test]
    fn add_prefix_and_suffix() {
        assert_eq!(
            run(TextOperation::AddToStart, json!({"prefix": "The "}), Some("Movie")),
            Some("The Movie".into())
        );
        assert_eq!(
            run(TextOperation::AddToEnd, json!({"suffix": "!"}), None),
            Some("!".into())
        );
        assert_eq!(
            run(TextOperation::AddToEnd, json!({}), Some("same")),
            Some("same".into())
        );
    }

    #[test]
    fn insert_at_position_counts_characters() {
        assert_eq!(
            run(TextOperation::AddToAnyPosition, json!({"value": "-", "index": 2}), Some("äöü")),
            Some("äö-ü".into())
        );
        assert_eq!(
            run(
                TextOperation::AddToAnyPosition,
                json!({"value": "-", "index": 1, "reversed": true}),
                Some("abc")
            ),
            Some("ab-c".into())
        );
        assert_eq!(
            run(TextOperation::AddToAnyPosition, json!({"value": "+", "index": 99}), Some("ab")),
            Some("ab+".into())
        );
    }

    #[test]
    fn remove_characters() {
        assert_eq!(
            run(TextOperation::RemoveFromStart, json!({"count": 2}), Some("héllo")),
            Some("llo".into())
        );
        assert_eq!(
            run(TextOperation::RemoveFromEnd, json!({"count": 10}), Some("abc")),
            Some(String::new())
        );
        assert_eq!(
            run(TextOperation::RemoveFromAnyPosition, json!({"count": 2, "index": 1}), Some("abcde")),
            Some("ade".into())
        );
        assert_eq!(
            run(
                TextOperation::RemoveFromAnyPosition,
                json!({"count": 2, "index": 1, "reversed": true}),
                Some("abcde")
            ),
            Some("abe".into())
        );
        assert_eq!(
            run(TextOperation::RemoveFromStart, json!({}), Some("abc")),
            Some("abc".into())
        );
    }

    #[test]
    fn replace_first_last_all() {
        let opts = json!({"find": "a", "replace": "o"});
        assert_eq!(
            run(TextOperation::ReplaceFromStart, opts.clone(), Some("banana")),
            Some("bonana".into())
        );
        assert_eq!(
            run(TextOperation::ReplaceFromEnd, opts.clone(), Some("banana")),
            Some("banano".into())
        );
        assert_eq!(
            run(TextOperation::ReplaceFromAnyPosition, opts, Some("banana")),
            Some("bonono".into())
        );
        assert_eq!(
            run(TextOperation::ReplaceFromAnyPosition, json!({"find": "n"}), Some("banana")),
            Some("baaa".into())
        );
    }

    #[test]
    fn regex_replacement_supports_groups() {
        assert_eq!(
            run(
                TextOperation::ReplaceWithRegex,
                json!({"find": r"(\d{4})-(\d{2})", "replace": "$2/$1"}),
                Some("2024-05")
            ),
            Some("05/2024".into())
        );
    }

    #[test]
    fn invalid_regex_leaves_value_unchanged() {
        assert_eq!(
            run(TextOperation::ReplaceWithRegex, json!({"find": "(", "replace": "x"}), Some("keep")),
            Some("keep".into())
        );
    }

    #[test]
    fn variable_supplies_inserted_text() {
        let mut ctx = ProcessContext::default();
        ctx.set_variable("year", Some(StandardValue::Decimal(1999.0)));
        let options: TextProcessOptions =
            serde_json::from_value(json!({"value": {"variable": "year"}})).unwrap();
        let out = execute(
            TextOperation::AddToEnd,
            &options,
            Some(StandardValue::String("Film ".into())),
            &ctx,
        );
        assert_eq!(out, Some(StandardValue::String("Film 1999".into())));
    }
}
