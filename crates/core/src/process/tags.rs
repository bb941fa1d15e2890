use crate::process::value::ValueProcessOptions;
use crate::process::ProcessContext;
use crate::standard_value::{StandardValue, StandardValueType, TagValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagsOperation {
    Delete = 1,
    SetWithFixedValue = 2,
    AddTags = 3,
    RemoveTags = 4,
}

impl TagsOperation {
    pub const ALL: [TagsOperation; 4] =
        [Self::Delete, Self::SetWithFixedValue, Self::AddTags, Self::RemoveTags];

    pub const CODES: &'static [i32] = &[1, 2, 3, 4];

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.code() == code)
    }
}

pub fn execute(
    op: TagsOperation,
    options: &ValueProcessOptions,
    current: Option<StandardValue>,
    ctx: &ProcessContext,
) -> Option<StandardValue> {
    let tags = as_tags(current);
    let value = || as_tags(options.resolve(StandardValueType::ListTag, ctx));

    let result = match op {
        TagsOperation::Delete => return None,
        TagsOperation::SetWithFixedValue => value(),
        TagsOperation::AddTags => {
            let mut tags = tags;
            for tag in value() {
                if !tags.contains(&tag) {
                    tags.push(tag);
                }
            }
            tags
        }
        TagsOperation::RemoveTags => {
            let remove = value();
            tags.into_iter().filter(|t| !remove.contains(t)).collect()
        }
    };
    StandardValue::ListTag(result).normalize()
}

fn as_tags(value: Option<StandardValue>) -> Vec<TagValue> {
    match value.and_then(|v| v.convert_to(StandardValueType::ListTag)) {
        Some(StandardValue::ListTag(tags)) => tags,
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::value::ProcessValue;
    use serde_json::json;

    fn tags(items: &[(&str, &str)]) -> Option<StandardValue> {
        Some(StandardValue::ListTag(
            items
                .iter()
                .map(|(g, n)| TagValue::new((!g.is_empty()).then_some(*g), n))
                .collect(),
        ))
    }

    fn opts(value: serde_json::Value) -> ValueProcessOptions {
        ValueProcessOptions {
            value: Some(ProcessValue::Fixed(value)),
        }
    }

    #[test]
    fn add_tags_skips_duplicates() {
        let ctx = ProcessContext::default();
        let out = execute(
            TagsOperation::AddTags,
            &opts(json!(["genre:drama", "genre:comedy"])),
            tags(&[("genre", "drama")]),
            &ctx,
        );
        assert_eq!(out, tags(&[("genre", "drama"), ("genre", "comedy")]));
    }

    #[test]
    fn remove_tags_matches_group_and_name() {
        let ctx = ProcessContext::default();
        let out = execute(
            TagsOperation::RemoveTags,
            &opts(json!(["drama"])),
            tags(&[("genre", "drama"), ("", "drama")]),
            &ctx,
        );
        assert_eq!(out, tags(&[("genre", "drama")]));
    }

    #[test]
    fn removing_every_tag_is_absent() {
        let ctx = ProcessContext::default();
        let out = execute(
            TagsOperation::RemoveTags,
            &opts(json!(["x"])),
            tags(&[("", "x")]),
            &ctx,
        );
        assert_eq!(out, None);
    }
}
