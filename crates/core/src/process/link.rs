use crate::process::value::ValueProcessOptions;
use crate::process::ProcessContext;
use crate::standard_value::{LinkValue, StandardValue, StandardValueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOperation {
    Delete = 1,
    SetWithFixedValue = 2,
    SetText = 3,
    SetUrl = 4,
}

impl LinkOperation {
    pub const ALL: [LinkOperation; 4] =
        [Self::Delete, Self::SetWithFixedValue, Self::SetText, Self::SetUrl];

    pub const CODES: &'static [i32] = &[1, 2, 3, 4];

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.code() == code)
    }
}

/// `SetText` and `SetUrl` replace one part and keep the other.
pub fn execute(
    op: LinkOperation,
    options: &ValueProcessOptions,
    current: Option<StandardValue>,
    ctx: &ProcessContext,
) -> Option<StandardValue> {
    let link = match current.and_then(|v| v.convert_to(StandardValueType::Link)) {
        Some(StandardValue::Link(link)) => link,
        _ => LinkValue::default(),
    };
    let text = || {
        options
            .resolve(StandardValueType::String, ctx)
            .map(|v| v.to_text())
    };

    let result = match op {
        LinkOperation::Delete => return None,
        LinkOperation::SetWithFixedValue => return options.resolve(StandardValueType::Link, ctx),
        LinkOperation::SetText => LinkValue {
            text: text(),
            ..link
        },
        LinkOperation::SetUrl => LinkValue {
            url: text(),
            ..link
        },
    };
    StandardValue::Link(result).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::value::ProcessValue;
    use serde_json::json;

    fn link(text: Option<&str>, url: Option<&str>) -> Option<StandardValue> {
        Some(StandardValue::Link(LinkValue {
            text: text.map(str::to_string),
            url: url.map(str::to_string),
        }))
    }

    fn opts(value: serde_json::Value) -> ValueProcessOptions {
        ValueProcessOptions {
            value: Some(ProcessValue::Fixed(value)),
        }
    }

    #[test]
    fn set_text_keeps_url() {
        let ctx = ProcessContext::default();
        assert_eq!(
            execute(
                LinkOperation::SetText,
                &opts(json!("Home")),
                link(None, Some("https://a.example")),
                &ctx
            ),
            link(Some("Home"), Some("https://a.example"))
        );
    }

    #[test]
    fn set_url_on_absent_value() {
        let ctx = ProcessContext::default();
        assert_eq!(
            execute(LinkOperation::SetUrl, &opts(json!("https://b.example")), None, &ctx),
            link(None, Some("https://b.example"))
        );
    }

    #[test]
    fn set_whole_link() {
        let ctx = ProcessContext::default();
        assert_eq!(
            execute(
                LinkOperation::SetWithFixedValue,
                &opts(json!({"text": "t", "url": "u"})),
                link(Some("x"), None),
                &ctx
            ),
            link(Some("t"), Some("u"))
        );
        assert_eq!(
            execute(LinkOperation::Delete, &opts(json!(null)), link(Some("x"), None), &ctx),
            None
        );
    }
}
