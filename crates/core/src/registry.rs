//! Property-type operation registry.
//!
//! The single source of truth for how a step targeting a property is
//! interpreted: the options payload shape, the standard value type the
//! pipeline operates on, and the operation codes that are valid. A step's
//! payload is never inspected to guess its shape; the target property's
//! declared type is resolved here first and the payload decoded against
//! the result.

use serde_json::Value;

use crate::process::boolean::BooleanOperation;
use crate::process::date_time::{DateTimeOperation, DateTimeProcessOptions};
use crate::process::decimal::{DecimalOperation, DecimalProcessOptions};
use crate::process::link::LinkOperation;
use crate::process::list_string::{ListStringOperation, ListStringProcessOptions};
use crate::process::tags::TagsOperation;
use crate::process::text::{TextOperation, TextProcessOptions};
use crate::process::value::ValueProcessOptions;
use crate::process::ProcessOptions;
use crate::property::PropertyType;
use crate::standard_value::StandardValueType;

/// Which options payload a property type's steps carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionsKind {
    Text,
    ListString,
    Decimal,
    Boolean,
    DateTime,
    Link,
    Tags,
}

impl OptionsKind {
    /// Decode a stored options payload into the typed options for this kind.
    ///
    /// A missing (`null`) payload decodes to the kind's default options.
    pub fn decode(&self, payload: &Value) -> Result<ProcessOptions, serde_json::Error> {
        fn typed<T: serde::de::DeserializeOwned + Default>(
            payload: &Value,
        ) -> Result<T, serde_json::Error> {
            if payload.is_null() {
                Ok(T::default())
            } else {
                serde_json::from_value(payload.clone())
            }
        }

        Ok(match self {
            Self::Text => ProcessOptions::Text(typed::<TextProcessOptions>(payload)?),
            Self::ListString => ProcessOptions::ListString(typed::<ListStringProcessOptions>(payload)?),
            Self::Decimal => ProcessOptions::Decimal(typed::<DecimalProcessOptions>(payload)?),
            Self::Boolean => ProcessOptions::Boolean(typed::<ValueProcessOptions>(payload)?),
            Self::DateTime => ProcessOptions::DateTime(typed::<DateTimeProcessOptions>(payload)?),
            Self::Link => ProcessOptions::Link(typed::<ValueProcessOptions>(payload)?),
            Self::Tags => ProcessOptions::Tags(typed::<ValueProcessOptions>(payload)?),
        })
    }
}

/// Everything needed to decode and run steps against one property type.
#[derive(Debug)]
pub struct ProcessorDescriptor {
    pub options_kind: OptionsKind,
    pub value_type: StandardValueType,
    pub operations: &'static [i32],
}

impl ProcessorDescriptor {
    pub fn supports(&self, operation: i32) -> bool {
        self.operations.contains(&operation)
    }
}

static TEXT: ProcessorDescriptor = ProcessorDescriptor {
    options_kind: OptionsKind::Text,
    value_type: StandardValueType::String,
    operations: TextOperation::CODES,
};

static LIST_STRING: ProcessorDescriptor = ProcessorDescriptor {
    options_kind: OptionsKind::ListString,
    value_type: StandardValueType::ListString,
    operations: ListStringOperation::CODES,
};

static DECIMAL: ProcessorDescriptor = ProcessorDescriptor {
    options_kind: OptionsKind::Decimal,
    value_type: StandardValueType::Decimal,
    operations: DecimalOperation::CODES,
};

static BOOLEAN: ProcessorDescriptor = ProcessorDescriptor {
    options_kind: OptionsKind::Boolean,
    value_type: StandardValueType::Boolean,
    operations: BooleanOperation::CODES,
};

static DATE_TIME: ProcessorDescriptor = ProcessorDescriptor {
    options_kind: OptionsKind::DateTime,
    value_type: StandardValueType::DateTime,
    operations: DateTimeOperation::CODES,
};

static LINK: ProcessorDescriptor = ProcessorDescriptor {
    options_kind: OptionsKind::Link,
    value_type: StandardValueType::Link,
    operations: LinkOperation::CODES,
};

static TAGS: ProcessorDescriptor = ProcessorDescriptor {
    options_kind: OptionsKind::Tags,
    value_type: StandardValueType::ListTag,
    operations: TagsOperation::CODES,
};

/// Look up the descriptor for a declared property type.
///
/// `None` means bulk modification does not support the type: steps against
/// it are skipped and diffs referencing it are dropped.
pub fn descriptor(property_type: PropertyType) -> Option<&'static ProcessorDescriptor> {
    match property_type {
        PropertyType::SingleLineText | PropertyType::MultilineText | PropertyType::SingleChoice => {
            Some(&TEXT)
        }
        PropertyType::MultipleChoice | PropertyType::Attachment => Some(&LIST_STRING),
        PropertyType::Number | PropertyType::Percentage | PropertyType::Rating => Some(&DECIMAL),
        PropertyType::Boolean => Some(&BOOLEAN),
        PropertyType::Date | PropertyType::DateTime => Some(&DATE_TIME),
        PropertyType::Link => Some(&LINK),
        PropertyType::Tags => Some(&TAGS),
        PropertyType::Time | PropertyType::Formula | PropertyType::Multilevel => None,
    }
}
