use crate::lifecycle::BulkModificationState;
use crate::property::PropertyKey;
use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// Raised in strict mode when a referenced property no longer exists.
    #[error("Some properties no longer exist, please run the preview again: {}", format_keys(.missing))]
    MissingProperties { missing: Vec<PropertyKey> },

    #[error("Cannot move bulk modification from '{from}' to '{to}'")]
    Lifecycle {
        from: BulkModificationState,
        to: BulkModificationState,
    },

    #[error("External service error: {0}")]
    External(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn format_keys(keys: &[PropertyKey]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
