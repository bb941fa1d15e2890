use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use curio_core::error::CoreError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `curio_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// HTTP status, stable error code and client-facing message.
    fn classify(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::MissingProperties { .. } => {
                    (StatusCode::CONFLICT, "PROPERTIES_MISSING", core.to_string())
                }
                CoreError::Lifecycle { .. } => {
                    (StatusCode::CONFLICT, "LIFECYCLE_VIOLATION", core.to_string())
                }
                CoreError::External(msg) => {
                    tracing::warn!(error = %msg, "External service error");
                    (StatusCode::BAD_GATEWAY, "EXTERNAL_SERVICE_ERROR", msg.clone())
                }
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.classify();

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use curio_core::lifecycle::BulkModificationState;
    use curio_core::property::{PropertyKey, PropertyPool};

    #[test]
    fn lifecycle_violation_is_conflict() {
        let err = AppError::Core(CoreError::Lifecycle {
            from: BulkModificationState::Calculated,
            to: BulkModificationState::Reverted,
        });
        let (status, code, message) = err.classify();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(code, "LIFECYCLE_VIOLATION");
        assert!(message.contains("'calculated' to 'reverted'"));
    }

    #[test]
    fn missing_properties_is_conflict() {
        let err = AppError::Core(CoreError::MissingProperties {
            missing: vec![PropertyKey::new(PropertyPool::Custom, 3)],
        });
        let (status, code, message) = err.classify();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(code, "PROPERTIES_MISSING");
        assert!(message.contains("please run the preview again"));
    }

    #[test]
    fn internal_detail_is_hidden() {
        let err = AppError::Core(CoreError::Internal("connection reset".into()));
        let (status, _, message) = err.classify();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!message.contains("connection reset"));
    }

    #[test]
    fn external_is_bad_gateway() {
        let (status, code, _) = AppError::Core(CoreError::External("down".into())).classify();
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(code, "EXTERNAL_SERVICE_ERROR");
    }
}
