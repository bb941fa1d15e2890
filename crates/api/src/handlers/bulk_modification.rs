//! Handlers for the bulk modification lifecycle.
//!
//! Definitions are edited freely until applied; the lifecycle endpoints
//! (`filter`, `calculate`, `apply`, `revert`) delegate to
//! [`BulkModificationService`](curio_core::engine::BulkModificationService),
//! which enforces the state machine.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use curio_core::bulk_modification::BulkModificationPatch;
use curio_core::types::DbId;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Largest page of diffs returned at once.
pub const MAX_DIFF_PAGE: usize = 500;

// ---------------------------------------------------------------------------
// Request bodies and query parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateBulkModification {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CalculateParams {
    /// Fail instead of dropping processes bound to missing properties.
    /// Defaults to the server's `BULK_STRICT_PREVIEW`.
    pub throw_if_missing: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct DiffParams {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

/// GET /bulk-modifications
pub async fn list(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let items = state.bulk_modifications.list().await?;
    tracing::debug!(count = items.len(), "Listed bulk modifications");
    Ok(Json(DataResponse { data: items }))
}

/// POST /bulk-modifications
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreateBulkModification>,
) -> AppResult<impl IntoResponse> {
    let created = state.bulk_modifications.create(&input.name).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: created })))
}

/// GET /bulk-modifications/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let bm = state.bulk_modifications.get(id).await?;
    Ok(Json(DataResponse { data: bm }))
}

/// PATCH /bulk-modifications/{id}
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(patch): Json<BulkModificationPatch>,
) -> AppResult<impl IntoResponse> {
    let bm = state.bulk_modifications.patch(id, patch).await?;
    Ok(Json(DataResponse { data: bm }))
}

/// DELETE /bulk-modifications/{id}
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    state.bulk_modifications.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /bulk-modifications/{id}/duplicate
pub async fn duplicate(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let copy = state.bulk_modifications.duplicate(id).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: copy })))
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// POST /bulk-modifications/{id}/filter
pub async fn filter(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let bm = state.bulk_modifications.filter(id).await?;
    Ok(Json(DataResponse { data: bm }))
}

/// POST /bulk-modifications/{id}/calculate
pub async fn calculate(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Query(params): Query<CalculateParams>,
) -> AppResult<impl IntoResponse> {
    let summary = state
        .bulk_modifications
        .calculate(id, params.throw_if_missing)
        .await?;
    Ok(Json(DataResponse { data: summary }))
}

/// GET /bulk-modifications/{id}/diffs
pub async fn list_diffs(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Query(params): Query<DiffParams>,
) -> AppResult<impl IntoResponse> {
    let limit = match params.limit {
        Some(0) => return Err(AppError::BadRequest("limit must be at least 1".to_string())),
        Some(limit) => limit.min(MAX_DIFF_PAGE),
        None => MAX_DIFF_PAGE,
    };
    let diffs = state
        .bulk_modifications
        .get_diffs(id, params.offset.unwrap_or(0), Some(limit))
        .await?;
    Ok(Json(DataResponse { data: diffs }))
}

/// POST /bulk-modifications/{id}/apply
pub async fn apply(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let report = state.bulk_modifications.apply(id).await?;
    Ok(Json(DataResponse { data: report }))
}

/// POST /bulk-modifications/{id}/revert
pub async fn revert(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let report = state.bulk_modifications.revert(id).await?;
    Ok(Json(DataResponse { data: report }))
}
