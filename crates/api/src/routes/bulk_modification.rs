//! Route definitions for bulk modifications.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::bulk_modification;
use crate::state::AppState;

/// Routes mounted at `/bulk-modifications`.
///
/// ```text
/// GET    /                    -> list
/// POST   /                    -> create
/// GET    /{id}                -> get_by_id
/// PATCH  /{id}                -> update
/// DELETE /{id}                -> delete
/// POST   /{id}/duplicate      -> duplicate
/// POST   /{id}/filter         -> filter
/// POST   /{id}/calculate      -> calculate
/// GET    /{id}/diffs          -> list_diffs
/// POST   /{id}/apply          -> apply
/// POST   /{id}/revert         -> revert
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(bulk_modification::list).post(bulk_modification::create),
        )
        .route(
            "/{id}",
            get(bulk_modification::get_by_id)
                .patch(bulk_modification::update)
                .delete(bulk_modification::delete),
        )
        .route("/{id}/duplicate", post(bulk_modification::duplicate))
        .route("/{id}/filter", post(bulk_modification::filter))
        .route("/{id}/calculate", post(bulk_modification::calculate))
        .route("/{id}/diffs", get(bulk_modification::list_diffs))
        .route("/{id}/apply", post(bulk_modification::apply))
        .route("/{id}/revert", post(bulk_modification::revert))
}
