pub mod bulk_modification;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /bulk-modifications      bulk modification lifecycle
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/bulk-modifications", bulk_modification::router())
}
