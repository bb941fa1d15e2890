use std::sync::Arc;

use curio_core::engine::BulkModificationService;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool. `None` when the engine runs on in-memory
    /// adapters.
    pub pool: Option<curio_db::DbPool>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Bulk modification lifecycle service.
    pub bulk_modifications: BulkModificationService,
}
