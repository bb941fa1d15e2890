#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use curio_api::config::ServerConfig;
use curio_api::router::build_app_router;
use curio_api::state::AppState;
use curio_core::engine::{BulkModificationService, EngineConfig};
use curio_core::memory::{MemoryCatalog, MemoryStore};
use curio_core::property::{Property, PropertyKey, PropertyPool, PropertyType};
use curio_core::standard_value::StandardValue;

pub const TITLE: PropertyKey = PropertyKey {
    pool: PropertyPool::Reserved,
    id: 1,
};
pub const RATING: PropertyKey = PropertyKey {
    pool: PropertyPool::Custom,
    id: 7,
};

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        catalog_api_url: "http://localhost:0".to_string(),
        engine: EngineConfig {
            calculate_workers: 2,
            strict_preview: false,
        },
    }
}

/// A catalog with a title and a rating property and three resources.
pub async fn seeded_catalog() -> Arc<MemoryCatalog> {
    let catalog = Arc::new(MemoryCatalog::with_properties(vec![
        Property {
            pool: TITLE.pool,
            id: TITLE.id,
            name: "Title".to_string(),
            property_type: PropertyType::SingleLineText,
        },
        Property {
            pool: RATING.pool,
            id: RATING.id,
            name: "Rating".to_string(),
            property_type: PropertyType::Rating,
        },
    ]));
    for (id, title) in [(1, "Movie"), (2, "Show"), (3, "Clip")] {
        catalog
            .add_resource(
                id,
                &format!("/media/{}", title.to_lowercase()),
                [(TITLE, StandardValue::String(title.to_string()))],
            )
            .await;
    }
    catalog
}

/// Build the full application router over in-memory adapters, using the
/// same middleware stack as production.
pub fn build_test_app(catalog: Arc<MemoryCatalog>) -> Router {
    let config = test_config();
    let bulk_modifications = BulkModificationService::new(
        Arc::new(MemoryStore::new()),
        catalog.clone(),
        catalog.clone(),
        catalog,
        config.engine.clone(),
    );
    let state = AppState {
        pool: None,
        config: Arc::new(config.clone()),
        bulk_modifications,
    };
    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn post(app: &Router, uri: &str) -> Response<Body> {
    send(app, Request::post(uri).body(Body::empty()).unwrap()).await
}

pub async fn delete(app: &Router, uri: &str) -> Response<Body> {
    send(app, Request::delete(uri).body(Body::empty()).unwrap()).await
}

pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(
        app,
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

pub async fn patch_json(app: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(
        app,
        Request::patch(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Assert the status and return the JSON body.
pub async fn expect_json(response: Response<Body>, status: StatusCode) -> serde_json::Value {
    assert_eq!(response.status(), status);
    body_json(response).await
}
