//! HTTP-level integration tests for the bulk modification API.
//!
//! Requests go through the full router (middleware included) via
//! `tower::ServiceExt::oneshot`; the engine runs on in-memory adapters.

mod common;

use axum::http::StatusCode;
use common::{
    body_json, delete, expect_json, get, patch_json, post, post_json, seeded_catalog,
    build_test_app, RATING, TITLE,
};
use curio_core::standard_value::StandardValue;
use serde_json::json;

const BASE: &str = "/api/v1/bulk-modifications";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn every_titled_resource() -> serde_json::Value {
    json!({
        "filters": [{"propertyPool": 2, "propertyId": 1, "operation": "is_not_null"}]
    })
}

fn append_suffix() -> serde_json::Value {
    json!([{
        "property_pool": 2,
        "property_id": 1,
        "steps": [{"operation": 4, "options": {"value": " (remastered)"}}]
    }])
}

async fn create(app: &axum::Router, name: &str) -> i64 {
    let json = expect_json(
        post_json(app, BASE, json!({"name": name})).await,
        StatusCode::CREATED,
    )
    .await;
    json["data"]["id"].as_i64().unwrap()
}

async fn define(app: &axum::Router, processes: serde_json::Value) -> i64 {
    let id = create(app, "Remaster").await;
    let response = patch_json(
        app,
        &format!("{BASE}/{id}"),
        json!({"filter": every_titled_resource(), "processes": processes}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    id
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_ok_without_database() {
    let app = build_test_app(seeded_catalog().await);
    let json = expect_json(get(&app, "/health").await, StatusCode::OK).await;
    assert_eq!(json["status"], "ok");
    assert!(json.get("db_healthy").is_none());
}

#[tokio::test]
async fn request_id_is_propagated() {
    let app = build_test_app(seeded_catalog().await);
    let response = get(&app, "/health").await;
    assert!(response.headers().contains_key("x-request-id"));
}

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_get_list_and_delete() {
    let app = build_test_app(seeded_catalog().await);
    let id = create(&app, "First").await;

    let json = expect_json(get(&app, &format!("{BASE}/{id}")).await, StatusCode::OK).await;
    assert_eq!(json["data"]["name"], "First");
    assert_eq!(json["data"]["state"], "created");

    let json = expect_json(get(&app, BASE).await, StatusCode::OK).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);

    let response = delete(&app, &format!("{BASE}/{id}")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let json = expect_json(get(&app, &format!("{BASE}/{id}")).await, StatusCode::NOT_FOUND).await;
    assert_eq!(json["code"], "NOT_FOUND");
}

#[tokio::test]
async fn blank_name_is_rejected() {
    let app = build_test_app(seeded_catalog().await);
    let json = expect_json(
        post_json(&app, BASE, json!({"name": "   "})).await,
        StatusCode::BAD_REQUEST,
    )
    .await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn duplicate_copies_definition() {
    let app = build_test_app(seeded_catalog().await);
    let id = define(&app, append_suffix()).await;

    let json = expect_json(
        post(&app, &format!("{BASE}/{id}/duplicate")).await,
        StatusCode::CREATED,
    )
    .await;
    assert_ne!(json["data"]["id"].as_i64().unwrap(), id);
    assert_eq!(json["data"]["name"], "Remaster (copy)");
    assert_eq!(json["data"]["processes"], append_suffix());
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_lifecycle_applies_and_reverts() {
    let catalog = seeded_catalog().await;
    let app = build_test_app(catalog.clone());
    let id = define(&app, append_suffix()).await;

    let json = expect_json(post(&app, &format!("{BASE}/{id}/filter")).await, StatusCode::OK).await;
    assert_eq!(json["data"]["state"], "filtered");
    assert_eq!(json["data"]["filtered_resource_ids"], json!([1, 2, 3]));

    let json = expect_json(
        post(&app, &format!("{BASE}/{id}/calculate")).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(json["data"]["changed_resources"], 3);
    assert_eq!(json["data"]["bulk_modification"]["state"], "calculated");

    let json = expect_json(
        get(&app, &format!("{BASE}/{id}/diffs?limit=2")).await,
        StatusCode::OK,
    )
    .await;
    let diffs = json["data"].as_array().unwrap();
    assert_eq!(diffs.len(), 2);
    assert_eq!(diffs[0]["resource_id"], 1);
    assert_eq!(diffs[0]["diffs"][0]["oldValue"], "Movie");
    assert_eq!(diffs[0]["diffs"][0]["newValue"], "Movie (remastered)");

    let json = expect_json(post(&app, &format!("{BASE}/{id}/apply")).await, StatusCode::OK).await;
    assert_eq!(json["data"]["succeeded"], json!([1, 2, 3]));
    assert_eq!(
        catalog.value(2, TITLE).await,
        Some(StandardValue::String("Show (remastered)".to_string()))
    );

    let json = expect_json(post(&app, &format!("{BASE}/{id}/revert")).await, StatusCode::OK).await;
    assert_eq!(json["data"]["succeeded"], json!([1, 2, 3]));
    assert_eq!(
        catalog.value(2, TITLE).await,
        Some(StandardValue::String("Show".to_string()))
    );

    let json = expect_json(get(&app, &format!("{BASE}/{id}")).await, StatusCode::OK).await;
    assert_eq!(json["data"]["state"], "reverted");
}

#[tokio::test]
async fn revert_before_apply_is_a_conflict() {
    let app = build_test_app(seeded_catalog().await);
    let id = define(&app, append_suffix()).await;
    post(&app, &format!("{BASE}/{id}/filter")).await;
    post(&app, &format!("{BASE}/{id}/calculate")).await;

    let json = expect_json(
        post(&app, &format!("{BASE}/{id}/revert")).await,
        StatusCode::CONFLICT,
    )
    .await;
    assert_eq!(json["code"], "LIFECYCLE_VIOLATION");
}

#[tokio::test]
async fn strict_calculation_reports_missing_properties() {
    let catalog = seeded_catalog().await;
    let app = build_test_app(catalog.clone());
    let processes = json!([{
        "property_pool": 4,
        "property_id": 7,
        "steps": [{"operation": 2, "options": {"value": 5}}]
    }]);
    let id = define(&app, processes).await;
    post(&app, &format!("{BASE}/{id}/filter")).await;
    catalog.remove_property(RATING).await;

    let json = expect_json(
        post(&app, &format!("{BASE}/{id}/calculate?throw_if_missing=true")).await,
        StatusCode::CONFLICT,
    )
    .await;
    assert_eq!(json["code"], "PROPERTIES_MISSING");

    let json = expect_json(get(&app, &format!("{BASE}/{id}/diffs")).await, StatusCode::OK).await;
    assert!(json["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn apply_failing_everywhere_is_bad_gateway() {
    let catalog = seeded_catalog().await;
    let app = build_test_app(catalog.clone());
    let id = define(&app, append_suffix()).await;
    post(&app, &format!("{BASE}/{id}/filter")).await;
    post(&app, &format!("{BASE}/{id}/calculate")).await;
    for resource in [1, 2, 3] {
        catalog.fail_writes_for(resource).await;
    }

    let json = expect_json(
        post(&app, &format!("{BASE}/{id}/apply")).await,
        StatusCode::BAD_GATEWAY,
    )
    .await;
    assert_eq!(json["code"], "EXTERNAL_SERVICE_ERROR");

    let json = expect_json(get(&app, &format!("{BASE}/{id}")).await, StatusCode::OK).await;
    assert_eq!(json["data"]["state"], "calculated");
}

#[tokio::test]
async fn zero_limit_is_a_bad_request() {
    let app = build_test_app(seeded_catalog().await);
    let id = create(&app, "Empty").await;
    let response = get(&app, &format!("{BASE}/{id}/diffs?limit=0")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
}
