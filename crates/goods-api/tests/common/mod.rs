//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use goods_catalog::application::service::GoodsService;
use goods_store::pg_good_repository::PgGoodRepository;
use goods_test_support::InMemoryGoodsListCache;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use goods_api::state::AppState;

/// Build the full app router with a real `PgGoodRepository` and an in-memory
/// list cache. Uses the same route structure as `main.rs`.
pub fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with_cache(pool, Arc::new(InMemoryGoodsListCache::new()))
}

/// Build the full app router around a cache the test keeps a handle to.
pub fn build_test_app_with_cache(pool: PgPool, cache: Arc<InMemoryGoodsListCache>) -> Router {
    let repository = Arc::new(PgGoodRepository::new(pool));
    goods_api::build_router(AppState::new(GoodsService::new(repository, cache)))
}

/// Send a request with an optional JSON body and return the response.
pub async fn send_json(
    app: Router,
    method: Method,
    uri: &str,
    body: Option<&serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send_json(app, Method::POST, uri, Some(body)).await
}

/// Send a PATCH request with a JSON body and return the response.
pub async fn patch_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send_json(app, Method::PATCH, uri, Some(body)).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send_json(app, Method::GET, uri, None).await
}

/// Send a DELETE request and return the response.
pub async fn delete_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send_json(app, Method::DELETE, uri, None).await
}

/// Count outbox rows written for a good.
pub async fn outbox_count(pool: &PgPool, good_id: i64) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM outbox WHERE good_id = $1")
        .bind(good_id)
        .fetch_one(pool)
        .await
        .unwrap()
}
