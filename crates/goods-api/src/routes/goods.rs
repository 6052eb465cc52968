//! Routes for the goods catalog.
//!
//! Identity and paging travel as query parameters (`id`, `projectId`,
//! `limit`, `offset`); mutable fields travel as a JSON body.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use goods_core::command::{CreateGood, DeleteGood, ListGoods, ReprioritizeGood, UpdateGood};
use goods_core::error::DomainError;
use goods_core::good::{Good, GoodPriority, GoodsList};

use crate::error::ApiError;
use crate::state::AppState;

/// Query parameters for POST /good/create.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectParams {
    /// Owning project.
    pub project_id: i64,
}

/// Query parameters addressing one good.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoodParams {
    /// The good identifier.
    pub id: i64,
    /// Owning project.
    pub project_id: i64,
}

/// Query parameters for GET /good/list.
#[derive(Debug, Deserialize)]
pub struct PageParams {
    /// Page size.
    pub limit: i64,
    /// Rows to skip.
    pub offset: i64,
}

/// Request body for POST /good/create.
#[derive(Debug, Deserialize)]
pub struct CreateGoodRequest {
    /// Display name.
    #[serde(default)]
    pub name: String,
}

/// Request body for PATCH /good/update.
#[derive(Debug, Deserialize)]
pub struct UpdateGoodRequest {
    /// New name.
    #[serde(default)]
    pub name: String,
    /// New description.
    #[serde(default)]
    pub description: String,
}

/// Request body for PATCH /good/reprioritize.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReprioritizeRequest {
    /// Requested priority.
    pub new_priority: i32,
}

/// Response body for DELETE /good/remove.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveGoodResponse {
    /// The removed good.
    pub id: i64,
    /// Its project.
    pub project_id: i64,
    /// Always `true`.
    pub removed: bool,
}

/// Response body for PATCH /good/reprioritize.
#[derive(Debug, Serialize)]
pub struct ReprioritizeResponse {
    /// Priorities after the update.
    pub priorities: Vec<GoodPriority>,
}

fn query<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    params
        .map(|Query(params)| params)
        .map_err(|rejection| ApiError(DomainError::BadRequest(rejection.body_text())))
}

fn body<T>(request: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    request
        .map(|Json(request)| request)
        .map_err(|rejection| ApiError(DomainError::BadRequest(rejection.body_text())))
}

/// POST /good/create?projectId=
#[instrument(skip_all)]
async fn create_good(
    State(state): State<AppState>,
    params: Result<Query<ProjectParams>, QueryRejection>,
    request: Result<Json<CreateGoodRequest>, JsonRejection>,
) -> Result<Json<Good>, ApiError> {
    let ProjectParams { project_id } = query(params)?;
    let request = body(request)?;
    let command = CreateGood {
        project_id,
        name: request.name,
    };

    let good = state.goods.create(&command).await?;
    info!(good_id = good.id, project_id, "good created");

    Ok(Json(good))
}

/// PATCH /good/update?id=&projectId=
#[instrument(skip_all)]
async fn update_good(
    State(state): State<AppState>,
    params: Result<Query<GoodParams>, QueryRejection>,
    request: Result<Json<UpdateGoodRequest>, JsonRejection>,
) -> Result<Json<Good>, ApiError> {
    let GoodParams { id, project_id } = query(params)?;
    let request = body(request)?;
    let command = UpdateGood {
        id,
        project_id,
        name: request.name,
        description: request.description,
    };

    let good = state.goods.update(&command).await?;
    info!(good_id = id, project_id, "good updated");

    Ok(Json(good))
}

/// DELETE /good/remove?id=&projectId=
#[instrument(skip_all)]
async fn remove_good(
    State(state): State<AppState>,
    params: Result<Query<GoodParams>, QueryRejection>,
) -> Result<Json<RemoveGoodResponse>, ApiError> {
    let GoodParams { id, project_id } = query(params)?;

    state.goods.delete(&DeleteGood { id, project_id }).await?;
    info!(good_id = id, project_id, "good removed");

    Ok(Json(RemoveGoodResponse {
        id,
        project_id,
        removed: true,
    }))
}

/// GET /good/list?limit=&offset=
#[instrument(skip_all)]
async fn list_goods(
    State(state): State<AppState>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<GoodsList>, ApiError> {
    let PageParams { limit, offset } = query(params)?;
    let page = ListGoods { limit, offset };

    if let Some(cached) = state.goods.cached_list(&page).await {
        return Ok(Json(cached));
    }

    Ok(Json(state.goods.list(&page).await?))
}

/// PATCH /good/reprioritize?id=&projectId=
#[instrument(skip_all)]
async fn reprioritize_good(
    State(state): State<AppState>,
    params: Result<Query<GoodParams>, QueryRejection>,
    request: Result<Json<ReprioritizeRequest>, JsonRejection>,
) -> Result<Json<ReprioritizeResponse>, ApiError> {
    let GoodParams { id, project_id } = query(params)?;
    let request = body(request)?;
    let command = ReprioritizeGood {
        id,
        project_id,
        new_priority: request.new_priority,
    };

    let priorities = state.goods.reprioritize(&command).await?;
    info!(good_id = id, project_id, priority = request.new_priority, "good reprioritized");

    Ok(Json(ReprioritizeResponse { priorities }))
}

/// Returns the router for the goods catalog.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/good/create", post(create_good))
        .route("/good/update", patch(update_good))
        .route("/good/remove", delete(remove_good))
        .route("/good/list", get(list_goods))
        .route("/good/reprioritize", patch(reprioritize_good))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use goods_catalog::application::service::GoodsService;
    use goods_core::repository::GoodRepository;
    use goods_test_support::{FailingGoodRepository, InMemoryGoodRepository, InMemoryGoodsListCache};
    use serde_json::Value;
    use tower::ServiceExt;

    fn app_with(
        repository: Arc<dyn GoodRepository>,
        cache: Arc<InMemoryGoodsListCache>,
    ) -> Router {
        router().with_state(AppState::new(GoodsService::new(repository, cache)))
    }

    fn test_app() -> (Router, Arc<InMemoryGoodsListCache>) {
        let cache = Arc::new(InMemoryGoodsListCache::new());
        (
            app_with(Arc::new(InMemoryGoodRepository::new()), cache.clone()),
            cache,
        )
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&json).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body_bytes).unwrap())
    }

    async fn create(app: &Router, project_id: i64, name: &str) -> Value {
        let (status, json) = send(
            app,
            Method::POST,
            &format!("/good/create?projectId={project_id}"),
            Some(serde_json::json!({ "name": name })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        json
    }

    #[tokio::test]
    async fn test_create_returns_good_with_defaults() {
        // Arrange
        let (app, _) = test_app();

        // Act
        let json = create(&app, 1, "widget").await;

        // Assert
        assert_eq!(json["projectId"], 1);
        assert_eq!(json["name"], "widget");
        assert_eq!(json["description"], "");
        assert_eq!(json["priority"], 0);
        assert_eq!(json["removed"], false);
    }

    #[tokio::test]
    async fn test_create_with_empty_name_returns_400() {
        // Arrange
        let (app, _) = test_app();

        // Act
        let (status, json) = send(
            &app,
            Method::POST,
            "/good/create?projectId=1",
            Some(serde_json::json!({ "name": "" })),
        )
        .await;

        // Assert
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "bad_request");
    }

    #[tokio::test]
    async fn test_missing_query_param_returns_400() {
        // Arrange
        let (app, _) = test_app();

        // Act
        let (status, json) = send(
            &app,
            Method::PATCH,
            "/good/update?id=1",
            Some(serde_json::json!({ "name": "a", "description": "b" })),
        )
        .await;

        // Assert
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "bad_request");
    }

    #[tokio::test]
    async fn test_update_in_other_project_returns_404() {
        // Arrange
        let (app, _) = test_app();
        let good = create(&app, 1, "widget").await;

        // Act
        let (status, json) = send(
            &app,
            Method::PATCH,
            &format!("/good/update?id={}&projectId=2", good["id"]),
            Some(serde_json::json!({ "name": "gadget", "description": "red" })),
        )
        .await;

        // Assert
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "not_found");
    }

    #[tokio::test]
    async fn test_remove_returns_removed_flag_and_good_stays_listed() {
        // Arrange
        let (app, _) = test_app();
        let good = create(&app, 7, "widget").await;
        let id = good["id"].as_i64().unwrap();

        // Act
        let (status, json) = send(
            &app,
            Method::DELETE,
            &format!("/good/remove?id={id}&projectId=7"),
            None,
        )
        .await;
        let (_, list) = send(&app, Method::GET, "/good/list?limit=10&offset=0", None).await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, serde_json::json!({ "id": id, "projectId": 7, "removed": true }));
        assert_eq!(list["meta"]["removed"], 1);
        assert_eq!(list["goods"][0]["removed"], true);
    }

    #[tokio::test]
    async fn test_reprioritize_returns_priorities() {
        // Arrange
        let (app, _) = test_app();
        let good = create(&app, 1, "widget").await;
        let id = good["id"].as_i64().unwrap();

        // Act
        let (status, json) = send(
            &app,
            Method::PATCH,
            &format!("/good/reprioritize?id={id}&projectId=1"),
            Some(serde_json::json!({ "newPriority": 5 })),
        )
        .await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json,
            serde_json::json!({ "priorities": [{ "id": id, "priority": 5 }] })
        );
    }

    #[tokio::test]
    async fn test_reprioritize_below_one_returns_400() {
        // Arrange
        let (app, _) = test_app();
        let good = create(&app, 1, "widget").await;

        // Act
        let (status, _) = send(
            &app,
            Method::PATCH,
            &format!("/good/reprioritize?id={}&projectId=1", good["id"]),
            Some(serde_json::json!({ "newPriority": 0 })),
        )
        .await;

        // Assert
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_second_list_is_served_from_cache() {
        // Arrange
        let (app, cache) = test_app();
        create(&app, 1, "widget").await;

        // Act
        let (_, first) = send(&app, Method::GET, "/good/list?limit=10&offset=0", None).await;
        let (_, second) = send(&app, Method::GET, "/good/list?limit=10&offset=0", None).await;

        // Assert
        assert_eq!(first, second);
        assert_eq!(first["meta"]["total"], 1);
        assert_eq!(cache.set_count(), 1);
    }

    #[tokio::test]
    async fn test_list_with_other_window_bypasses_cache() {
        // Arrange
        let (app, cache) = test_app();
        create(&app, 1, "a").await;
        create(&app, 1, "b").await;
        send(&app, Method::GET, "/good/list?limit=10&offset=0", None).await;

        // Act
        let (status, json) = send(&app, Method::GET, "/good/list?limit=10&offset=1", None).await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["meta"]["offset"], 1);
        assert_eq!(json["goods"].as_array().unwrap().len(), 1);
        assert_eq!(cache.set_count(), 2);
    }

    #[tokio::test]
    async fn test_mutation_with_failing_cache_delete_returns_500() {
        // Arrange
        let (app, cache) = test_app();
        cache.fail_deletes(true);

        // Act
        let (status, json) = send(
            &app,
            Method::POST,
            "/good/create?projectId=1",
            Some(serde_json::json!({ "name": "widget" })),
        )
        .await;

        // Assert
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "cache_invalidation_error");
    }

    #[tokio::test]
    async fn test_list_returns_500_when_repository_fails() {
        // Arrange
        let app = app_with(
            Arc::new(FailingGoodRepository),
            Arc::new(InMemoryGoodsListCache::new()),
        );

        // Act
        let (status, json) = send(&app, Method::GET, "/good/list?limit=10&offset=0", None).await;

        // Assert
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "infrastructure_error");
    }
}
