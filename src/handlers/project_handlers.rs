//! HTTP handlers for the project CRUD API.

use crate::{
    errors::AppError,
    models::project::{NewProject, Project, ProjectPatch},
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde_json::{Value, json};

/// `GET /` — service banner.
pub async fn root() -> Json<Value> {
    Json(json!({ "message": "Project management API is running" }))
}

/// `GET /api/projects`
pub async fn list_projects(State(state): State<AppState>) -> Result<Json<Vec<Project>>, AppError> {
    let projects = state
        .projects
        .list()
        .await
        .map_err(|err| AppError::from_service(err, "failed to list projects"))?;
    Ok(Json(projects))
}

/// `POST /api/projects`
pub async fn create_project(
    State(state): State<AppState>,
    body: Result<Json<NewProject>, JsonRejection>,
) -> Result<(StatusCode, Json<Project>), AppError> {
    let Json(input) = body.map_err(invalid_body)?;
    let project = state
        .projects
        .create(input)
        .await
        .map_err(|err| AppError::from_service(err, "failed to create project"))?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// `GET /api/projects/{id}`
pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Project>, AppError> {
    let project = state
        .projects
        .get(&id)
        .await
        .map_err(|err| AppError::from_service(err, "failed to fetch project"))?;
    Ok(Json(project))
}

/// `PUT /api/projects/{id}` — partial update.
pub async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<ProjectPatch>, JsonRejection>,
) -> Result<Json<Project>, AppError> {
    let Json(patch) = body.map_err(invalid_body)?;
    let project = state
        .projects
        .update(&id, patch)
        .await
        .map_err(|err| AppError::from_service(err, "failed to update project"))?;
    Ok(Json(project))
}

/// `DELETE /api/projects/{id}` — removes the project and its files.
pub async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state
        .projects
        .delete(&id)
        .await
        .map_err(|err| AppError::from_service(err, "failed to delete project"))?;
    Ok(StatusCode::NO_CONTENT)
}

fn invalid_body(rejection: JsonRejection) -> AppError {
    AppError::bad_request("invalid request body").with_detail(rejection.body_text())
}

#[cfg(test)]
mod tests {
    use crate::test_helpers::{TestContext, read_json};
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use serde_json::json;
    use tower::ServiceExt;

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn banner_is_served_at_root() {
        let ctx = TestContext::new().await;
        let resp = ctx.router().oneshot(empty_request("GET", "/")).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = read_json(resp).await;
        assert!(body["message"].as_str().unwrap().contains("running"));
    }

    #[tokio::test]
    async fn project_crud_over_http() {
        let ctx = TestContext::new().await;
        let app = ctx.router();

        let resp = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/projects",
                json!({
                    "title": "Launch",
                    "startDate": "2024-03-01",
                    "tasks": [{ "taskName": "draft", "completed": true }, { "name": "ship" }]
                }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created = read_json(resp).await;
        assert_eq!(created["title"], "Launch");
        assert_eq!(created["status"], "not_started");
        assert_eq!(created["startDate"], "2024-03-01");
        assert_eq!(created["tasks"][0]["name"], "draft");
        assert_eq!(created["tasks"][1]["completed"], false);
        assert_eq!(created["files"], json!([]));
        let id = created["id"].as_str().unwrap().to_string();

        let resp = app
            .clone()
            .oneshot(json_request(
                "PUT",
                &format!("/api/projects/{id}"),
                json!({ "status": "completed", "description": "done" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let updated = read_json(resp).await;
        assert_eq!(updated["status"], "completed");
        assert_eq!(updated["title"], "Launch");
        assert_eq!(updated["tasks"].as_array().unwrap().len(), 2);

        let resp = app
            .clone()
            .oneshot(empty_request("GET", "/api/projects"))
            .await
            .unwrap();
        let listed = read_json(resp).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["description"], "done");

        let uri = format!("/api/projects/{id}");
        let resp = app
            .clone()
            .oneshot(empty_request("DELETE", &uri))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = app.oneshot(empty_request("GET", &uri)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = read_json(resp).await;
        assert_eq!(body["status"], 404);
    }

    #[tokio::test]
    async fn null_date_clears_it() {
        let ctx = TestContext::new().await;
        let app = ctx.router();

        let resp = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/projects",
                json!({ "title": "Dated", "startDate": "2023-12-01", "endDate": "2024-01-01" }),
            ))
            .await
            .unwrap();
        let id = read_json(resp).await["id"].as_str().unwrap().to_string();
        let uri = format!("/api/projects/{id}");

        let resp = app
            .clone()
            .oneshot(json_request("PUT", &uri, json!({ "endDate": null })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let updated = read_json(resp).await;
        assert!(updated["endDate"].is_null());
        assert_eq!(updated["startDate"], "2023-12-01");

        let resp = app.oneshot(empty_request("GET", &uri)).await.unwrap();
        let fetched = read_json(resp).await;
        assert!(fetched["endDate"].is_null());
        assert_eq!(fetched["startDate"], "2023-12-01");
    }

    #[tokio::test]
    async fn invalid_bodies_are_bad_requests() {
        let ctx = TestContext::new().await;
        let app = ctx.router();

        let resp = app
            .clone()
            .oneshot(json_request("POST", "/api/projects", json!({ "title": "" })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/projects",
                json!({ "title": "x", "status": "paused" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = read_json(resp).await;
        assert_eq!(body["message"], "invalid request body");
        assert!(body["error"].is_string());

        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/projects")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_project_ids_are_not_found() {
        let ctx = TestContext::new().await;
        let app = ctx.router();

        for (method, uri) in [
            ("GET", "/api/projects/not-a-uuid"),
            ("DELETE", "/api/projects/0b8e3f4e-5c5d-4f3c-9a52-1c3c1b1f0f00"),
        ] {
            let resp = app
                .clone()
                .oneshot(empty_request(method, uri))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{method} {uri}");
        }
    }
}
