//! Defines routes for the project and attachment API.
//!
//! ## Structure
//! - **Service endpoints**
//!   - `GET    /` — banner
//!   - `GET    /healthz`, `GET /readyz` — liveness and readiness
//!   - `GET    /api-docs/openapi.json` — API description
//!
//! - **Project endpoints**
//!   - `GET    /api/projects` — list projects
//!   - `POST   /api/projects` — create project
//!   - `GET    /api/projects/{id}` — fetch project
//!   - `PUT    /api/projects/{id}` — partial update
//!   - `DELETE /api/projects/{id}` — delete project and its files
//!
//! - **Attachment endpoints**
//!   - `POST   /api/projects/{id}/files` — multipart upload (field `files`)
//!   - `GET    /api/projects/{id}/files` — list attachments
//!   - `GET    /api/projects/{id}/files/stats` — aggregate statistics
//!   - `DELETE /api/projects/{id}/files/{file_id}` — remove one attachment
//!   - `GET    /api/files/{filename}` — stream a stored file

use crate::{
    handlers::{
        docs_handlers::openapi,
        file_handlers::{delete_file, file_stats, list_files, serve_file, upload_files},
        health_handlers::{healthz, readyz},
        project_handlers::{
            create_project, delete_project, get_project, list_projects, root, update_project,
        },
    },
    middleware::log_request,
    services::upload_gate::UploadLimits,
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get},
};
use tower_http::cors::CorsLayer;

/// Room for multipart framing and part headers on top of the file payloads.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Upload request body limit. The gate enforces the per-file limit itself;
/// this only has to let a full batch through.
fn upload_body_limit(limits: UploadLimits) -> usize {
    let payload = limits.max_file_size.saturating_mul(limits.max_files as u64);
    usize::try_from(payload)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD)
}

/// All routes, carrying `AppState` to every handler.
pub fn routes(upload_limits: UploadLimits) -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/api-docs/openapi.json", get(openapi))
        // Project routes
        .route("/api/projects", get(list_projects).post(create_project))
        .route(
            "/api/projects/{id}",
            get(get_project).put(update_project).delete(delete_project),
        )
        // Attachment routes
        .route(
            "/api/projects/{id}/files",
            get(list_files)
                .post(upload_files)
                .layer(DefaultBodyLimit::max(upload_body_limit(upload_limits))),
        )
        .route("/api/projects/{id}/files/stats", get(file_stats))
        .route("/api/projects/{id}/files/{file_id}", delete(delete_file))
        .route("/api/files/{filename}", get(serve_file))
}

/// The complete application: routes, state, CORS and request logging.
pub fn build_router(state: AppState) -> Router {
    routes(state.uploads.limits())
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(log_request))
}
