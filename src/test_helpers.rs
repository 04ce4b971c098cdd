//! Shared fixtures for unit and HTTP tests: a throwaway SQLite database and
//! upload directory per test.

use crate::{
    db,
    models::project::{NewProject, ProjectStatus},
    routes::build_router,
    services::{
        attachment_service::AttachmentService, project_service::ProjectService,
        upload_gate::{UploadGate, UploadedFile},
    },
    state::AppState,
};
use axum::{Router, response::Response};
use bytes::Bytes;
use serde_json::Value;
use sqlx::{SqlitePool, sqlite::SqliteConnectOptions};
use std::{io, path::Path, sync::Arc};
use tempfile::TempDir;

pub struct TestContext {
    pub db: Arc<SqlitePool>,
    pub state: AppState,
    pub projects: ProjectService,
    pub attachments: AttachmentService,
    pub uploads: UploadGate,
    _tmp: TempDir,
}

impl TestContext {
    pub async fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let options = SqliteConnectOptions::new()
            .filename(tmp.path().join("test.db"))
            .create_if_missing(true);
        let pool = db::connect_with(options).await.unwrap();
        db::run_migrations(&pool).await.unwrap();

        let db = Arc::new(pool);
        let state = AppState::new(db.clone(), tmp.path().join("uploads"));

        Self {
            db,
            projects: state.projects.clone(),
            attachments: state.attachments.clone(),
            uploads: state.uploads.clone(),
            state,
            _tmp: tmp,
        }
    }

    pub fn upload_dir(&self) -> &Path {
        self.uploads.upload_dir()
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Create a project and return its id as a string.
    pub async fn create_project(&self, title: &str) -> String {
        let project = self
            .projects
            .create(NewProject {
                title: title.into(),
                description: String::new(),
                start_date: None,
                end_date: None,
                status: ProjectStatus::default(),
                tasks: Vec::new(),
            })
            .await
            .unwrap();
        project.id.to_string()
    }

    /// Store one file through the upload gate, as a multipart upload would.
    pub async fn write_upload(&self, name: &str, mimetype: &str, data: &[u8]) -> UploadedFile {
        let chunk = Bytes::copy_from_slice(data);
        let stream = futures::stream::iter([Ok::<_, io::Error>(chunk)]);

        let mut batch = self.uploads.begin();
        batch.push("files", name, mimetype, stream).await.unwrap();
        batch.finish().pop().unwrap()
    }
}

/// Number of regular files in `dir`; a missing directory counts as empty.
pub fn file_count(dir: &Path) -> usize {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .filter(|e| e.path().is_file())
            .count(),
        Err(_) => 0,
    }
}

/// Encode `(field, filename, content type, data)` parts as a
/// `multipart/form-data` body. An empty content type leaves the part's
/// `Content-Type` header out.
pub fn multipart_body(boundary: &str, parts: &[(&str, &str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (field, filename, content_type, data) in parts {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n"
            )
            .as_bytes(),
        );
        if !content_type.is_empty() {
            body.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

pub async fn read_json(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
