//! Shared state handed to every handler.

use crate::services::{
    attachment_service::AttachmentService, file_lifecycle::FileLifecycle,
    project_service::ProjectService, upload_gate::UploadGate,
};
use sqlx::SqlitePool;
use std::{path::PathBuf, sync::Arc};

/// The pool is created once at startup and injected here; every service holds
/// a clone of the same `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<SqlitePool>,
    pub projects: ProjectService,
    pub attachments: AttachmentService,
    pub uploads: UploadGate,
}

impl AppState {
    pub fn new(db: Arc<SqlitePool>, upload_dir: impl Into<PathBuf>) -> Self {
        let upload_dir = upload_dir.into();
        let lifecycle = FileLifecycle::default();
        let projects = ProjectService::new(db.clone(), lifecycle.clone());
        let attachments = AttachmentService::new(
            db.clone(),
            projects.clone(),
            lifecycle.clone(),
            upload_dir.clone(),
        );
        let uploads = UploadGate::new(upload_dir, lifecycle);

        Self {
            db,
            projects,
            attachments,
            uploads,
        }
    }
}
