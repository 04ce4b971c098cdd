//! src/services/attachment_service.rs
//!
//! AttachmentService — the files attached to each project. Records live in
//! SQLite, payloads in the upload directory, and every operation keeps the two
//! in step:
//! - Append records for files that already passed the upload gate, removing
//!   those files again if the project is missing or persistence fails
//! - List records in upload order
//! - Remove a record and its payload
//! - Aggregate statistics
//! - Resolve a stored filename for download
//!
//! Appends are plain row inserts, so concurrent uploads to the same project
//! all persist; their relative order in the list is whatever order the
//! transactions commit in.

use crate::{
    errors::{ServiceError, ServiceResult},
    models::attachment::{
        Attachment, AttachmentView, CategoryStats, DeletedFile, FileStats, RecentFile,
    },
    services::{
        file_format::{classify, format_size, format_stored_size},
        file_lifecycle::FileLifecycle,
        parse_id,
        project_service::ProjectService,
        upload_gate::UploadedFile,
    },
};
use chrono::Utc;
use sqlx::SqlitePool;
use std::{
    collections::BTreeMap,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::fs::{self, File};
use tracing::info;
use uuid::Uuid;

pub(crate) const ATTACHMENT_COLUMNS: &str =
    "id, project_id, filename, original_name, mimetype, size_bytes, category, path, uploaded_at";

/// Number of entries in [`FileStats::recent_files`].
const RECENT_FILES: usize = 5;

/// Attachments of a project, ready for the list endpoint.
#[derive(Debug)]
pub struct ProjectFiles {
    pub project_title: String,
    pub files: Vec<AttachmentView>,
}

/// Statistics of a project, ready for the stats endpoint.
#[derive(Debug)]
pub struct ProjectFileStats {
    pub project_title: String,
    pub stats: FileStats,
}

#[derive(Clone)]
pub struct AttachmentService {
    db: Arc<SqlitePool>,
    projects: ProjectService,
    lifecycle: FileLifecycle,
    upload_dir: PathBuf,
}

impl AttachmentService {
    pub fn new(
        db: Arc<SqlitePool>,
        projects: ProjectService,
        lifecycle: FileLifecycle,
        upload_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            db,
            projects,
            lifecycle,
            upload_dir: upload_dir.into(),
        }
    }

    /// Record `files` as attachments of the project.
    ///
    /// The files are already on disk. On any failure they are deleted before
    /// the error is returned, so a rejected request leaves nothing behind.
    pub async fn append_attachments(
        &self,
        project_id: &str,
        files: Vec<UploadedFile>,
    ) -> ServiceResult<Vec<AttachmentView>> {
        let result = self.insert_attachments(project_id, &files).await;
        if result.is_err() {
            self.lifecycle
                .delete_all_best_effort(files.into_iter().map(|f| f.path))
                .await;
        }
        result
    }

    async fn insert_attachments(
        &self,
        raw_id: &str,
        files: &[UploadedFile],
    ) -> ServiceResult<Vec<AttachmentView>> {
        let project_id = parse_id(raw_id, ServiceError::ProjectNotFound)?;
        let not_found = || ServiceError::ProjectNotFound(raw_id.to_string());
        self.projects
            .find_title(project_id)
            .await?
            .ok_or_else(not_found)?;
        if files.is_empty() {
            return Err(ServiceError::NoFiles);
        }

        let now = Utc::now();
        let records = files
            .iter()
            .map(|file| {
                let size = i64::try_from(file.size).map_err(|_| {
                    ServiceError::Validation(format!("file `{}` is too large", file.original_name))
                })?;
                Ok(Attachment {
                    id: Uuid::new_v4(),
                    project_id,
                    filename: file.filename.clone(),
                    original_name: file.original_name.clone(),
                    mimetype: file.mimetype.clone(),
                    size,
                    category: classify(&file.mimetype),
                    path: file.path.to_string_lossy().into_owned(),
                    uploaded_at: now,
                })
            })
            .collect::<ServiceResult<Vec<_>>>()?;

        // The UPDATE comes first so the transaction takes the write lock
        // before reading anything, and doubles as the existence check.
        let mut tx = self.db.begin().await?;
        let touched = sqlx::query("UPDATE projects SET updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(project_id)
            .execute(&mut *tx)
            .await?;
        if touched.rows_affected() == 0 {
            return Err(not_found());
        }

        for record in &records {
            sqlx::query(&format!(
                "INSERT INTO attachments ({ATTACHMENT_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
            ))
            .bind(record.id)
            .bind(record.project_id)
            .bind(&record.filename)
            .bind(&record.original_name)
            .bind(&record.mimetype)
            .bind(record.size)
            .bind(record.category)
            .bind(&record.path)
            .bind(record.uploaded_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        info!(
            "attached {} file(s) to project {}",
            records.len(),
            project_id
        );
        Ok(records.iter().map(AttachmentView::from).collect())
    }

    /// All attachments of a project, in upload order.
    pub async fn list_attachments(&self, raw_id: &str) -> ServiceResult<ProjectFiles> {
        let (project_id, project_title) = self.require_project(raw_id).await?;
        let files = attachments_for_project(&self.db, project_id)
            .await?
            .iter()
            .map(AttachmentView::from)
            .collect();
        Ok(ProjectFiles {
            project_title,
            files,
        })
    }

    /// Remove one attachment: payload first (best-effort), then the record.
    pub async fn remove_attachment(
        &self,
        raw_project_id: &str,
        raw_attachment_id: &str,
    ) -> ServiceResult<DeletedFile> {
        let (project_id, _) = self.require_project(raw_project_id).await?;
        let attachment_id = parse_id(raw_attachment_id, ServiceError::AttachmentNotFound)?;
        let not_found = || ServiceError::AttachmentNotFound(raw_attachment_id.to_string());

        let attachment = sqlx::query_as::<_, Attachment>(&format!(
            "SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE id = ? AND project_id = ?"
        ))
        .bind(attachment_id)
        .bind(project_id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or_else(not_found)?;

        self.lifecycle
            .delete_best_effort(Path::new(&attachment.path))
            .await;

        let mut tx = self.db.begin().await?;
        let removed = sqlx::query("DELETE FROM attachments WHERE id = ? AND project_id = ?")
            .bind(attachment_id)
            .bind(project_id)
            .execute(&mut *tx)
            .await?;
        if removed.rows_affected() == 0 {
            return Err(not_found());
        }
        sqlx::query("UPDATE projects SET updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(project_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(
            "removed file {} from project {}",
            attachment.filename, project_id
        );
        Ok(DeletedFile {
            filename: attachment.filename,
            original_name: attachment.original_name,
        })
    }

    /// Aggregate statistics over a project's attachments. Read-only.
    pub async fn compute_stats(&self, raw_id: &str) -> ServiceResult<ProjectFileStats> {
        let (project_id, project_title) = self.require_project(raw_id).await?;
        let records = attachments_for_project(&self.db, project_id).await?;
        Ok(ProjectFileStats {
            project_title,
            stats: summarize(&records),
        })
    }

    /// Find the payload and metadata behind a stored filename.
    ///
    /// Both must exist: a file nobody references and a record whose file is
    /// gone are each reported as not found.
    pub async fn resolve_file(&self, filename: &str) -> ServiceResult<(Attachment, File)> {
        let not_found = || ServiceError::FileNotFound(filename.to_string());
        if !is_safe_filename(filename) {
            return Err(not_found());
        }

        let path = self.upload_dir.join(filename);
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(not_found()),
            Err(err) if err.kind() == ErrorKind::NotFound => return Err(not_found()),
            Err(err) => return Err(ServiceError::Io(err)),
        }

        let attachment = sqlx::query_as::<_, Attachment>(&format!(
            "SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE filename = ?"
        ))
        .bind(filename)
        .fetch_optional(&*self.db)
        .await?
        .ok_or_else(|| ServiceError::FileRecordNotFound(filename.to_string()))?;

        let file = File::open(&path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                not_found()
            } else {
                ServiceError::Io(err)
            }
        })?;

        Ok((attachment, file))
    }

    async fn require_project(&self, raw_id: &str) -> ServiceResult<(Uuid, String)> {
        let id = parse_id(raw_id, ServiceError::ProjectNotFound)?;
        let title = self
            .projects
            .find_title(id)
            .await?
            .ok_or_else(|| ServiceError::ProjectNotFound(raw_id.to_string()))?;
        Ok((id, title))
    }
}

/// Attachments of one project in insertion order.
pub(crate) async fn attachments_for_project(
    db: &SqlitePool,
    project_id: Uuid,
) -> Result<Vec<Attachment>, sqlx::Error> {
    sqlx::query_as::<_, Attachment>(&format!(
        "SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE project_id = ? ORDER BY rowid"
    ))
    .bind(project_id)
    .fetch_all(db)
    .await
}

/// Totals, per-category sums and the most recent uploads.
pub fn summarize(records: &[Attachment]) -> FileStats {
    let mut categories: BTreeMap<_, CategoryStats> = BTreeMap::new();
    let mut total_size: u64 = 0;

    for record in records {
        let size = u64::try_from(record.size).unwrap_or(0);
        total_size += size;
        let entry = categories
            .entry(record.category)
            .or_insert_with(|| CategoryStats {
                count: 0,
                total_size: 0,
                formatted_size: String::new(),
            });
        entry.count += 1;
        entry.total_size += size;
    }
    for entry in categories.values_mut() {
        entry.formatted_size = format_size(entry.total_size);
    }

    // sort_by is stable, so equal timestamps keep upload order
    let mut recent: Vec<&Attachment> = records.iter().collect();
    recent.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
    let recent_files = recent
        .into_iter()
        .take(RECENT_FILES)
        .map(|a| RecentFile {
            filename: a.filename.clone(),
            original_name: a.original_name.clone(),
            category: a.category,
            uploaded_at: a.uploaded_at,
            formatted_size: format_stored_size(a.size),
        })
        .collect();

    FileStats {
        total_files: records.len() as u64,
        total_size,
        categories,
        recent_files,
        formatted_total_size: format_size(total_size),
    }
}

/// Stored names are generated by the upload gate; anything that could step
/// outside the upload directory is rejected outright.
fn is_safe_filename(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && !name.contains("..")
        && !name
            .chars()
            .any(|c| c == '/' || c == '\\' || c == '\0' || c.is_control())
}
