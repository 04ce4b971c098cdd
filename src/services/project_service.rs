//! src/services/project_service.rs
//!
//! ProjectService — CRUD over the project aggregate. Project fields and the
//! task list live in the `projects` row (tasks as a JSON document column);
//! attachments are rows in `attachments` and are read back in upload order.
//!
//! Updates are read-modify-write without locking, so two concurrent updates
//! of the same project resolve as last-write-wins.

use crate::{
    errors::{ServiceError, ServiceResult},
    models::{
        attachment::Attachment,
        project::{NewProject, Project, ProjectPatch, ProjectRow, Task},
    },
    services::{
        attachment_service::{ATTACHMENT_COLUMNS, attachments_for_project},
        file_lifecycle::FileLifecycle,
        parse_id,
    },
};
use chrono::Utc;
use sqlx::SqlitePool;
use std::{collections::HashMap, path::PathBuf, sync::Arc};
use tracing::info;
use uuid::Uuid;

const PROJECT_COLUMNS: &str =
    "id, title, description, start_date, end_date, status, tasks, created_at, updated_at";

#[derive(Clone)]
pub struct ProjectService {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
    lifecycle: FileLifecycle,
}

impl ProjectService {
    pub fn new(db: Arc<SqlitePool>, lifecycle: FileLifecycle) -> Self {
        Self { db, lifecycle }
    }

    /// All projects in creation order, each with its tasks and files.
    pub async fn list(&self) -> ServiceResult<Vec<Project>> {
        let rows = sqlx::query_as::<_, ProjectRow>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects ORDER BY created_at, rowid"
        ))
        .fetch_all(&*self.db)
        .await?;

        let attachments = sqlx::query_as::<_, Attachment>(&format!(
            "SELECT {ATTACHMENT_COLUMNS} FROM attachments ORDER BY rowid"
        ))
        .fetch_all(&*self.db)
        .await?;

        let mut by_project: HashMap<Uuid, Vec<Attachment>> = HashMap::new();
        for attachment in attachments {
            by_project
                .entry(attachment.project_id)
                .or_default()
                .push(attachment);
        }

        rows.into_iter()
            .map(|row| {
                let files = by_project.remove(&row.id).unwrap_or_default();
                row.into_project(files).map_err(ServiceError::from)
            })
            .collect()
    }

    /// Fetch one project by its identifier.
    pub async fn get(&self, raw_id: &str) -> ServiceResult<Project> {
        let id = parse_id(raw_id, ServiceError::ProjectNotFound)?;
        let row = self
            .fetch_row(id)
            .await?
            .ok_or_else(|| ServiceError::ProjectNotFound(raw_id.to_string()))?;
        let files = attachments_for_project(&self.db, id).await?;
        Ok(row.into_project(files)?)
    }

    /// Title of a project, or `None` when it does not exist.
    pub async fn find_title(&self, id: Uuid) -> ServiceResult<Option<String>> {
        Ok(
            sqlx::query_scalar::<_, String>("SELECT title FROM projects WHERE id = ?")
                .bind(id)
                .fetch_optional(&*self.db)
                .await?,
        )
    }

    pub async fn create(&self, input: NewProject) -> ServiceResult<Project> {
        validate_title(&input.title)?;
        validate_tasks(&input.tasks)?;

        let now = Utc::now();
        let project = Project {
            id: Uuid::new_v4(),
            title: input.title,
            description: input.description,
            start_date: input.start_date,
            end_date: input.end_date,
            status: input.status,
            tasks: input.tasks,
            files: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(&format!(
            "INSERT INTO projects ({PROJECT_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(project.id)
        .bind(&project.title)
        .bind(&project.description)
        .bind(project.start_date)
        .bind(project.end_date)
        .bind(project.status)
        .bind(serde_json::to_string(&project.tasks)?)
        .bind(project.created_at)
        .bind(project.updated_at)
        .execute(&*self.db)
        .await?;

        info!("created project {} ({})", project.id, project.title);
        Ok(project)
    }

    /// Apply a partial update and refresh `updated_at`.
    pub async fn update(&self, raw_id: &str, patch: ProjectPatch) -> ServiceResult<Project> {
        let id = parse_id(raw_id, ServiceError::ProjectNotFound)?;
        let not_found = || ServiceError::ProjectNotFound(raw_id.to_string());
        let mut row = self.fetch_row(id).await?.ok_or_else(not_found)?;

        if let Some(title) = patch.title {
            validate_title(&title)?;
            row.title = title;
        }
        if let Some(description) = patch.description {
            row.description = description;
        }
        if let Some(start_date) = patch.start_date {
            row.start_date = start_date;
        }
        if let Some(end_date) = patch.end_date {
            row.end_date = end_date;
        }
        if let Some(status) = patch.status {
            row.status = status;
        }
        if let Some(tasks) = patch.tasks {
            validate_tasks(&tasks)?;
            row.tasks = serde_json::to_string(&tasks)?;
        }
        row.updated_at = Utc::now();

        let result = sqlx::query(
            "UPDATE projects
             SET title = ?, description = ?, start_date = ?, end_date = ?, status = ?,
                 tasks = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&row.title)
        .bind(&row.description)
        .bind(row.start_date)
        .bind(row.end_date)
        .bind(row.status)
        .bind(&row.tasks)
        .bind(row.updated_at)
        .bind(id)
        .execute(&*self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(not_found());
        }

        let files = attachments_for_project(&self.db, id).await?;
        Ok(row.into_project(files)?)
    }

    /// Delete a project together with its attachment records, then remove the
    /// attachments' physical files best-effort.
    pub async fn delete(&self, raw_id: &str) -> ServiceResult<()> {
        let id = parse_id(raw_id, ServiceError::ProjectNotFound)?;

        let mut tx = self.db.begin().await?;
        let paths: Vec<String> =
            sqlx::query_scalar("DELETE FROM attachments WHERE project_id = ? RETURNING path")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;
        let result = sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::ProjectNotFound(raw_id.to_string()));
        }
        tx.commit().await?;

        info!("deleted project {} with {} file(s)", id, paths.len());
        self.lifecycle
            .delete_all_best_effort(paths.into_iter().map(PathBuf::from))
            .await;
        Ok(())
    }

    async fn fetch_row(&self, id: Uuid) -> ServiceResult<Option<ProjectRow>> {
        Ok(sqlx::query_as::<_, ProjectRow>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&*self.db)
        .await?)
    }
}

fn validate_title(title: &str) -> ServiceResult<()> {
    if title.trim().is_empty() {
        return Err(ServiceError::Validation("project title is required".into()));
    }
    Ok(())
}

fn validate_tasks(tasks: &[Task]) -> ServiceResult<()> {
    if tasks.iter().any(|t| t.name.trim().is_empty()) {
        return Err(ServiceError::Validation("task name is required".into()));
    }
    Ok(())
}
