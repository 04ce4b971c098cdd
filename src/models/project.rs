//! Represents a project: the aggregate that owns tasks and attachments.

use crate::models::attachment::Attachment;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Progress state of a project.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

/// A unit of work inside a project. Tasks have no lifecycle of their own and
/// are persisted inside the project document.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Sub-identifier; generated when the client omits it.
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    #[serde(alias = "taskName")]
    pub name: String,

    #[serde(default)]
    pub completed: bool,
}

/// A project with its tasks and attachments, as returned to clients.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: ProjectStatus,
    pub tasks: Vec<Task>,
    pub files: Vec<Attachment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw `projects` row. Tasks are kept as a JSON document column.
#[derive(FromRow, Debug)]
pub struct ProjectRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: ProjectStatus,
    pub tasks: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProjectRow {
    /// Decode the task document and attach the project's files.
    pub fn into_project(self, files: Vec<Attachment>) -> Result<Project, serde_json::Error> {
        let tasks: Vec<Task> = serde_json::from_str(&self.tasks)?;
        Ok(Project {
            id: self.id,
            title: self.title,
            description: self.description,
            start_date: self.start_date,
            end_date: self.end_date,
            status: self.status,
            tasks,
            files,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Body of `POST /api/projects`.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

/// Body of `PUT /api/projects/{id}`. Absent fields are left untouched;
/// `tasks`, when present, replaces the whole list.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    /// `Some(None)` when the client sent `null`, clearing the date.
    #[serde(default, deserialize_with = "present")]
    pub start_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "present")]
    pub end_date: Option<Option<NaiveDate>>,
    pub status: Option<ProjectStatus>,
    pub tasks: Option<Vec<Task>>,
}

/// Distinguish an explicit `null` from an absent key: only called when the
/// key is present, so the result is always `Some`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
