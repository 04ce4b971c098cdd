//! Represents a file attached to a project and the views derived from it.

use crate::services::file_format::format_stored_size;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use uuid::Uuid;

/// URL prefix under which stored files are served.
pub const FILES_URL_PREFIX: &str = "/api/files";

/// Coarse classification of an attachment, derived from its MIME type at
/// upload time and persisted alongside it.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Category {
    Image,
    Document,
    Pdf,
    Spreadsheet,
    Presentation,
    Other,
}

/// A single file record owned by a project.
///
/// The struct stores metadata only; the bytes live on disk at `path`.
/// `path` and `project_id` are server-side details and never serialized.
#[derive(Serialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Identifier, unique within the owning project.
    pub id: Uuid,

    /// Owning project.
    #[serde(skip_serializing)]
    pub project_id: Uuid,

    /// System-generated storage name, unique across the file store.
    pub filename: String,

    /// Name supplied by the uploader. Untrusted.
    pub original_name: String,

    /// MIME type claimed at upload.
    pub mimetype: String,

    /// Size in bytes.
    #[sqlx(rename = "size_bytes")]
    pub size: i64,

    /// Category computed once from `mimetype`.
    pub category: Category,

    /// Location of the payload on disk.
    #[serde(skip_serializing)]
    pub path: String,

    /// When the upload was recorded.
    pub uploaded_at: DateTime<Utc>,
}

impl Attachment {
    /// Client-facing URL of the stored payload.
    pub fn url(&self) -> String {
        format!("{}/{}", FILES_URL_PREFIX, self.filename)
    }
}

/// Attachment as returned by the upload and list endpoints.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentView {
    pub id: Uuid,
    pub filename: String,
    pub original_name: String,
    pub mimetype: String,
    pub size: i64,
    pub formatted_size: String,
    pub category: Category,
    pub uploaded_at: DateTime<Utc>,
    pub url: String,
}

impl From<&Attachment> for AttachmentView {
    fn from(a: &Attachment) -> Self {
        Self {
            id: a.id,
            filename: a.filename.clone(),
            original_name: a.original_name.clone(),
            mimetype: a.mimetype.clone(),
            size: a.size,
            formatted_size: format_stored_size(a.size),
            category: a.category,
            uploaded_at: a.uploaded_at,
            url: a.url(),
        }
    }
}

/// Identifies an attachment that was just removed.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeletedFile {
    pub filename: String,
    pub original_name: String,
}

/// Per-category aggregate.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStats {
    pub count: u64,
    pub total_size: u64,
    pub formatted_size: String,
}

/// Entry in the "recently uploaded" list of [`FileStats`].
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RecentFile {
    pub filename: String,
    pub original_name: String,
    pub category: Category,
    pub uploaded_at: DateTime<Utc>,
    pub formatted_size: String,
}

/// Aggregate statistics over a project's attachments.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FileStats {
    pub total_files: u64,
    pub total_size: u64,
    pub categories: BTreeMap<Category, CategoryStats>,
    pub recent_files: Vec<RecentFile>,
    pub formatted_total_size: String,
}
