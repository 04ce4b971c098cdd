use crate::services::upload_gate::UploadError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::{fmt, io};
use thiserror::Error;

/// Errors raised by the project and attachment services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("project `{0}` not found")]
    ProjectNotFound(String),
    #[error("file `{0}` not found in project")]
    AttachmentNotFound(String),
    #[error("file `{0}` not found")]
    FileNotFound(String),
    #[error("file `{0}` is not referenced by any project")]
    FileRecordNotFound(String),
    #[error("no files were uploaded")]
    NoFiles,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// An HTTP-facing error: status, human-readable message and optional detail
/// (an error code for rejected uploads, the underlying cause for 500s).
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    pub detail: Option<String>,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
            detail: None,
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Map a service error to a response. Server-side failures are reported
    /// as `context` with the cause in `detail`.
    pub fn from_service(err: ServiceError, context: &str) -> Self {
        match err {
            ServiceError::ProjectNotFound(_)
            | ServiceError::AttachmentNotFound(_)
            | ServiceError::FileNotFound(_)
            | ServiceError::FileRecordNotFound(_) => Self::not_found(err.to_string()),
            ServiceError::NoFiles | ServiceError::Validation(_) => {
                Self::bad_request(err.to_string())
            }
            ServiceError::Upload(upload) if upload.is_client_error() => {
                Self::bad_request(upload.to_string()).with_detail(upload.code())
            }
            other => {
                tracing::error!("{}: {}", context, other);
                Self::internal(context).with_detail(other.to_string())
            }
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "message": self.message,
            "status": self.status.as_u16()
        });
        if let Some(detail) = self.detail {
            body["error"] = json!(detail);
        }

        (self.status, Json(body)).into_response()
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        AppError::from_service(err, "internal server error")
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        AppError::from_service(ServiceError::Upload(err), "failed to store uploaded files")
    }
}
