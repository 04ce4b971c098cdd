//! src/services/upload_gate.rs
//!
//! UploadGate — admission control for uploaded files. Each multipart file part
//! is checked against the per-request count limit, the expected field name and
//! the MIME allow-list before any byte is written, then streamed to the upload
//! directory under a generated name while the per-file size limit is enforced.
//!
//! A request is all-or-nothing: when any part is rejected, the files already
//! written for that request are removed before the error is returned.

use crate::services::file_lifecycle::FileLifecycle;
use axum::extract::Multipart;
use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt, pin_mut};
use rand::Rng;
use std::{
    fmt,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    fs::{self, File, OpenOptions},
    io::AsyncWriteExt,
    sync::OnceCell,
};
use tracing::{debug, info, warn};

/// Largest accepted file, in bytes.
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
/// Most files accepted in a single request.
pub const MAX_FILES_PER_REQUEST: usize = 5;
/// Multipart field that carries files.
pub const UPLOAD_FIELD: &str = "files";
/// Content type of a file part that does not declare one (RFC 7578 §4.4).
const DEFAULT_PART_CONTENT_TYPE: &str = "text/plain";

const ALLOWED_MIME_TYPES: [&str; 14] = [
    // images
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
    // documents
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "text/plain",
    "text/csv",
];

const MAX_EXTENSION_LEN: usize = 16;
const NAME_ATTEMPTS: usize = 5;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("file `{name}` is too large, the maximum allowed size is 10MB")]
    FileTooLarge { name: String },
    #[error("too many files, at most {max} files are allowed per upload")]
    TooManyFiles { max: usize },
    #[error(
        "file type `{0}` is not allowed; only images (JPEG, PNG, GIF, WebP) and documents \
         (PDF, Word, Excel, PowerPoint, TXT, CSV) are accepted"
    )]
    UnsupportedType(String),
    #[error("unexpected file field `{0}`")]
    UnexpectedField(String),
    #[error("malformed upload: {0}")]
    Malformed(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl UploadError {
    /// Machine-readable code reported next to the message.
    pub fn code(&self) -> &'static str {
        match self {
            UploadError::FileTooLarge { .. } => "LIMIT_FILE_SIZE",
            UploadError::TooManyFiles { .. } => "LIMIT_FILE_COUNT",
            UploadError::UnexpectedField(_) => "LIMIT_UNEXPECTED_FILE",
            UploadError::UnsupportedType(_) | UploadError::Malformed(_) => "FILE_UPLOAD_ERROR",
            UploadError::Io(_) => "FILE_WRITE_ERROR",
        }
    }

    /// True for rejections caused by the request rather than the server.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, UploadError::Io(_))
    }
}

/// Admission limits applied to every request.
#[derive(Clone, Copy, Debug)]
pub struct UploadLimits {
    pub max_file_size: u64,
    pub max_files: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_file_size: MAX_FILE_SIZE,
            max_files: MAX_FILES_PER_REQUEST,
        }
    }
}

/// A file that passed the gate and now exists on disk.
#[derive(Clone, Debug)]
pub struct UploadedFile {
    pub original_name: String,
    pub mimetype: String,
    pub size: u64,
    pub filename: String,
    pub path: PathBuf,
}

#[derive(Clone)]
pub struct UploadGate {
    upload_dir: PathBuf,
    limits: UploadLimits,
    lifecycle: FileLifecycle,
    dir_ready: Arc<OnceCell<()>>,
}

impl UploadGate {
    pub fn new(upload_dir: impl Into<PathBuf>, lifecycle: FileLifecycle) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            limits: UploadLimits::default(),
            lifecycle,
            dir_ready: Arc::new(OnceCell::new()),
        }
    }

    #[cfg(test)]
    pub fn with_limits(mut self, limits: UploadLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn limits(&self) -> UploadLimits {
        self.limits
    }

    /// Create the upload directory (recursively) the first time it is needed.
    pub async fn ensure_upload_dir(&self) -> io::Result<()> {
        self.dir_ready
            .get_or_try_init(|| async {
                fs::create_dir_all(&self.upload_dir).await?;
                info!("upload directory ready at {}", self.upload_dir.display());
                Ok::<(), io::Error>(())
            })
            .await
            .map(|_| ())
    }

    /// Start an all-or-nothing batch.
    pub fn begin(&self) -> UploadBatch<'_> {
        UploadBatch {
            gate: self,
            files: Vec::new(),
        }
    }

    /// Drain a multipart request through the gate. Text parts are ignored.
    pub async fn receive(&self, multipart: &mut Multipart) -> Result<Vec<UploadedFile>, UploadError> {
        let mut batch = self.begin();
        loop {
            let field = match multipart.next_field().await {
                Ok(Some(field)) => field,
                Ok(None) => break,
                Err(err) => return Err(batch.abort(UploadError::Malformed(err.to_string())).await),
            };

            let Some(original_name) = field.file_name().map(str::to_string) else {
                continue;
            };
            let field_name = field.name().unwrap_or_default().to_string();
            let mimetype = field
                .content_type()
                .unwrap_or(DEFAULT_PART_CONTENT_TYPE)
                .to_string();

            batch
                .push(&field_name, &original_name, &mimetype, field)
                .await?;
        }

        if batch.is_empty() {
            debug!("multipart body carried no files");
        } else {
            debug!("received {} file(s)", batch.len());
        }
        Ok(batch.finish())
    }

    /// Validate one file part and stream it to disk.
    ///
    /// `index` is the number of files already accepted in this request.
    async fn accept<S, E>(
        &self,
        index: usize,
        field_name: &str,
        original_name: &str,
        mimetype: &str,
        stream: S,
    ) -> Result<UploadedFile, UploadError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: fmt::Display,
    {
        if index >= self.limits.max_files {
            return Err(UploadError::TooManyFiles {
                max: self.limits.max_files,
            });
        }
        if field_name != UPLOAD_FIELD {
            return Err(UploadError::UnexpectedField(field_name.to_string()));
        }
        let mimetype = normalize_mime(mimetype);
        if !is_allowed_mime(&mimetype) {
            return Err(UploadError::UnsupportedType(mimetype));
        }

        self.ensure_upload_dir().await?;
        let (filename, path, mut file) = self.create_unique(field_name, original_name).await?;

        let written = write_limited(&mut file, stream, self.limits.max_file_size, original_name).await;
        drop(file);

        match written {
            Ok(size) => {
                debug!("stored upload {} ({} bytes) as {}", original_name, size, filename);
                Ok(UploadedFile {
                    original_name: original_name.to_string(),
                    mimetype,
                    size,
                    filename,
                    path,
                })
            }
            Err(err) => {
                self.lifecycle.delete_best_effort(&path).await;
                Err(err)
            }
        }
    }

    /// Open a fresh file under a generated name. `create_new` guarantees an
    /// existing payload is never overwritten; a clash just draws a new name.
    async fn create_unique(
        &self,
        field_name: &str,
        original_name: &str,
    ) -> io::Result<(String, PathBuf, File)> {
        for _ in 0..NAME_ATTEMPTS {
            let filename = storage_filename(field_name, original_name);
            let path = self.upload_dir.join(&filename);
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => return Ok((filename, path, file)),
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    debug!("storage name {} already taken, retrying", filename);
                }
                Err(err) => return Err(err),
            }
        }
        Err(io::Error::new(
            ErrorKind::AlreadyExists,
            "could not allocate a unique storage filename",
        ))
    }
}

/// Files accepted so far in one request.
pub struct UploadBatch<'a> {
    gate: &'a UploadGate,
    files: Vec<UploadedFile>,
}

impl UploadBatch<'_> {
    /// Admit one more file; on rejection the whole batch is rolled back.
    pub async fn push<S, E>(
        &mut self,
        field_name: &str,
        original_name: &str,
        mimetype: &str,
        stream: S,
    ) -> Result<(), UploadError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: fmt::Display,
    {
        let accepted = self
            .gate
            .accept(self.files.len(), field_name, original_name, mimetype, stream)
            .await;
        match accepted {
            Ok(file) => {
                self.files.push(file);
                Ok(())
            }
            Err(err) => Err(self.abort(err).await),
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn finish(self) -> Vec<UploadedFile> {
        self.files
    }

    async fn abort(&mut self, err: UploadError) -> UploadError {
        warn!("upload rejected ({}): {}", err.code(), err);
        let paths = std::mem::take(&mut self.files)
            .into_iter()
            .map(|f| f.path);
        self.gate.lifecycle.delete_all_best_effort(paths).await;
        err
    }
}

async fn write_limited<S, E>(
    file: &mut File,
    stream: S,
    max_size: u64,
    original_name: &str,
) -> Result<u64, UploadError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: fmt::Display,
{
    pin_mut!(stream);
    let mut size: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| UploadError::Malformed(err.to_string()))?;
        size += chunk.len() as u64;
        if size > max_size {
            return Err(UploadError::FileTooLarge {
                name: original_name.to_string(),
            });
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    file.sync_all().await?;
    Ok(size)
}

/// Strip parameters and case from a claimed content type.
fn normalize_mime(mimetype: &str) -> String {
    mimetype
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn is_allowed_mime(mimetype: &str) -> bool {
    ALLOWED_MIME_TYPES.contains(&mimetype)
}

/// `<field>-<unix millis>-<random>.<ext>`
fn storage_filename(field_name: &str, original_name: &str) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    format!(
        "{}-{}-{}{}",
        field_name,
        Utc::now().timestamp_millis(),
        suffix,
        extension_of(original_name)
    )
}

/// Original extension including the dot, or empty when it is missing or
/// could not be used safely in a filename.
///
/// Only short ASCII alphanumeric extensions are kept as-is. Anything else
/// (`x.c++`, non-Latin scripts, quotes) is dropped rather than escaped so a
/// stored name is always a plain URL path segment; the original name,
/// extension included, stays on the record and in `Content-Disposition`.
fn extension_of(original_name: &str) -> String {
    Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default()
}
