//! HTTP handlers for project attachments.
//! Uploads are streamed through the upload gate; downloads are streamed from
//! disk. Storage and bookkeeping live in `AttachmentService`.

use crate::{
    errors::AppError,
    models::attachment::{Attachment, AttachmentView, DeletedFile, FileStats},
    state::AppState,
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State, multipart::MultipartRejection},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::Response,
};
use serde::Serialize;
use tokio_util::io::ReaderStream;

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub message: String,
    pub files: Vec<AttachmentView>,
    pub project_id: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ListFilesResponse {
    pub project_id: String,
    pub project_title: String,
    pub files_count: usize,
    pub files: Vec<AttachmentView>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FileStatsResponse {
    pub project_id: String,
    pub project_title: String,
    pub stats: FileStats,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFileResponse {
    pub message: String,
    pub deleted_file: DeletedFile,
}

/// POST `/api/projects/{id}/files` — upload up to five files in field `files`.
///
/// A request that is not multipart at all is treated as an empty upload, so
/// it fails the same way as a multipart body without files.
pub async fn upload_files(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let files = match multipart {
        Ok(mut multipart) => state.uploads.receive(&mut multipart).await?,
        Err(rejection) => {
            tracing::debug!("upload without multipart body: {}", rejection);
            Vec::new()
        }
    };

    let files = state
        .attachments
        .append_attachments(&project_id, files)
        .await
        .map_err(|err| AppError::from_service(err, "failed to upload files"))?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            message: format!("{} file(s) uploaded successfully", files.len()),
            files,
            project_id,
        }),
    ))
}

/// GET `/api/projects/{id}/files`
pub async fn list_files(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Json<ListFilesResponse>, AppError> {
    let listed = state
        .attachments
        .list_attachments(&project_id)
        .await
        .map_err(|err| AppError::from_service(err, "failed to list project files"))?;

    Ok(Json(ListFilesResponse {
        project_id,
        project_title: listed.project_title,
        files_count: listed.files.len(),
        files: listed.files,
    }))
}

/// GET `/api/projects/{id}/files/stats`
pub async fn file_stats(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Json<FileStatsResponse>, AppError> {
    let result = state
        .attachments
        .compute_stats(&project_id)
        .await
        .map_err(|err| AppError::from_service(err, "failed to compute file statistics"))?;

    Ok(Json(FileStatsResponse {
        project_id,
        project_title: result.project_title,
        stats: result.stats,
    }))
}

/// DELETE `/api/projects/{id}/files/{file_id}`
pub async fn delete_file(
    State(state): State<AppState>,
    Path((project_id, file_id)): Path<(String, String)>,
) -> Result<Json<DeleteFileResponse>, AppError> {
    let deleted_file = state
        .attachments
        .remove_attachment(&project_id, &file_id)
        .await
        .map_err(|err| AppError::from_service(err, "failed to delete file"))?;

    Ok(Json(DeleteFileResponse {
        message: "file deleted successfully".into(),
        deleted_file,
    }))
}

/// GET `/api/files/{filename}` — stream a stored file inline.
pub async fn serve_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let (meta, file) = state
        .attachments
        .resolve_file(&filename)
        .await
        .map_err(|err| AppError::from_service(err, "failed to serve file"))?;

    let length = file.metadata().await.ok().map(|m| m.len());
    let body = Body::from_stream(ReaderStream::new(file));

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    set_file_headers(response.headers_mut(), &meta, length);
    Ok(response)
}

fn set_file_headers(headers: &mut HeaderMap, meta: &Attachment, length: Option<u64>) {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&meta.mimetype)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );

    if let Some(length) = length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    }

    if let Ok(value) = HeaderValue::from_str(&content_disposition(&meta.original_name)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    headers.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );
}

/// `inline` disposition for an untrusted filename.
///
/// `filename` gets a printable-ASCII fallback with quotes, backslashes and
/// control characters replaced; `filename*` carries the exact name
/// percent-encoded as UTF-8 (RFC 5987).
fn content_disposition(original_name: &str) -> String {
    let fallback: String = original_name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() || c == ' ') && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let mut encoded = String::with_capacity(original_name.len());
    for byte in original_name.bytes() {
        if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }

    format!("inline; filename=\"{}\"; filename*=UTF-8''{}", fallback, encoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{TestContext, file_count, multipart_body, read_json};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    const BOUNDARY: &str = "X-PROJECT-FILES-BOUNDARY";

    fn upload_request(project_id: &str, parts: &[(&str, &str, &str, &[u8])]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(format!("/api/projects/{project_id}/files"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(BOUNDARY, parts)))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn delete(uri: &str) -> Request<Body> {
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn content_disposition_neutralizes_header_injection() {
        let value = content_disposition("evil\"\r\nSet-Cookie: x=1.txt");
        assert!(!value.contains('\r'));
        assert!(!value.contains('\n'));
        assert!(value.starts_with("inline; filename=\"evil___Set-Cookie: x=1.txt\""));
        assert!(value.contains("filename*=UTF-8''evil%22%0D%0ASet-Cookie%3A%20x%3D1.txt"));
        assert!(HeaderValue::from_str(&value).is_ok());
    }

    #[test]
    fn content_disposition_encodes_unicode() {
        let value = content_disposition("résumé.pdf");
        assert_eq!(
            value,
            "inline; filename=\"r_sum_.pdf\"; filename*=UTF-8''r%C3%A9sum%C3%A9.pdf"
        );
    }

    #[tokio::test]
    async fn upload_list_serve_delete_round_trip() {
        let ctx = TestContext::new().await;
        let project = ctx.create_project("Round trip").await;
        let app = ctx.router();

        let resp = app
            .clone()
            .oneshot(upload_request(
                &project,
                &[("files", "test-file.txt", "text/plain", &b"This is a test file."[..])],
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body = read_json(resp).await;
        assert_eq!(body["message"], "1 file(s) uploaded successfully");
        assert_eq!(body["projectId"], project.as_str());
        let file = &body["files"][0];
        assert_eq!(file["originalName"], "test-file.txt");
        assert_eq!(file["mimetype"], "text/plain");
        assert_eq!(file["category"], "document");
        assert!(file.get("path").is_none());
        let stored = file["filename"].as_str().unwrap().to_string();
        assert_eq!(file["url"], format!("/api/files/{stored}"));

        let resp = app
            .clone()
            .oneshot(get(&format!("/api/projects/{project}/files")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = read_json(resp).await;
        assert_eq!(body["projectTitle"], "Round trip");
        assert_eq!(body["filesCount"], 1);
        let file_id = body["files"][0]["id"].as_str().unwrap().to_string();

        let resp = app
            .clone()
            .oneshot(get(&format!("/api/files/{stored}")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/plain");
        assert_eq!(resp.headers()[header::CONTENT_LENGTH], "20");
        assert!(
            resp.headers()[header::CONTENT_DISPOSITION]
                .to_str()
                .unwrap()
                .starts_with("inline; filename=\"test-file.txt\"")
        );
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"This is a test file.");

        let uri = format!("/api/projects/{project}/files/{file_id}");
        let resp = app.clone().oneshot(delete(&uri)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = read_json(resp).await;
        assert_eq!(body["deletedFile"]["originalName"], "test-file.txt");

        let resp = app.clone().oneshot(delete(&uri)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = app
            .clone()
            .oneshot(get(&format!("/api/projects/{project}/files")))
            .await
            .unwrap();
        let body = read_json(resp).await;
        assert_eq!(body["filesCount"], 0);

        let resp = app
            .oneshot(get(&format!("/api/files/{stored}")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn part_without_content_type_is_plain_text() {
        let ctx = TestContext::new().await;
        let project = ctx.create_project("Untyped").await;

        let resp = ctx
            .router()
            .oneshot(upload_request(&project, &[("files", "a.txt", "", &b"plain"[..])]))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::CREATED);
        let body = read_json(resp).await;
        assert_eq!(body["files"][0]["mimetype"], "text/plain");
        assert_eq!(body["files"][0]["category"], "document");
    }

    #[tokio::test]
    async fn upload_to_missing_project_leaves_no_files() {
        let ctx = TestContext::new().await;
        let missing = uuid::Uuid::new_v4().to_string();

        let resp = ctx
            .router()
            .oneshot(upload_request(
                &missing,
                &[("files", "a.txt", "text/plain", &b"a"[..])],
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(file_count(ctx.upload_dir()), 0);
    }

    #[tokio::test]
    async fn upload_without_files_is_bad_request() {
        let ctx = TestContext::new().await;
        let project = ctx.create_project("Nothing").await;

        let resp = ctx
            .router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/projects/{project}/files"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = read_json(resp).await;
        assert_eq!(body["message"], "no files were uploaded");
    }

    #[tokio::test]
    async fn disallowed_type_is_rejected_and_list_unchanged() {
        let ctx = TestContext::new().await;
        let project = ctx.create_project("Types").await;
        let app = ctx.router();

        let resp = app
            .clone()
            .oneshot(upload_request(
                &project,
                &[("files", "test-file.xyz", "application/octet-stream", &b"??"[..])],
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = read_json(resp).await;
        assert_eq!(body["error"], "FILE_UPLOAD_ERROR");
        assert!(
            body["message"]
                .as_str()
                .unwrap()
                .contains("application/octet-stream")
        );

        let listed = ctx.attachments.list_attachments(&project).await.unwrap();
        assert!(listed.files.is_empty());
        assert_eq!(file_count(ctx.upload_dir()), 0);
    }

    #[tokio::test]
    async fn six_files_are_rejected_entirely() {
        let ctx = TestContext::new().await;
        let project = ctx.create_project("Too many").await;

        let parts: Vec<(&str, &str, &str, &[u8])> = (0..6)
            .map(|_| ("files", "f.txt", "text/plain", b"x".as_slice()))
            .collect();
        let resp = ctx
            .router()
            .oneshot(upload_request(&project, &parts))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = read_json(resp).await;
        assert_eq!(body["error"], "LIMIT_FILE_COUNT");
        assert_eq!(file_count(ctx.upload_dir()), 0);
        let listed = ctx.attachments.list_attachments(&project).await.unwrap();
        assert!(listed.files.is_empty());
    }

    #[tokio::test]
    async fn oversized_file_is_rejected() {
        let ctx = TestContext::new().await;
        let project = ctx.create_project("Big").await;
        let big = vec![b'a'; (10 * 1024 * 1024) + 1];

        let resp = ctx
            .router()
            .oneshot(upload_request(
                &project,
                &[("files", "big.txt", "text/plain", &big[..])],
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = read_json(resp).await;
        assert_eq!(body["error"], "LIMIT_FILE_SIZE");
        assert_eq!(file_count(ctx.upload_dir()), 0);
    }

    #[tokio::test]
    async fn multiple_files_in_one_request() {
        let ctx = TestContext::new().await;
        let project = ctx.create_project("Many").await;

        let resp = ctx
            .router()
            .oneshot(upload_request(
                &project,
                &[
                    ("files", "a.png", "image/png", &b"png"[..]),
                    ("files", "b.pdf", "application/pdf", &b"%PDF"[..]),
                ],
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::CREATED);
        let body = read_json(resp).await;
        let categories: Vec<&str> = body["files"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["category"].as_str().unwrap())
            .collect();
        assert_eq!(categories, vec!["image", "pdf"]);
        assert_eq!(file_count(ctx.upload_dir()), 2);
    }

    #[tokio::test]
    async fn stats_endpoint_reports_totals() {
        let ctx = TestContext::new().await;
        let project = ctx.create_project("Stats").await;
        let uploads = vec![
            ctx.write_upload("a.png", "image/png", &[0u8; 100]).await,
            ctx.write_upload("b.xlsx", "application/vnd.ms-excel", &[0u8; 200]).await,
            ctx.write_upload("c.txt", "text/plain", &[0u8; 300]).await,
        ];
        ctx.attachments
            .append_attachments(&project, uploads)
            .await
            .unwrap();

        let resp = ctx
            .router()
            .oneshot(get(&format!("/api/projects/{project}/files/stats")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = read_json(resp).await;
        let stats = &body["stats"];
        assert_eq!(stats["totalFiles"], 3);
        assert_eq!(stats["totalSize"], 600);
        assert_eq!(stats["formattedTotalSize"], "600 Bytes");
        assert_eq!(stats["categories"]["spreadsheet"]["count"], 1);
        assert_eq!(stats["categories"]["image"]["totalSize"], 100);
        assert_eq!(stats["recentFiles"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn missing_project_endpoints_return_404() {
        let ctx = TestContext::new().await;
        let app = ctx.router();
        let missing = uuid::Uuid::new_v4();

        for uri in [
            format!("/api/projects/{missing}/files"),
            format!("/api/projects/{missing}/files/stats"),
            "/api/projects/not-a-uuid/files".to_string(),
        ] {
            let resp = app.clone().oneshot(get(&uri)).await.unwrap();
            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
        }
    }

    #[tokio::test]
    async fn serving_unknown_or_unreferenced_files_is_404() {
        let ctx = TestContext::new().await;
        ctx.uploads.ensure_upload_dir().await.unwrap();
        std::fs::write(ctx.upload_dir().join("stray.txt"), b"?").unwrap();
        let app = ctx.router();

        let resp = app.clone().oneshot(get("/api/files/nope.txt")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = app.oneshot(get("/api/files/stray.txt")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = read_json(resp).await;
        assert!(body["message"].as_str().unwrap().contains("not referenced"));
    }
}
