use crate::{
    AppState,
    api::models::uploads::{UploadQuery, UploadResponse},
    errors::{Error, Result},
    upload::{UploadDestination, UploadFile},
};
use axum::{
    Json,
    extract::{
        Multipart, Query, State,
        multipart::{MultipartError, MultipartRejection},
        rejection::QueryRejection,
    },
    http::StatusCode,
};
use bytes::BytesMut;

/// Multipart part names accepted as files
const FILE_FIELDS: [&str; 2] = ["files", "files[]"];

fn multipart_error(e: MultipartError) -> Error {
    // The body limit surfaces as a multipart error
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::PayloadTooLarge { message: e.body_text() }
    } else {
        Error::BadRequest {
            message: format!("Failed to parse multipart data: {}", e.body_text()),
        }
    }
}

#[utoipa::path(
    post,
    path = "/upload/",
    tag = "uploads",
    summary = "Upload files",
    description = "Upload one or more files (repeated `files` parts) to the configured bucket and key prefix. \
        Files are written concurrently and each one is reported separately: the response is 200 when every \
        file was stored and 207 when at least one failed.",
    params(UploadQuery),
    request_body(content_type = "multipart/form-data", description = "One `files` part per file"),
    responses(
        (status = 200, description = "All files uploaded", body = UploadResponse),
        (status = 207, description = "Some files failed to upload", body = UploadResponse),
        (status = 400, description = "Malformed multipart body or no files"),
        (status = 413, description = "File or request too large"),
        (status = 500, description = "Invalid destination or internal server error")
    )
)]
pub async fn upload_files(
    State(state): State<AppState>,
    query: std::result::Result<Query<UploadQuery>, QueryRejection>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    let Query(query) = query?;
    let mut multipart = multipart?;
    let max_file_size = state.config.upload.max_file_size;
    let mut files = Vec::new();

    // Parts arrive one after another on the same body, so each file is read fully before the next
    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        if !field.name().is_some_and(|name| FILE_FIELDS.contains(&name)) {
            continue;
        }

        let name = field
            .file_name()
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .ok_or_else(|| Error::BadRequest {
                message: "Every file part needs a filename".to_string(),
            })?;
        let content_type = field.content_type().map(str::to_string);

        let mut content = BytesMut::new();
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            if max_file_size > 0 && (content.len() + chunk.len()) as u64 > max_file_size {
                tracing::warn!(file = %name, max_file_size, "File size limit exceeded, rejecting upload");
                return Err(Error::PayloadTooLarge {
                    message: format!(
                        "File {name} exceeds maximum allowed size of {max_file_size} bytes ({} MB)",
                        max_file_size / (1024 * 1024)
                    ),
                });
            }
            content.extend_from_slice(&chunk);
        }

        tracing::debug!(file = %name, bytes = content.len(), "Received file part");
        let file = UploadFile::from_bytes(name, content.freeze());
        files.push(match content_type {
            Some(content_type) => file.with_content_type(content_type),
            None => file,
        });
    }

    if files.is_empty() {
        return Err(Error::BadRequest {
            message: "No files provided, send one or more 'files' parts".to_string(),
        });
    }

    let destination = UploadDestination::new(
        query.bucket_name.unwrap_or_else(|| state.config.storage.bucket.clone()),
        query.prefix.unwrap_or_else(|| state.config.storage.key_prefix.clone()),
    );

    let result = state.uploader.upload_batch(&destination, files).await?;

    let status = if result.all_succeeded() {
        StatusCode::OK
    } else {
        StatusCode::MULTI_STATUS
    };
    Ok((status, Json(UploadResponse::from(result))))
}
