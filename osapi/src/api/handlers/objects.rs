//! Handlers that address a single object under the configured bucket and key prefix.

use crate::{
    AppState,
    api::models::objects::{CheckFileForm, FileExistsResponse, PresignedUrlForm},
    errors::Result,
    upload::derive_key,
};
use axum::{
    Form, Json,
    extract::{State, rejection::FormRejection},
};

#[utoipa::path(
    post,
    path = "/generate-presigned-url/",
    tag = "objects",
    summary = "Generate presigned upload URL",
    description = "Returns a time-limited URL the client can PUT the file to directly. The object key is \
        derived from the configured key prefix and the given filename.",
    request_body(content = PresignedUrlForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Presigned URL", body = String),
        (status = 403, description = "Object store credentials missing or incomplete"),
        (status = 422, description = "Missing form fields"),
        (status = 500, description = "Internal server error")
    )
)]
#[tracing::instrument(skip_all, fields(filename = tracing::field::Empty))]
pub async fn generate_presigned_url(
    State(state): State<AppState>,
    form: std::result::Result<Form<PresignedUrlForm>, FormRejection>,
) -> Result<Json<String>> {
    let Form(form) = form?;
    tracing::Span::current().record("filename", form.filename.as_str());
    let storage = &state.config.storage;
    let key = derive_key(&storage.key_prefix, &form.filename);

    let url = state
        .store
        .presign_put(&storage.bucket, &key, &form.file_type, state.config.presigned_url_expiry)
        .await?;

    tracing::debug!(bucket = %storage.bucket, key = %key, "Generated presigned URL");
    Ok(Json(url))
}

#[utoipa::path(
    post,
    path = "/check-file-exist/",
    tag = "objects",
    summary = "Check file existence",
    request_body(content = CheckFileForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Whether the object exists", body = FileExistsResponse),
        (status = 403, description = "Object store credentials missing or rejected"),
        (status = 422, description = "Missing form fields"),
        (status = 500, description = "Internal server error")
    )
)]
#[tracing::instrument(skip_all, fields(filename = tracing::field::Empty))]
pub async fn check_file_exists(
    State(state): State<AppState>,
    form: std::result::Result<Form<CheckFileForm>, FormRejection>,
) -> Result<Json<FileExistsResponse>> {
    let Form(form) = form?;
    tracing::Span::current().record("filename", form.filename.as_str());
    let storage = &state.config.storage;
    let key = derive_key(&storage.key_prefix, &form.filename);
    let exists = state.store.object_exists(&storage.bucket, &key).await?;
    Ok(Json(FileExistsResponse { exists }))
}
