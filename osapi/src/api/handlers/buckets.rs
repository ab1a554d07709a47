use crate::{
    AppState,
    api::models::{MessageResponse, buckets::CreateBucketQuery},
    errors::{Error, Result},
};
use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};

#[utoipa::path(
    post,
    path = "/create-bucket/",
    tag = "buckets",
    summary = "Create bucket",
    description = "Create a new bucket in the object store.",
    params(CreateBucketQuery),
    responses(
        (status = 200, description = "Bucket created", body = MessageResponse),
        (status = 400, description = "Missing or empty bucket name", body = MessageResponse),
        (status = 403, description = "Object store credentials missing or rejected", body = MessageResponse),
        (status = 409, description = "Bucket already exists", body = MessageResponse),
        (status = 500, description = "Internal server error", body = MessageResponse)
    )
)]
#[tracing::instrument(skip_all, fields(bucket = tracing::field::Empty))]
pub async fn create_bucket(
    State(state): State<AppState>,
    query: std::result::Result<Query<CreateBucketQuery>, QueryRejection>,
) -> Result<Json<MessageResponse>> {
    let Query(CreateBucketQuery { bucket_name: bucket }) = query?;
    tracing::Span::current().record("bucket", bucket.as_str());
    if bucket.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "Bucket name cannot be empty".to_string(),
        });
    }

    state.store.create_bucket(&bucket).await?;
    tracing::info!("Bucket created");

    Ok(Json(MessageResponse {
        message: format!("Bucket {bucket} created successfully"),
    }))
}

#[cfg(test)]
mod tests {
    use crate::api::models::MessageResponse;
    use crate::config::StorageBackend;
    use crate::test_utils::{create_test_app, create_test_app_with_config, test_config};
    use axum::http::StatusCode;

    #[test_log::test(tokio::test)]
    async fn test_create_bucket() {
        let (app, store) = create_test_app().await;

        let response = app.post("/create-bucket/").add_query_param("bucket_name", "photos").await;

        response.assert_status_ok();
        let body: MessageResponse = response.json();
        assert_eq!(body.message, "Bucket photos created successfully");
        assert_eq!(store.object_count("photos").await, 0);
    }

    #[tokio::test]
    async fn test_create_existing_bucket_conflicts() {
        let (app, _store) = create_test_app().await;

        app.post("/create-bucket/")
            .add_query_param("bucket_name", "photos")
            .await
            .assert_status_ok();
        let response = app.post("/create-bucket/").add_query_param("bucket_name", "photos").await;

        response.assert_status(StatusCode::CONFLICT);
        let body: MessageResponse = response.json();
        assert_eq!(body.message, "Bucket photos is already owned by you");
    }

    #[tokio::test]
    async fn test_create_bucket_requires_name() {
        let (app, _store) = create_test_app().await;

        app.post("/create-bucket/")
            .add_query_param("bucket_name", "")
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        app.post("/create-bucket/").await.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_bucket_name_is_json_error() {
        let (app, _store) = create_test_app().await;

        let response = app.post("/create-bucket/").await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: MessageResponse = response.json();
        assert!(body.message.contains("bucket_name"), "unexpected message {}", body.message);
    }

    #[tokio::test]
    async fn test_create_bucket_without_credentials_is_forbidden() {
        let mut config = test_config();
        config.storage.backend = StorageBackend::S3;
        config.storage.endpoint_url = Some("http://127.0.0.1:9".to_string());
        let app = create_test_app_with_config(config);

        let response = app.post("/create-bucket/").add_query_param("bucket_name", "photos").await;

        response.assert_status(StatusCode::FORBIDDEN);
        let body: MessageResponse = response.json();
        assert_eq!(body.message, "No credentials found for the object store");
    }
}
