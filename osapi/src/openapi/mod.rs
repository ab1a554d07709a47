//! OpenAPI documentation of the HTTP API, served as JSON at `/api-docs/openapi.json` and
//! rendered with Scalar at `/docs`.

use utoipa::OpenApi;

use crate::{api, upload};

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::root::redirect_to_docs,
        api::handlers::buckets::create_bucket,
        api::handlers::objects::generate_presigned_url,
        api::handlers::objects::check_file_exists,
        api::handlers::uploads::upload_files,
    ),
    components(
        schemas(
            api::models::MessageResponse,
            api::models::objects::PresignedUrlForm,
            api::models::objects::CheckFileForm,
            api::models::objects::FileExistsResponse,
            api::models::uploads::UploadResponse,
            upload::UploadOutcome,
            upload::UploadStatus,
        )
    ),
    tags(
        (name = "buckets", description = "Bucket management."),
        (name = "objects", description = "Presigned upload URLs and existence checks for single objects."),
        (name = "uploads", description = "Concurrent batch upload of files through the service.

Each file is reported individually. A failed file never affects the others and nothing is rolled back."),
        (name = "docs", description = "API documentation."),
    ),
    info(
        title = "Object Storage API",
        version = "1.0.0",
        description = "HTTP facade over an S3-compatible object store.",
    )
)]
pub struct ApiDoc;
