use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Form fields for presigned URL generation
#[derive(Debug, Deserialize, ToSchema)]
pub struct PresignedUrlForm {
    /// Object name, placed under the configured key prefix
    pub filename: String,
    /// Content type the client will upload with
    pub file_type: String,
}

/// Form fields for the existence check
#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckFileForm {
    pub filename: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FileExistsResponse {
    pub exists: bool,
}
