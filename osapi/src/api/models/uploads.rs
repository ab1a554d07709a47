use crate::upload::{BatchResult, UploadOutcome};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Optional overrides of the configured upload destination
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct UploadQuery {
    /// Bucket to upload to (default: `storage.bucket`)
    pub bucket_name: Option<String>,
    /// Key prefix for the uploaded files (default: `storage.key_prefix`)
    pub prefix: Option<String>,
}

/// Result of a batch upload, one entry per submitted file in submission order
#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub message: String,
    pub all_succeeded: bool,
    pub files: Vec<UploadOutcome>,
}

impl From<BatchResult> for UploadResponse {
    fn from(result: BatchResult) -> Self {
        let total = result.outcomes.len();
        let failed = result.failed_count();
        let message = if failed == 0 {
            format!("Successfully uploaded {total} file(s)")
        } else {
            format!("{failed} of {total} file(s) failed to upload")
        };

        Self {
            message,
            all_succeeded: failed == 0,
            files: result.outcomes,
        }
    }
}
