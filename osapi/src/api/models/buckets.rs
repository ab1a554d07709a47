use serde::Deserialize;
use utoipa::IntoParams;

/// Query parameters for bucket creation
#[derive(Debug, Deserialize, IntoParams)]
pub struct CreateBucketQuery {
    /// Name of the bucket to create
    pub bucket_name: String,
}
