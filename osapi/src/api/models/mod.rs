//! Request and response models of the HTTP API.

pub mod buckets;
pub mod objects;
pub mod uploads;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Plain message body, also the shape of every error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}
