//! HTTP API: route handlers and their request/response models.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response data structures
//!
//! # API Structure
//!
//! - `POST /create-bucket/`: create a bucket
//! - `POST /generate-presigned-url/`: presigned PUT URL for a direct client upload
//! - `POST /upload/`: upload a batch of files through the service
//! - `POST /check-file-exist/`: check whether an object exists
//!
//! All endpoints are documented with `utoipa`; the interactive documentation is served at `/docs`
//! and `GET /` redirects there.

pub mod handlers;
pub mod models;
