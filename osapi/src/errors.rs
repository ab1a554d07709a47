use crate::storage::StorageError;
use crate::upload::BatchUploadError;
use axum::{
    Json,
    extract::{
        multipart::MultipartRejection,
        rejection::{FormRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Invalid request data
    #[error("{message}")]
    BadRequest { message: String },

    /// Well-formed request whose fields are missing or of the wrong type
    #[error("{message}")]
    UnprocessableEntity { message: String },

    /// Uploaded file or request body exceeds the configured limit
    #[error("{message}")]
    PayloadTooLarge { message: String },

    /// Object store operation error
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Batch upload failed as a whole
    #[error(transparent)]
    Upload(#[from] BatchUploadError),

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::UnprocessableEntity { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::Storage(storage_err) => match storage_err {
                StorageError::BucketAlreadyExists { .. } | StorageError::BucketAlreadyOwnedByYou { .. } => StatusCode::CONFLICT,
                StorageError::NoCredentials | StorageError::PartialCredentials | StorageError::AccessDenied { .. } => {
                    StatusCode::FORBIDDEN
                }
                StorageError::NoSuchBucket { .. } => StatusCode::NOT_FOUND,
                StorageError::InvalidRequest { .. } | StorageError::Backend { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Upload(BatchUploadError::InvalidDestination) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::BadRequest { message } | Error::UnprocessableEntity { message } | Error::PayloadTooLarge { message } => {
                message.clone()
            }
            Error::Storage(storage_err) => match storage_err {
                StorageError::BucketAlreadyExists { bucket } => format!("Bucket {bucket} already exists"),
                StorageError::BucketAlreadyOwnedByYou { bucket } => format!("Bucket {bucket} is already owned by you"),
                StorageError::NoSuchBucket { bucket } => format!("Bucket {bucket} does not exist"),
                StorageError::NoCredentials => "No credentials found for the object store".to_string(),
                StorageError::PartialCredentials => "Incomplete credentials for the object store".to_string(),
                StorageError::AccessDenied { .. } => "Object store rejected the configured credentials".to_string(),
                StorageError::InvalidRequest { message } => format!("Invalid storage request: {message}"),
                StorageError::Backend { .. } => "Object store error occurred".to_string(),
            },
            Error::Upload(upload_err) => upload_err.to_string(),
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Other(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::Storage(StorageError::Backend { .. } | StorageError::InvalidRequest { .. })
            | Error::Upload(_)
            | Error::Internal { .. }
            | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Storage(e) if e.is_credential_error() => {
                tracing::warn!("Object store credential error: {}", self);
            }
            Error::Storage(_) => {
                tracing::warn!("Object store error: {}", self);
            }
            Error::BadRequest { .. } | Error::UnprocessableEntity { .. } | Error::PayloadTooLarge { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        (status, Json(json!({ "message": self.user_message() }))).into_response()
    }
}

impl Error {
    /// Keep the status axum chose for an extractor rejection, but answer in our JSON shape
    fn from_rejection(status: StatusCode, message: String) -> Self {
        match status {
            StatusCode::UNPROCESSABLE_ENTITY => Error::UnprocessableEntity { message },
            StatusCode::PAYLOAD_TOO_LARGE => Error::PayloadTooLarge { message },
            _ => Error::BadRequest { message },
        }
    }
}

impl From<QueryRejection> for Error {
    fn from(rejection: QueryRejection) -> Self {
        Error::from_rejection(rejection.status(), rejection.body_text())
    }
}

impl From<FormRejection> for Error {
    fn from(rejection: FormRejection) -> Self {
        Error::from_rejection(rejection.status(), rejection.body_text())
    }
}

impl From<MultipartRejection> for Error {
    fn from(rejection: MultipartRejection) -> Self {
        Error::from_rejection(rejection.status(), rejection.body_text())
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
