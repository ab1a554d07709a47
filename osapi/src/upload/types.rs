//! Request and result types of a batch upload.

use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, StreamExt};
use serde::Serialize;
use thiserror::Error as ThisError;
use utoipa::ToSchema;

/// Content of one file: chunks as they arrive from the client
pub type FileStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Where a batch is written to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadDestination {
    pub bucket: String,
    /// Key prefix, may be empty
    pub prefix: String,
}

impl UploadDestination {
    pub fn new(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }
}

/// One file of a batch
pub struct UploadFile {
    pub name: String,
    pub content: FileStream,
    /// Size hint in bytes, if the caller knows it
    pub size: Option<u64>,
    pub content_type: Option<String>,
}

impl UploadFile {
    pub fn from_stream(name: impl Into<String>, content: FileStream, size: Option<u64>) -> Self {
        Self {
            name: name.into(),
            content,
            size,
            content_type: None,
        }
    }

    /// A file whose content is already in memory
    pub fn from_bytes(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        let content = content.into();
        let size = content.len() as u64;
        Self::from_stream(name, stream::once(async move { Ok(content) }).boxed(), Some(size))
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Drain the stream into one buffer. The stream is consumed (and dropped) either way.
    pub(crate) async fn read_to_end(content: FileStream, size: Option<u64>) -> std::io::Result<Bytes> {
        let capacity = size.and_then(|s| usize::try_from(s).ok()).unwrap_or(0);
        let mut buffer = BytesMut::with_capacity(capacity);
        let mut content = content;
        while let Some(chunk) = content.next().await {
            buffer.extend_from_slice(&chunk?);
        }
        Ok(buffer.freeze())
    }
}

impl std::fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadFile")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Succeeded,
    Failed,
}

/// Result of uploading one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct UploadOutcome {
    /// File name as submitted
    pub name: String,
    /// Object key the file was written to
    pub key: String,
    pub status: UploadStatus,
    /// Why the upload failed; only present for failed uploads
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadOutcome {
    pub fn succeeded(name: String, key: String) -> Self {
        Self {
            name,
            key,
            status: UploadStatus::Succeeded,
            error: None,
        }
    }

    pub fn failed(name: String, key: String, error: impl Into<String>) -> Self {
        Self {
            name,
            key,
            status: UploadStatus::Failed,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == UploadStatus::Succeeded
    }
}

/// Outcomes of a batch, in the order the files were submitted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub outcomes: Vec<UploadOutcome>,
}

impl BatchResult {
    /// True when every file was written. An empty batch trivially succeeds.
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(UploadOutcome::is_success)
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_success()).count()
    }
}

/// Failures of the batch as a whole. Per-file failures never end up here.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum BatchUploadError {
    #[error("Invalid upload destination: bucket name cannot be empty")]
    InvalidDestination,
}
