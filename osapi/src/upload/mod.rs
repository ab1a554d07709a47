//! Batch upload coordination.
//!
//! [`BatchUploader`] writes a set of files to one destination concurrently and reports one
//! [`UploadOutcome`] per file, in submission order. A file that fails (unreadable stream,
//! backend error, cancellation, even a panic inside the backend) is reported as failed and
//! never affects the other files of the batch. Only an invalid destination fails the call as a
//! whole, before any backend request is made.
//!
//! Concurrency is bounded per batch by `upload.max_concurrent_uploads` permits; each permit
//! covers reading one file's content and the backend write that follows. There are no retries:
//! a file's stream can only be consumed once.

pub mod types;

pub use types::{BatchResult, BatchUploadError, FileStream, UploadDestination, UploadFile, UploadOutcome, UploadStatus};

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error as ThisError;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::UploadConfig;
use crate::storage::{ObjectStore, StorageError};

/// Object key for a file: `prefix/name`, or just `name` without a prefix.
/// Trailing slashes on the prefix are ignored so `"p"` and `"p/"` give the same key.
pub fn derive_key(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

/// Why a single file was not written
#[derive(ThisError, Debug)]
enum FileUploadError {
    #[error("failed to read file content: {0}")]
    Read(#[source] std::io::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("upload cancelled before completion")]
    Cancelled,

    #[error("upload task panicked")]
    Panicked,
}

/// Uploads batches of files to an [`ObjectStore`].
#[derive(Clone)]
pub struct BatchUploader {
    store: Arc<dyn ObjectStore>,
    /// 0 means unbounded
    max_concurrent_uploads: usize,
    batch_timeout: Option<Duration>,
}

impl BatchUploader {
    pub fn new(store: Arc<dyn ObjectStore>, config: &UploadConfig) -> Self {
        Self {
            store,
            max_concurrent_uploads: config.max_concurrent_uploads,
            batch_timeout: config.batch_timeout,
        }
    }

    /// Upload every file to `destination` and wait for all of them.
    pub async fn upload_batch(&self, destination: &UploadDestination, files: Vec<UploadFile>) -> Result<BatchResult, BatchUploadError> {
        self.upload_batch_with_cancel(destination, files, CancellationToken::new()).await
    }

    /// Like [`upload_batch`](Self::upload_batch), but unfinished uploads stop as soon as
    /// `cancel` fires. Cancelled files are reported as failed.
    #[tracing::instrument(skip_all, fields(bucket = %destination.bucket, prefix = %destination.prefix, files = files.len()))]
    pub async fn upload_batch_with_cancel(
        &self,
        destination: &UploadDestination,
        files: Vec<UploadFile>,
        cancel: CancellationToken,
    ) -> Result<BatchResult, BatchUploadError> {
        if destination.bucket.trim().is_empty() {
            return Err(BatchUploadError::InvalidDestination);
        }
        if files.is_empty() {
            tracing::debug!("Empty batch, nothing to upload");
            return Ok(BatchResult::default());
        }

        let started = Instant::now();
        let total = files.len();
        // Our own child token: the batch deadline must not cancel the caller's token
        let cancel = cancel.child_token();
        let semaphore = (self.max_concurrent_uploads > 0).then(|| Arc::new(Semaphore::new(self.max_concurrent_uploads)));

        let mut labels = Vec::with_capacity(total);
        let mut tasks = JoinSet::new();

        for (index, file) in files.into_iter().enumerate() {
            let key = derive_key(&destination.prefix, &file.name);
            labels.push((file.name.clone(), key.clone()));

            let job = UploadJob {
                store: self.store.clone(),
                bucket: destination.bucket.clone(),
                key,
                file,
                semaphore: semaphore.clone(),
                cancel: cancel.clone(),
            };
            tasks.spawn(async move { (index, job.run().await) });
        }

        let mut slots: Vec<Option<UploadOutcome>> = vec![None; total];
        let deadline = self.batch_timeout.map(|timeout| tokio::time::Instant::now() + timeout);

        loop {
            let joined = match deadline {
                Some(deadline) if !cancel.is_cancelled() => {
                    tokio::select! {
                        joined = tasks.join_next() => joined,
                        _ = tokio::time::sleep_until(deadline) => {
                            tracing::warn!(timeout = ?self.batch_timeout, "Batch deadline reached, cancelling unfinished uploads");
                            cancel.cancel();
                            continue;
                        }
                    }
                }
                _ => tasks.join_next().await,
            };

            match joined {
                Some(Ok((index, outcome))) => slots[index] = Some(outcome),
                // Jobs catch their own panics, so this only happens if the runtime drops the task
                Some(Err(join_error)) => tracing::error!(error = %join_error, "Upload task did not complete"),
                None => break,
            }
        }

        let outcomes: Vec<UploadOutcome> = slots
            .into_iter()
            .zip(labels)
            .map(|(slot, (name, key))| slot.unwrap_or_else(|| UploadOutcome::failed(name, key, "upload task did not complete")))
            .collect();
        let result = BatchResult { outcomes };

        tracing::info!(
            files = total,
            succeeded = total - result.failed_count(),
            failed = result.failed_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Batch upload finished"
        );

        Ok(result)
    }
}

/// Everything one worker needs to upload one file
struct UploadJob {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    key: String,
    file: UploadFile,
    semaphore: Option<Arc<Semaphore>>,
    cancel: CancellationToken,
}

impl UploadJob {
    async fn run(self) -> UploadOutcome {
        let UploadJob {
            store,
            bucket,
            key,
            file,
            semaphore,
            cancel,
        } = self;
        let UploadFile {
            name,
            content,
            size,
            content_type,
        } = file;

        let write = async {
            // Held until the backend call returns
            let _permit = match semaphore {
                Some(semaphore) => Some(semaphore.acquire_owned().await.map_err(|_| FileUploadError::Cancelled)?),
                None => None,
            };
            let body = UploadFile::read_to_end(content, size).await.map_err(FileUploadError::Read)?;
            store.put_object(&bucket, &key, body, content_type.as_deref()).await?;
            Ok::<_, FileUploadError>(())
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FileUploadError::Cancelled),
            result = AssertUnwindSafe(write).catch_unwind() => result.unwrap_or(Err(FileUploadError::Panicked)),
        };

        match result {
            Ok(()) => {
                tracing::debug!(file = %name, bucket = %bucket, key = %key, "File uploaded");
                UploadOutcome::succeeded(name, key)
            }
            Err(e) => {
                tracing::warn!(file = %name, bucket = %bucket, key = %key, error = %e, "File upload failed");
                UploadOutcome::failed(name, key, e.to_string())
            }
        }
    }
}
