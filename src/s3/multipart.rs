//! Multipart upload orchestration
//!
//! Large file-backed objects are uploaded as a sequence of parts:
//!
//! ```text
//! Idle -> Started -> Polling -> UploadingParts -> Completing -> Completed
//!            \___________\______________\____________> Aborting -> Aborted
//! ```
//!
//! Any failure after the upload has started triggers exactly one abort
//! attempt. The error returned to the caller is always the one that caused
//! the abort, never the outcome of the abort itself.

use crate::config::MultipartConfig;
use crate::error::{Result, ServiceError};
use crate::s3::client::S3Client;
use crate::s3::types::{DataSource, MultipartCompleted, MultipartUpload, PutOutcome, StorageObject};
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use std::io::SeekFrom;
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Parts accepted by one multipart upload
pub const MAX_PARTS: u64 = 10_000;

/// Byte range of one part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartPlan {
    pub part_number: u32,
    pub offset: u64,
    pub size: u64,
}

/// Split `total` bytes into parts of at most `max_part_size`, numbered from 1
pub fn plan_parts(total: u64, max_part_size: u64) -> Result<Vec<PartPlan>> {
    if max_part_size == 0 {
        return Err(ServiceError::InvalidArgument(
            "max part size must be greater than zero".to_string(),
        ));
    }

    let count = total.div_ceil(max_part_size);
    if count > MAX_PARTS {
        return Err(ServiceError::InvalidArgument(format!(
            "{} bytes in parts of {} bytes needs {} parts, more than {}",
            total, max_part_size, count, MAX_PARTS
        )));
    }

    Ok((0..count)
        .map(|index| {
            let offset = index * max_part_size;
            PartPlan {
                part_number: (index + 1) as u32,
                offset,
                size: max_part_size.min(total - offset),
            }
        })
        .collect())
}

async fn read_part(path: &Path, part: PartPlan) -> Result<Bytes> {
    let mut file = tokio::fs::File::open(path).await?;
    file.seek(SeekFrom::Start(part.offset)).await?;
    let mut buf = vec![0u8; part.size as usize];
    file.read_exact(&mut buf).await?;
    Ok(Bytes::from(buf))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    Started,
    Polling,
    UploadingParts,
    Completing,
    Completed,
    Aborting,
    Aborted,
    /// Failed with nothing to abort, or the abort itself failed
    Failed,
}

/// Drives one object through the multipart state machine
pub struct MultipartUploader<'a> {
    client: &'a S3Client,
    config: MultipartConfig,
    state: UploadState,
}

impl<'a> MultipartUploader<'a> {
    /// Uploader using the client's multipart settings
    pub fn new(client: &'a S3Client) -> Self {
        Self {
            client,
            config: client.config().multipart.clone(),
            state: UploadState::Idle,
        }
    }

    pub fn with_config(mut self, config: MultipartConfig) -> Self {
        self.config = config;
        self
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    fn advance(&mut self, next: UploadState) {
        tracing::debug!(from = ?self.state, to = ?next, "Multipart state change");
        self.state = next;
    }

    /// Store `object` in `bucket`, in parts when it is file-backed and larger
    /// than the maximum part size, otherwise with a single PUT.
    pub async fn upload(&mut self, bucket: &str, object: &StorageObject) -> Result<PutOutcome> {
        let path = match &object.data {
            Some(DataSource::File(path)) => path.clone(),
            _ => return self.put_single(bucket, object).await,
        };
        let size = tokio::fs::metadata(&path).await?.len();
        if size <= self.config.max_part_size {
            return self.put_single(bucket, object).await;
        }
        let plan = plan_parts(size, self.config.max_part_size)?;

        let mut upload = match self.client.multipart_start_upload(bucket, object).await {
            Ok(upload) => upload,
            Err(err) => {
                self.advance(UploadState::Failed);
                return Err(err);
            }
        };
        self.advance(UploadState::Started);

        self.advance(UploadState::Polling);
        match self.await_visibility(&upload).await {
            Ok(true) => {}
            Ok(false) => {
                // The upload never became visible, so there is nothing to abort
                self.advance(UploadState::Failed);
                return Err(ServiceError::UploadNotVisible {
                    upload_id: upload.upload_id.clone(),
                    attempts: self.config.visibility_poll_attempts,
                });
            }
            Err(err) => return Err(self.abort_after_failure(&upload, err).await),
        }

        match self.upload_and_complete(&mut upload, &path, &plan).await {
            Ok(completed) => {
                self.advance(UploadState::Completed);
                Ok(PutOutcome::Multipart(completed))
            }
            Err(err) => Err(self.abort_after_failure(&upload, err).await),
        }
    }

    async fn put_single(&mut self, bucket: &str, object: &StorageObject) -> Result<PutOutcome> {
        match self.client.put_object(bucket, object).await {
            Ok(stored) => {
                self.advance(UploadState::Completed);
                Ok(PutOutcome::Single(stored))
            }
            Err(err) => {
                self.advance(UploadState::Failed);
                Err(err)
            }
        }
    }

    /// Poll until the new upload is listable.
    ///
    /// `Ok(false)` means it stayed invisible for every attempt. Errors other
    /// than `NoSuchUpload` are returned as-is. Zero attempts disables polling.
    async fn await_visibility(&self, upload: &MultipartUpload) -> Result<bool> {
        let attempts = self.config.visibility_poll_attempts;
        if attempts == 0 {
            return Ok(true);
        }

        for attempt in 1..=attempts {
            match self.client.multipart_list_parts(upload).await {
                Ok(_) => return Ok(true),
                Err(err) if err.is_error_code("NoSuchUpload") => {
                    tracing::warn!(
                        upload_id = %upload.upload_id,
                        attempt,
                        attempts,
                        "New multipart upload not yet visible"
                    );
                    if attempt < attempts {
                        tokio::time::sleep(self.config.visibility_poll_interval()).await;
                    }
                }
                Err(err) => return Err(err),
            }
        }
        Ok(false)
    }

    async fn upload_and_complete(
        &mut self,
        upload: &mut MultipartUpload,
        path: &Path,
        plan: &[PartPlan],
    ) -> Result<MultipartCompleted> {
        self.advance(UploadState::UploadingParts);
        tracing::info!(
            upload_id = %upload.upload_id,
            parts = plan.len(),
            concurrency = self.config.concurrency,
            "Uploading parts"
        );

        let client = self.client;
        let target = upload.clone();
        let target = &target;

        // Ordered buffering: results arrive in part-number order even when
        // several parts are in flight
        let mut results = stream::iter(plan.iter().copied())
            .map(|part| async move {
                let data = read_part(path, part).await?;
                client.multipart_upload_part(target, part.part_number, data).await
            })
            .buffered(self.config.concurrency.max(1));

        while let Some(result) = results.next().await {
            upload.append_part(result?);
        }
        drop(results);

        self.advance(UploadState::Completing);
        self.client.multipart_complete_upload(upload).await
    }

    /// Abort after `err`, logging but otherwise ignoring abort failures; returns `err`
    async fn abort_after_failure(&mut self, upload: &MultipartUpload, err: ServiceError) -> ServiceError {
        self.advance(UploadState::Aborting);
        tracing::warn!(
            upload_id = %upload.upload_id,
            error = %err,
            "Multipart upload failed, aborting"
        );

        match self.client.multipart_abort_upload(upload).await {
            Ok(()) => self.advance(UploadState::Aborted),
            Err(abort_err) => {
                tracing::warn!(
                    upload_id = %upload.upload_id,
                    error = %abort_err,
                    original_error = %err,
                    "Failed to abort multipart upload"
                );
                self.advance(UploadState::Failed);
            }
        }
        err
    }
}
