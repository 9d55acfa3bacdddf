//! Chunked upload for large files
//!
//! Each file is split into fixed-size parts. The backend opens a multipart upload, hands out
//! one pre-signed URL per part, and assembles the parts on completion. Any failure after the
//! upload was opened aborts it with the same upload id.

use async_trait::async_trait;
use bytes::Bytes;
use ealbum_api_client::{error_for_status, ApiClient};
use ealbum_core::models::{
    AbortMultipartRequest, CompleteMultipartRequest, CompletedPart, InitiateMultipartRequest,
    InitiateMultipartResponse, PartUrlRequest,
};
use ealbum_core::{CleanupState, FileId, MediaFile, MultipartAbortError, TransportError};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, ETAG};
use reqwest::Body;
use std::num::NonZeroU64;

use super::{api_failure, check_batch, read_failure, send_failure, stored_objects, BatchContext};
use super::{TransportKind, UploadTransport};
use crate::progress::{ProgressHandle, ProgressReporter};
use crate::source::{memory_stream, read_range, with_progress};

pub const DEFAULT_PART_SIZE: NonZeroU64 = match NonZeroU64::new(10 * 1024 * 1024) {
    Some(size) => size,
    None => unreachable!(),
};

/// Byte range `start..end` of one part; part numbers start at 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartRange {
    pub part_number: u32,
    pub start: u64,
    pub end: u64,
}

impl PartRange {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Split a file of `size` bytes into contiguous parts of `part_size`; the last part may be
/// shorter. An empty file is sent as a single empty part.
pub fn plan_parts(size: u64, part_size: NonZeroU64) -> Vec<PartRange> {
    if size == 0 {
        return vec![PartRange {
            part_number: 1,
            start: 0,
            end: 0,
        }];
    }

    let part_size = part_size.get();
    (0..size.div_ceil(part_size))
        .map(|i| {
            let start = i * part_size;
            PartRange {
                part_number: (i + 1) as u32,
                start,
                end: (start + part_size).min(size),
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct ChunkedTransport {
    api: ApiClient,
    part_size: NonZeroU64,
}

impl ChunkedTransport {
    pub fn new(api: ApiClient, part_size: NonZeroU64) -> Self {
        Self { api, part_size }
    }

    pub fn part_size(&self) -> u64 {
        self.part_size.get()
    }

    async fn upload_file(
        &self,
        ctx: &BatchContext<'_>,
        file: &MediaFile,
        file_id: &FileId,
        progress: &ProgressHandle,
    ) -> Result<String, TransportError> {
        let parts = plan_parts(file.size, self.part_size);
        let upload = self
            .api
            .initiate_multipart(&InitiateMultipartRequest {
                file_name: file.name.clone(),
                content_type: file.content_type.clone(),
                file_size: file.size,
                part_count: parts.len() as u32,
                album_pin: ctx.album_pin.to_string(),
                category: ctx.category.to_string(),
            })
            .await
            .map_err(|e| api_failure(vec![file.name.clone()], &e))?;

        tracing::debug!(
            file = %file.name,
            upload_id = %upload.upload_id,
            part_count = parts.len(),
            "Multipart upload opened"
        );

        // Stays armed until the explicit abort returns.
        let mut guard = AbortGuard::new(&self.api, &upload);
        let result = self
            .upload_parts(&upload, file, &parts, progress.reporter(file_id.clone()))
            .await;

        match result {
            Ok(key) => {
                guard.disarm();
                progress.complete(file_id);
                Ok(key)
            }
            Err(err) => {
                let cleanup = self.abort(&upload).await;
                guard.disarm();
                Err(err.with_cleanup(cleanup))
            }
        }
    }

    async fn upload_parts(
        &self,
        upload: &InitiateMultipartResponse,
        file: &MediaFile,
        parts: &[PartRange],
        reporter: ProgressReporter,
    ) -> Result<String, TransportError> {
        let mut completed = Vec::with_capacity(parts.len());
        for part in parts {
            let e_tag = self.upload_part(upload, file, part, reporter.clone()).await?;
            completed.push(CompletedPart {
                part_number: part.part_number,
                e_tag,
            });
        }
        completed.sort_by_key(|p| p.part_number);

        let response = self
            .api
            .complete_multipart(&CompleteMultipartRequest {
                upload_id: upload.upload_id.clone(),
                key: upload.key.clone(),
                parts: completed,
            })
            .await
            .map_err(|e| api_failure(vec![file.name.clone()], &e))?;
        Ok(response.key)
    }

    /// PUT one part and return its ETag.
    async fn upload_part(
        &self,
        upload: &InitiateMultipartResponse,
        file: &MediaFile,
        part: &PartRange,
        reporter: ProgressReporter,
    ) -> Result<String, TransportError> {
        let part_url = self
            .api
            .multipart_part_url(&PartUrlRequest {
                upload_id: upload.upload_id.clone(),
                key: upload.key.clone(),
                part_number: part.part_number,
            })
            .await
            .map_err(|e| api_failure(vec![file.name.clone()], &e))?;

        let data: Bytes = read_range(&file.source, part.start, part.len())
            .await
            .map_err(|e| read_failure(file, e))?;

        let response = self
            .api
            .client()
            .put(&part_url.url)
            .header(CONTENT_TYPE, file.content_type.as_str())
            .header(CONTENT_LENGTH, part.len())
            .body(Body::wrap_stream(with_progress(
                memory_stream(data),
                reporter,
                part.start,
            )))
            .send()
            .await
            .map_err(|e| send_failure(vec![file.name.clone()], e))?;

        let response = error_for_status(response)
            .await
            .map_err(|e| api_failure(vec![file.name.clone()], &e))?;

        response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                TransportError::for_file(
                    &file.name,
                    None,
                    format!("Part {} response is missing an ETag", part.part_number),
                )
            })
    }

    async fn abort(&self, upload: &InitiateMultipartResponse) -> CleanupState {
        match abort_upload(&self.api, upload).await {
            Ok(()) => {
                tracing::info!(upload_id = %upload.upload_id, "Multipart upload aborted");
                CleanupState::Aborted {
                    upload_id: upload.upload_id.clone(),
                }
            }
            Err(error) => {
                tracing::error!(
                    upload_id = %upload.upload_id,
                    key = %upload.key,
                    error = %error,
                    "Failed to abort multipart upload; parts may remain in storage"
                );
                CleanupState::AbortFailed {
                    upload_id: upload.upload_id.clone(),
                    error,
                }
            }
        }
    }
}

async fn abort_upload(
    api: &ApiClient,
    upload: &InitiateMultipartResponse,
) -> Result<(), MultipartAbortError> {
    api.abort_multipart(&AbortMultipartRequest {
        upload_id: upload.upload_id.clone(),
        key: upload.key.clone(),
    })
    .await
    .map_err(|e| MultipartAbortError {
        upload_id: upload.upload_id.clone(),
        status: e.status(),
        message: e.message(),
    })
}

/// Aborts the open upload in the background if the upload future is dropped mid-transfer.
struct AbortGuard {
    pending: Option<(ApiClient, InitiateMultipartResponse)>,
}

impl AbortGuard {
    fn new(api: &ApiClient, upload: &InitiateMultipartResponse) -> Self {
        Self {
            pending: Some((api.clone(), upload.clone())),
        }
    }

    fn disarm(&mut self) {
        self.pending = None;
    }
}

impl Drop for AbortGuard {
    fn drop(&mut self) {
        let Some((api, upload)) = self.pending.take() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(upload_id = %upload.upload_id, "No runtime to abort multipart upload");
            return;
        };
        runtime.spawn(async move {
            if let Err(error) = abort_upload(&api, &upload).await {
                tracing::error!(
                    upload_id = %upload.upload_id,
                    error = %error,
                    "Failed to abort interrupted multipart upload"
                );
            }
        });
    }
}

#[async_trait]
impl UploadTransport for ChunkedTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Chunked
    }

    async fn upload_batch(
        &self,
        ctx: &BatchContext<'_>,
        files: &[MediaFile],
        progress: &ProgressHandle,
    ) -> Result<Vec<String>, TransportError> {
        check_batch(ctx, files)?;

        let mut keys = Vec::with_capacity(files.len());
        for (file, id) in files.iter().zip(ctx.file_ids) {
            match self.upload_file(ctx, file, id, progress).await {
                Ok(key) => keys.push(key),
                Err(err) => return Err(err.with_stored(stored_objects(ctx, files, &keys))),
            }
        }
        Ok(keys)
    }
}
