//! Direct upload: one pre-signed PUT per file
//!
//! The backend hands out a pre-signed URL and the storage key for each file; the file bytes
//! are then streamed straight to storage. Files of a batch are sent concurrently; the first
//! failure drops the transfers still in flight.

use async_trait::async_trait;
use ealbum_api_client::{error_for_status, ApiClient};
use ealbum_core::models::PresignRequest;
use ealbum_core::{FileId, MediaFile, StoredObject, TransportError};
use futures::stream::{FuturesUnordered, StreamExt};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::Body;

use super::{api_failure, check_batch, read_failure, send_failure, BatchContext, RetryPolicy};
use super::{TransportKind, UploadTransport};
use crate::progress::{ProgressHandle, ProgressReporter};
use crate::source::{open_stream, with_progress};

#[derive(Debug, Clone)]
pub struct DirectPutTransport {
    api: ApiClient,
    retry: RetryPolicy,
}

impl DirectPutTransport {
    pub fn new(api: ApiClient, retry: RetryPolicy) -> Self {
        Self { api, retry }
    }

    async fn upload_file(
        &self,
        ctx: &BatchContext<'_>,
        file: &MediaFile,
        file_id: &FileId,
        progress: &ProgressHandle,
    ) -> Result<String, TransportError> {
        let presigned = self
            .api
            .presign_upload(&PresignRequest {
                file_name: file.name.clone(),
                content_type: file.content_type.clone(),
                file_size: file.size,
                album_pin: ctx.album_pin.to_string(),
                category: ctx.category.to_string(),
            })
            .await
            .map_err(|e| api_failure(vec![file.name.clone()], &e))?;

        let reporter = progress.reporter(file_id.clone());
        let url = presigned.url.as_str();
        self.retry
            .run(&file.name, |_| self.put_object(url, file, reporter.clone()))
            .await?;

        progress.complete(file_id);
        tracing::debug!(
            file = %file.name,
            key = %presigned.key,
            bytes = file.size,
            "File uploaded"
        );
        Ok(presigned.key)
    }

    async fn put_object(
        &self,
        url: &str,
        file: &MediaFile,
        reporter: ProgressReporter,
    ) -> Result<(), TransportError> {
        let stream = open_stream(&file.source)
            .await
            .map_err(|e| read_failure(file, e))?;

        let response = self
            .api
            .client()
            .put(url)
            .header(CONTENT_TYPE, file.content_type.as_str())
            .header(CONTENT_LENGTH, file.size)
            .body(Body::wrap_stream(with_progress(stream, reporter, 0)))
            .send()
            .await
            .map_err(|e| send_failure(vec![file.name.clone()], e))?;

        error_for_status(response)
            .await
            .map_err(|e| api_failure(vec![file.name.clone()], &e))?;
        Ok(())
    }
}

#[async_trait]
impl UploadTransport for DirectPutTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::DirectPut
    }

    async fn upload_batch(
        &self,
        ctx: &BatchContext<'_>,
        files: &[MediaFile],
        progress: &ProgressHandle,
    ) -> Result<Vec<String>, TransportError> {
        check_batch(ctx, files)?;

        let mut pending: FuturesUnordered<_> = files
            .iter()
            .zip(ctx.file_ids)
            .enumerate()
            .map(|(index, (file, id))| async move {
                (index, self.upload_file(ctx, file, id, progress).await)
            })
            .collect();

        let mut keys: Vec<Option<String>> = vec![None; files.len()];
        while let Some((index, result)) = pending.next().await {
            match result {
                Ok(key) => keys[index] = Some(key),
                Err(err) => {
                    drop(pending);
                    let stored = keys
                        .into_iter()
                        .enumerate()
                        .filter_map(|(i, key)| {
                            key.map(|key| StoredObject {
                                file_id: ctx.file_ids[i].clone(),
                                file_name: files[i].name.clone(),
                                key,
                            })
                        })
                        .collect();
                    return Err(err.with_stored(stored));
                }
            }
        }

        Ok(keys.into_iter().flatten().collect())
    }
}
