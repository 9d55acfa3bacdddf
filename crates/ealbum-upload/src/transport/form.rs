//! Bulk upload: the whole batch as one multi-part form POST
//!
//! Form fields: `albumPin`, `categoryName`, then one `files` part per file in batch order.
//! The storage API answers with one link per file, in the same order.

use async_trait::async_trait;
use ealbum_api_client::ApiClient;
use ealbum_core::{MediaFile, TransportError};
use reqwest::multipart::{Form, Part};
use reqwest::Body;

use super::{api_failure, check_batch, file_names, read_failure, BatchContext};
use super::{TransportKind, UploadTransport};
use crate::progress::ProgressHandle;
use crate::source::{open_stream, with_progress};

#[derive(Debug, Clone)]
pub struct MultipartFormTransport {
    storage: ApiClient,
}

impl MultipartFormTransport {
    pub fn new(storage: ApiClient) -> Self {
        Self { storage }
    }

    async fn build_form(
        &self,
        ctx: &BatchContext<'_>,
        files: &[MediaFile],
        progress: &ProgressHandle,
    ) -> Result<Form, TransportError> {
        let mut form = Form::new()
            .text("albumPin", ctx.album_pin.to_string())
            .text("categoryName", ctx.category.to_string());

        for (file, id) in files.iter().zip(ctx.file_ids) {
            let stream = open_stream(&file.source)
                .await
                .map_err(|e| read_failure(file, e))?;
            let body = Body::wrap_stream(with_progress(stream, progress.reporter(id.clone()), 0));
            let part = Part::stream_with_length(body, file.size)
                .file_name(file.name.clone())
                .mime_str(&file.content_type)
                .map_err(|e| {
                    TransportError::for_file(
                        &file.name,
                        None,
                        format!("Invalid content type {}: {}", file.content_type, e),
                    )
                })?;
            form = form.part("files", part);
        }

        Ok(form)
    }
}

#[async_trait]
impl UploadTransport for MultipartFormTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::MultipartForm
    }

    async fn upload_batch(
        &self,
        ctx: &BatchContext<'_>,
        files: &[MediaFile],
        progress: &ProgressHandle,
    ) -> Result<Vec<String>, TransportError> {
        check_batch(ctx, files)?;
        if files.is_empty() {
            return Ok(Vec::new());
        }

        let form = self.build_form(ctx, files, progress).await?;
        let response = self
            .storage
            .ingest_files(form)
            .await
            .map_err(|e| api_failure(file_names(files), &e))?;

        // Keys are matched to files by position, so a short or long answer is unusable.
        if response.file_links.len() != files.len() {
            return Err(TransportError::new(
                file_names(files),
                None,
                format!(
                    "Storage returned {} file links for {} files",
                    response.file_links.len(),
                    files.len()
                ),
            ));
        }

        for id in ctx.file_ids {
            progress.complete(id);
        }
        tracing::debug!(
            category = %ctx.category,
            batch_index = ctx.batch_index,
            file_count = files.len(),
            "Batch ingested"
        );
        Ok(response.file_links)
    }
}
