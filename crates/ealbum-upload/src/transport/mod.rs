//! Upload transports
//!
//! A transport moves one batch of files from a category to storage and returns one storage
//! key per file, in input order. Three strategies exist:
//! - [`DirectPutTransport`]: one pre-signed PUT per file
//! - [`MultipartFormTransport`]: the whole batch as one multi-part form POST
//! - [`ChunkedTransport`]: each file split into parts, assembled server-side
//!
//! [`AutoTransport`] picks between form and chunked per file by size.

pub mod auto;
pub mod chunked;
pub mod direct;
pub mod form;
pub mod retry;

pub use auto::AutoTransport;
pub use chunked::{plan_parts, ChunkedTransport, PartRange};
pub use direct::DirectPutTransport;
pub use form::MultipartFormTransport;
pub use retry::RetryPolicy;

use async_trait::async_trait;
use ealbum_api_client::{ApiClient, ApiError};
use ealbum_core::{
    FileId, MediaFile, StoredObject, TransportError, TransportMode, UploaderConfig,
};
use std::fmt;
use std::num::NonZeroU64;
use std::sync::Arc;

use crate::progress::ProgressHandle;

/// Strategy implemented by a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    DirectPut,
    MultipartForm,
    Chunked,
    Auto,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportKind::DirectPut => "direct_put",
            TransportKind::MultipartForm => "multipart_form",
            TransportKind::Chunked => "chunked",
            TransportKind::Auto => "auto",
        };
        f.write_str(s)
    }
}

/// Where a batch belongs and how its files are identified for progress
#[derive(Debug, Clone, Copy)]
pub struct BatchContext<'a> {
    pub album_pin: &'a str,
    pub category: &'a str,
    /// One id per file in the batch, same order
    pub file_ids: &'a [FileId],
    pub batch_index: usize,
}

impl<'a> BatchContext<'a> {
    /// Context for the files `start..end` of this batch
    pub fn slice(&self, start: usize, end: usize) -> BatchContext<'a> {
        BatchContext {
            file_ids: &self.file_ids[start..end],
            ..*self
        }
    }
}

#[async_trait]
pub trait UploadTransport: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Upload every file of the batch. On success the returned keys correspond positionally
    /// to `files`. Progress is reported through `progress` under `ctx.file_ids`.
    async fn upload_batch(
        &self,
        ctx: &BatchContext<'_>,
        files: &[MediaFile],
        progress: &ProgressHandle,
    ) -> Result<Vec<String>, TransportError>;
}

/// Build the transport selected by `config.transport`.
pub fn transport_from_config(
    config: &UploaderConfig,
    backend: ApiClient,
    storage: ApiClient,
) -> Arc<dyn UploadTransport> {
    let part_size = NonZeroU64::new(config.part_size_bytes).unwrap_or(chunked::DEFAULT_PART_SIZE);
    match config.transport {
        TransportMode::Direct => Arc::new(DirectPutTransport::new(
            backend,
            RetryPolicy::from_config(config),
        )),
        TransportMode::Form => Arc::new(MultipartFormTransport::new(storage)),
        TransportMode::Chunked => Arc::new(ChunkedTransport::new(backend, part_size)),
        TransportMode::Auto => Arc::new(AutoTransport::new(
            MultipartFormTransport::new(storage),
            ChunkedTransport::new(backend, part_size),
            config.large_file_threshold_bytes,
        )),
    }
}

/// Map an API failure onto the files it affected.
pub(crate) fn api_failure(files: Vec<String>, err: &ApiError) -> TransportError {
    TransportError::new(files, err.status(), err.message())
}

pub(crate) fn file_names(files: &[MediaFile]) -> Vec<String> {
    files.iter().map(|f| f.name.clone()).collect()
}

pub(crate) fn read_failure(file: &MediaFile, err: std::io::Error) -> TransportError {
    TransportError::for_file(&file.name, None, format!("Failed to read file: {}", err))
}

pub(crate) fn send_failure(files: Vec<String>, err: reqwest::Error) -> TransportError {
    TransportError::new(files, err.status().map(|s| s.as_u16()), err.to_string())
}

/// Pair the first `keys.len()` files of a batch with the keys they were stored under.
pub(crate) fn stored_objects(
    ctx: &BatchContext<'_>,
    files: &[MediaFile],
    keys: &[String],
) -> Vec<StoredObject> {
    files
        .iter()
        .zip(ctx.file_ids)
        .zip(keys)
        .map(|((file, id), key)| StoredObject {
            file_id: id.clone(),
            file_name: file.name.clone(),
            key: key.clone(),
        })
        .collect()
}

/// Fail early when the caller passed mismatched ids and files.
pub(crate) fn check_batch(ctx: &BatchContext<'_>, files: &[MediaFile]) -> Result<(), TransportError> {
    if ctx.file_ids.len() != files.len() {
        return Err(TransportError::new(
            file_names(files),
            None,
            format!(
                "Batch has {} files but {} file ids",
                files.len(),
                ctx.file_ids.len()
            ),
        ));
    }
    Ok(())
}
