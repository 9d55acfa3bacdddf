//! Size-based transport selection
//!
//! Files at or above the threshold go through [`ChunkedTransport`]; runs of smaller files go
//! through [`MultipartFormTransport`]. Runs are contiguous, so returned keys stay in file order.

use async_trait::async_trait;
use ealbum_core::{MediaFile, TransportError};

use super::{check_batch, stored_objects, BatchContext, ChunkedTransport, MultipartFormTransport};
use super::{TransportKind, UploadTransport};
use crate::progress::ProgressHandle;

#[derive(Debug, Clone)]
pub struct AutoTransport {
    form: MultipartFormTransport,
    chunked: ChunkedTransport,
    threshold: u64,
}

impl AutoTransport {
    pub fn new(form: MultipartFormTransport, chunked: ChunkedTransport, threshold: u64) -> Self {
        Self {
            form,
            chunked,
            threshold,
        }
    }

    pub fn is_large(&self, file: &MediaFile) -> bool {
        file.size >= self.threshold
    }
}

/// Split `files` into maximal runs `(start, end, large)` of equal size class.
fn runs<F>(files: &[MediaFile], is_large: F) -> Vec<(usize, usize, bool)>
where
    F: Fn(&MediaFile) -> bool,
{
    let mut out: Vec<(usize, usize, bool)> = Vec::new();
    for (i, file) in files.iter().enumerate() {
        let large = is_large(file);
        match out.last_mut() {
            Some((_, end, class)) if *class == large => *end = i + 1,
            _ => out.push((i, i + 1, large)),
        }
    }
    out
}

#[async_trait]
impl UploadTransport for AutoTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Auto
    }

    async fn upload_batch(
        &self,
        ctx: &BatchContext<'_>,
        files: &[MediaFile],
        progress: &ProgressHandle,
    ) -> Result<Vec<String>, TransportError> {
        check_batch(ctx, files)?;

        let mut keys = Vec::with_capacity(files.len());
        for (start, end, large) in runs(files, |f| self.is_large(f)) {
            let sub = ctx.slice(start, end);
            let chunk = &files[start..end];
            let uploaded = if large {
                self.chunked.upload_batch(&sub, chunk, progress).await
            } else {
                self.form.upload_batch(&sub, chunk, progress).await
            };
            match uploaded {
                Ok(uploaded) => keys.extend(uploaded),
                Err(err) => return Err(err.with_stored(stored_objects(ctx, files, &keys))),
            }
        }
        Ok(keys)
    }
}
