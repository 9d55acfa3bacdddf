//! Domain methods for the eAlbum API client.
//!
//! Request and response shapes live in `ealbum_core::models`.

use crate::{ApiClient, ApiResult};
use ealbum_core::models::{
    AbortMultipartRequest, AlbumDescriptor, AlbumPayload, CompleteMultipartRequest,
    CompleteMultipartResponse, IngestResponse, InitiateMultipartRequest,
    InitiateMultipartResponse, PartUrlRequest, PartUrlResponse, PresignRequest, PresignResponse,
};
use reqwest::Method;

/// Header carrying the client-generated token for album creation
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

impl ApiClient {
    /// Request a pre-signed PUT URL for one file.
    pub async fn presign_upload(&self, request: &PresignRequest) -> ApiResult<PresignResponse> {
        self.post_json("/uploads/presign", request).await
    }

    /// Open a multipart upload for a large file.
    pub async fn initiate_multipart(
        &self,
        request: &InitiateMultipartRequest,
    ) -> ApiResult<InitiateMultipartResponse> {
        self.post_json("/uploads/multipart/initiate", request)
            .await
    }

    /// Request the pre-signed URL for one part of an open multipart upload.
    pub async fn multipart_part_url(&self, request: &PartUrlRequest) -> ApiResult<PartUrlResponse> {
        self.post_json("/uploads/multipart/part-url", request)
            .await
    }

    /// Assemble the uploaded parts into the final object.
    pub async fn complete_multipart(
        &self,
        request: &CompleteMultipartRequest,
    ) -> ApiResult<CompleteMultipartResponse> {
        self.post_json("/uploads/multipart/complete", request)
            .await
    }

    /// Abort an open multipart upload, releasing its parts.
    pub async fn abort_multipart(&self, request: &AbortMultipartRequest) -> ApiResult<()> {
        let builder = self
            .request(Method::POST, "/uploads/multipart/abort")
            .json(request);
        self.execute_empty(builder).await
    }

    /// Send a batch of files as one multi-part form to the bulk ingest endpoint.
    /// The response holds one link per file, in submission order.
    pub async fn ingest_files(&self, form: reqwest::multipart::Form) -> ApiResult<IngestResponse> {
        self.post_multipart("/files/bulk-upload", form).await
    }

    /// Create the album record pointing at the uploaded keys.
    pub async fn create_album(
        &self,
        payload: &AlbumPayload,
        idempotency_key: &str,
    ) -> ApiResult<AlbumDescriptor> {
        let builder = self
            .request(Method::POST, "/albums")
            .header(IDEMPOTENCY_KEY_HEADER, idempotency_key)
            .json(payload);
        self.execute(builder).await
    }
}
