//! Album registration
//!
//! Submits the album metadata and the uploaded storage keys as one record. Called only after
//! every upload of a session succeeded.

use async_trait::async_trait;
use ealbum_api_client::ApiClient;
use ealbum_core::{AlbumDescriptor, AlbumPayload, RegistrationError};

#[async_trait]
pub trait AlbumRegistrar: Send + Sync {
    /// Create the album. `idempotency_key` is the same for every retry of one session.
    async fn create_album(
        &self,
        payload: &AlbumPayload,
        idempotency_key: &str,
    ) -> Result<AlbumDescriptor, RegistrationError>;
}

/// Registers albums through the backend API
#[derive(Debug, Clone)]
pub struct ApiAlbumRegistrar {
    api: ApiClient,
}

impl ApiAlbumRegistrar {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl AlbumRegistrar for ApiAlbumRegistrar {
    async fn create_album(
        &self,
        payload: &AlbumPayload,
        idempotency_key: &str,
    ) -> Result<AlbumDescriptor, RegistrationError> {
        tracing::debug!(
            album_name = %payload.album_name,
            image_count = payload.image_count(),
            "Registering album"
        );

        self.api
            .create_album(payload, idempotency_key)
            .await
            .map_err(|e| RegistrationError {
                status: e.status(),
                message: e.message(),
            })
    }
}
