//! eAlbum Core Library
//!
//! This crate provides the domain models, error types, configuration, and validation
//! shared by the API client, the upload orchestrator, and the CLI.

pub mod config;
pub mod error;
pub mod models;
pub mod pin;
pub mod preview;
pub mod validation;

// Re-export commonly used types
pub use config::{ProgressPolicy, TransportMode, UploaderConfig};
pub use error::{
    CleanupState, ErrorMetadata, FailedStage, LogLevel, MultipartAbortError, RegistrationError,
    TransportError, UploadError, ValidationError,
};
pub use models::{
    AlbumDescriptor, AlbumDetails, AlbumDraft, AlbumPayload, Category, ContactPerson, FileId,
    MediaFile, MediaSource, StoredObject, UploadStatus,
};
pub use pin::generate_access_pin;
pub use preview::{PreviewHandle, PreviewRegistry};
