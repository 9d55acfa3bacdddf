//! Error types module
//!
//! Every failure an album upload session can surface is unified under [`UploadError`].
//! The orchestrator catches lower-layer errors, stops the session, and returns exactly one
//! of these to its caller. Each variant wraps a stage-specific error:
//!
//! - [`ValidationError`]: the draft is incomplete; nothing was sent over the network.
//! - [`TransportError`]: a file or batch failed to reach storage.
//! - [`RegistrationError`]: every upload succeeded but the album record could not be created.
//!
//! [`MultipartAbortError`] never surfaces on its own. It is logged and attached to the
//! [`TransportError`] whose cleanup it was part of.

use std::fmt;
use std::io;

use crate::models::StoredObject;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like a cancelled session
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Session stage an error originated from. Shown to the user in the failure notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedStage {
    Validation,
    Upload,
    Registration,
    Session,
}

impl fmt::Display for FailedStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailedStage::Validation => "validation",
            FailedStage::Upload => "upload",
            FailedStage::Registration => "registration",
            FailedStage::Session => "session",
        };
        f.write_str(name)
    }
}

/// Metadata describing how an error should be presented to the user
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "TRANSPORT_ERROR")
    fn error_code(&self) -> &'static str;

    /// Stage of the session that failed
    fn stage(&self) -> FailedStage;

    /// Whether the user can retry the session after correcting input or waiting
    fn is_recoverable(&self) -> bool;

    /// Single user-facing notification message
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

/// Problems with the album draft, detected before any network call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No category contains any file")]
    NoFiles,

    #[error("Category already exists: {0}")]
    DuplicateCategory(String),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),
}

fn is_missing_value(err: &validator::ValidationError) -> bool {
    match err.code.as_ref() {
        "required" => true,
        "length" => err
            .params
            .get("value")
            .and_then(|v| v.as_str())
            .map_or(true, |v| v.trim().is_empty()),
        _ => false,
    }
}

impl From<validator::ValidationErrors> for ValidationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field_errors = errors.field_errors();
        let mut fields: Vec<_> = field_errors.iter().collect();
        fields.sort_by(|a, b| a.0.cmp(b.0));

        // Only empty required values are missing; over-long ones are invalid input.
        for (field, errs) in &fields {
            if errs.iter().any(is_missing_value) {
                return ValidationError::MissingField(field.to_string());
            }
        }

        ValidationError::InvalidInput(format!("Validation error: {}", errors))
    }
}

/// Failure while releasing server-side multipart state after a part upload failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Failed to abort multipart upload {upload_id}: {message}")]
pub struct MultipartAbortError {
    pub upload_id: String,
    pub status: Option<u16>,
    pub message: String,
}

/// Whether a failed transfer left partial server-side state behind
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CleanupState {
    /// No server-side state was opened
    #[default]
    NotRequired,
    /// An open multipart upload existed and was aborted
    Aborted { upload_id: String },
    /// An open multipart upload existed and aborting it failed; storage may leak the parts
    AbortFailed {
        upload_id: String,
        error: MultipartAbortError,
    },
}

impl CleanupState {
    /// Whether server-side state still needs manual cleanup
    pub fn needs_cleanup(&self) -> bool {
        matches!(self, CleanupState::AbortFailed { .. })
    }

    pub fn upload_id(&self) -> Option<&str> {
        match self {
            CleanupState::NotRequired => None,
            CleanupState::Aborted { upload_id } | CleanupState::AbortFailed { upload_id, .. } => {
                Some(upload_id)
            }
        }
    }
}

/// A single file or batch failed to reach storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    /// Display names of the files involved in the failed transfer
    pub files: Vec<String>,
    /// HTTP status returned by the endpoint, if a response was received
    pub status: Option<u16>,
    pub message: String,
    pub cleanup: CleanupState,
    /// Files of the same batch that did reach storage before the failure
    pub stored: Vec<StoredObject>,
}

impl TransportError {
    pub fn new(files: Vec<String>, status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            files,
            status,
            message: message.into(),
            cleanup: CleanupState::NotRequired,
            stored: Vec::new(),
        }
    }

    pub fn for_file(file: &str, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::new(vec![file.to_string()], status, message)
    }

    pub fn with_cleanup(mut self, cleanup: CleanupState) -> Self {
        self.cleanup = cleanup;
        self
    }

    /// Record objects stored before the failure, ahead of any already recorded.
    pub fn with_stored(mut self, mut stored: Vec<StoredObject>) -> Self {
        stored.append(&mut self.stored);
        self.stored = stored;
        self
    }

    /// Whether the failure is worth retrying at the transport layer
    pub fn is_transient(&self) -> bool {
        match self.status {
            None => true,
            Some(status) => status == 408 || status == 429 || status >= 500,
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Upload of [{}] failed", self.files.join(", "))?;
        if let Some(status) = self.status {
            write!(f, " with status {}", status)?;
        }
        write!(f, ": {}", self.message)?;
        if let CleanupState::AbortFailed { error, .. } = &self.cleanup {
            write!(f, " ({})", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for TransportError {}

/// Album metadata submission failed after every upload succeeded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationError {
    pub status: Option<u16>,
    /// Message reported by the backend, or the local failure description
    pub message: String,
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Album registration failed")?;
        if let Some(status) = self.status {
            write!(f, " with status {}", status)?;
        }
        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for RegistrationError {}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error("Upload session was cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<io::Error> for UploadError {
    fn from(err: io::Error) -> Self {
        UploadError::Internal(format!("IO error: {}", err))
    }
}

impl From<validator::ValidationErrors> for UploadError {
    fn from(err: validator::ValidationErrors) -> Self {
        UploadError::Validation(err.into())
    }
}

/// Static metadata for each variant: (error_code, stage, recoverable, log_level).
fn upload_error_static_metadata(err: &UploadError) -> (&'static str, FailedStage, bool, LogLevel) {
    match err {
        UploadError::Validation(_) => (
            "VALIDATION_ERROR",
            FailedStage::Validation,
            true,
            LogLevel::Debug,
        ),
        UploadError::Transport(_) => (
            "TRANSPORT_ERROR",
            FailedStage::Upload,
            true,
            LogLevel::Error,
        ),
        UploadError::Registration(_) => (
            "REGISTRATION_ERROR",
            FailedStage::Registration,
            true,
            LogLevel::Error,
        ),
        UploadError::Cancelled => ("CANCELLED", FailedStage::Session, true, LogLevel::Warn),
        UploadError::Internal(_) => (
            "INTERNAL_ERROR",
            FailedStage::Session,
            false,
            LogLevel::Error,
        ),
    }
}

impl UploadError {
    /// File names involved in the failure, if any
    pub fn files(&self) -> &[String] {
        match self {
            UploadError::Transport(e) => &e.files,
            _ => &[],
        }
    }

    /// HTTP status behind the failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            UploadError::Transport(e) => e.status,
            UploadError::Registration(e) => e.status,
            _ => None,
        }
    }
}

impl ErrorMetadata for UploadError {
    fn error_code(&self) -> &'static str {
        upload_error_static_metadata(self).0
    }

    fn stage(&self) -> FailedStage {
        upload_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        upload_error_static_metadata(self).2
    }

    fn log_level(&self) -> LogLevel {
        upload_error_static_metadata(self).3
    }

    fn client_message(&self) -> String {
        match self {
            UploadError::Validation(e) => format!("Please check the album details: {}", e),
            UploadError::Transport(e) => match e.files.first() {
                Some(file) if e.files.len() == 1 => format!("Upload failed for {}", file),
                Some(file) => format!(
                    "Upload failed for {} and {} other file(s)",
                    file,
                    e.files.len() - 1
                ),
                None => "Upload failed".to_string(),
            },
            UploadError::Registration(e) => format!("Failed to create album: {}", e.message),
            UploadError::Cancelled => "Upload cancelled".to_string(),
            UploadError::Internal(_) => "Something went wrong while saving the album".to_string(),
        }
    }
}
