//! Session observer hooks
//!
//! Callers implement [`SessionObserver`] to follow a session: state transitions, progress and
//! per-file results. Every method has an empty default.

use ealbum_core::{AlbumDescriptor, StoredObject, UploadError};

use crate::orchestrator::SessionState;
use crate::progress::ProgressSnapshot;

pub trait SessionObserver: Send + Sync {
    fn on_state_change(&self, _from: SessionState, _to: SessionState) {}

    fn on_progress(&self, _snapshot: &ProgressSnapshot) {}

    fn on_file_uploaded(&self, _category: &str, _object: &StoredObject) {}

    fn on_finished(&self, _result: Result<&AlbumDescriptor, &UploadError>) {}
}

/// Observer that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl SessionObserver for NoOpObserver {}
