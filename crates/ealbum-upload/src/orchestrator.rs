//! Upload orchestrator
//!
//! Drives one album-creation session through
//! `Idle -> Validating -> Uploading -> Registering -> Succeeded`, or to `Failed` from any
//! active state. Categories and batches are processed strictly one at a time. The first
//! failure stops the session; objects already uploaded are not rolled back and are reported
//! as orphaned on the session instead.

use chrono::{DateTime, Utc};
use ealbum_api_client::{ApiClient, CredentialProvider};
use ealbum_core::validation::validate_for_upload;
use ealbum_core::{
    generate_access_pin, AlbumDescriptor, AlbumDraft, AlbumPayload, ErrorMetadata, FileId,
    LogLevel, ProgressPolicy, StoredObject, TransportError, UploadError, UploadStatus,
    UploaderConfig,
};
use serde::Serialize;
use std::fmt;
use std::num::NonZeroUsize;
use std::ops::Range;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::batcher::batches;
use crate::observer::{NoOpObserver, SessionObserver};
use crate::progress::{ProgressHandle, ProgressSnapshot};
use crate::registrar::{AlbumRegistrar, ApiAlbumRegistrar};
use crate::transport::{transport_from_config, BatchContext, TransportKind, UploadTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Validating,
    Uploading,
    Registering,
    Succeeded,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Succeeded | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::Validating => "validating",
            SessionState::Uploading => "uploading",
            SessionState::Registering => "registering",
            SessionState::Succeeded => "succeeded",
            SessionState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// State of one album-creation attempt
#[derive(Debug)]
pub struct UploadSession {
    id: Uuid,
    pin: String,
    state: SessionState,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    progress: ProgressHandle,
    orphaned: Vec<StoredObject>,
    album: Option<AlbumDescriptor>,
}

impl UploadSession {
    pub fn new() -> Self {
        Self::with_pin(generate_access_pin())
    }

    pub fn with_pin(pin: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            pin: pin.into(),
            state: SessionState::Idle,
            started_at: None,
            finished_at: None,
            progress: ProgressHandle::new(ProgressPolicy::default()),
            orphaned: Vec::new(),
            album: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Album access pin, sent with every upload and in the album payload
    pub fn pin(&self) -> &str {
        &self.pin
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Token sent with album creation; stable across retries of this session
    pub fn idempotency_key(&self) -> String {
        self.id.to_string()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn progress(&self) -> &ProgressHandle {
        &self.progress
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    /// Objects that reached storage in a failed attempt and were never registered
    pub fn orphaned(&self) -> &[StoredObject] {
        &self.orphaned
    }

    pub fn album(&self) -> Option<&AlbumDescriptor> {
        self.album.as_ref()
    }

    /// Return a failed session to `Idle` so it can run again with the same id and pin.
    /// Returns false if the session is not `Failed`.
    pub fn reset_for_retry(&mut self) -> bool {
        if self.state != SessionState::Failed {
            return false;
        }
        self.state = SessionState::Idle;
        self.started_at = None;
        self.finished_at = None;
        true
    }
}

impl Default for UploadSession {
    fn default() -> Self {
        Self::new()
    }
}

pub struct UploadOrchestrator {
    transport: Arc<dyn UploadTransport>,
    registrar: Arc<dyn AlbumRegistrar>,
    batch_size: NonZeroUsize,
    policy: ProgressPolicy,
    observer: Arc<dyn SessionObserver>,
}

impl fmt::Debug for UploadOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadOrchestrator")
            .field("transport", &self.transport.kind())
            .field("batch_size", &self.batch_size)
            .field("policy", &self.policy)
            .finish()
    }
}

impl UploadOrchestrator {
    pub fn new(
        transport: Arc<dyn UploadTransport>,
        registrar: Arc<dyn AlbumRegistrar>,
        batch_size: NonZeroUsize,
    ) -> Self {
        Self {
            transport,
            registrar,
            batch_size,
            policy: ProgressPolicy::default(),
            observer: Arc::new(NoOpObserver),
        }
    }

    pub fn with_progress_policy(mut self, policy: ProgressPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Wire the configured transport and the API registrar with injected credentials.
    pub fn from_config(
        config: &UploaderConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> anyhow::Result<Self> {
        let batch_size = NonZeroUsize::new(config.batch_size)
            .ok_or_else(|| anyhow::anyhow!("Batch size must be greater than zero"))?;
        let backend = ApiClient::backend(config, credentials.clone())?;
        let storage = ApiClient::storage(config, credentials)?;

        let transport = transport_from_config(config, backend.clone(), storage);
        let registrar = Arc::new(ApiAlbumRegistrar::new(backend));

        Ok(Self::new(transport, registrar, batch_size).with_progress_policy(config.progress_policy))
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.transport.kind()
    }

    pub fn batch_size(&self) -> NonZeroUsize {
        self.batch_size
    }

    pub fn start_session(&self) -> UploadSession {
        UploadSession::new()
    }

    /// Create a session and run it to completion.
    pub async fn save_album(
        &self,
        draft: &mut AlbumDraft,
    ) -> (UploadSession, Result<AlbumDescriptor, UploadError>) {
        let mut session = self.start_session();
        let result = self.run(&mut session, draft).await;
        (session, result)
    }

    pub async fn run(
        &self,
        session: &mut UploadSession,
        draft: &mut AlbumDraft,
    ) -> Result<AlbumDescriptor, UploadError> {
        self.run_with_cancel(session, draft, &CancellationToken::new())
            .await
    }

    /// Run an `Idle` session. Cancelling `cancel` drops the in-flight request and fails
    /// the session with [`UploadError::Cancelled`].
    pub async fn run_with_cancel(
        &self,
        session: &mut UploadSession,
        draft: &mut AlbumDraft,
        cancel: &CancellationToken,
    ) -> Result<AlbumDescriptor, UploadError> {
        if session.state != SessionState::Idle {
            return Err(UploadError::Internal(format!(
                "Session {} cannot start from state {}",
                session.id, session.state
            )));
        }

        session.started_at = Some(Utc::now());
        session.album = None;
        let observer = self.observer.clone();
        session.progress =
            ProgressHandle::new(self.policy).with_listener(move |snapshot| observer.on_progress(snapshot));

        let result = self.drive(session, draft, cancel).await;

        if let Err(err) = &result {
            if matches!(
                session.state,
                SessionState::Uploading | SessionState::Registering
            ) {
                session.orphaned.extend(
                    draft
                        .categories()
                        .iter()
                        .flat_map(|c| c.uploaded.iter().cloned()),
                );
                if let UploadError::Transport(transport) = err {
                    session.orphaned.extend(transport.stored.iter().cloned());
                }
            }
            log_failure(session, err);
        }

        let released = draft.release_previews();
        if released > 0 {
            tracing::debug!(session_id = %session.id, released = released, "Previews released");
        }

        match &result {
            Ok(album) => {
                session.album = Some(album.clone());
                self.transition(session, SessionState::Succeeded);
            }
            Err(_) => self.transition(session, SessionState::Failed),
        }
        session.finished_at = Some(Utc::now());
        self.observer.on_finished(result.as_ref());
        result
    }

    async fn drive(
        &self,
        session: &mut UploadSession,
        draft: &mut AlbumDraft,
        cancel: &CancellationToken,
    ) -> Result<AlbumDescriptor, UploadError> {
        self.transition(session, SessionState::Validating);
        validate_for_upload(draft)?;

        self.transition(session, SessionState::Uploading);
        draft.reset_uploads();
        for category in draft.categories() {
            for (index, file) in category.files.iter().enumerate() {
                session.progress.register(
                    FileId::new(&category.name, &file.name, index),
                    &category.name,
                    file.size,
                );
            }
        }
        self.upload_categories(session, draft, cancel).await?;

        self.transition(session, SessionState::Registering);
        let payload = AlbumPayload::from_draft(draft, &session.pin);
        let idempotency_key = session.idempotency_key();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(UploadError::Cancelled),
            result = self.registrar.create_album(&payload, &idempotency_key) => {
                let album = result?;
                tracing::info!(
                    session_id = %session.id,
                    album_name = %album.name,
                    album_code = %album.code,
                    image_count = payload.image_count(),
                    "Album registered"
                );
                Ok(album)
            }
        }
    }

    async fn upload_categories(
        &self,
        session: &UploadSession,
        draft: &mut AlbumDraft,
        cancel: &CancellationToken,
    ) -> Result<(), UploadError> {
        let pin = session.pin.as_str();
        let progress = &session.progress;

        for category in draft.categories_mut() {
            if category.is_empty() {
                continue;
            }
            let name = category.name.clone();
            let ids: Vec<FileId> = category
                .files
                .iter()
                .enumerate()
                .map(|(index, file)| FileId::new(&name, &file.name, index))
                .collect();
            let ranges: Vec<Range<usize>> = batches(&category.files, self.batch_size)
                .map(|batch| batch.range())
                .collect();

            tracing::info!(
                album_pin = %pin,
                category = %name,
                file_count = ids.len(),
                batch_count = ranges.len(),
                "Uploading category"
            );

            for (batch_index, range) in ranges.into_iter().enumerate() {
                for file in &mut category.files[range.clone()] {
                    file.status = UploadStatus::Uploading;
                }
                let ctx = BatchContext {
                    album_pin: pin,
                    category: &name,
                    file_ids: &ids[range.clone()],
                    batch_index,
                };
                tracing::debug!(
                    category = %name,
                    batch_index = batch_index,
                    batch_len = range.len(),
                    "Uploading batch"
                );

                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(UploadError::Cancelled),
                    result = self.transport.upload_batch(&ctx, &category.files[range.clone()], progress) => {
                        result.map_err(UploadError::from)
                    }
                };

                let checked = match outcome {
                    Ok(keys) => check_key_count(keys, category, &range),
                    Err(err) => Err(err),
                };
                let keys = match checked {
                    Ok(keys) => keys,
                    Err(err) => {
                        for file in &mut category.files[range] {
                            file.status = UploadStatus::Failed;
                        }
                        return Err(err);
                    }
                };

                for (index, key) in range.zip(keys) {
                    let file = &mut category.files[index];
                    file.assign_storage_key(key.clone())?;
                    file.release_preview();
                    progress.complete(&ids[index]);

                    let object = StoredObject {
                        file_id: ids[index].clone(),
                        file_name: file.name.clone(),
                        key,
                    };
                    self.observer.on_file_uploaded(&name, &object);
                    category.uploaded.push(object);
                }
            }
        }

        Ok(())
    }

    fn transition(&self, session: &mut UploadSession, to: SessionState) {
        let from = session.state;
        session.state = to;
        tracing::info!(
            session_id = %session.id,
            album_pin = %session.pin,
            from = %from,
            to = %to,
            "Upload session state changed"
        );
        self.observer.on_state_change(from, to);
    }
}

/// Keys are matched to files by position, so the count must be exact.
fn check_key_count(
    keys: Vec<String>,
    category: &ealbum_core::Category,
    range: &Range<usize>,
) -> Result<Vec<String>, UploadError> {
    if keys.len() == range.len() {
        return Ok(keys);
    }
    let files = category.files[range.clone()]
        .iter()
        .map(|f| f.name.clone())
        .collect();
    Err(TransportError::new(
        files,
        None,
        format!("Transport returned {} keys for {} files", keys.len(), range.len()),
    )
    .into())
}

fn log_failure(session: &UploadSession, err: &UploadError) {
    let files = err.files().join(", ");
    match err.log_level() {
        LogLevel::Debug => tracing::debug!(
            session_id = %session.id,
            error_code = err.error_code(),
            stage = %err.stage(),
            error = %err,
            "Upload session rejected"
        ),
        LogLevel::Warn => tracing::warn!(
            session_id = %session.id,
            error_code = err.error_code(),
            stage = %err.stage(),
            error = %err,
            "Upload session stopped"
        ),
        LogLevel::Error => tracing::error!(
            session_id = %session.id,
            error_code = err.error_code(),
            stage = %err.stage(),
            status = ?err.status(),
            files = %files,
            orphaned = session.orphaned.len(),
            error = %err,
            "Upload session failed"
        ),
    }
}
