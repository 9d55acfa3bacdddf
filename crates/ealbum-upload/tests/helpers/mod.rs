//! Test helpers: in-memory transport, registrar and observer fakes plus draft fixtures.
//!
//! Run from workspace root: `cargo test -p ealbum-upload`.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use ealbum_core::{
    AlbumDescriptor, AlbumDetails, AlbumDraft, AlbumPayload, MediaFile, RegistrationError,
    StoredObject, TransportError, UploadError,
};
use ealbum_upload::{
    BatchContext, ProgressHandle, ProgressSnapshot, SessionObserver, SessionState, TransportKind,
    UploadTransport,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// One recorded `upload_batch` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchCall {
    pub album_pin: String,
    pub category: String,
    pub batch_index: usize,
    pub files: Vec<String>,
}

/// Transport that stores nothing: returns `albums/{pin}/{category}/{file}` keys,
/// optionally failing the N-th call (0-based) or stalling every call.
#[derive(Default)]
pub struct FakeTransport {
    calls: Mutex<Vec<BatchCall>>,
    fail_on: Option<(usize, u16)>,
    delay: Option<Duration>,
    short_by: usize,
    partial: bool,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(call: usize, status: u16) -> Self {
        Self {
            fail_on: Some((call, status)),
            ..Self::default()
        }
    }

    /// Like `failing_on`, but the failing call stores its first file before giving up
    pub fn failing_after_first(call: usize, status: u16) -> Self {
        Self {
            fail_on: Some((call, status)),
            partial: true,
            ..Self::default()
        }
    }

    pub fn stalling(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Return `n` fewer keys than files
    pub fn dropping_keys(n: usize) -> Self {
        Self {
            short_by: n,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<BatchCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl UploadTransport for FakeTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::MultipartForm
    }

    async fn upload_batch(
        &self,
        ctx: &BatchContext<'_>,
        files: &[MediaFile],
        progress: &ProgressHandle,
    ) -> Result<Vec<String>, TransportError> {
        let names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
        let call_index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(BatchCall {
                album_pin: ctx.album_pin.to_string(),
                category: ctx.category.to_string(),
                batch_index: ctx.batch_index,
                files: names.clone(),
            });
            calls.len() - 1
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some((fail_call, status)) = self.fail_on {
            if fail_call == call_index {
                if !self.partial {
                    return Err(TransportError::new(names, Some(status), "Internal Server Error"));
                }
                let stored = StoredObject {
                    file_id: ctx.file_ids[0].clone(),
                    file_name: files[0].name.clone(),
                    key: format!("albums/{}/{}/{}", ctx.album_pin, ctx.category, files[0].name),
                };
                return Err(
                    TransportError::new(names[1..].to_vec(), Some(status), "Internal Server Error")
                        .with_stored(vec![stored]),
                );
            }
        }

        // Interleaved, partly stale progress events, as a real transport may emit.
        for (file, id) in files.iter().zip(ctx.file_ids) {
            progress.update(id, file.size / 2);
            progress.update(id, file.size / 4);
        }

        let keys: Vec<String> = files
            .iter()
            .map(|f| format!("albums/{}/{}/{}", ctx.album_pin, ctx.category, f.name))
            .collect();
        let keep = keys.len().saturating_sub(self.short_by);
        Ok(keys.into_iter().take(keep).collect())
    }
}

/// Registrar that records payloads and answers with the payload's pin as album code
#[derive(Default)]
pub struct FakeRegistrar {
    payloads: Mutex<Vec<(AlbumPayload, String)>>,
    failure: Option<RegistrationError>,
}

impl FakeRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(status: u16, message: &str) -> Self {
        Self {
            failure: Some(RegistrationError {
                status: Some(status),
                message: message.to_string(),
            }),
            ..Self::default()
        }
    }

    pub fn payloads(&self) -> Vec<(AlbumPayload, String)> {
        self.payloads.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.payloads.lock().unwrap().len()
    }
}

#[async_trait]
impl ealbum_upload::AlbumRegistrar for FakeRegistrar {
    async fn create_album(
        &self,
        payload: &AlbumPayload,
        idempotency_key: &str,
    ) -> Result<AlbumDescriptor, RegistrationError> {
        self.payloads
            .lock()
            .unwrap()
            .push((payload.clone(), idempotency_key.to_string()));

        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(AlbumDescriptor {
                name: payload.album_name.clone(),
                code: payload.pin.clone(),
            }),
        }
    }
}

/// Observer that records what it is told
#[derive(Default)]
pub struct RecordingObserver {
    pub transitions: Mutex<Vec<(SessionState, SessionState)>>,
    pub progress: Mutex<Vec<u8>>,
    pub uploaded: Mutex<Vec<StoredObject>>,
    pub finished: AtomicUsize,
}

impl RecordingObserver {
    pub fn states(&self) -> Vec<SessionState> {
        self.transitions
            .lock()
            .unwrap()
            .iter()
            .map(|(_, to)| *to)
            .collect()
    }

    pub fn progress_values(&self) -> Vec<u8> {
        self.progress.lock().unwrap().clone()
    }

    pub fn finished_count(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

impl SessionObserver for RecordingObserver {
    fn on_state_change(&self, from: SessionState, to: SessionState) {
        self.transitions.lock().unwrap().push((from, to));
    }

    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        self.progress.lock().unwrap().push(snapshot.overall_percent);
    }

    fn on_file_uploaded(&self, _category: &str, object: &StoredObject) {
        self.uploaded.lock().unwrap().push(object.clone());
    }

    fn on_finished(&self, _result: Result<&AlbumDescriptor, &UploadError>) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn details() -> AlbumDetails {
    AlbumDetails {
        album_name: "Spring Wedding".to_string(),
        studio_name: "Lumen Studio".to_string(),
        sender_emails: vec!["desk@lumen.example".to_string()],
        single_sided: true,
        ..Default::default()
    }
}

pub fn media(name: &str, size: usize) -> MediaFile {
    MediaFile::in_memory(name, None, Bytes::from(vec![7u8; size]))
}

/// Draft with one category per `(name, file_count)`; files are named `{category}-{i}.jpg`.
pub fn draft(categories: &[(&str, usize)]) -> AlbumDraft {
    let mut draft = AlbumDraft::new(details());
    for (category, count) in categories {
        draft.add_category(*category).unwrap();
        for i in 0..*count {
            draft
                .add_file(category, media(&format!("{}-{}.jpg", category, i), 1000 + i))
                .unwrap();
        }
    }
    draft
}
