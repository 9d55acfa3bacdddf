//! Progress reporting for the CLI

use ealbum_core::StoredObject;
use ealbum_upload::{ProgressSnapshot, RateEstimator, SessionObserver, SessionState};
use std::sync::Mutex;
use std::time::Instant;

use crate::format_bytes;

/// Logs session transitions and progress with upload speed and ETA.
#[derive(Debug, Default)]
pub struct CliObserver {
    rate: Mutex<RateEstimator>,
}

impl CliObserver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionObserver for CliObserver {
    fn on_state_change(&self, from: SessionState, to: SessionState) {
        tracing::debug!(from = %from, to = %to, "Session state changed");
    }

    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        let mut rate = self.rate.lock().unwrap_or_else(|e| e.into_inner());
        let speed = rate.sample(Instant::now(), snapshot.bytes_uploaded);
        let eta = rate.eta(snapshot.total_bytes.saturating_sub(snapshot.bytes_uploaded));

        tracing::info!(
            percent = snapshot.overall_percent,
            files = %format!("{}/{}", snapshot.files_processed, snapshot.total_files),
            uploaded = %format_bytes(snapshot.bytes_uploaded),
            total = %format_bytes(snapshot.total_bytes),
            speed = %speed.map(|s| format!("{}/s", format_bytes(s as u64))).unwrap_or_else(|| "-".to_string()),
            eta = %eta,
            "Upload progress"
        );
    }

    fn on_file_uploaded(&self, category: &str, object: &StoredObject) {
        tracing::debug!(category = %category, file = %object.file_name, key = %object.key, "File stored");
    }
}
