//! Upload progress tracking
//!
//! [`ProgressTracker`] keeps the latest known byte count per file and rolls it up into
//! per-category and overall percentages. Updates overwrite the stored value and never add
//! deltas, so progress events may arrive repeatedly and out of order.
//!
//! The overall percentage never decreases within a session and only reaches 100 once every
//! file is complete.

use ealbum_core::{FileId, ProgressPolicy};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Progress of a single file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FileProgress {
    pub progress_percent: u8,
    pub bytes_uploaded: u64,
    pub total_bytes: u64,
    pub complete: bool,
}

/// Point-in-time view of a session's progress
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ProgressSnapshot {
    pub overall_percent: u8,
    pub files_processed: usize,
    pub total_files: usize,
    pub bytes_uploaded: u64,
    pub total_bytes: u64,
}

#[derive(Debug)]
struct TrackedFile {
    category: String,
    progress: FileProgress,
}

#[derive(Debug)]
pub struct ProgressTracker {
    policy: ProgressPolicy,
    files: HashMap<FileId, TrackedFile>,
    total_bytes: u64,
    uploaded_bytes: u64,
    files_processed: usize,
    overall_percent: u8,
}

impl ProgressTracker {
    pub fn new(policy: ProgressPolicy) -> Self {
        Self {
            policy,
            files: HashMap::new(),
            total_bytes: 0,
            uploaded_bytes: 0,
            files_processed: 0,
            overall_percent: 0,
        }
    }

    pub fn policy(&self) -> ProgressPolicy {
        self.policy
    }

    /// Start tracking a file. Registering an id twice keeps the first registration.
    pub fn register(&mut self, file_id: FileId, category: &str, total_bytes: u64) {
        if self.files.contains_key(&file_id) {
            tracing::warn!(file_id = %file_id, "File registered twice, keeping first registration");
            return;
        }
        self.total_bytes += total_bytes;
        self.files.insert(
            file_id,
            TrackedFile {
                category: category.to_string(),
                progress: FileProgress {
                    total_bytes,
                    ..Default::default()
                },
            },
        );
        self.recompute();
    }

    /// Record the latest byte count for a file. Returns the overall percentage.
    ///
    /// Counts beyond the file size are clamped; counts below the best value seen so far are
    /// stale events and leave the entry unchanged.
    pub fn update(&mut self, file_id: &FileId, bytes_uploaded: u64) -> u8 {
        if let Some(tracked) = self.files.get_mut(file_id) {
            let progress = &mut tracked.progress;
            let bytes = bytes_uploaded.min(progress.total_bytes);
            if bytes > progress.bytes_uploaded {
                self.uploaded_bytes += bytes - progress.bytes_uploaded;
                progress.bytes_uploaded = bytes;
                progress.progress_percent = file_percent(progress);
            }
        }
        self.recompute();
        self.overall_percent
    }

    /// Mark a file as fully uploaded. Returns the overall percentage.
    pub fn complete(&mut self, file_id: &FileId) -> u8 {
        if let Some(tracked) = self.files.get_mut(file_id) {
            let progress = &mut tracked.progress;
            if !progress.complete {
                self.uploaded_bytes += progress.total_bytes - progress.bytes_uploaded;
                progress.bytes_uploaded = progress.total_bytes;
                progress.complete = true;
                progress.progress_percent = 100;
                self.files_processed += 1;
            }
        }
        self.recompute();
        self.overall_percent
    }

    pub fn file(&self, file_id: &FileId) -> Option<FileProgress> {
        self.files.get(file_id).map(|t| t.progress)
    }

    pub fn overall_percent(&self) -> u8 {
        self.overall_percent
    }

    pub fn files_processed(&self) -> usize {
        self.files_processed
    }

    pub fn total_files(&self) -> usize {
        self.files.len()
    }

    /// Percentage of a single category, under the tracker's policy
    pub fn category_percent(&self, category: &str) -> u8 {
        let mut total_bytes = 0u64;
        let mut uploaded = 0u64;
        let mut files = 0usize;
        let mut done = 0usize;
        for tracked in self.files.values().filter(|t| t.category == category) {
            total_bytes += tracked.progress.total_bytes;
            uploaded += tracked.progress.bytes_uploaded;
            files += 1;
            done += usize::from(tracked.progress.complete);
        }
        rollup(self.policy, uploaded, total_bytes, done, files)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            overall_percent: self.overall_percent,
            files_processed: self.files_processed,
            total_files: self.files.len(),
            bytes_uploaded: self.uploaded_bytes,
            total_bytes: self.total_bytes,
        }
    }

    fn recompute(&mut self) {
        let percent = rollup(
            self.policy,
            self.uploaded_bytes,
            self.total_bytes,
            self.files_processed,
            self.files.len(),
        );
        self.overall_percent = self.overall_percent.max(percent);
    }
}

fn file_percent(progress: &FileProgress) -> u8 {
    if progress.complete {
        return 100;
    }
    if progress.total_bytes == 0 {
        return 0;
    }
    capped_percent(progress.bytes_uploaded, progress.total_bytes, false)
}

/// Roll progress up into a percentage. Exactly 100 only when every file is complete.
fn rollup(policy: ProgressPolicy, uploaded: u64, total_bytes: u64, done: usize, files: usize) -> u8 {
    if files == 0 {
        return 0;
    }
    let all_done = done == files;
    match policy {
        ProgressPolicy::Bytes if total_bytes > 0 => capped_percent(uploaded, total_bytes, all_done),
        // Zero-byte sessions have nothing to weigh by size.
        ProgressPolicy::Bytes | ProgressPolicy::Count => {
            capped_percent(done as u64, files as u64, all_done)
        }
    }
}

fn capped_percent(done: u64, total: u64, all_done: bool) -> u8 {
    if all_done {
        return 100;
    }
    let percent = ((done as f64 / total as f64) * 100.0).round() as u8;
    percent.min(99)
}

type ProgressListener = Arc<dyn Fn(&ProgressSnapshot) + Send + Sync>;

/// Shared, thread-safe handle to a session's tracker
#[derive(Clone)]
pub struct ProgressHandle {
    tracker: Arc<Mutex<ProgressTracker>>,
    listener: Option<ProgressListener>,
}

impl ProgressHandle {
    pub fn new(policy: ProgressPolicy) -> Self {
        Self {
            tracker: Arc::new(Mutex::new(ProgressTracker::new(policy))),
            listener: None,
        }
    }

    /// Call `listener` whenever the overall percentage changes.
    pub fn with_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(&ProgressSnapshot) + Send + Sync + 'static,
    {
        self.listener = Some(Arc::new(listener));
        self
    }

    fn lock(&self) -> MutexGuard<'_, ProgressTracker> {
        self.tracker.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn register(&self, file_id: FileId, category: &str, total_bytes: u64) {
        self.lock().register(file_id, category, total_bytes);
    }

    pub fn update(&self, file_id: &FileId, bytes_uploaded: u64) {
        self.apply(|tracker| tracker.update(file_id, bytes_uploaded));
    }

    pub fn complete(&self, file_id: &FileId) {
        self.apply(|tracker| tracker.complete(file_id));
    }

    fn apply<F>(&self, op: F)
    where
        F: FnOnce(&mut ProgressTracker) -> u8,
    {
        let notify = {
            let mut tracker = self.lock();
            let before = tracker.overall_percent();
            let after = op(&mut tracker);
            (after != before).then(|| tracker.snapshot())
        };
        // The listener runs outside the lock so it may read the handle.
        if let (Some(snapshot), Some(listener)) = (notify, &self.listener) {
            listener(&snapshot);
        }
    }

    pub fn file(&self, file_id: &FileId) -> Option<FileProgress> {
        self.lock().file(file_id)
    }

    pub fn category_percent(&self, category: &str) -> u8 {
        self.lock().category_percent(category)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.lock().snapshot()
    }

    /// Reporter bound to one file, for transports to call with cumulative byte counts
    pub fn reporter(&self, file_id: FileId) -> ProgressReporter {
        ProgressReporter {
            handle: self.clone(),
            file_id,
        }
    }
}

impl fmt::Debug for ProgressHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressHandle")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

/// Reports `(file_id, bytes_sent)` updates for a single file
#[derive(Clone, Debug)]
pub struct ProgressReporter {
    handle: ProgressHandle,
    file_id: FileId,
}

impl ProgressReporter {
    pub fn report(&self, bytes_sent: u64) {
        self.handle.update(&self.file_id, bytes_sent);
    }

    pub fn file_id(&self) -> &FileId {
        &self.file_id
    }
}

/// Minimum spacing between rate samples
pub const MIN_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Estimated time to completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eta {
    Calculating,
    Remaining(Duration),
}

impl fmt::Display for Eta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Eta::Calculating => f.write_str("Calculating…"),
            Eta::Remaining(d) => {
                let secs = d.as_secs();
                if secs >= 3600 {
                    write!(f, "{}h {:02}m", secs / 3600, (secs % 3600) / 60)
                } else if secs >= 60 {
                    write!(f, "{}m {:02}s", secs / 60, secs % 60)
                } else {
                    write!(f, "{}s", secs)
                }
            }
        }
    }
}

/// Upload speed and ETA from byte-count samples taken at least one second apart
#[derive(Debug, Default)]
pub struct RateEstimator {
    last_sample: Option<(Instant, u64)>,
    bytes_per_sec: Option<f64>,
}

impl RateEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a sample. Samples closer than [`MIN_SAMPLE_INTERVAL`] to the previous accepted
    /// one are ignored. Returns the current speed estimate.
    pub fn sample(&mut self, at: Instant, bytes_uploaded: u64) -> Option<f64> {
        match self.last_sample {
            None => self.last_sample = Some((at, bytes_uploaded)),
            Some((last_at, last_bytes)) => {
                let elapsed = at.saturating_duration_since(last_at);
                if elapsed >= MIN_SAMPLE_INTERVAL {
                    let delta = bytes_uploaded.saturating_sub(last_bytes);
                    self.bytes_per_sec = Some(delta as f64 / elapsed.as_secs_f64());
                    self.last_sample = Some((at, bytes_uploaded));
                }
            }
        }
        self.bytes_per_sec
    }

    pub fn bytes_per_sec(&self) -> Option<f64> {
        self.bytes_per_sec
    }

    pub fn eta(&self, remaining_bytes: u64) -> Eta {
        match self.bytes_per_sec {
            Some(speed) if speed > 0.0 => {
                Eta::Remaining(Duration::from_secs_f64(remaining_bytes as f64 / speed))
            }
            _ => Eta::Calculating,
        }
    }
}
