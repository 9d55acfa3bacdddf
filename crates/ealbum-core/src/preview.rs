//! Local preview handles
//!
//! Each selected file gets a revocable preview handle (the equivalent of a browser object URL).
//! A handle is move-only and is released exactly once: explicitly through
//! [`PreviewHandle::release`], or when it is dropped with the file or draft that owns it.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct PreviewInner {
    next_id: AtomicU64,
    live: Mutex<HashSet<u64>>,
    released: AtomicU64,
}

impl PreviewInner {
    fn live(&self) -> std::sync::MutexGuard<'_, HashSet<u64>> {
        self.live.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Issues preview handles and tracks how many are still live
#[derive(Clone, Default)]
pub struct PreviewRegistry {
    inner: Arc<PreviewInner>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, file_name: &str) -> PreviewHandle {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.inner.live().insert(id);
        PreviewHandle {
            id,
            url: format!("preview://{}/{}", id, file_name),
            registry: Arc::clone(&self.inner),
        }
    }

    /// Number of handles created and not yet released
    pub fn live_count(&self) -> usize {
        self.inner.live().len()
    }

    /// Number of handles released over the registry's lifetime
    pub fn released_count(&self) -> u64 {
        self.inner.released.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for PreviewRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewRegistry")
            .field("live", &self.live_count())
            .field("released", &self.released_count())
            .finish()
    }
}

/// A live preview for one selected file
pub struct PreviewHandle {
    id: u64,
    url: String,
    registry: Arc<PreviewInner>,
}

impl PreviewHandle {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Revoke the preview
    pub fn release(self) {
        drop(self)
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        if self.registry.live().remove(&self.id) {
            self.registry.released.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewHandle")
            .field("id", &self.id)
            .field("url", &self.url)
            .finish()
    }
}
