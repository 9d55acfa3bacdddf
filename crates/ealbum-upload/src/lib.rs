//! Album upload orchestration
//!
//! Moves the files of an [`ealbum_core::AlbumDraft`] to storage batch by batch, tracks
//! progress, and registers the album once every file is stored.

pub mod batcher;
pub mod observer;
pub mod orchestrator;
pub mod progress;
pub mod registrar;
pub mod source;
pub mod transport;

pub use batcher::{batch_sizes, batches, UploadBatch};
pub use observer::{NoOpObserver, SessionObserver};
pub use orchestrator::{SessionState, UploadOrchestrator, UploadSession};
pub use progress::{
    Eta, FileProgress, ProgressHandle, ProgressReporter, ProgressSnapshot, ProgressTracker,
    RateEstimator,
};
pub use registrar::{AlbumRegistrar, ApiAlbumRegistrar};
pub use transport::{
    transport_from_config, AutoTransport, BatchContext, ChunkedTransport, DirectPutTransport,
    MultipartFormTransport, RetryPolicy, TransportKind, UploadTransport,
};
