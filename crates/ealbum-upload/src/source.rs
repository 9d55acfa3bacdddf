//! Reading file bytes for upload
//!
//! Sources are read lazily: whole files as chunked streams, chunked-upload parts by byte range.

use bytes::Bytes;
use ealbum_core::MediaSource;
use futures::{Stream, StreamExt};
use std::io::{self, SeekFrom};
use std::pin::Pin;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::progress::ProgressReporter;

/// Size of the chunks streamed to the network
pub const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Byte stream usable as a request body
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + Sync>>;

/// Open the whole source as a stream of chunks.
pub async fn open_stream(source: &MediaSource) -> io::Result<ByteStream> {
    match source {
        MediaSource::Path(path) => {
            let file = tokio::fs::File::open(path).await?;
            Ok(Box::pin(ReaderStream::with_capacity(file, STREAM_CHUNK_SIZE)))
        }
        MediaSource::Memory(bytes) => Ok(memory_stream(bytes.clone())),
    }
}

/// Stream in-memory bytes in fixed-size chunks.
pub fn memory_stream(bytes: Bytes) -> ByteStream {
    let chunks: Vec<io::Result<Bytes>> = (0..bytes.len())
        .step_by(STREAM_CHUNK_SIZE)
        .map(|start| Ok(bytes.slice(start..(start + STREAM_CHUNK_SIZE).min(bytes.len()))))
        .collect();
    Box::pin(futures::stream::iter(chunks))
}

/// Read `len` bytes starting at `start`.
pub async fn read_range(source: &MediaSource, start: u64, len: u64) -> io::Result<Bytes> {
    match source {
        MediaSource::Path(path) => {
            let mut file = tokio::fs::File::open(path).await?;
            file.seek(SeekFrom::Start(start)).await?;
            let mut buffer = vec![0u8; len as usize];
            file.read_exact(&mut buffer).await?;
            Ok(Bytes::from(buffer))
        }
        MediaSource::Memory(bytes) => {
            let end = start
                .checked_add(len)
                .filter(|end| *end <= bytes.len() as u64)
                .ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!(
                            "Range {}..{} exceeds source length {}",
                            start,
                            start.saturating_add(len),
                            bytes.len()
                        ),
                    )
                })?;
            Ok(bytes.slice(start as usize..end as usize))
        }
    }
}

/// Report cumulative bytes to `reporter` as the stream is consumed, starting from `base`.
pub fn with_progress(stream: ByteStream, reporter: ProgressReporter, base: u64) -> ByteStream {
    let mut sent = base;
    Box::pin(stream.map(move |chunk| {
        if let Ok(bytes) = &chunk {
            sent += bytes.len() as u64;
            reporter.report(sent);
        }
        chunk
    }))
}
