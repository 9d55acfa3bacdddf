use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::UploadError;
use crate::preview::PreviewHandle;

/// Upload lifecycle of a single file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Uploading,
    Uploaded,
    Failed,
}

/// Where a file's bytes are read from
#[derive(Debug, Clone)]
pub enum MediaSource {
    /// File on local disk, read lazily
    Path(PathBuf),
    /// Bytes already held in memory
    Memory(Bytes),
}

/// Identifies one file within a draft by category, name and position.
///
/// Equality compares the parts, so ids stay distinct even when their display form
/// `{category}-{file_name}-{index}` coincides (e.g. `Pre-Wedding` + `x.jpg` and
/// `Pre` + `Wedding-x.jpg`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileId {
    category: String,
    file_name: String,
    index: usize,
}

impl FileId {
    pub fn new(category: &str, file_name: &str, index: usize) -> Self {
        Self {
            category: category.to_string(),
            file_name: file_name.to_string(),
            index,
        }
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.category, self.file_name, self.index)
    }
}

/// A locally-selected file pending upload
#[derive(Debug)]
pub struct MediaFile {
    /// Display name (the original file name)
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// MIME type sent as the object's content type
    pub content_type: String,
    pub source: MediaSource,
    pub status: UploadStatus,
    pub bytes_transferred: u64,
    storage_key: Option<String>,
    preview: Option<PreviewHandle>,
}

impl MediaFile {
    /// Build a file from bytes held in memory. The content type is guessed from the
    /// name when not given.
    pub fn in_memory(name: impl Into<String>, content_type: Option<&str>, data: Bytes) -> Self {
        let name = name.into();
        let content_type = content_type
            .map(str::to_string)
            .unwrap_or_else(|| guess_content_type(&name));
        Self {
            size: data.len() as u64,
            name,
            content_type,
            source: MediaSource::Memory(data),
            status: UploadStatus::Pending,
            bytes_transferred: 0,
            storage_key: None,
            preview: None,
        }
    }

    /// Build a file backed by a path on disk. Reads only the file's metadata.
    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Not a regular file: {}", path.display()),
            ));
        }

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.bin")
            .to_string();

        Ok(Self {
            content_type: guess_content_type(&name),
            name,
            size: metadata.len(),
            source: MediaSource::Path(path.to_path_buf()),
            status: UploadStatus::Pending,
            bytes_transferred: 0,
            storage_key: None,
            preview: None,
        })
    }

    pub fn storage_key(&self) -> Option<&str> {
        self.storage_key.as_deref()
    }

    /// Record the storage key produced by a successful transfer.
    ///
    /// A key is assigned at most once; a second assignment is reported as an internal error.
    pub fn assign_storage_key(&mut self, key: String) -> Result<(), UploadError> {
        if let Some(existing) = &self.storage_key {
            return Err(UploadError::Internal(format!(
                "Storage key for {} already assigned ({}), refusing {}",
                self.name, existing, key
            )));
        }
        self.storage_key = Some(key);
        self.status = UploadStatus::Uploaded;
        self.bytes_transferred = self.size;
        Ok(())
    }

    pub fn preview(&self) -> Option<&PreviewHandle> {
        self.preview.as_ref()
    }

    pub(crate) fn attach_preview(&mut self, preview: PreviewHandle) {
        self.preview = Some(preview);
    }

    /// Release the local preview, if one is still held. Returns whether one was released.
    pub fn release_preview(&mut self) -> bool {
        match self.preview.take() {
            Some(handle) => {
                handle.release();
                true
            }
            None => false,
        }
    }

    /// Return the file to `Pending` so a new session can upload it again
    pub fn reset(&mut self) {
        self.status = UploadStatus::Pending;
        self.bytes_transferred = 0;
        self.storage_key = None;
    }
}

fn guess_content_type(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_file_id_format() {
        let id = FileId::new("Wedding", "IMG_001.jpg", 3);
        assert_eq!(id.to_string(), "Wedding-IMG_001.jpg-3");
        assert_eq!(id.category(), "Wedding");
        assert_eq!(id.index(), 3);
    }

    #[test]
    fn test_file_ids_with_same_label_stay_distinct() {
        let a = FileId::new("Pre-Wedding", "x.jpg", 0);
        let b = FileId::new("Pre", "Wedding-x.jpg", 0);
        assert_eq!(a.to_string(), b.to_string());
        assert_ne!(a, b);

        let set: std::collections::HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_in_memory_guesses_content_type() {
        let file = MediaFile::in_memory("clip.mp4", None, Bytes::from_static(b"1234"));
        assert_eq!(file.content_type, "video/mp4");
        assert_eq!(file.size, 4);
        assert_eq!(file.status, UploadStatus::Pending);

        let file = MediaFile::in_memory("raw", Some("image/x-raw"), Bytes::new());
        assert_eq!(file.content_type, "image/x-raw");
    }

    #[test]
    fn test_from_path_reads_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portrait.png");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(&[0u8; 2048]).unwrap();

        let file = MediaFile::from_path(&path).unwrap();
        assert_eq!(file.name, "portrait.png");
        assert_eq!(file.size, 2048);
        assert_eq!(file.content_type, "image/png");
        assert!(matches!(file.source, MediaSource::Path(_)));
    }

    #[test]
    fn test_from_path_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(MediaFile::from_path(dir.path()).is_err());
    }

    #[test]
    fn test_storage_key_assigned_once() {
        let mut file = MediaFile::in_memory("a.jpg", None, Bytes::from_static(b"abc"));
        file.assign_storage_key("albums/a.jpg".to_string()).unwrap();
        assert_eq!(file.storage_key(), Some("albums/a.jpg"));
        assert_eq!(file.status, UploadStatus::Uploaded);
        assert_eq!(file.bytes_transferred, 3);

        let err = file
            .assign_storage_key("albums/a-2.jpg".to_string())
            .unwrap_err();
        assert!(matches!(err, UploadError::Internal(_)));
        assert_eq!(file.storage_key(), Some("albums/a.jpg"));

        file.reset();
        assert_eq!(file.storage_key(), None);
        assert_eq!(file.status, UploadStatus::Pending);
    }
}
