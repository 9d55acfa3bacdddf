//! Album manifest
//!
//! JSON description of an album to upload: the album metadata fields plus an ordered list of
//! categories, each naming its files. Relative file paths resolve against the manifest's
//! directory.
//!
//! ```json
//! {
//!   "albumName": "Spring Wedding",
//!   "studioName": "Lumen Studio",
//!   "senderEmails": ["desk@lumen.example"],
//!   "categories": [{ "name": "Ceremony", "files": ["ceremony/001.jpg"] }]
//! }
//! ```

use anyhow::Context;
use ealbum_core::{AlbumDetails, AlbumDraft, MediaFile};
use ealbum_upload::batch_sizes;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestCategory {
    pub name: String,
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    #[serde(flatten)]
    pub details: AlbumDetails,
    #[serde(default)]
    pub categories: Vec<ManifestCategory>,
}

/// Batch layout of one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryPlan {
    pub name: String,
    pub file_count: usize,
    pub batches: Vec<usize>,
}

impl Manifest {
    /// Read a manifest file, resolving relative file paths against its directory.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        let manifest: Manifest = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse manifest {}", path.display()))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(manifest.resolve(base))
    }

    pub fn resolve(mut self, base: &Path) -> Self {
        for category in &mut self.categories {
            for file in &mut category.files {
                if file.is_relative() {
                    *file = base.join(&*file);
                }
            }
        }
        self
    }

    pub fn file_count(&self) -> usize {
        self.categories.iter().map(|c| c.files.len()).sum()
    }

    /// Per-category batch sizes, computed without touching the files.
    pub fn plan(&self, batch_size: NonZeroUsize) -> Vec<CategoryPlan> {
        self.categories
            .iter()
            .map(|c| CategoryPlan {
                name: c.name.clone(),
                file_count: c.files.len(),
                batches: batch_sizes(c.files.len(), batch_size),
            })
            .collect()
    }

    /// Build the draft, reading each file's metadata.
    pub fn into_draft(self) -> anyhow::Result<AlbumDraft> {
        let mut draft = AlbumDraft::new(self.details);
        for category in self.categories {
            draft
                .add_category(category.name.as_str())
                .with_context(|| format!("Invalid category '{}'", category.name))?;
            let name = category.name.trim().to_string();
            for path in category.files {
                let file = MediaFile::from_path(&path)
                    .with_context(|| format!("Failed to open {}", path.display()))?;
                draft.add_file(&name, file)?;
            }
        }
        Ok(draft)
    }
}
