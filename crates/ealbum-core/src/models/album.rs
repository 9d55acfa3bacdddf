use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::ValidationError;
use crate::models::media::{MediaFile, UploadStatus};
use crate::models::upload::StoredObject;
use crate::preview::PreviewRegistry;

/// Person the album recipient can contact at the studio
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ContactPerson {
    #[validate(length(min = 1, max = 255, message = "Contact name must be between 1 and 255 characters"))]
    pub name: String,
    #[validate(length(min = 3, max = 32, message = "Phone number must be between 3 and 32 characters"))]
    pub phone: String,
}

/// Album metadata entered by the studio
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AlbumDetails {
    #[validate(length(min = 1, max = 255, message = "Album name must be between 1 and 255 characters"))]
    pub album_name: String,
    #[validate(length(min = 1, max = 255, message = "Studio name must be between 1 and 255 characters"))]
    pub studio_name: String,
    #[serde(default)]
    #[validate(nested)]
    pub contact_persons: Vec<ContactPerson>,
    #[serde(default)]
    #[validate(custom(function = "crate::validation::validate_sender_emails"))]
    pub sender_emails: Vec<String>,
    /// Attach the studio profile to the album
    #[serde(default)]
    pub attach_profile: bool,
    /// Render the album single-sided
    #[serde(default)]
    pub single_sided: bool,
}

/// A named bucket of files plus the storage objects produced once they upload
#[derive(Debug)]
pub struct Category {
    pub name: String,
    pub files: Vec<MediaFile>,
    pub uploaded: Vec<StoredObject>,
}

impl Category {
    fn new(name: String) -> Self {
        Self {
            name,
            files: Vec::new(),
            uploaded: Vec::new(),
        }
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// The input of one album-creation attempt: metadata plus ordered categories of files
#[derive(Debug)]
pub struct AlbumDraft {
    pub details: AlbumDetails,
    categories: Vec<Category>,
    previews: PreviewRegistry,
}

impl AlbumDraft {
    pub fn new(details: AlbumDetails) -> Self {
        Self::with_previews(details, PreviewRegistry::new())
    }

    pub fn with_previews(details: AlbumDetails, previews: PreviewRegistry) -> Self {
        Self {
            details,
            categories: Vec::new(),
            previews,
        }
    }

    /// Add an empty category. Names must be non-blank and unique within the draft.
    pub fn add_category(&mut self, name: impl Into<String>) -> Result<(), ValidationError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::MissingField("category name".to_string()));
        }
        if self.categories.iter().any(|c| c.name == name) {
            return Err(ValidationError::DuplicateCategory(name));
        }
        self.categories.push(Category::new(name));
        Ok(())
    }

    /// Append a file to a category, creating its preview. Returns the file's index.
    pub fn add_file(&mut self, category: &str, mut file: MediaFile) -> Result<usize, ValidationError> {
        let preview = self.previews.create(&file.name);
        let category = self.category_mut(category)?;
        file.attach_preview(preview);
        category.files.push(file);
        Ok(category.files.len() - 1)
    }

    /// Remove a file from a category, releasing its preview.
    pub fn remove_file(&mut self, category: &str, index: usize) -> Result<MediaFile, ValidationError> {
        let category = self.category_mut(category)?;
        if index >= category.files.len() {
            return Err(ValidationError::InvalidInput(format!(
                "No file at index {} in category {}",
                index, category.name
            )));
        }
        let mut file = category.files.remove(index);
        file.release_preview();
        Ok(file)
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn categories_mut(&mut self) -> &mut [Category] {
        &mut self.categories
    }

    pub fn category(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == name)
    }

    fn category_mut(&mut self, name: &str) -> Result<&mut Category, ValidationError> {
        self.categories
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| ValidationError::UnknownCategory(name.to_string()))
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    pub fn total_files(&self) -> usize {
        self.categories.iter().map(|c| c.files.len()).sum()
    }

    pub fn total_bytes(&self) -> u64 {
        self.categories.iter().map(Category::total_bytes).sum()
    }

    /// Discard results of a previous attempt so the draft can be uploaded again
    pub fn reset_uploads(&mut self) {
        for category in &mut self.categories {
            category.uploaded.clear();
            for file in &mut category.files {
                file.reset();
            }
        }
    }

    /// Release every preview still held by the draft's files
    pub fn release_previews(&mut self) -> usize {
        self.categories
            .iter_mut()
            .flat_map(|c| c.files.iter_mut())
            .map(MediaFile::release_preview)
            .filter(|released| *released)
            .count()
    }

    /// Files that did not reach `Uploaded`
    pub fn pending_files(&self) -> impl Iterator<Item = &MediaFile> {
        self.categories
            .iter()
            .flat_map(|c| c.files.iter())
            .filter(|f| f.status != UploadStatus::Uploaded)
    }
}

/// One uploaded image in the album-creation payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageEntry {
    pub key: String,
    pub file_name: String,
}

/// Images grouped under their category in the album-creation payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryImages {
    pub name: String,
    pub images: Vec<ImageEntry>,
}

/// Body of the single "create album" request sent once every upload succeeded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumPayload {
    pub album_name: String,
    pub studio_name: String,
    pub contact_persons: Vec<ContactPerson>,
    pub sender_emails: Vec<String>,
    pub categories: Vec<CategoryImages>,
    pub pin: String,
    pub attach_profile: bool,
    pub single_sided: bool,
}

impl AlbumPayload {
    /// Assemble the payload from the draft's uploaded objects.
    /// Categories without uploaded objects are left out.
    pub fn from_draft(draft: &AlbumDraft, pin: &str) -> Self {
        let details = &draft.details;
        let categories = draft
            .categories()
            .iter()
            .filter(|c| !c.uploaded.is_empty())
            .map(|c| CategoryImages {
                name: c.name.clone(),
                images: c
                    .uploaded
                    .iter()
                    .map(|o| ImageEntry {
                        key: o.key.clone(),
                        file_name: o.file_name.clone(),
                    })
                    .collect(),
            })
            .collect();

        Self {
            album_name: details.album_name.trim().to_string(),
            studio_name: details.studio_name.trim().to_string(),
            contact_persons: details.contact_persons.clone(),
            sender_emails: details.sender_emails.clone(),
            categories,
            pin: pin.to_string(),
            attach_profile: details.attach_profile,
            single_sided: details.single_sided,
        }
    }

    pub fn image_count(&self) -> usize {
        self.categories.iter().map(|c| c.images.len()).sum()
    }
}

/// Final album descriptor handed back for display and sharing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumDescriptor {
    pub name: String,
    /// Access code recipients use to open the album
    pub code: String,
}
