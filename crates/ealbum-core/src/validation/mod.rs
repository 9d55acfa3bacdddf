//! Album draft validation
//!
//! Runs before any network call:
//! - Album metadata: required names, contact persons, sender email format
//! - Files: at least one category must hold at least one file

use validator::{Validate, ValidateEmail};

use crate::error::ValidationError;
use crate::models::{AlbumDetails, AlbumDraft};

/// Maximum number of sender emails attached to an album
pub const MAX_SENDER_EMAILS: usize = 10;

/// Custom `validator` check for the sender email list
pub fn validate_sender_emails(emails: &[String]) -> Result<(), validator::ValidationError> {
    if emails.len() > MAX_SENDER_EMAILS {
        let mut err = validator::ValidationError::new("too_many_emails");
        err.message = Some(format!("At most {} sender emails are allowed", MAX_SENDER_EMAILS).into());
        return Err(err);
    }

    if let Some(bad) = emails.iter().find(|e| !e.trim().to_string().validate_email()) {
        let mut err = validator::ValidationError::new("email");
        err.message = Some(format!("Invalid sender email: {}", bad).into());
        return Err(err);
    }

    Ok(())
}

/// Validate album metadata. Whitespace-only names count as missing.
pub fn validate_album_details(details: &AlbumDetails) -> Result<(), ValidationError> {
    if details.studio_name.trim().is_empty() {
        return Err(ValidationError::MissingField("studio_name".to_string()));
    }
    if details.album_name.trim().is_empty() {
        return Err(ValidationError::MissingField("album_name".to_string()));
    }
    details.validate()?;
    Ok(())
}

/// Precondition check for an upload run: metadata is complete and some category has files.
pub fn validate_for_upload(draft: &AlbumDraft) -> Result<(), ValidationError> {
    validate_album_details(&draft.details)?;

    if !draft.categories().iter().any(|c| !c.is_empty()) {
        return Err(ValidationError::NoFiles);
    }

    Ok(())
}
