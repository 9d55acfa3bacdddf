pub mod album;
pub mod media;
pub mod upload;

pub use album::{
    AlbumDescriptor, AlbumDetails, AlbumDraft, AlbumPayload, Category, CategoryImages,
    ContactPerson, ImageEntry,
};
pub use media::{FileId, MediaFile, MediaSource, UploadStatus};
pub use upload::{
    AbortMultipartRequest, CompleteMultipartRequest, CompleteMultipartResponse, CompletedPart,
    IngestResponse, InitiateMultipartRequest, InitiateMultipartResponse, PartUrlRequest,
    PartUrlResponse, PresignRequest, PresignResponse, StoredObject,
};
