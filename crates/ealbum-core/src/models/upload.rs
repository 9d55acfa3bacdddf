//! Wire types for the storage and upload endpoints.

use serde::{Deserialize, Serialize};

use crate::models::media::FileId;

/// A file that reached durable storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredObject {
    pub file_id: FileId,
    pub file_name: String,
    /// Storage key or link returned by the storage endpoint
    pub key: String,
}

/// Request for a pre-signed PUT URL for a single file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignRequest {
    pub file_name: String,
    pub content_type: String,
    pub file_size: u64,
    pub album_pin: String,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignResponse {
    /// Pre-signed URL accepting a single PUT
    pub url: String,
    /// Storage key the object will be stored under
    pub key: String,
}

/// Request to open a multipart upload for a large file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateMultipartRequest {
    pub file_name: String,
    pub content_type: String,
    pub file_size: u64,
    pub part_count: u32,
    pub album_pin: String,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateMultipartResponse {
    pub upload_id: String,
    pub key: String,
}

/// Request for the pre-signed URL of one part (part numbers start at 1)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartUrlRequest {
    pub upload_id: String,
    pub key: String,
    pub part_number: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartUrlResponse {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedPart {
    pub part_number: u32,
    pub e_tag: String,
}

/// Request to assemble uploaded parts. `parts` is sorted by ascending part number.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteMultipartRequest {
    pub upload_id: String,
    pub key: String,
    pub parts: Vec<CompletedPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteMultipartResponse {
    pub key: String,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbortMultipartRequest {
    pub upload_id: String,
    pub key: String,
}

/// Response of the bulk ingest endpoint: one link per submitted file, in submission order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub file_links: Vec<String>,
}
