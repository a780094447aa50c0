//! XML payloads of the S3 REST protocol
//!
//! Only the documents this crate exchanges are modelled. Unknown elements are
//! ignored on input so that richer responses from other backends still parse.

use super::error::{S3Error, S3Result};
use serde::{Deserialize, Serialize};

/// Body of a successful `POST <path>?uploads`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiateMultipartUploadResult {
    #[serde(rename = "Bucket", default)]
    pub bucket: String,
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "UploadId")]
    pub upload_id: String,
}

/// One entry of the completion manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPart {
    #[serde(rename = "PartNumber")]
    pub part_number: u32,
    #[serde(rename = "ETag")]
    pub etag: String,
}

/// Body of `POST <path>?uploadId=<id>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteMultipartUpload {
    #[serde(rename = "Part", default)]
    pub parts: Vec<CompletedPart>,
}

/// Body of a successful `POST <path>?uploadId=<id>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteMultipartUploadResult {
    #[serde(rename = "Location", default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(rename = "Bucket", default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(rename = "Key", default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(rename = "ETag", default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

/// One `<Contents>` entry of a ListObjectsV2 page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEntry {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Size", default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(rename = "ETag", default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(rename = "LastModified", default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    #[serde(rename = "StorageClass", default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
}

/// Body of `GET /?list-type=2`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListBucketResult {
    #[serde(rename = "Name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "Prefix", default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(rename = "KeyCount", default, skip_serializing_if = "Option::is_none")]
    pub key_count: Option<u32>,
    #[serde(rename = "IsTruncated", default, skip_serializing_if = "Option::is_none")]
    pub is_truncated: Option<bool>,
    #[serde(rename = "NextContinuationToken", default, skip_serializing_if = "Option::is_none")]
    pub next_continuation_token: Option<String>,
    #[serde(rename = "Contents", default)]
    pub contents: Vec<ListEntry>,
}

/// Structured `<Error>` document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "Message", default)]
    pub message: String,
    #[serde(rename = "Resource", default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(rename = "RequestId", default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Deserialize a response document
pub fn from_xml<T>(body: &[u8]) -> S3Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let text = std::str::from_utf8(body).map_err(|e| S3Error::Xml(e.to_string()))?;
    quick_xml::de::from_str(text).map_err(|e| S3Error::Xml(e.to_string()))
}

/// Serialize a request document under the given root element
pub fn to_xml<T: Serialize>(root: &str, value: &T) -> S3Result<String> {
    let body = quick_xml::se::to_string_with_root(root, value)
        .map_err(|e| S3Error::Xml(e.to_string()))?;
    Ok(format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}",
        body
    ))
}

/// Parse an `<Error>` body, `None` if the body is not one
pub fn parse_error_body(body: &[u8]) -> Option<ErrorBody> {
    if body.is_empty() {
        return None;
    }
    from_xml::<ErrorBody>(body)
        .ok()
        .filter(|err| !err.code.is_empty())
}

impl CompleteMultipartUpload {
    pub fn to_xml(&self) -> S3Result<String> {
        to_xml("CompleteMultipartUpload", self)
    }
}
