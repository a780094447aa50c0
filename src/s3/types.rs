//! Type definitions for S3 operations

use super::xml::{ListBucketResult, ListEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An object returned by a bucket listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Object {
    /// Object key (path within bucket)
    pub key: String,

    /// Object size in bytes, when the backend reports it
    pub size: Option<u64>,

    /// Last modified timestamp
    pub last_modified: Option<DateTime<Utc>>,

    /// ETag (entity tag)
    pub etag: Option<String>,

    /// Storage class as reported by the service
    pub storage_class: Option<String>,
}

impl S3Object {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            size: None,
            last_modified: None,
            etag: None,
            storage_class: None,
        }
    }
}

impl From<ListEntry> for S3Object {
    fn from(entry: ListEntry) -> Self {
        let last_modified = entry
            .last_modified
            .as_deref()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|ts| ts.with_timezone(&Utc));

        Self {
            key: entry.key,
            size: entry.size,
            last_modified,
            etag: entry.etag,
            storage_class: entry.storage_class,
        }
    }
}

/// One page of a bucket listing
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    /// Objects on this page, in server order
    pub objects: Vec<S3Object>,

    /// Cursor for the next page; `None` on the last page
    pub continuation_token: Option<String>,
}

impl ListPage {
    pub fn is_last(&self) -> bool {
        self.continuation_token.is_none()
    }
}

impl From<ListBucketResult> for ListPage {
    fn from(result: ListBucketResult) -> Self {
        Self {
            objects: result.contents.into_iter().map(S3Object::from).collect(),
            continuation_token: result
                .next_continuation_token
                .filter(|token| !token.is_empty()),
        }
    }
}
