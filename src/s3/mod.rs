//! S3 protocol client
//!
//! Speaks the S3 REST protocol directly: multipart uploads driven by a
//! concurrent streaming engine, paginated ListObjectsV2 walks, and single
//! object get/put/delete. Works against AWS S3 and S3-compatible services
//! such as MinIO.
//!
//! # Features
//!
//! - Streaming multipart uploads with a bounded worker pool
//! - Part manifest kept in part-number order regardless of completion order
//! - Local enforcement of the 5 MiB minimum part size and 10,000 part limit
//! - Lazy or eager bucket listings
//! - Pluggable [`Transport`] so tests run against [`MockTransport`]
//! - AWS Signature Version 4 signing for the HTTP transport
//!
//! # Examples
//!
//! ## Streaming Upload
//!
//! ```ignore
//! use stratus::s3::{S3Client, S3Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = S3Client::new(S3Config::new("my-bucket"))?;
//!     let upload = client.initiate_upload("backups/db.dump", Vec::<(String, String)>::new()).await?;
//!
//!     let file = tokio::fs::File::open("db.dump").await?;
//!     upload.stream(file, 8 * 1024 * 1024, 4).await?;
//!     upload.complete().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Listing a Prefix
//!
//! ```ignore
//! use stratus::s3::{S3Client, S3Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = S3Config {
//!         bucket: "my-bucket".to_string(),
//!         endpoint: Some("http://localhost:9000".to_string()),
//!         force_path_style: true,
//!         ..Default::default()
//!     };
//!
//!     let client = S3Client::new(config)?;
//!     for object in client.list_prefix("logs/").await? {
//!         println!("{} {:?}", object.key, object.size);
//!     }
//!
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod error;
mod list;
mod multipart;
mod operations;
mod registry;
mod types;

pub mod http;
pub mod mock;
pub mod signer;
pub mod transport;
pub mod xml;

pub use client::S3Client;
pub use config::{S3Config, S3ConfigBuilder};
pub use error::{S3Error, S3Result, ServiceError, StreamFailure};
pub use http::HttpTransport;
pub use mock::MockTransport;
pub use multipart::Upload;
pub use registry::PartRegistry;
pub use transport::{Body, Method, Request, Response, Transport, TransportError};
pub use types::{ListPage, S3Object};

/// Minimum size of every part but the last (5 MiB)
pub const MIN_PART_SIZE: usize = 5 * 1024 * 1024;

/// Maximum part size (5 GiB)
pub const MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Maximum number of parts in one multipart upload
pub const MAX_PARTS: u32 = 10_000;

/// Default number of parallel part uploads
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Upper bound accepted for the worker pool size
pub const MAX_CONCURRENCY: usize = 64;

pub const DEFAULT_REGION: &str = "us-east-1";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_limits() {
        assert_eq!(MIN_PART_SIZE, 5_242_880);
        assert_eq!(MAX_PART_SIZE, 5_368_709_120);
        assert!(MAX_PART_SIZE > MIN_PART_SIZE as u64);
        // The largest object reachable with minimum-size parts
        assert_eq!(MIN_PART_SIZE as u64 * MAX_PARTS as u64, 52_428_800_000);
    }
}
