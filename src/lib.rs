/*!
 * Stratus - streaming transfers for S3-compatible object stores
 *
 * A client-side S3 engine with:
 * - Concurrent multipart uploads fed from any async reader
 * - Part manifests kept in order no matter how parts finish
 * - Paginated bucket listings, eager or lazy
 * - Streaming object downloads and single-request put/delete
 * - AWS Signature Version 4 signing over a pluggable transport
 *
 * Version: 0.1.0
 */

pub mod config;
pub mod error;
pub mod logging;
pub mod s3;

// Re-export commonly used types
pub use config::{Config, LogLevel};
pub use error::{Result, StratusError};
pub use s3::{S3Client, S3Config, S3Error, S3Object, StreamFailure, Upload};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
