/*!
 * Error types for Stratus
 */

use crate::s3::{S3Error, StreamFailure};
use std::fmt;
use std::io;

/// Process exit codes
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_PARTIAL: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

#[derive(Debug)]
pub enum StratusError {
    /// Configuration error
    Config(String),

    /// A single S3 request or local S3 pre-flight check failed
    S3(S3Error),

    /// A streaming upload stopped part way
    Stream(StreamFailure),

    /// Local I/O error
    Io(io::Error),
}

impl StratusError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // Nothing was attempted
            StratusError::Config(_) => EXIT_FATAL,
            StratusError::S3(S3Error::InvalidConfig(_))
            | StratusError::S3(S3Error::LimitExceeded(_)) => EXIT_FATAL,
            StratusError::Stream(failure) if failure.transferred == 0 => EXIT_FATAL,
            // Some data may have moved
            StratusError::Stream(_) => EXIT_PARTIAL,
            _ => EXIT_PARTIAL,
        }
    }

    /// Bytes read before a streaming upload failed
    pub fn transferred(&self) -> Option<u64> {
        match self {
            StratusError::Stream(failure) => Some(failure.transferred),
            _ => None,
        }
    }
}

impl fmt::Display for StratusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StratusError::Config(msg) => write!(f, "Configuration error: {}", msg),
            StratusError::S3(err) => write!(f, "S3 error: {}", err),
            StratusError::Stream(failure) => write!(f, "Upload error: {}", failure),
            StratusError::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for StratusError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StratusError::S3(err) => Some(err),
            StratusError::Stream(failure) => Some(failure),
            StratusError::Io(err) => Some(err),
            StratusError::Config(_) => None,
        }
    }
}

impl From<io::Error> for StratusError {
    fn from(err: io::Error) -> Self {
        StratusError::Io(err)
    }
}

impl From<S3Error> for StratusError {
    fn from(err: S3Error) -> Self {
        StratusError::S3(err)
    }
}

impl From<StreamFailure> for StratusError {
    fn from(failure: StreamFailure) -> Self {
        StratusError::Stream(failure)
    }
}

impl From<toml::de::Error> for StratusError {
    fn from(err: toml::de::Error) -> Self {
        StratusError::Config(format!("Invalid config file: {}", err))
    }
}

impl From<serde_json::Error> for StratusError {
    fn from(err: serde_json::Error) -> Self {
        StratusError::Config(format!("JSON error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, StratusError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_exit_code_constants() {
        assert_eq!(EXIT_SUCCESS, 0);
        assert_eq!(EXIT_PARTIAL, 1);
        assert_eq!(EXIT_FATAL, 2);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            StratusError::Config("missing bucket".to_string()).exit_code(),
            EXIT_FATAL
        );
        assert_eq!(
            StratusError::from(S3Error::LimitExceeded("10001 parts".to_string())).exit_code(),
            EXIT_FATAL
        );
        assert_eq!(
            StratusError::from(S3Error::status_only("get /k", 404)).exit_code(),
            EXIT_PARTIAL
        );
    }

    #[test]
    fn test_stream_failure_exit_code_depends_on_progress() {
        let early = StreamFailure::new(0, S3Error::status_only("upload part 1", 500));
        assert_eq!(StratusError::from(early).exit_code(), EXIT_FATAL);

        let late = StratusError::from(StreamFailure::new(
            15 * 1024 * 1024,
            S3Error::status_only("upload part 4", 500),
        ));
        assert_eq!(late.exit_code(), EXIT_PARTIAL);
        assert_eq!(late.transferred(), Some(15 * 1024 * 1024));
    }

    #[test]
    fn test_display_and_source() {
        let err = StratusError::from(S3Error::InvalidConfig("bad bucket".to_string()));
        assert_eq!(
            err.to_string(),
            "S3 error: Invalid configuration: bad bucket"
        );
        assert!(err.source().is_some());
        assert!(StratusError::Config("x".to_string()).source().is_none());
    }

    #[test]
    fn test_from_io_error() {
        let err: StratusError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, StratusError::Io(_)));
        assert_eq!(err.exit_code(), EXIT_PARTIAL);
    }
}
