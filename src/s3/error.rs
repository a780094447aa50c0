//! Error types for S3 operations

use super::transport::TransportError;
use super::xml::ErrorBody;
use std::fmt;
use std::io;
use thiserror::Error;

/// Result type alias for S3 operations
pub type S3Result<T> = Result<T, S3Error>;

/// Structured error returned by the storage service in an `<Error>` body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    pub code: String,
    pub message: String,
    pub resource: Option<String>,
    pub request_id: Option<String>,
}

impl From<ErrorBody> for ServiceError {
    fn from(body: ErrorBody) -> Self {
        Self {
            code: body.code,
            message: body.message,
            resource: body.resource,
            request_id: body.request_id,
        }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if let Some(resource) = &self.resource {
            write!(f, " ({})", resource)?;
        }
        Ok(())
    }
}

/// Errors that can occur during S3 operations
#[derive(Error, Debug, Clone)]
pub enum S3Error {
    /// The service answered with an unexpected status code
    #[error("{context} failed with HTTP {status}{}", describe_service(.service, .raw))]
    Protocol {
        context: String,
        status: u16,
        service: Option<ServiceError>,
        raw: Option<String>,
    },

    /// Local pre-flight rejection of a request that would break a service limit
    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),

    /// Failure inside the transport collaborator, passed through untouched
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Malformed XML payload
    #[error("XML error: {0}")]
    Xml(String),

    /// Reading the input stream failed
    #[error("I/O error: {0}")]
    Io(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The part registry cannot produce a valid completion manifest
    #[error("Incomplete multipart upload: {0}")]
    IncompleteUpload(String),

    /// An upload worker task died without reporting a result
    #[error("Upload worker failed: {0}")]
    WorkerPanicked(String),
}

fn describe_service(service: &Option<ServiceError>, raw: &Option<String>) -> String {
    match (service, raw) {
        (Some(service), _) => format!(": {}", service),
        (None, Some(raw)) if !raw.is_empty() => format!(": {}", raw),
        _ => String::new(),
    }
}

impl S3Error {
    /// Build a protocol error from a status code and the raw response body
    ///
    /// The body is parsed as an S3 `<Error>` document when possible; otherwise
    /// a short excerpt of it is kept.
    pub fn protocol(context: impl Into<String>, status: u16, body: &[u8]) -> Self {
        let service = super::xml::parse_error_body(body).map(ServiceError::from);
        let raw = if service.is_none() && !body.is_empty() {
            let text = String::from_utf8_lossy(body);
            Some(text.chars().take(256).collect())
        } else {
            None
        };

        S3Error::Protocol {
            context: context.into(),
            status,
            service,
            raw,
        }
    }

    /// Build a protocol error that deliberately ignores the response body
    pub fn status_only(context: impl Into<String>, status: u16) -> Self {
        S3Error::Protocol {
            context: context.into(),
            status,
            service: None,
            raw: None,
        }
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, S3Error::Protocol { .. })
    }

    pub fn is_limit_exceeded(&self) -> bool {
        matches!(self, S3Error::LimitExceeded(_))
    }

    /// HTTP status of a protocol error
    pub fn status(&self) -> Option<u16> {
        match self {
            S3Error::Protocol { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Service error code (`NoSuchKey`, `AccessDenied`, ...) when one was parsed
    pub fn service_code(&self) -> Option<&str> {
        match self {
            S3Error::Protocol {
                service: Some(service),
                ..
            } => Some(service.code.as_str()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
            || matches!(self.service_code(), Some("NoSuchKey" | "NoSuchBucket" | "NoSuchUpload"))
    }
}

impl From<io::Error> for S3Error {
    fn from(err: io::Error) -> Self {
        S3Error::Io(err.to_string())
    }
}

/// Failure of a streaming upload together with the progress made before it
///
/// `transferred` counts the bytes read from the input and handed to the
/// worker pool before the failure was detected.
#[derive(Error, Debug, Clone)]
#[error("stream failed after {transferred} bytes: {error}")]
pub struct StreamFailure {
    pub transferred: u64,
    #[source]
    pub error: S3Error,
}

impl StreamFailure {
    pub fn new(transferred: u64, error: S3Error) -> Self {
        Self { transferred, error }
    }

    pub fn into_error(self) -> S3Error {
        self.error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_SUCH_KEY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message><Resource>/bucket/missing</Resource><RequestId>4442587FB7D0A2F9</RequestId></Error>"#;

    #[test]
    fn test_protocol_error_parses_service_body() {
        let err = S3Error::protocol("GET /missing", 404, NO_SUCH_KEY.as_bytes());
        assert!(err.is_protocol());
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.service_code(), Some("NoSuchKey"));
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "GET /missing failed with HTTP 404: NoSuchKey: The specified key does not exist. (/bucket/missing)"
        );
    }

    #[test]
    fn test_protocol_error_keeps_raw_excerpt() {
        let err = S3Error::protocol("PUT /x", 502, b"Bad Gateway");
        assert_eq!(err.service_code(), None);
        assert_eq!(err.to_string(), "PUT /x failed with HTTP 502: Bad Gateway");
    }

    #[test]
    fn test_status_only_error() {
        let err = S3Error::status_only("upload part 3", 500);
        assert_eq!(err.to_string(), "upload part 3 failed with HTTP 500");
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_transport_error_is_transparent() {
        let err: S3Error = TransportError::Timeout("30s elapsed".to_string()).into();
        assert_eq!(err.to_string(), "request timed out: 30s elapsed");
        assert!(matches!(err, S3Error::Transport(TransportError::Timeout(_))));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed");
        let err: S3Error = io_err.into();
        assert!(matches!(err, S3Error::Io(_)));
    }

    #[test]
    fn test_stream_failure_display() {
        let failure = StreamFailure::new(
            10 * 1024 * 1024,
            S3Error::LimitExceeded("too many parts".to_string()),
        );
        assert_eq!(
            failure.to_string(),
            "stream failed after 10485760 bytes: Limit exceeded: too many parts"
        );
        assert!(failure.into_error().is_limit_exceeded());
    }
}
