//! S3 client implementation

use super::config::S3Config;
use super::error::{S3Error, S3Result};
use super::http::HttpTransport;
use super::transport::{Request, Response, Transport};
use std::sync::Arc;
use tracing::debug;

/// S3 client bound to one bucket
///
/// Cheap to clone; clones share the transport.
#[derive(Clone)]
pub struct S3Client {
    transport: Arc<dyn Transport>,
    bucket: String,
}

impl S3Client {
    /// Create a client that talks HTTP to the configured endpoint
    ///
    /// # Example
    ///
    /// ```no_run
    /// use stratus::s3::{S3Client, S3Config};
    ///
    /// let config = S3Config::new("my-bucket");
    /// let client = S3Client::new(config)?;
    /// # Ok::<(), stratus::s3::S3Error>(())
    /// ```
    pub fn new(config: S3Config) -> S3Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(config.bucket, Arc::new(transport)))
    }

    /// Create a client over any transport collaborator
    pub fn with_transport(bucket: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            bucket: bucket.into(),
        }
    }

    /// Get the bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub(crate) async fn send(&self, request: Request) -> S3Result<Response> {
        debug!(method = %request.method, path = %request.path, "s3 request");
        Ok(self.transport.send(request).await?)
    }

    /// Send a request and require an exact status, reading the error body otherwise
    pub(crate) async fn send_expect(
        &self,
        request: Request,
        expected: u16,
        context: impl Into<String>,
    ) -> S3Result<Response> {
        let response = self.send(request).await?;
        if response.status != expected {
            let status = response.status;
            let body = response.bytes().await?;
            return Err(S3Error::protocol(context, status, &body));
        }
        Ok(response)
    }
}

impl std::fmt::Debug for S3Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Client")
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}
