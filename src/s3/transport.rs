//! Transport boundary between the S3 protocol layer and the wire
//!
//! Everything above this module speaks in [`Request`] and [`Response`] values.
//! The concrete collaborator ([`super::http::HttpTransport`] in production,
//! [`super::mock::MockTransport`] in tests) owns addressing, signing and I/O.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, StreamExt};
use std::fmt;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Errors raised by a transport collaborator
///
/// These are surfaced to callers unchanged through [`super::S3Error::Transport`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Could not establish or keep a connection
    #[error("connection failed: {0}")]
    Connect(String),

    /// Request or response exceeded the configured timeout
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Failure while streaming a request or response body
    #[error("body I/O failed: {0}")]
    Io(String),

    /// Request could not be built (bad URL, header value, ...)
    #[error("invalid request: {0}")]
    Request(String),

    /// Request could not be signed
    #[error("signing failed: {0}")]
    Signing(String),
}

/// HTTP method used by the S3 REST protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request addressed relative to the configured bucket
///
/// `path` is the object path (`/` for the bucket itself). Query pairs keep
/// their insertion order; a pair with an empty value is a bare flag such as
/// `?uploads`.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let path = path.into();
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };

        Self {
            method,
            path,
            query: Vec::new(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Append a query parameter
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Append a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Append every header from an iterator of pairs
    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Look up a query parameter by name
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_query(&self, key: &str) -> bool {
        self.query.iter().any(|(k, _)| k == key)
    }
}

/// Streaming response body
pub struct Body {
    inner: BoxStream<'static, Result<Bytes, TransportError>>,
}

impl Body {
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: futures::Stream<Item = Result<Bytes, TransportError>> + Send + 'static,
    {
        Self {
            inner: stream.boxed(),
        }
    }

    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Self::empty();
        }
        Self::from_stream(stream::once(async move { Ok(bytes) }))
    }

    pub fn empty() -> Self {
        Self::from_stream(stream::empty())
    }

    /// Next chunk of the body, `None` at the end
    pub async fn next_chunk(&mut self) -> Option<Result<Bytes, TransportError>> {
        self.inner.next().await
    }

    /// Buffer the whole body in memory
    pub async fn collect(mut self) -> Result<Bytes, TransportError> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.next_chunk().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }

    /// Stream the body into a writer, returning the number of bytes copied
    pub async fn copy_to<W>(mut self, writer: &mut W) -> Result<u64, TransportError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut copied = 0u64;
        while let Some(chunk) = self.next_chunk().await {
            let chunk = chunk?;
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| TransportError::Io(e.to_string()))?;
            copied += chunk.len() as u64;
        }
        writer
            .flush()
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;
        Ok(copied)
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body").finish_non_exhaustive()
    }
}

/// Status, headers and body returned by a transport
#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Body::empty(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Body::from_bytes(body);
        self
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub async fn bytes(self) -> Result<Bytes, TransportError> {
        self.body.collect().await
    }

    pub fn into_body(self) -> Body {
        self.body
    }
}

/// The collaborator that performs authenticated HTTP requests
///
/// Implementations must be shareable across the upload worker pool.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, request: Request) -> Result<Response, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_path_is_rooted() {
        assert_eq!(Request::get("a/b.txt").path, "/a/b.txt");
        assert_eq!(Request::get("/a/b.txt").path, "/a/b.txt");
    }

    #[test]
    fn test_request_query_lookup() {
        let req = Request::post("/obj").query("uploads", "");
        assert!(req.has_query("uploads"));
        assert_eq!(req.query_param("uploads"), Some(""));
        assert_eq!(req.query_param("uploadId"), None);
    }

    #[test]
    fn test_response_header_case_insensitive() {
        let res = Response::new(200).with_header("ETag", "\"abc\"");
        assert_eq!(res.header("etag"), Some("\"abc\""));
        assert!(res.is_success());
        assert!(!Response::new(404).is_success());
    }

    #[tokio::test]
    async fn test_body_collect_multiple_chunks() {
        let chunks = vec![Ok(Bytes::from_static(b"hello ")), Ok(Bytes::from_static(b"world"))];
        let body = Body::from_stream(stream::iter(chunks));
        assert_eq!(body.collect().await.unwrap(), Bytes::from_static(b"hello world"));
    }

    #[tokio::test]
    async fn test_body_copy_to_writer() {
        let body = Body::from_bytes(Bytes::from_static(b"payload"));
        let mut out = Vec::new();
        let copied = body.copy_to(&mut out).await.unwrap();
        assert_eq!(copied, 7);
        assert_eq!(out, b"payload");
    }

    #[tokio::test]
    async fn test_body_error_propagates() {
        let chunks = vec![
            Ok(Bytes::from_static(b"partial")),
            Err(TransportError::Io("reset".to_string())),
        ];
        let body = Body::from_stream(stream::iter(chunks));
        assert_eq!(
            body.collect().await,
            Err(TransportError::Io("reset".to_string()))
        );
    }
}
