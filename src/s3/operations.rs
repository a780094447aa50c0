//! Single-request object operations

use super::client::S3Client;
use super::error::S3Result;
use super::transport::{Body, Request};
use bytes::Bytes;
use tracing::{debug, info};

impl S3Client {
    /// Fetch an object, returning its body as a stream
    ///
    /// The body is not buffered; read it with [`Body::collect`] or copy it
    /// out with [`Body::copy_to`].
    pub async fn get(&self, key: &str) -> S3Result<Body> {
        let request = Request::get(key);
        let context = format!("get {}", request.path);
        let response = self.send_expect(request, 200, context).await?;
        debug!(key, length = ?response.header("Content-Length"), "object fetched");
        Ok(response.into_body())
    }

    /// Fetch an object into memory
    pub async fn get_bytes(&self, key: &str) -> S3Result<Bytes> {
        Ok(self.get(key).await?.collect().await?)
    }

    /// Store an object with a single PUT, returning its ETag if reported
    pub async fn put<I, K, V>(&self, key: &str, data: impl Into<Bytes>, headers: I) -> S3Result<Option<String>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let data = data.into();
        let size = data.len();
        let request = Request::put(key).headers(headers).body(data);
        let context = format!("put {}", request.path);
        let response = self.send_expect(request, 200, context).await?;
        info!(key, size, "object stored");
        Ok(response.header("ETag").map(str::to_string))
    }

    /// Delete an object
    ///
    /// S3 answers 204 whether or not the key existed.
    pub async fn delete(&self, key: &str) -> S3Result<()> {
        let request = Request::delete(key);
        let context = format!("delete {}", request.path);
        self.send_expect(request, 204, context).await?;
        info!(key, "object deleted");
        Ok(())
    }
}
