//! Paginated bucket listing (ListObjectsV2)

use super::client::S3Client;
use super::error::{S3Error, S3Result};
use super::transport::Request;
use super::types::{ListPage, S3Object};
use super::xml::{self, ListBucketResult};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use tracing::debug;

/// Where a lazy listing is in its walk
enum Cursor {
    Start,
    Next(String),
    Done,
}

impl S3Client {
    /// List every object in the bucket
    ///
    /// Pages are requested one after another until the service stops
    /// returning a continuation token. Any failed page fails the whole call;
    /// objects from earlier pages are discarded.
    pub async fn list(&self) -> S3Result<Vec<S3Object>> {
        self.list_prefix("").await
    }

    /// List every object whose key starts with `prefix`
    pub async fn list_prefix(&self, prefix: &str) -> S3Result<Vec<S3Object>> {
        let mut objects = Vec::new();
        let mut token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self.list_page(token.as_deref(), prefix).await?;
            pages += 1;
            objects.extend(page.objects);
            match page.continuation_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        debug!(bucket = %self.bucket(), prefix, pages, objects = objects.len(), "listing finished");
        Ok(objects)
    }

    /// Fetch a single page
    ///
    /// `token` is the cursor returned by the previous page; an empty prefix
    /// is not sent.
    pub async fn list_page(&self, token: Option<&str>, prefix: &str) -> S3Result<ListPage> {
        let mut request = Request::get("/").query("list-type", "2");
        if !prefix.is_empty() {
            request = request.query("prefix", prefix);
        }
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            request = request.query("continuation-token", token);
        }

        let context = format!("list objects in {}", self.bucket());
        let response = self.send_expect(request, 200, context).await?;
        let body = response.bytes().await?;
        let result: ListBucketResult = xml::from_xml(&body)?;
        Ok(ListPage::from(result))
    }

    /// Lazily list objects under `prefix`, fetching pages on demand
    ///
    /// The stream yields objects in server order and ends after the first
    /// error.
    pub fn list_stream(&self, prefix: impl Into<String>) -> BoxStream<'static, S3Result<S3Object>> {
        let client = self.clone();
        let prefix = prefix.into();

        stream::try_unfold(Cursor::Start, move |cursor| {
            let client = client.clone();
            let prefix = prefix.clone();
            async move {
                let token = match cursor {
                    Cursor::Start => None,
                    Cursor::Next(token) => Some(token),
                    Cursor::Done => return Ok::<_, S3Error>(None),
                };
                let page = client.list_page(token.as_deref(), &prefix).await?;
                let next = match page.continuation_token {
                    Some(token) => Cursor::Next(token),
                    None => Cursor::Done,
                };
                Ok(Some((page.objects, next)))
            }
        })
        .map_ok(|objects| stream::iter(objects.into_iter().map(Ok)))
        .try_flatten()
        .boxed()
    }
}
