//! HTTP transport built on reqwest

use super::config::S3Config;
use super::signer::{canonical_query, uri_encode_path, SigV4Signer, SigningRequest};
use super::transport::{Body, Method, Request, Response, Transport, TransportError};
use async_trait::async_trait;
use futures::TryStreamExt;
use std::time::Duration;
use tracing::trace;
use url::Url;

/// Production transport: addressing, optional SigV4 signing, streaming bodies
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base: Url,
    bucket: String,
    path_style: bool,
    signer: Option<SigV4Signer>,
}

impl HttpTransport {
    pub fn new(config: &S3Config) -> Result<Self, TransportError> {
        let endpoint = config.endpoint_url();
        let base = Url::parse(&endpoint)
            .map_err(|e| TransportError::Request(format!("invalid endpoint {}: {}", endpoint, e)))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let signer = config.credentials().map(|(access, secret)| {
            SigV4Signer::new(
                access.to_string(),
                secret.to_string(),
                config.session_token.clone(),
                config.region.clone(),
            )
        });

        Ok(Self {
            client,
            base,
            bucket: config.bucket.clone(),
            path_style: config.force_path_style,
            signer,
        })
    }

    /// Host (with port when non-default) and encoded absolute path for a request
    fn address(&self, path: &str) -> Result<(String, String), TransportError> {
        let host = self
            .base
            .host_str()
            .ok_or_else(|| TransportError::Request(format!("endpoint {} has no host", self.base)))?;
        let host = match self.base.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        let object_path = uri_encode_path(path);
        if self.path_style {
            Ok((host, format!("/{}{}", self.bucket, object_path)))
        } else {
            Ok((format!("{}.{}", self.bucket, host), object_path))
        }
    }

    fn url_for(&self, host: &str, path: &str, query: &str) -> String {
        let mut url = format!("{}://{}{}", self.base.scheme(), host, path);
        if !query.is_empty() {
            url.push('?');
            url.push_str(query);
        }
        url
    }
}

fn to_reqwest(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Put => reqwest::Method::PUT,
        Method::Post => reqwest::Method::POST,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else if err.is_builder() {
        TransportError::Request(err.to_string())
    } else {
        TransportError::Io(err.to_string())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        let (host, path) = self.address(&request.path)?;
        let query = canonical_query(&request.query);
        let url = self.url_for(&host, &path, &query);

        let mut headers = request.headers.clone();
        if let Some(signer) = &self.signer {
            let signed = signer.sign(&SigningRequest {
                method: request.method.as_str(),
                host: &host,
                path: &path,
                query: &request.query,
                headers: &request.headers,
                payload: &request.body,
            })?;
            headers.extend(signed);
        }

        trace!(method = %request.method, %url, bytes = request.body.len(), "sending request");

        let mut builder = self.client.request(to_reqwest(request.method), &url);
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let response = builder
            .body(request.body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body = Body::from_stream(response.bytes_stream().map_err(map_reqwest_error));

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}
