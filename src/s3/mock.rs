//! In-memory S3 transport for testing
//!
//! [`MockTransport`] answers the subset of the REST protocol this crate
//! speaks: multipart uploads, ListObjectsV2, and plain object get/put/delete.
//! Every request is logged, and failures can be injected per part or per
//! listing page.

use super::signer::payload_hash;
use super::transport::{Method, Request, Response, Transport, TransportError};
use super::xml::{
    self, CompleteMultipartUpload, CompleteMultipartUploadResult, InitiateMultipartUploadResult,
    ListBucketResult, ListEntry,
};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use std::time::Duration;

const CONTINUATION_PREFIX: &str = "after:";

#[derive(Debug, Default)]
struct PendingUpload {
    key: String,
    parts: HashMap<u32, (Bytes, String)>,
}

#[derive(Debug, Default)]
struct MockState {
    objects: BTreeMap<String, Bytes>,
    uploads: HashMap<String, PendingUpload>,
    next_upload: u64,
    requests: Vec<Request>,
    list_requests: usize,
    manifests: HashMap<String, Vec<u32>>,
    acknowledged: HashMap<String, Vec<u32>>,

    initiate_failure: Option<u16>,
    part_failures: HashMap<u32, u16>,
    part_disconnects: Vec<u32>,
    part_delays: HashMap<u32, Duration>,
    list_failures: HashMap<usize, u16>,
    omit_etags: bool,
}

/// In-memory S3 bucket implementing [`Transport`]
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use stratus::s3::{MockTransport, S3Client};
///
/// let transport = Arc::new(MockTransport::new());
/// transport.insert_object("notes/a.txt", &b"hello"[..]);
///
/// let client = S3Client::with_transport("bucket", transport.clone());
/// assert_eq!(client.bucket(), "bucket");
/// assert_eq!(transport.object_count(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct MockTransport {
    state: Arc<RwLock<MockState>>,
    page_size: usize,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Create an empty bucket listing 1000 keys per page
    pub fn new() -> Self {
        Self::with_page_size(1000)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(MockState::default())),
            page_size: page_size.max(1),
        }
    }

    /// Store an object directly
    pub fn insert_object(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        self.state
            .write()
            .unwrap()
            .objects
            .insert(key.into(), data.into());
    }

    /// Contents of a stored object
    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.state.read().unwrap().objects.get(key).cloned()
    }

    pub fn object_count(&self) -> usize {
        self.state.read().unwrap().objects.len()
    }

    /// Every request received, in arrival order
    pub fn requests(&self) -> Vec<Request> {
        self.state.read().unwrap().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.read().unwrap().requests.len()
    }

    /// Number of requests with the given method carrying query key `flag`
    pub fn count_requests(&self, method: Method, flag: &str) -> usize {
        self.state
            .read()
            .unwrap()
            .requests
            .iter()
            .filter(|r| r.method == method && r.has_query(flag))
            .count()
    }

    /// Whether an upload is still open
    pub fn has_upload(&self, upload_id: &str) -> bool {
        self.state.read().unwrap().uploads.contains_key(upload_id)
    }

    /// Sizes of the parts held for an open upload, by ascending part number
    pub fn part_sizes(&self, upload_id: &str) -> Vec<usize> {
        let state = self.state.read().unwrap();
        let Some(upload) = state.uploads.get(upload_id) else {
            return Vec::new();
        };
        let mut numbers: Vec<&u32> = upload.parts.keys().collect();
        numbers.sort();
        numbers
            .into_iter()
            .map(|n| upload.parts[n].0.len())
            .collect()
    }

    /// Part numbers submitted in the completion manifest of an upload
    pub fn completed_manifest(&self, upload_id: &str) -> Option<Vec<u32>> {
        self.state.read().unwrap().manifests.get(upload_id).cloned()
    }

    /// Part numbers of an upload in the order they were acknowledged
    pub fn acknowledged_parts(&self, upload_id: &str) -> Vec<u32> {
        self.state
            .read()
            .unwrap()
            .acknowledged
            .get(upload_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Reject the next initiate requests with `status`
    pub fn fail_initiate(&self, status: u16) {
        self.state.write().unwrap().initiate_failure = Some(status);
    }

    /// Answer uploads of part `part_number` with `status`
    pub fn fail_part(&self, part_number: u32, status: u16) {
        self.state
            .write()
            .unwrap()
            .part_failures
            .insert(part_number, status);
    }

    /// Fail uploads of part `part_number` with a connection error
    pub fn disconnect_part(&self, part_number: u32) {
        self.state
            .write()
            .unwrap()
            .part_disconnects
            .push(part_number);
    }

    /// Hold part `part_number` for `delay` before acknowledging it
    pub fn delay_part(&self, part_number: u32, delay: Duration) {
        self.state
            .write()
            .unwrap()
            .part_delays
            .insert(part_number, delay);
    }

    /// Answer the `page`-th listing request (zero based) with `status`
    pub fn fail_list_page(&self, page: usize, status: u16) {
        self.state.write().unwrap().list_failures.insert(page, status);
    }

    /// Acknowledge parts without an ETag header
    pub fn omit_etags(&self) {
        self.state.write().unwrap().omit_etags = true;
    }

    fn initiate(&self, key: String) -> Response {
        let mut state = self.state.write().unwrap();
        if let Some(status) = state.initiate_failure {
            return error_response(status, &format!("/{}", key));
        }

        state.next_upload += 1;
        let upload_id = format!("mock-upload-{:04}", state.next_upload);
        state.uploads.insert(
            upload_id.clone(),
            PendingUpload {
                key: key.clone(),
                parts: HashMap::new(),
            },
        );

        let body = InitiateMultipartUploadResult {
            bucket: "mock".to_string(),
            key,
            upload_id,
        };
        xml_response(200, "InitiateMultipartUploadResult", &body)
    }

    async fn upload_part(&self, request: &Request) -> Result<Response, TransportError> {
        let upload_id = request.query_param("uploadId").unwrap_or_default();
        let part_number: u32 = match request.query_param("partNumber").map(str::parse::<u32>) {
            Some(Ok(n)) if (1..=10_000).contains(&n) => n,
            _ => return Ok(error_response(400, &request.path)),
        };

        let (delay, failure, disconnect) = {
            let state = self.state.read().unwrap();
            (
                state.part_delays.get(&part_number).copied(),
                state.part_failures.get(&part_number).copied(),
                state.part_disconnects.contains(&part_number),
            )
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if disconnect {
            return Err(TransportError::Connect(format!(
                "connection reset during part {}",
                part_number
            )));
        }
        if let Some(status) = failure {
            return Ok(error_response(status, &request.path));
        }

        let mut state = self.state.write().unwrap();
        let omit_etags = state.omit_etags;
        let Some(upload) = state.uploads.get_mut(upload_id) else {
            return Ok(error_response(404, &request.path));
        };
        let etag = format!("\"{}\"", &payload_hash(&request.body)[..32]);
        upload
            .parts
            .insert(part_number, (request.body.clone(), etag.clone()));
        state
            .acknowledged
            .entry(upload_id.to_string())
            .or_default()
            .push(part_number);

        let response = Response::new(200);
        if omit_etags {
            Ok(response)
        } else {
            Ok(response.with_header("ETag", etag))
        }
    }

    fn complete(&self, request: &Request) -> Response {
        let upload_id = request.query_param("uploadId").unwrap_or_default();
        let manifest: CompleteMultipartUpload = match xml::from_xml(&request.body) {
            Ok(manifest) => manifest,
            Err(_) => return error_with_code(400, "MalformedXML", &request.path),
        };

        let mut state = self.state.write().unwrap();
        let Some(upload) = state.uploads.get(upload_id) else {
            return error_response(404, &request.path);
        };
        if manifest.parts.is_empty() {
            return error_with_code(400, "MalformedXML", &request.path);
        }
        if manifest
            .parts
            .windows(2)
            .any(|pair| pair[0].part_number >= pair[1].part_number)
        {
            return error_with_code(400, "InvalidPartOrder", &request.path);
        }

        let mut data = BytesMut::new();
        for part in &manifest.parts {
            match upload.parts.get(&part.part_number) {
                Some((bytes, etag)) if *etag == part.etag => data.extend_from_slice(bytes),
                _ => return error_with_code(400, "InvalidPart", &request.path),
            }
        }

        let key = upload.key.clone();
        let numbers = manifest.parts.iter().map(|p| p.part_number).collect();
        state.uploads.remove(upload_id);
        state.manifests.insert(upload_id.to_string(), numbers);
        let data = data.freeze();
        let etag = format!("\"{}-{}\"", &payload_hash(&data)[..32], manifest.parts.len());
        state.objects.insert(key.clone(), data);

        let body = CompleteMultipartUploadResult {
            location: Some(format!("http://mock{}", request.path)),
            bucket: Some("mock".to_string()),
            key: Some(key),
            etag: Some(etag),
        };
        xml_response(200, "CompleteMultipartUploadResult", &body)
    }

    fn abort(&self, request: &Request) -> Response {
        let upload_id = request.query_param("uploadId").unwrap_or_default();
        let mut state = self.state.write().unwrap();
        match state.uploads.remove(upload_id) {
            Some(_) => Response::new(204),
            None => error_response(404, &request.path),
        }
    }

    fn list(&self, request: &Request) -> Response {
        let mut state = self.state.write().unwrap();
        let page = state.list_requests;
        state.list_requests += 1;
        if let Some(status) = state.list_failures.get(&page).copied() {
            return error_response(status, "/");
        }

        let prefix = request.query_param("prefix").unwrap_or_default();
        let after = match request.query_param("continuation-token") {
            Some(token) => match token.strip_prefix(CONTINUATION_PREFIX) {
                Some(key) => Some(key.to_string()),
                None => return error_with_code(400, "InvalidArgument", "/"),
            },
            None => None,
        };

        let mut matching = state
            .objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| after.as_deref().map_or(true, |a| key.as_str() > a));
        let contents: Vec<ListEntry> = matching
            .by_ref()
            .take(self.page_size)
            .map(|(key, data)| ListEntry {
                key: key.clone(),
                size: Some(data.len() as u64),
                etag: Some(format!("\"{}\"", &payload_hash(data)[..32])),
                last_modified: Some("2024-01-01T00:00:00.000Z".to_string()),
                storage_class: Some("STANDARD".to_string()),
            })
            .collect();
        let truncated = matching.next().is_some();

        let next_continuation_token = match (truncated, contents.last()) {
            (true, Some(last)) => Some(format!("{}{}", CONTINUATION_PREFIX, last.key)),
            _ => None,
        };
        let body = ListBucketResult {
            name: Some("mock".to_string()),
            prefix: Some(prefix.to_string()),
            key_count: Some(contents.len() as u32),
            is_truncated: Some(truncated),
            next_continuation_token,
            contents,
        };
        xml_response(200, "ListBucketResult", &body)
    }

    fn object_request(&self, request: &Request) -> Response {
        let key = request.path.trim_start_matches('/').to_string();
        match request.method {
            Method::Get => match self.object(&key) {
                Some(data) => Response::new(200)
                    .with_header("Content-Length", data.len().to_string())
                    .with_body(data),
                None => error_with_code(404, "NoSuchKey", &request.path),
            },
            Method::Put => {
                let etag = format!("\"{}\"", &payload_hash(&request.body)[..32]);
                self.insert_object(key, request.body.clone());
                Response::new(200).with_header("ETag", etag)
            }
            Method::Delete => {
                self.state.write().unwrap().objects.remove(&key);
                Response::new(204)
            }
            Method::Post => error_with_code(405, "MethodNotAllowed", &request.path),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        self.state.write().unwrap().requests.push(request.clone());

        let response = match request.method {
            Method::Post if request.has_query("uploads") => {
                self.initiate(request.path.trim_start_matches('/').to_string())
            }
            Method::Put if request.has_query("uploadId") => {
                return self.upload_part(&request).await;
            }
            Method::Post if request.has_query("uploadId") => self.complete(&request),
            Method::Delete if request.has_query("uploadId") => self.abort(&request),
            Method::Get if request.has_query("list-type") => self.list(&request),
            _ => self.object_request(&request),
        };
        Ok(response)
    }
}

fn xml_response<T: serde::Serialize>(status: u16, root: &str, body: &T) -> Response {
    match xml::to_xml(root, body) {
        Ok(text) => Response::new(status)
            .with_header("Content-Type", "application/xml")
            .with_body(text),
        Err(_) => Response::new(500),
    }
}

fn error_response(status: u16, resource: &str) -> Response {
    let code = match status {
        400 => "InvalidRequest",
        403 => "AccessDenied",
        404 => "NoSuchUpload",
        409 => "Conflict",
        503 => "SlowDown",
        _ => "InternalError",
    };
    error_with_code(status, code, resource)
}

fn error_with_code(status: u16, code: &str, resource: &str) -> Response {
    let body = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Error><Code>{}</Code><Message>mock {} failure</Message><Resource>{}</Resource><RequestId>mock-request</RequestId></Error>",
        code, status, resource
    );
    Response::new(status)
        .with_header("Content-Type", "application/xml")
        .with_body(body)
}
