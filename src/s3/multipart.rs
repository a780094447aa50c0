//! Multipart upload sessions and the concurrent streaming engine
//!
//! A single producer reads the input in fixed-size blocks, numbers each block
//! and hands it to a bounded queue. A fixed pool of workers drains the queue
//! and uploads parts in whatever order they finish. Because numbering happens
//! before dispatch, completion order never affects the manifest.

use super::client::S3Client;
use super::error::{S3Error, S3Result, StreamFailure};
use super::registry::PartRegistry;
use super::transport::Request;
use super::xml::{self, CompleteMultipartUpload, CompleteMultipartUploadResult, InitiateMultipartUploadResult};
use super::{MAX_PARTS, MAX_PART_SIZE, MIN_PART_SIZE};
use bytes::Bytes;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A numbered block of input on its way to a worker
struct Chunk {
    part_number: u32,
    data: Bytes,
}

struct UploadState {
    key: String,
    path: String,
    upload_id: String,
    registry: PartRegistry,
}

/// An in-progress multipart upload
///
/// Created by [`S3Client::initiate_upload`]. Finish it with
/// [`Upload::complete`]; abandoning it leaves the parts on the server until
/// [`Upload::abort`] is called.
#[derive(Clone)]
pub struct Upload {
    client: S3Client,
    state: Arc<UploadState>,
}

impl S3Client {
    /// Start a multipart upload at `path`
    ///
    /// `headers` are sent with the initiate request only (content type,
    /// metadata, ACL, ...).
    pub async fn initiate_upload<I, K, V>(&self, path: &str, headers: I) -> S3Result<Upload>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let request = Request::post(path).query("uploads", "").headers(headers);
        let context = format!("initiate multipart upload of {}", request.path);
        let response = self.send_expect(request, 200, context).await?;
        let body = response.bytes().await?;
        let result: InitiateMultipartUploadResult = xml::from_xml(&body)?;

        info!(
            bucket = %self.bucket(),
            key = %result.key,
            upload_id = %result.upload_id,
            "multipart upload started"
        );

        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };

        Ok(Upload {
            client: self.clone(),
            state: Arc::new(UploadState {
                key: result.key,
                path,
                upload_id: result.upload_id,
                registry: PartRegistry::new(),
            }),
        })
    }

    /// Abort a multipart upload by id, freeing its stored parts
    pub async fn abort_upload(&self, path: &str, upload_id: &str) -> S3Result<()> {
        let request = Request::delete(path).query("uploadId", upload_id);
        let context = format!("abort multipart upload {}", upload_id);
        self.send_expect(request, 204, context).await?;
        info!(upload_id = %upload_id, "multipart upload aborted");
        Ok(())
    }
}

impl Upload {
    /// Object key reported by the service
    pub fn key(&self) -> &str {
        &self.state.key
    }

    /// Request path the upload was started on
    pub fn path(&self) -> &str {
        &self.state.path
    }

    pub fn upload_id(&self) -> &str {
        &self.state.upload_id
    }

    /// Number of part numbers handed out so far
    pub fn parts_assigned(&self) -> usize {
        self.state.registry.len()
    }

    /// Number of parts acknowledged by the service
    pub fn parts_completed(&self) -> usize {
        self.state.registry.completed()
    }

    /// Upload `data` as the next part and wait for the acknowledgement
    pub async fn write(&self, data: impl Into<Bytes>) -> S3Result<()> {
        let part_number = self.state.registry.assign()?;
        self.put_part(part_number, data.into()).await
    }

    /// PUT one part and record its ETag
    async fn put_part(&self, part_number: u32, data: Bytes) -> S3Result<()> {
        if part_number == 0 || part_number > MAX_PARTS {
            return Err(S3Error::LimitExceeded(format!(
                "part number {} is outside 1..={}",
                part_number, MAX_PARTS
            )));
        }

        let size = data.len();
        let request = Request::put(self.path())
            .query("partNumber", part_number.to_string())
            .query("uploadId", self.upload_id())
            .body(data);
        let response = self.client.send(request).await?;

        // Any status other than 200 fails the part; the body is not consulted.
        if response.status != 200 {
            return Err(S3Error::status_only(
                format!("upload part {} of {}", part_number, self.path()),
                response.status,
            ));
        }

        let etag = response
            .header("ETag")
            .map(str::to_string)
            .ok_or_else(|| {
                S3Error::IncompleteUpload(format!("no ETag returned for part {}", part_number))
            })?;
        self.state.registry.record(part_number, etag)?;

        debug!(part_number, size, "part uploaded");
        Ok(())
    }

    /// Stream `reader` into the upload with `concurrency` parallel part uploads
    ///
    /// Every part except the last is exactly `block_size` bytes. On success
    /// the total number of bytes read is returned. On failure the returned
    /// [`StreamFailure`] carries the bytes queued before the failure was
    /// noticed. Parts already handed to workers are allowed to finish; nothing
    /// is cancelled mid-request. An empty reader produces no parts.
    ///
    /// The upload is not completed or aborted here.
    pub async fn stream<R>(
        &self,
        mut reader: R,
        block_size: usize,
        concurrency: usize,
    ) -> Result<u64, StreamFailure>
    where
        R: AsyncRead + Unpin,
    {
        if block_size < MIN_PART_SIZE {
            return Err(StreamFailure::new(
                0,
                S3Error::LimitExceeded(format!(
                    "S3 requires block sizes of {} bytes or more, got {}",
                    MIN_PART_SIZE, block_size
                )),
            ));
        }
        if block_size as u64 > MAX_PART_SIZE {
            return Err(StreamFailure::new(
                0,
                S3Error::LimitExceeded(format!(
                    "S3 limits parts to {} bytes, got {}",
                    MAX_PART_SIZE, block_size
                )),
            ));
        }
        if concurrency == 0 {
            return Err(StreamFailure::new(
                0,
                S3Error::InvalidConfig("at least one upload worker is required".to_string()),
            ));
        }

        let (chunk_tx, chunk_rx) = mpsc::channel::<Chunk>(1);
        let chunk_rx = Arc::new(Mutex::new(chunk_rx));
        let (error_tx, mut error_rx) = mpsc::channel::<S3Error>(concurrency);

        let workers: Vec<JoinHandle<()>> = (0..concurrency)
            .map(|worker| {
                tokio::spawn(run_worker(
                    worker,
                    self.clone(),
                    Arc::clone(&chunk_rx),
                    error_tx.clone(),
                ))
            })
            .collect();
        // Workers hold the only remaining handles, so a send fails once all of them exit.
        drop(chunk_rx);
        drop(error_tx);

        debug!(
            upload_id = %self.upload_id(),
            block_size,
            concurrency,
            "streaming upload started"
        );

        let produced = self
            .produce(&mut reader, block_size, &chunk_tx, &mut error_rx)
            .await;

        // No more work: let the workers drain what is queued, then join them.
        drop(chunk_tx);
        let mut panicked = None;
        for handle in workers {
            if let Err(e) = handle.await {
                panicked.get_or_insert_with(|| S3Error::WorkerPanicked(e.to_string()));
            }
        }

        let total = produced?;
        if let Ok(err) = error_rx.try_recv() {
            return Err(StreamFailure::new(total, err));
        }
        if let Some(err) = panicked {
            return Err(StreamFailure::new(total, err));
        }

        info!(
            upload_id = %self.upload_id(),
            bytes = total,
            parts = self.parts_assigned(),
            "streaming upload finished"
        );
        Ok(total)
    }

    /// [`Upload::stream`] with a single worker
    pub async fn stream_sequential<R>(&self, reader: R, block_size: usize) -> Result<u64, StreamFailure>
    where
        R: AsyncRead + Unpin,
    {
        self.stream(reader, block_size, 1).await
    }

    /// Producer loop: read, number, dispatch, then poll for worker errors
    async fn produce<R>(
        &self,
        reader: &mut R,
        block_size: usize,
        chunks: &mpsc::Sender<Chunk>,
        errors: &mut mpsc::Receiver<S3Error>,
    ) -> Result<u64, StreamFailure>
    where
        R: AsyncRead + Unpin,
    {
        let mut total = 0u64;
        loop {
            let data = read_block(reader, block_size)
                .await
                .map_err(|e| StreamFailure::new(total, e.into()))?;
            if data.is_empty() {
                return Ok(total);
            }

            let last = data.len() < block_size;
            let len = data.len() as u64;
            let part_number = self
                .state
                .registry
                .assign()
                .map_err(|e| StreamFailure::new(total, e))?;

            debug!(part_number, size = len, "dispatching part");
            if chunks.send(Chunk { part_number, data }).await.is_err() {
                let err = errors.recv().await.unwrap_or_else(|| {
                    S3Error::WorkerPanicked("all upload workers exited".to_string())
                });
                return Err(StreamFailure::new(total, err));
            }
            total += len;

            if last {
                return Ok(total);
            }
            if let Ok(err) = errors.try_recv() {
                return Err(StreamFailure::new(total, err));
            }
        }
    }

    /// Submit the manifest and turn the upload into an object
    ///
    /// Parts are listed in ascending part-number order regardless of the
    /// order they finished in. Fails locally, without a request, when no part
    /// was uploaded or a part is missing its ETag.
    pub async fn complete(&self) -> S3Result<CompleteMultipartUploadResult> {
        let parts = self.state.registry.manifest()?;
        let count = parts.len();
        let body = CompleteMultipartUpload { parts }.to_xml()?;

        let request = Request::post(self.path())
            .query("uploadId", self.upload_id())
            .header("Content-Type", "application/xml")
            .body(body);
        let context = format!("complete multipart upload of {}", self.path());
        let response = self.client.send_expect(request, 200, context.clone()).await?;
        let body = response.bytes().await?;

        // S3 may report a failed completion inside a 200 response.
        if xml::parse_error_body(&body).is_some() {
            return Err(S3Error::protocol(context, 200, &body));
        }
        let result = if body.is_empty() {
            CompleteMultipartUploadResult::default()
        } else {
            xml::from_xml(&body)?
        };

        info!(
            key = %self.key(),
            upload_id = %self.upload_id(),
            parts = count,
            "multipart upload completed"
        );
        Ok(result)
    }

    /// Abort this upload, discarding every uploaded part
    pub async fn abort(&self) -> S3Result<()> {
        self.client.abort_upload(self.path(), self.upload_id()).await
    }
}

impl std::fmt::Debug for Upload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upload")
            .field("key", &self.state.key)
            .field("path", &self.state.path)
            .field("upload_id", &self.state.upload_id)
            .field("parts", &self.state.registry.len())
            .finish()
    }
}

async fn run_worker(
    worker: usize,
    upload: Upload,
    queue: Arc<Mutex<mpsc::Receiver<Chunk>>>,
    errors: mpsc::Sender<S3Error>,
) {
    loop {
        let next = queue.lock().await.recv().await;
        let Some(chunk) = next else {
            break;
        };

        if let Err(err) = upload.put_part(chunk.part_number, chunk.data).await {
            warn!(worker, part_number = chunk.part_number, error = %err, "part upload failed");
            // Capacity equals the worker count and each worker reports once.
            let _ = errors.try_send(err);
            return;
        }
    }
    debug!(worker, "upload worker finished");
}

/// Read up to `block_size` bytes; fewer only at end of input
async fn read_block<R>(reader: &mut R, block_size: usize) -> std::io::Result<Bytes>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; block_size];
    let mut filled = 0;
    while filled < block_size {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(Bytes::from(buf))
}
