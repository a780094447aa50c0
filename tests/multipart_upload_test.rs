//! Integration tests for streaming multipart uploads
//!
//! These run the full initiate, stream and complete cycle against the
//! in-memory transport, including injected part failures and slow parts.

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use stratus::s3::{
    Method, MockTransport, S3Client, S3Error, TransportError, Upload, MAX_PARTS, MIN_PART_SIZE,
};
use tokio::io::{AsyncRead, ReadBuf};

const MIB: usize = 1024 * 1024;

/// Reader that hands out data in small chunks, optionally failing part way
struct ChunkedReader {
    remaining: usize,
    chunk_size: usize,
    fail_after: Option<usize>,
    served: usize,
}

impl ChunkedReader {
    fn new(total: usize) -> Self {
        Self {
            remaining: total,
            chunk_size: 64 * 1024,
            fail_after: None,
            served: 0,
        }
    }

    fn failing_after(total: usize, fail_after: usize) -> Self {
        Self {
            fail_after: Some(fail_after),
            ..Self::new(total)
        }
    }
}

impl AsyncRead for ChunkedReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if let Some(limit) = self.fail_after {
            if self.served >= limit {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "source went away",
                )));
            }
        }
        if self.remaining == 0 {
            return Poll::Ready(Ok(()));
        }

        let to_write = self.chunk_size.min(self.remaining).min(buf.remaining());
        let data: Vec<u8> = (0..to_write)
            .map(|i| ((self.served + i) % 251) as u8)
            .collect();
        buf.put_slice(&data);
        self.remaining -= to_write;
        self.served += to_write;
        Poll::Ready(Ok(()))
    }
}

/// Reader that records whether it was ever polled
struct TouchReader {
    touched: Arc<AtomicBool>,
}

impl AsyncRead for TouchReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.touched.store(true, Ordering::SeqCst);
        Poll::Ready(Ok(()))
    }
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

async fn start(transport: &Arc<MockTransport>, key: &str) -> Upload {
    let client = S3Client::with_transport("bucket", transport.clone());
    client
        .initiate_upload(key, Vec::<(String, String)>::new())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_twelve_mib_with_three_workers() {
    let transport = Arc::new(MockTransport::new());
    let upload = start(&transport, "video/clip.mp4").await;
    let data = pattern(12 * MIB);

    let total = upload.stream(&data[..], 5 * MIB, 3).await.unwrap();
    assert_eq!(total, 12 * MIB as u64);
    assert_eq!(
        transport.part_sizes(upload.upload_id()),
        vec![5 * MIB, 5 * MIB, 2 * MIB]
    );

    upload.complete().await.unwrap();
    assert_eq!(
        transport.completed_manifest(upload.upload_id()),
        Some(vec![1, 2, 3])
    );
    assert_eq!(transport.object("video/clip.mp4"), Some(Bytes::from(data)));
}

#[tokio::test]
async fn test_manifest_sorted_when_parts_finish_out_of_order() {
    let transport = Arc::new(MockTransport::new());
    transport.delay_part(1, Duration::from_millis(300));
    transport.delay_part(2, Duration::from_millis(150));
    let upload = start(&transport, "out-of-order.bin").await;
    let data = pattern(3 * MIN_PART_SIZE + 100);

    upload.stream(&data[..], MIN_PART_SIZE, 4).await.unwrap();

    let acknowledged = transport.acknowledged_parts(upload.upload_id());
    assert_eq!(acknowledged.len(), 4);
    assert_ne!(acknowledged, vec![1, 2, 3, 4], "parts should finish out of order");

    upload.complete().await.unwrap();
    assert_eq!(
        transport.completed_manifest(upload.upload_id()),
        Some(vec![1, 2, 3, 4])
    );
    assert_eq!(transport.object("out-of-order.bin"), Some(Bytes::from(data)));
}

#[tokio::test]
async fn test_small_reads_are_assembled_into_full_parts() {
    let transport = Arc::new(MockTransport::new());
    let upload = start(&transport, "chunked").await;

    let total = upload
        .stream(ChunkedReader::new(11 * MIB), 5 * MIB, 2)
        .await
        .unwrap();
    assert_eq!(total, 11 * MIB as u64);
    assert_eq!(
        transport.part_sizes(upload.upload_id()),
        vec![5 * MIB, 5 * MIB, MIB]
    );
}

#[tokio::test]
async fn test_part_failure_never_completes() {
    let transport = Arc::new(MockTransport::new());
    transport.fail_part(4, 500);
    let upload = start(&transport, "broken").await;
    let data = pattern(10 * 5 * MIB);

    let failure = upload.stream(&data[..], 5 * MIB, 3).await.unwrap_err();
    assert_eq!(failure.error.status(), Some(500));
    assert!(failure.transferred >= 4 * 5 * MIB as u64);
    assert_eq!(failure.transferred % (5 * MIB) as u64, 0);

    // Nothing completes or aborts on its own.
    assert_eq!(transport.count_requests(Method::Post, "uploadId"), 0);
    assert_eq!(transport.count_requests(Method::Delete, "uploadId"), 0);
    assert!(transport.has_upload(upload.upload_id()));
    assert!(transport.object("broken").is_none());
}

#[tokio::test]
async fn test_transport_error_surfaces_unchanged() {
    let transport = Arc::new(MockTransport::new());
    transport.disconnect_part(2);
    let upload = start(&transport, "reset").await;
    let data = pattern(3 * 5 * MIB);

    let failure = upload.stream_sequential(&data[..], 5 * MIB).await.unwrap_err();
    assert!(matches!(
        failure.error,
        S3Error::Transport(TransportError::Connect(_))
    ));
}

#[tokio::test]
async fn test_reader_error_stops_stream() {
    let transport = Arc::new(MockTransport::new());
    let upload = start(&transport, "flaky-source").await;

    let failure = upload
        .stream(ChunkedReader::failing_after(20 * MIB, 7 * MIB), 5 * MIB, 2)
        .await
        .unwrap_err();
    assert!(matches!(failure.error, S3Error::Io(_)));
    assert_eq!(failure.transferred, 5 * MIB as u64);
    assert_eq!(upload.parts_assigned(), 1);
}

#[tokio::test]
async fn test_block_size_below_minimum_rejected_before_reading() {
    let transport = Arc::new(MockTransport::new());
    let upload = start(&transport, "tiny-blocks").await;
    let touched = Arc::new(AtomicBool::new(false));

    let failure = upload
        .stream(
            TouchReader {
                touched: touched.clone(),
            },
            MIN_PART_SIZE - 1,
            4,
        )
        .await
        .unwrap_err();

    assert!(failure.error.is_limit_exceeded());
    assert_eq!(failure.transferred, 0);
    assert!(!touched.load(Ordering::SeqCst));
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn test_part_limit_rejected_without_request() {
    let transport = Arc::new(MockTransport::new());
    let upload = start(&transport, "many-parts").await;

    for _ in 0..MAX_PARTS {
        upload.write(Bytes::from_static(b"p")).await.unwrap();
    }
    let before = transport.request_count();
    assert_eq!(before, 1 + MAX_PARTS as usize);

    let err = upload.write(Bytes::from_static(b"p")).await.unwrap_err();
    assert!(err.is_limit_exceeded());
    assert_eq!(transport.request_count(), before);
    assert_eq!(upload.parts_assigned(), MAX_PARTS as usize);

    upload.complete().await.unwrap();
    assert_eq!(
        transport.object("many-parts").map(|b| b.len()),
        Some(MAX_PARTS as usize)
    );
}

#[tokio::test]
async fn test_empty_input_then_complete_fails_locally() {
    let transport = Arc::new(MockTransport::new());
    let upload = start(&transport, "empty").await;

    assert_eq!(upload.stream(&b""[..], 5 * MIB, 3).await.unwrap(), 0);
    assert!(matches!(
        upload.complete().await,
        Err(S3Error::IncompleteUpload(_))
    ));
    assert_eq!(transport.count_requests(Method::Post, "uploadId"), 0);
}

#[tokio::test]
async fn test_abort_after_failure_frees_upload() {
    let transport = Arc::new(MockTransport::new());
    transport.fail_part(1, 503);
    let upload = start(&transport, "abandoned").await;
    let data = pattern(6 * MIB);

    assert!(upload.stream(&data[..], 5 * MIB, 2).await.is_err());
    upload.abort().await.unwrap();
    assert!(!transport.has_upload(upload.upload_id()));
}

#[tokio::test]
async fn test_sequential_and_parallel_store_same_object() {
    let data = pattern(17 * MIB);

    let mut stored = Vec::new();
    for workers in [1, 5] {
        let transport = Arc::new(MockTransport::new());
        let upload = start(&transport, "same").await;
        upload.stream(&data[..], 5 * MIB, workers).await.unwrap();
        upload.complete().await.unwrap();
        stored.push(transport.object("same").unwrap());
    }
    assert_eq!(stored[0], stored[1]);
    assert_eq!(stored[0].len(), 17 * MIB);
}
