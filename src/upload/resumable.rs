//! Resumable chunked upload (tus protocol).
//!
//! Content is split into fixed-size chunks, each acknowledged with an
//! `Upload-Offset` header. Transient failures retry on a fixed delay
//! schedule with a capped attempt count, re-querying the server offset
//! before each retry so an interrupted transfer continues from the last
//! acknowledged byte instead of double-submitting.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

use super::{ProgressFn, UploadPhase, UploadProgress};
use crate::error::{Result, XLensError};

/// Default chunk size: 5 MB.
pub const DEFAULT_CHUNK_SIZE: usize = 5 * 1024 * 1024;

const TUS_VERSION: &str = "1.0.0";

/// Fixed retry delay schedule in milliseconds; the schedule length caps
/// the attempt count per chunk.
pub fn default_retry_delays() -> Vec<u64> {
    vec![0, 3000, 5000, 10000, 20000]
}

/// Chunked uploader with resume support.
pub struct TusUploader {
    client: reqwest::Client,
    chunk_size: usize,
    retry_delays_ms: Vec<u64>,
    cancelled: AtomicBool,
    /// Upload URL of the in-flight (or interrupted) transfer
    location: Mutex<Option<String>>,
}

impl TusUploader {
    pub fn new(chunk_size: usize, retry_delays_ms: Vec<u64>) -> Self {
        Self {
            client: reqwest::Client::new(),
            chunk_size,
            retry_delays_ms,
            cancelled: AtomicBool::new(false),
            location: Mutex::new(None),
        }
    }

    /// Upload `data` to `endpoint`, firing `on_progress` per acknowledged
    /// chunk. Returns the server-assigned stream id.
    pub async fn upload(
        &self,
        data: &[u8],
        endpoint: &str,
        on_progress: &ProgressFn,
    ) -> Result<String> {
        let location = self.create_upload(endpoint, data.len()).await?;
        self.set_location(Some(location.clone()));

        let result = self.send_chunks(data, &location, 0, on_progress).await;
        if result.is_ok() {
            self.set_location(None);
        }
        result.map(|()| stream_id_from_location(&location))
    }

    /// Continue an interrupted transfer from the last acknowledged byte.
    /// Fails if no transfer is pending.
    pub async fn resume(&self, data: &[u8], on_progress: &ProgressFn) -> Result<String> {
        let location = self
            .location
            .lock()
            .ok()
            .and_then(|loc| loc.clone())
            .ok_or_else(|| XLensError::UploadFailed("no upload to resume".into()))?;

        let offset = self.query_offset(&location).await?;
        info!(offset, "Resuming upload");

        let result = self.send_chunks(data, &location, offset, on_progress).await;
        if result.is_ok() {
            self.set_location(None);
        }
        result.map(|()| stream_id_from_location(&location))
    }

    /// Abort the in-flight transfer. Idempotent; safe from any state.
    /// The uploader stays aborted, refusing `upload` and `resume`, until
    /// `reset` re-arms it for the next capture.
    pub fn abort(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Re-arm after an abort and forget any interrupted transfer. Called
    /// when a new capture begins.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
        self.set_location(None);
    }

    fn set_location(&self, value: Option<String>) {
        if let Ok(mut loc) = self.location.lock() {
            *loc = value;
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(XLensError::UploadFailed("upload aborted".into()));
        }
        Ok(())
    }

    async fn create_upload(&self, endpoint: &str, total: usize) -> Result<String> {
        self.check_cancelled()?;

        let response = self
            .client
            .post(endpoint)
            .header("Tus-Resumable", TUS_VERSION)
            .header("Upload-Length", total.to_string())
            .header("Content-Length", "0")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(XLensError::UploadFailed(format!(
                "upload creation returned {}",
                response.status()
            )));
        }

        let location = response
            .headers()
            .get("Location")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| XLensError::UploadFailed("no Location header".into()))?;

        Ok(resolve_location(endpoint, location))
    }

    async fn send_chunks(
        &self,
        data: &[u8],
        location: &str,
        start_offset: u64,
        on_progress: &ProgressFn,
    ) -> Result<()> {
        let total = data.len() as u64;
        let mut offset = start_offset;

        while offset < total {
            self.check_cancelled()?;

            let end = (offset as usize + self.chunk_size).min(data.len());
            let chunk = &data[offset as usize..end];

            offset = self.send_chunk_with_retry(location, offset, chunk).await?;

            on_progress(UploadProgress {
                phase: UploadPhase::Video,
                bytes_uploaded: offset,
                bytes_total: total,
            });
        }

        debug!(total, "Upload complete");
        Ok(())
    }

    /// Send one chunk, retrying on the fixed delay schedule. The server
    /// offset is re-queried before each retry so an acknowledged-but-
    /// unconfirmed chunk is never re-sent.
    async fn send_chunk_with_retry(
        &self,
        location: &str,
        offset: u64,
        chunk: &[u8],
    ) -> Result<u64> {
        let mut offset = offset;
        let mut chunk = chunk;
        let mut last_error = None;

        for (attempt, delay_ms) in self.retry_delays_ms.iter().enumerate() {
            if *delay_ms > 0 {
                sleep(Duration::from_millis(*delay_ms)).await;
            }
            self.check_cancelled()?;

            if attempt > 0 {
                // Re-sync with the server before retrying
                match self.query_offset(location).await {
                    Ok(server_offset) if server_offset > offset => {
                        let advanced = (server_offset - offset) as usize;
                        if advanced >= chunk.len() {
                            return Ok(server_offset);
                        }
                        chunk = &chunk[advanced..];
                        offset = server_offset;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(attempt, error = %e, "Offset query failed");
                        last_error = Some(e);
                        continue;
                    }
                }
            }

            match self.patch_chunk(location, offset, chunk).await {
                Ok(new_offset) => return Ok(new_offset),
                Err(e) => {
                    warn!(attempt, offset, error = %e, "Chunk upload failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| XLensError::UploadFailed("chunk retries exhausted".into())))
    }

    async fn patch_chunk(&self, location: &str, offset: u64, chunk: &[u8]) -> Result<u64> {
        let response = self
            .client
            .patch(location)
            .header("Tus-Resumable", TUS_VERSION)
            .header("Upload-Offset", offset.to_string())
            .header("Content-Type", "application/offset+octet-stream")
            .body(chunk.to_vec())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(XLensError::UploadFailed(format!(
                "chunk at offset {} returned {}",
                offset,
                response.status()
            )));
        }

        response
            .headers()
            .get("Upload-Offset")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| XLensError::UploadFailed("no Upload-Offset in ack".into()))
    }

    async fn query_offset(&self, location: &str) -> Result<u64> {
        let response = self
            .client
            .head(location)
            .header("Tus-Resumable", TUS_VERSION)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(XLensError::UploadFailed(format!(
                "offset query returned {}",
                response.status()
            )));
        }

        response
            .headers()
            .get("Upload-Offset")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| XLensError::UploadFailed("no Upload-Offset header".into()))
    }
}

/// Resolve a possibly-relative Location header against the creation endpoint.
fn resolve_location(endpoint: &str, location: &str) -> String {
    if location.starts_with("http://") || location.starts_with("https://") {
        return location.to_string();
    }
    if let Some(scheme_end) = endpoint.find("://") {
        if let Some(path_start) = endpoint[scheme_end + 3..].find('/') {
            let origin = &endpoint[..scheme_end + 3 + path_start];
            return format!("{}{}", origin, location);
        }
    }
    format!("{}/{}", endpoint.trim_end_matches('/'), location.trim_start_matches('/'))
}

/// The stream id is the final path segment of the upload URL.
fn stream_id_from_location(location: &str) -> String {
    location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(location)
        .to_string()
}
