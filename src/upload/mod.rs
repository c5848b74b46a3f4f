//! Payload transport to the upload endpoints.
//!
//! Large video blobs go through the resumable chunked uploader; small
//! JSON payloads (sensor data, proofs) go through the one-shot uploader
//! where a full retry is cheap.

pub mod resumable;
pub mod simple;

use async_trait::async_trait;

use crate::error::Result;

pub use resumable::TusUploader;
pub use simple::SimpleUploader;

/// Which artifact a progress event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    Video,
    Sensor,
    Proof,
}

/// Transient upload progress. Recomputed on every chunk acknowledgment
/// and never retained after the corresponding phase completes.
#[derive(Debug, Clone, Copy)]
pub struct UploadProgress {
    pub phase: UploadPhase,
    pub bytes_uploaded: u64,
    pub bytes_total: u64,
}

impl UploadProgress {
    pub fn percentage(&self) -> f64 {
        if self.bytes_total == 0 {
            return 100.0;
        }
        self.bytes_uploaded as f64 * 100.0 / self.bytes_total as f64
    }
}

/// Callback fired on every acknowledged chunk.
pub type ProgressFn = dyn Fn(UploadProgress) + Send + Sync;

/// Transport seam between the orchestrator and the upload endpoints.
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Resumable chunked upload; returns the server-assigned stream id.
    async fn upload_video(
        &self,
        data: &[u8],
        endpoint: &str,
        on_progress: &ProgressFn,
    ) -> Result<String>;

    /// One-shot upload for small payloads.
    async fn upload_blob(&self, data: &[u8], endpoint: &str, content_type: &str) -> Result<()>;

    /// Abort any in-flight transfer. Idempotent and safe from any state.
    /// An aborted uploader refuses further transfers until `reset`.
    fn abort(&self);

    /// Re-arm an aborted uploader before a new capture's transfers.
    fn reset(&self) {}
}

/// Production uploader: resumable for video, one-shot for the rest.
pub struct HttpUploader {
    tus: TusUploader,
    simple: SimpleUploader,
}

impl HttpUploader {
    pub fn new(chunk_size: usize, retry_delays_ms: Vec<u64>) -> Self {
        Self {
            tus: TusUploader::new(chunk_size, retry_delays_ms),
            simple: SimpleUploader::new(),
        }
    }
}

impl Default for HttpUploader {
    fn default() -> Self {
        Self::new(resumable::DEFAULT_CHUNK_SIZE, resumable::default_retry_delays())
    }
}

#[async_trait]
impl Uploader for HttpUploader {
    async fn upload_video(
        &self,
        data: &[u8],
        endpoint: &str,
        on_progress: &ProgressFn,
    ) -> Result<String> {
        self.tus.upload(data, endpoint, on_progress).await
    }

    async fn upload_blob(&self, data: &[u8], endpoint: &str, content_type: &str) -> Result<()> {
        self.simple.upload(data, endpoint, content_type).await
    }

    fn abort(&self) {
        self.tus.abort();
    }

    fn reset(&self) {
        self.tus.reset();
    }
}
