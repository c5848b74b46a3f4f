//! Adapter interfaces for external systems.
//!
//! The verification server sits behind one trait so the orchestrator and
//! the tests never construct HTTP requests themselves.

pub mod http;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{JumpResult, ProofPayload, Session, SubmissionResult};
use crate::error::Result;

pub use http::HttpServerApi;

/// Request to open a capture session against a device key.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub user_id: String,
    pub device_key_id: String,
    /// Base64 of the uncompressed P-256 public point
    pub public_key: String,
    pub platform: String,
}

/// Wire shape of a freshly issued session.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub nonce: String,
    pub nonce_display: String,
    pub expires_at: DateTime<Utc>,
}

/// Where the capture artifacts go.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadDestination {
    /// Resumable upload creation endpoint for the video
    pub video_upload_endpoint: String,
    /// One-shot endpoint for the sensor artifact
    pub sensor_upload_endpoint: String,
}

/// Proof submission, referencing the already-uploaded artifacts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJumpRequest {
    pub proof: ProofPayload,
    /// Stream id returned by the resumable video upload
    pub video_stream_id: String,
}

/// The verification server.
#[async_trait]
pub trait ServerApi: Send + Sync {
    /// Open a session; the returned nonce binds the next capture.
    async fn create_session(&self, request: &CreateSessionRequest) -> Result<Session>;

    /// Resolve upload endpoints for a session's artifacts.
    async fn get_upload_destination(&self, session_id: &str) -> Result<UploadDestination>;

    /// Submit a signed proof for verification.
    async fn submit_jump(&self, request: &SubmitJumpRequest) -> Result<SubmissionResult>;

    /// Poll the verification outcome for a submitted jump. Idempotent.
    async fn get_jump(&self, jump_id: &str) -> Result<JumpResult>;
}
