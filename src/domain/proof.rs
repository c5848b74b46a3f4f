//! The transmissible proof payload.
//!
//! Field names and nesting are wire-exact: the metadata hash in the proof
//! is computed over the serialized `CaptureMetadata` object exactly as it
//! is transmitted, so a verifier can recompute it byte-for-byte.

use serde::{Deserialize, Serialize};

use super::capture::DeviceInfo;

/// Test type tag for vertical jump captures.
pub const TEST_TYPE_VERT_JUMP: &str = "VERT_JUMP";

/// Capture metadata, transmitted inside the proof and hashed canonically.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureMetadata {
    /// Always "VERT_JUMP" for this client
    pub test_type: String,
    pub started_at_ms: i64,
    pub ended_at_ms: i64,
    pub fps: f64,
    pub device: DeviceInfo,
}

/// SHA-256 digests of the three proof inputs, lowercase hex, 64 chars each.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HashBundle {
    pub video_sha256: String,
    pub sensor_sha256: String,
    pub metadata_sha256: String,
}

/// ES256 signature block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureBundle {
    /// Always "ES256"
    pub alg: String,
    /// Key id derived from the public key (hash-based)
    #[serde(rename = "keyId")]
    pub key_id: String,
    /// Base64 of the raw ECDSA signature over nonce + the three hashes
    pub sig: String,
}

/// The signed bundle a client submits in place of raw trust.
///
/// The signature covers the nonce and all three hashes, so neither the
/// video, the sensor stream, nor the metadata can be substituted post-hoc
/// without invalidating it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofPayload {
    pub session_id: String,
    pub nonce: String,
    pub capture: CaptureMetadata,
    pub hashes: HashBundle,
    pub signature: SignatureBundle,
    pub sensors_available: bool,
}
