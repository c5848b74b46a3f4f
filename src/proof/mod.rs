//! Proof assembly and signing.
//!
//! A proof binds one capture to one session: the ES256 signature covers
//! the session nonce plus the SHA-256 digests of the video, the sensor
//! stream, and the transmitted metadata. Hashes computed at capture
//! completion are reused verbatim, never recomputed from intermediate
//! buffers, so the digests in the proof always describe the exact bytes
//! that were (or will be) uploaded.

use tracing::debug;

use crate::crypto::{sha256_hex, KeyStore};
use crate::domain::{
    CaptureMetadata, CaptureResult, DeviceInfo, HashBundle, ProofPayload, Session,
    SignatureBundle, TEST_TYPE_VERT_JUMP,
};
use crate::error::Result;

/// Assembles and signs proof payloads against a device key store.
pub struct ProofBuilder<'a> {
    key_store: &'a KeyStore,
    user_id: &'a str,
}

impl<'a> ProofBuilder<'a> {
    pub fn new(key_store: &'a KeyStore, user_id: &'a str) -> Self {
        Self { key_store, user_id }
    }

    /// Build a signed proof for `capture` bound to `session`.
    ///
    /// `sensors_available` is declared explicitly rather than inferred
    /// from an empty sample list, so a zero-motion capture on a working
    /// sensor is distinguishable from a sensorless one.
    pub fn build(
        &self,
        session: &Session,
        capture: &CaptureResult,
        sensors_available: bool,
    ) -> Result<ProofPayload> {
        let metadata = CaptureMetadata {
            test_type: TEST_TYPE_VERT_JUMP.to_string(),
            started_at_ms: capture.started_at_ms,
            ended_at_ms: capture.ended_at_ms,
            fps: capture.fps,
            device: DeviceInfo::current(),
        };

        // Hashed over the exact bytes that go on the wire.
        let metadata_hash = sha256_hex(&serde_json::to_vec(&metadata)?);

        let signable = signable_payload(
            &session.nonce,
            &capture.video_hash,
            &capture.sensor_hash,
            &metadata_hash,
        );

        let key = self.key_store.get_or_create(self.user_id)?;
        let raw_sig = self.key_store.sign(self.user_id, signable.as_bytes())?;

        debug!(
            session_id = %session.id,
            key_id = %key.key_id,
            "Proof signed"
        );

        Ok(ProofPayload {
            session_id: session.id.clone(),
            nonce: session.nonce.clone(),
            capture: metadata,
            hashes: HashBundle {
                video_sha256: capture.video_hash.clone(),
                sensor_sha256: capture.sensor_hash.clone(),
                metadata_sha256: metadata_hash,
            },
            signature: SignatureBundle {
                alg: "ES256".to_string(),
                key_id: key.key_id,
                sig: base64::encode(&raw_sig),
            },
            sensors_available,
        })
    }
}

/// The byte sequence the device key signs: nonce and the three digests,
/// pipe-delimited, in fixed order.
pub fn signable_payload(
    nonce: &str,
    video_hash: &str,
    sensor_hash: &str,
    metadata_hash: &str,
) -> String {
    format!("{}|{}|{}|{}", nonce, video_hash, sensor_hash, metadata_hash)
}

/// Recompute the video and sensor digests from the capture artifacts and
/// compare them against the proof. A mismatch means the artifacts changed
/// after hashing and the proof must not be submitted.
pub fn verify_hashes_locally(proof: &ProofPayload, capture: &CaptureResult) -> bool {
    let video = sha256_hex(&capture.video_data);
    if video != proof.hashes.video_sha256 {
        return false;
    }

    let sensor_bytes = match crate::domain::capture::serialize_samples(&capture.sensor_data) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    if sha256_hex(&sensor_bytes) != proof.hashes.sensor_sha256 {
        return false;
    }

    match serde_json::to_vec(&proof.capture) {
        Ok(bytes) => sha256_hex(&bytes) == proof.hashes.metadata_sha256,
        Err(_) => false,
    }
}
