//! Capture artifacts: inertial samples and the completed capture result.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One inertial reading.
///
/// Samples are appended in arrival order and never mutated after creation.
/// Rotation rate is `None` on platforms without a gyroscope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IMUSample {
    /// Wall-clock timestamp in milliseconds
    pub timestamp: i64,
    pub acceleration_x: f64,
    pub acceleration_y: f64,
    pub acceleration_z: f64,
    pub rotation_alpha: Option<f64>,
    pub rotation_beta: Option<f64>,
    pub rotation_gamma: Option<f64>,
}

/// Serialize a sample sequence to the exact JSON that is hashed and uploaded.
///
/// The sensor hash in the proof is computed over these bytes, so the server
/// can recompute it from the uploaded sensor artifact byte-for-byte.
pub fn serialize_samples(samples: &[IMUSample]) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(samples)?)
}

/// Descriptor of the capturing device, embedded in proof metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Platform tag, e.g. "rust-client"
    pub platform: String,
    pub model: String,
    pub os_version: String,
    pub app_version: String,
}

impl DeviceInfo {
    /// Describe the current host.
    pub fn current() -> Self {
        Self {
            platform: "rust-client".to_string(),
            model: std::env::consts::ARCH.to_string(),
            os_version: std::env::consts::OS.to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Output of one completed capture.
///
/// Hashes are computed exactly once, over the final immutable byte
/// sequences, never over partial buffers.
#[derive(Debug, Clone)]
pub struct CaptureResult {
    /// Final muxed video bytes
    pub video_data: Vec<u8>,

    /// Sensor samples collected over the same wall-clock interval
    /// (empty when motion sensing is unavailable, never absent)
    pub sensor_data: Vec<IMUSample>,

    pub started_at_ms: i64,
    pub ended_at_ms: i64,

    /// Observed encoding frame rate
    pub fps: f64,

    /// Frames fed to the encoder
    pub frame_count: u64,

    /// Lowercase hex SHA-256 of `video_data`
    pub video_hash: String,

    /// Lowercase hex SHA-256 of the serialized sensor sequence
    pub sensor_hash: String,
}

impl CaptureResult {
    /// Capture duration in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        self.ended_at_ms - self.started_at_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(ts: i64) -> IMUSample {
        IMUSample {
            timestamp: ts,
            acceleration_x: 0.1,
            acceleration_y: -9.8,
            acceleration_z: 0.0,
            rotation_alpha: Some(1.0),
            rotation_beta: None,
            rotation_gamma: None,
        }
    }

    #[test]
    fn test_sample_wire_names() {
        let json = serde_json::to_value(sample(1234)).unwrap();
        assert!(json.get("accelerationX").is_some());
        assert!(json.get("rotationAlpha").is_some());
        assert!(json.get("acceleration_x").is_none());
    }

    #[test]
    fn test_serialize_samples_deterministic() {
        let samples = vec![sample(1), sample(2)];
        let a = serialize_samples(&samples).unwrap();
        let b = serialize_samples(&samples).unwrap();
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn test_empty_sequence_serializes_to_array() {
        let bytes = serialize_samples(&[]).unwrap();
        assert_eq!(bytes, b"[]");
    }
}
