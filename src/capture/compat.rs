//! Runtime capability probing.
//!
//! The prober inspects the environment and reports what is available; it
//! never fails. Absence of a capability is recorded in the report, and
//! the orchestrator decides what that means (a missing camera is fatal,
//! a missing motion sensor is not).

use tokio::process::Command;
use tracing::debug;

use super::camera::CameraDevice;
use super::motion::MotionSensor;

/// Which encoder implementation a capture will use.
///
/// Selected once, before capture starts, and never switched mid-capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderPath {
    /// Frame-by-frame hardware-backed encoder
    Hardware,
    /// Platform stream recorder with chunk buffering
    Software,
}

/// Structured result of a compatibility probe.
#[derive(Debug, Clone)]
pub struct CompatibilityReport {
    pub is_compatible: bool,
    pub has_hardware_encoder: bool,
    pub has_software_recorder: bool,
    pub has_motion: bool,
    pub has_camera: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl CompatibilityReport {
    /// The encoder path a capture should take, hardware preferred.
    /// `None` when the platform is incompatible.
    pub fn encoder_path(&self) -> Option<EncoderPath> {
        if !self.has_camera {
            return None;
        }
        if self.has_hardware_encoder {
            Some(EncoderPath::Hardware)
        } else if self.has_software_recorder {
            Some(EncoderPath::Software)
        } else {
            None
        }
    }
}

/// Inspect the environment and report available capture primitives.
pub async fn probe(
    camera: &dyn CameraDevice,
    motion: &dyn MotionSensor,
    encoder_binary: &str,
) -> CompatibilityReport {
    let mut warnings = Vec::new();
    let mut errors = Vec::new();

    let has_camera = camera.is_available();
    if !has_camera {
        errors.push("no camera present".to_string());
    }

    let has_hardware_encoder = probe_encoder_binary(encoder_binary).await;
    let has_software_recorder = camera.supports_recorder();

    if !has_hardware_encoder && has_software_recorder {
        warnings.push(format!(
            "hardware encoder '{}' unavailable, falling back to stream recorder",
            encoder_binary
        ));
    }
    if !has_hardware_encoder && !has_software_recorder {
        errors.push("no encoder path available".to_string());
    }

    let has_motion = motion.is_available();
    if !has_motion {
        warnings.push("no motion sensor, capture will omit inertial data".to_string());
    }

    let is_compatible = has_camera && (has_hardware_encoder || has_software_recorder);

    debug!(
        has_camera,
        has_hardware_encoder, has_software_recorder, has_motion, "Compatibility probe complete"
    );

    CompatibilityReport {
        is_compatible,
        has_hardware_encoder,
        has_software_recorder,
        has_motion,
        has_camera,
        warnings,
        errors,
    }
}

/// Check that the encoder binary exists and runs.
async fn probe_encoder_binary(binary: &str) -> bool {
    match Command::new(binary).arg("-version").output().await {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::sim::{SimulatedCamera, SimulatedMotion};

    #[tokio::test]
    async fn test_probe_never_fails_without_encoder_binary() {
        let camera = SimulatedCamera::new();
        let motion = SimulatedMotion::new();

        // Nonexistent binary: software recorder keeps the platform compatible
        let report = probe(&camera, &motion, "definitely-not-an-encoder").await;
        assert!(report.is_compatible);
        assert!(!report.has_hardware_encoder);
        assert!(report.has_software_recorder);
        assert_eq!(report.encoder_path(), Some(EncoderPath::Software));
        assert!(!report.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_missing_camera_is_incompatible() {
        let camera = SimulatedCamera::unavailable();
        let motion = SimulatedMotion::new();

        let report = probe(&camera, &motion, "definitely-not-an-encoder").await;
        assert!(!report.is_compatible);
        assert!(report.encoder_path().is_none());
        assert!(report.errors.iter().any(|e| e.contains("camera")));
    }

    #[tokio::test]
    async fn test_missing_motion_is_warning_not_error() {
        let camera = SimulatedCamera::new();
        let motion = SimulatedMotion::unavailable();

        let report = probe(&camera, &motion, "definitely-not-an-encoder").await;
        assert!(report.is_compatible);
        assert!(!report.has_motion);
    }
}
