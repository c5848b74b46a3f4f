//! Client error taxonomy.
//!
//! Every error carries a stable machine-readable code and a `recoverable`
//! flag so callers can decide whether a retry affordance is meaningful.
//! Transient network failures during upload are retried locally before
//! surfacing; device and signing failures surface immediately.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, XLensError>;

/// All failure modes of the capture client.
#[derive(Debug, Clone, Error)]
pub enum XLensError {
    /// The platform lacks a camera or any usable encoder path.
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// User declined camera access. Retrying the permission request is meaningful.
    #[error("camera permission denied: {0}")]
    CameraPermissionDenied(String),

    /// User declined motion access. Non-fatal: capture proceeds without sensor data.
    #[error("motion permission denied: {0}")]
    MotionPermissionDenied(String),

    /// The session's expiry passed before capture started. The caller must
    /// create a fresh session; this is never wrapped in a generic failure.
    #[error("session expired")]
    SessionExpired,

    #[error("session creation failed: {0}")]
    SessionCreateFailed(String),

    #[error("capture failed: {0}")]
    CaptureFailed(String),

    #[error("encoding failed: {0}")]
    EncodingFailed(String),

    #[error("upload failed: {0}")]
    UploadFailed(String),

    #[error("network error: {0}")]
    NetworkError(String),

    #[error("key generation failed: {0}")]
    KeyGenerationFailed(String),

    #[error("signing failed: {0}")]
    SigningFailed(String),

    /// Catch-all wrapper preserving the original message.
    #[error("{0}")]
    Unknown(String),
}

impl XLensError {
    /// Stable snake_case code for logs and API payloads.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedPlatform(_) => "unsupported_platform",
            Self::CameraPermissionDenied(_) => "camera_permission_denied",
            Self::MotionPermissionDenied(_) => "motion_permission_denied",
            Self::SessionExpired => "session_expired",
            Self::SessionCreateFailed(_) => "session_create_failed",
            Self::CaptureFailed(_) => "capture_failed",
            Self::EncodingFailed(_) => "encoding_failed",
            Self::UploadFailed(_) => "upload_failed",
            Self::NetworkError(_) => "network_error",
            Self::KeyGenerationFailed(_) => "key_generation_failed",
            Self::SigningFailed(_) => "signing_failed",
            Self::Unknown(_) => "unknown_error",
        }
    }

    /// Whether the caller can expect a retry of the same operation to succeed.
    pub fn recoverable(&self) -> bool {
        matches!(
            self,
            Self::CameraPermissionDenied(_)
                | Self::MotionPermissionDenied(_)
                | Self::UploadFailed(_)
                | Self::NetworkError(_)
        )
    }

    /// Wrap an arbitrary error, preserving its message.
    pub fn unknown(context: &str, err: impl std::fmt::Display) -> Self {
        Self::Unknown(format!("{}: {}", context, err))
    }
}

impl From<reqwest::Error> for XLensError {
    fn from(err: reqwest::Error) -> Self {
        Self::NetworkError(err.to_string())
    }
}

impl From<serde_json::Error> for XLensError {
    fn from(err: serde_json::Error) -> Self {
        Self::Unknown(format!("serialization: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_flags() {
        assert!(XLensError::CameraPermissionDenied("denied".into()).recoverable());
        assert!(XLensError::NetworkError("timeout".into()).recoverable());
        assert!(XLensError::UploadFailed("503".into()).recoverable());
        assert!(!XLensError::SessionExpired.recoverable());
        assert!(!XLensError::SigningFailed("no key".into()).recoverable());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(XLensError::SessionExpired.code(), "session_expired");
        assert_eq!(
            XLensError::UnsupportedPlatform("no camera".into()).code(),
            "unsupported_platform"
        );
        assert_eq!(XLensError::unknown("ctx", "boom").code(), "unknown_error");
    }
}
