//! Camera stream acquisition.
//!
//! The stream, once started, is exclusively owned by the capture session:
//! the frame receiver can be taken once, and nothing else reads frames
//! from the device while a capture is active.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;

/// Requested camera configuration.
#[derive(Debug, Clone)]
pub struct CameraConfig {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub facing: CameraFacing,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            frame_rate: 60,
            facing: CameraFacing::Back,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraFacing {
    Front,
    Back,
}

impl CameraFacing {
    pub fn flipped(self) -> Self {
        match self {
            Self::Front => Self::Back,
            Self::Back => Self::Front,
        }
    }
}

/// One uncompressed frame (packed RGB, 3 bytes per pixel).
///
/// Frames are not reference-counted: the encoder consumes the buffer and
/// releases it immediately after encoding to bound memory use.
#[derive(Debug)]
pub struct RawFrame {
    /// Wall-clock capture timestamp in milliseconds
    pub timestamp_ms: i64,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl RawFrame {
    /// Expected buffer length for the frame's dimensions.
    pub fn expected_len(&self) -> usize {
        (self.width * self.height * 3) as usize
    }
}

/// A camera backend.
///
/// Permission denial surfaces as the recoverable `CameraPermissionDenied`
/// error; any other start failure is a non-recoverable `CaptureFailed`.
#[async_trait]
pub trait CameraDevice: Send + Sync {
    /// Whether a camera is present at all (used by the prober; never errors).
    fn is_available(&self) -> bool;

    /// Acquire the camera and begin producing frames.
    async fn start(&mut self, config: &CameraConfig) -> Result<()>;

    /// Release the camera and all associated producers.
    fn stop(&mut self);

    fn is_active(&self) -> bool;

    /// Flip between front and back lenses. No-op when only one exists.
    async fn switch_facing(&mut self) -> Result<()>;

    /// Actual stream dimensions after start.
    fn dimensions(&self) -> (u32, u32);

    /// Take exclusive ownership of the frame stream (hardware encoder
    /// path). Fails if the stream was already taken or frames are not
    /// exposed by this backend.
    fn take_frames(&mut self) -> Result<mpsc::Receiver<RawFrame>>;

    /// Whether the platform exposes a built-in stream recorder
    /// (software fallback path).
    fn supports_recorder(&self) -> bool;

    /// Start the platform recorder and return its chunk stream.
    fn start_recorder(&mut self) -> Result<mpsc::Receiver<Vec<u8>>>;

    /// Stop the platform recorder, closing the chunk stream after the
    /// final buffered chunk. Idempotent.
    fn stop_recorder(&mut self);
}
