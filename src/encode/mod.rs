//! Dual-path video encoding.
//!
//! Two implementations behind one trait: a hardware-backed frame-by-frame
//! encoder and a software fallback that buffers chunks from the platform
//! stream recorder. The path is chosen once, at capture start, from the
//! compatibility report; nothing branches on capability flags inside the
//! encode loop.

pub mod hardware;
pub mod software;

use async_trait::async_trait;

use crate::capture::camera::RawFrame;
use crate::error::Result;

pub use hardware::HardwareEncoder;
pub use software::SoftwareRecorder;

/// Encoder tuning shared by both paths.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// System encoder binary for the hardware path
    pub binary: String,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    /// Target bitrate in bits per second
    pub bitrate_bps: u32,
}

impl EncoderConfig {
    /// Keyframe interval in frames: one keyframe per second of video.
    pub fn keyframe_interval(&self) -> u32 {
        self.frame_rate.max(1)
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            binary: "ffmpeg".to_string(),
            width: 1280,
            height: 720,
            frame_rate: 60,
            bitrate_bps: 4_000_000,
        }
    }
}

/// Observed encoding statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncoderStats {
    pub frame_count: u64,
    pub elapsed_ms: u64,
    /// Frame rate measured from frame timestamps, not assumed
    pub actual_fps: f64,
}

/// A video encoder: raw frames in, one muxed byte blob out.
#[async_trait]
pub trait VideoEncoder: Send {
    async fn initialize(&mut self) -> Result<()>;

    /// Encode one frame. The frame buffer is consumed and released
    /// immediately; callers must not retain references.
    async fn encode_frame(&mut self, frame: RawFrame) -> Result<()>;

    /// Flush all previously submitted frames and return the final video
    /// bytes. The returned sequence is complete and immutable; hashing
    /// before finalize returns is a correctness violation.
    async fn finalize(&mut self) -> Result<Vec<u8>>;

    /// Discard all state. Idempotent.
    async fn abort(&mut self);

    fn stats(&self) -> EncoderStats;
}

/// Frame-rate measurement from observed frame timestamps.
///
/// Replaces the old flat estimate for the fallback path: achieved rate is
/// derived from the first and last frame timestamps whenever two or more
/// frames were seen.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct FpsMeter {
    first_ts_ms: Option<i64>,
    last_ts_ms: i64,
    count: u64,
}

impl FpsMeter {
    pub fn record(&mut self, timestamp_ms: i64) {
        if self.first_ts_ms.is_none() {
            self.first_ts_ms = Some(timestamp_ms);
        }
        self.last_ts_ms = timestamp_ms;
        self.count += 1;
    }

    pub fn frame_count(&self) -> u64 {
        self.count
    }

    /// Measured fps, or `fallback` when fewer than two frames were seen.
    pub fn actual_fps(&self, fallback: f64) -> f64 {
        match self.first_ts_ms {
            Some(first) if self.count >= 2 && self.last_ts_ms > first => {
                (self.count - 1) as f64 * 1000.0 / (self.last_ts_ms - first) as f64
            }
            _ => fallback,
        }
    }
}
