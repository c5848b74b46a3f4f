//! Hardware-accelerated encoder path.
//!
//! Frames are pushed one-by-one into a system encoder process configured
//! with a fixed bitrate, frame rate, and one keyframe per second; the
//! muxed MP4 is collected from a scratch file when the process drains its
//! input. Each frame buffer is consumed on write and freed immediately,
//! so memory use is bounded by the pipe, not the capture length.

use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tracing::{debug, warn};

use super::{EncoderConfig, EncoderStats, FpsMeter, VideoEncoder};
use crate::capture::camera::RawFrame;
use crate::error::{Result, XLensError};

/// Frame-by-frame encoder over a spawned system encoder process.
pub struct HardwareEncoder {
    config: EncoderConfig,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    output: Option<tempfile::TempPath>,
    meter: FpsMeter,
    started_at: Option<Instant>,
    elapsed_ms: u64,
}

impl HardwareEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self {
            config,
            child: None,
            stdin: None,
            output: None,
            meter: FpsMeter::default(),
            started_at: None,
            elapsed_ms: 0,
        }
    }

    /// Encoder invocation: raw RGB frames on stdin, muxed MP4 at `output`.
    fn build_args(config: &EncoderConfig, output: &str) -> Vec<String> {
        vec![
            "-y".into(),
            "-f".into(),
            "rawvideo".into(),
            "-pix_fmt".into(),
            "rgb24".into(),
            "-s".into(),
            format!("{}x{}", config.width, config.height),
            "-r".into(),
            config.frame_rate.to_string(),
            "-i".into(),
            "-".into(),
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            "veryfast".into(),
            "-b:v".into(),
            config.bitrate_bps.to_string(),
            "-g".into(),
            config.keyframe_interval().to_string(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-movflags".into(),
            "+faststart".into(),
            "-f".into(),
            "mp4".into(),
            output.into(),
        ]
    }
}

#[async_trait]
impl VideoEncoder for HardwareEncoder {
    async fn initialize(&mut self) -> Result<()> {
        let output = NamedTempFile::new()
            .map_err(|e| XLensError::EncodingFailed(format!("scratch file: {}", e)))?
            .into_temp_path();

        let args = Self::build_args(&self.config, &output.to_string_lossy());
        let mut child = Command::new(&self.config.binary)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                XLensError::EncodingFailed(format!(
                    "failed to spawn encoder '{}': {}",
                    self.config.binary, e
                ))
            })?;

        self.stdin = child.stdin.take();
        self.child = Some(child);
        self.output = Some(output);
        self.started_at = Some(Instant::now());
        debug!(binary = %self.config.binary, "Hardware encoder started");

        Ok(())
    }

    async fn encode_frame(&mut self, frame: RawFrame) -> Result<()> {
        if frame.data.len() != frame.expected_len() {
            return Err(XLensError::EncodingFailed(format!(
                "frame buffer is {} bytes, expected {}",
                frame.data.len(),
                frame.expected_len()
            )));
        }

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| XLensError::EncodingFailed("encoder not initialized".into()))?;

        stdin
            .write_all(&frame.data)
            .await
            .map_err(|e| XLensError::EncodingFailed(format!("frame write: {}", e)))?;

        self.meter.record(frame.timestamp_ms);
        // `frame` drops here; the buffer is released as soon as it is written
        Ok(())
    }

    async fn finalize(&mut self) -> Result<Vec<u8>> {
        // Closing stdin signals EOF; the process flushes every submitted
        // frame before exiting, so the scratch file is complete when wait
        // returns.
        drop(self.stdin.take());

        let child = self
            .child
            .take()
            .ok_or_else(|| XLensError::EncodingFailed("encoder not initialized".into()))?;

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| XLensError::EncodingFailed(format!("encoder wait: {}", e)))?;

        if let Some(start) = self.started_at.take() {
            self.elapsed_ms = start.elapsed().as_millis() as u64;
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(XLensError::EncodingFailed(format!(
                "encoder exited with {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        let path = self
            .output
            .take()
            .ok_or_else(|| XLensError::EncodingFailed("encoder output missing".into()))?;

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| XLensError::EncodingFailed(format!("read encoded video: {}", e)))?;

        debug!(
            frames = self.meter.frame_count(),
            bytes = bytes.len(),
            "Hardware encoder finalized"
        );
        Ok(bytes)
    }

    async fn abort(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                warn!(error = %e, "Failed to kill encoder process");
            }
        }
        self.output.take();
        self.started_at = None;
    }

    fn stats(&self) -> EncoderStats {
        let elapsed_ms = match self.started_at {
            Some(start) => start.elapsed().as_millis() as u64,
            None => self.elapsed_ms,
        };
        EncoderStats {
            frame_count: self.meter.frame_count(),
            elapsed_ms,
            actual_fps: self.meter.actual_fps(self.config.frame_rate as f64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_args() {
        let config = EncoderConfig {
            binary: "ffmpeg".into(),
            width: 1280,
            height: 720,
            frame_rate: 60,
            bitrate_bps: 4_000_000,
        };
        let args = HardwareEncoder::build_args(&config, "/tmp/out.mp4");

        let joined = args.join(" ");
        assert!(joined.contains("-s 1280x720"));
        assert!(joined.contains("-r 60"));
        assert!(joined.contains("-b:v 4000000"));
        // One keyframe per second of video
        assert!(joined.contains("-g 60"));
        assert!(joined.ends_with("/tmp/out.mp4"));
    }

    #[tokio::test]
    async fn test_missing_binary_fails_initialize() {
        let mut encoder = HardwareEncoder::new(EncoderConfig {
            binary: "definitely-not-an-encoder".into(),
            ..Default::default()
        });

        let err = encoder.initialize().await.unwrap_err();
        assert_eq!(err.code(), "encoding_failed");
    }

    #[tokio::test]
    async fn test_encode_before_initialize_fails() {
        let mut encoder = HardwareEncoder::new(EncoderConfig::default());
        let frame = RawFrame {
            timestamp_ms: 0,
            width: 1280,
            height: 720,
            data: vec![0; 1280 * 720 * 3],
        };
        let err = encoder.encode_frame(frame).await.unwrap_err();
        assert_eq!(err.code(), "encoding_failed");
    }

    #[tokio::test]
    async fn test_bad_frame_size_rejected() {
        let mut encoder = HardwareEncoder::new(EncoderConfig::default());
        let frame = RawFrame {
            timestamp_ms: 0,
            width: 1280,
            height: 720,
            data: vec![0; 16],
        };
        let err = encoder.encode_frame(frame).await.unwrap_err();
        assert!(err.to_string().contains("expected"));
    }

    #[tokio::test]
    async fn test_abort_idempotent() {
        let mut encoder = HardwareEncoder::new(EncoderConfig::default());
        encoder.abort().await;
        encoder.abort().await;
    }
}
