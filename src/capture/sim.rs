//! Deterministic simulated capture devices.
//!
//! Used by the CLI demo and the test suite. The simulated camera produces
//! synthetic frames at the configured rate and exposes a chunked stream
//! recorder; the simulated motion sensor produces a plausible jump-like
//! acceleration trace. Both support scripted permission outcomes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};

use super::camera::{CameraConfig, CameraDevice, CameraFacing, RawFrame};
use super::motion::{MotionSensor, SampleBuffer};
use crate::domain::IMUSample;
use crate::error::{Result, XLensError};

const FRAME_CHANNEL_CAPACITY: usize = 32;
const CHUNK_CHANNEL_CAPACITY: usize = 64;
const RECORDER_CHUNK_BYTES: usize = 4096;
const RECORDER_CHUNK_INTERVAL_MS: u64 = 250;
const MOTION_SAMPLE_INTERVAL_MS: u64 = 10;

/// Simulated camera backend.
pub struct SimulatedCamera {
    available: bool,
    grant_permission: bool,
    config: CameraConfig,
    active: bool,
    frames_rx: Option<mpsc::Receiver<RawFrame>>,
    frame_task: Option<JoinHandle<()>>,
    recorder_task: Option<JoinHandle<()>>,
    /// Number of successful starts, observable by tests asserting that an
    /// expired session never touches the device.
    start_count: Arc<AtomicUsize>,
}

impl SimulatedCamera {
    pub fn new() -> Self {
        Self {
            available: true,
            grant_permission: true,
            config: CameraConfig::default(),
            active: false,
            frames_rx: None,
            frame_task: None,
            recorder_task: None,
            start_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A host with no camera at all.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// A camera whose permission prompt the user declines.
    pub fn deny_permission() -> Self {
        Self {
            grant_permission: false,
            ..Self::new()
        }
    }

    /// Handle for observing device-level side effects in tests.
    pub fn start_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.start_count)
    }
}

impl Default for SimulatedCamera {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CameraDevice for SimulatedCamera {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn start(&mut self, config: &CameraConfig) -> Result<()> {
        if !self.available {
            return Err(XLensError::CaptureFailed("no camera present".into()));
        }
        if !self.grant_permission {
            return Err(XLensError::CameraPermissionDenied(
                "user declined camera access".into(),
            ));
        }
        if self.active {
            return Ok(());
        }

        self.config = config.clone();
        self.active = true;
        self.start_count.fetch_add(1, Ordering::SeqCst);

        let (tx, rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        self.frames_rx = Some(rx);

        let width = config.width;
        let height = config.height;
        let frame_interval = Duration::from_millis(1000 / config.frame_rate.max(1) as u64);
        self.frame_task = Some(tokio::spawn(async move {
            let mut ticker = interval(frame_interval);
            let mut idx: u64 = 0;
            loop {
                ticker.tick().await;
                let frame = RawFrame {
                    timestamp_ms: Utc::now().timestamp_millis(),
                    width,
                    height,
                    data: vec![(idx & 0xff) as u8; (width * height * 3) as usize],
                };
                if tx.send(frame).await.is_err() {
                    break;
                }
                idx += 1;
            }
        }));

        Ok(())
    }

    fn stop(&mut self) {
        if let Some(task) = self.frame_task.take() {
            task.abort();
        }
        self.stop_recorder();
        self.frames_rx = None;
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }

    async fn switch_facing(&mut self) -> Result<()> {
        self.config.facing = self.config.facing.flipped();
        Ok(())
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn take_frames(&mut self) -> Result<mpsc::Receiver<RawFrame>> {
        self.frames_rx
            .take()
            .ok_or_else(|| XLensError::CaptureFailed("frame stream unavailable".into()))
    }

    fn supports_recorder(&self) -> bool {
        self.available
    }

    fn start_recorder(&mut self) -> Result<mpsc::Receiver<Vec<u8>>> {
        if !self.active {
            return Err(XLensError::CaptureFailed("camera not started".into()));
        }

        let (tx, rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
        self.recorder_task = Some(tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(RECORDER_CHUNK_INTERVAL_MS));
            let mut idx: u64 = 0;
            loop {
                ticker.tick().await;
                let mut chunk = vec![0u8; RECORDER_CHUNK_BYTES];
                StdRng::seed_from_u64(idx).fill(&mut chunk[..]);
                if tx.send(chunk).await.is_err() {
                    break;
                }
                idx += 1;
            }
        }));

        Ok(rx)
    }

    fn stop_recorder(&mut self) {
        if let Some(task) = self.recorder_task.take() {
            task.abort();
        }
    }
}

/// Simulated motion sensor producing a jump-like acceleration trace.
pub struct SimulatedMotion {
    available: bool,
    grant_permission: bool,
    buffer: SampleBuffer,
    task: Option<JoinHandle<()>>,
}

impl SimulatedMotion {
    pub fn new() -> Self {
        Self {
            available: true,
            grant_permission: true,
            buffer: SampleBuffer::new(),
            task: None,
        }
    }

    /// A platform with no motion API.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// A sensor whose permission prompt the user declines.
    pub fn deny_permission() -> Self {
        Self {
            grant_permission: false,
            ..Self::new()
        }
    }
}

impl Default for SimulatedMotion {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MotionSensor for SimulatedMotion {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn request_permission(&mut self) -> Result<bool> {
        if !self.available {
            return Ok(false);
        }
        Ok(self.grant_permission)
    }

    fn start(&mut self) {
        if !self.available || self.task.is_some() {
            return;
        }

        let tx = self.buffer.sender();
        self.task = Some(tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(MOTION_SAMPLE_INTERVAL_MS));
            let mut rng = StdRng::seed_from_u64(7);
            let mut t: f64 = 0.0;
            loop {
                ticker.tick().await;
                // Resting gravity with a takeoff-like spike around t=1s
                let spike = if (0.9..1.1).contains(&t) { 18.0 } else { 0.0 };
                let sample = IMUSample {
                    timestamp: Utc::now().timestamp_millis(),
                    acceleration_x: rng.gen_range(-0.2..0.2),
                    acceleration_y: -9.81 + spike + rng.gen_range(-0.1..0.1),
                    acceleration_z: rng.gen_range(-0.2..0.2),
                    rotation_alpha: Some(rng.gen_range(-1.0..1.0)),
                    rotation_beta: Some(rng.gen_range(-1.0..1.0)),
                    rotation_gamma: Some(rng.gen_range(-1.0..1.0)),
                };
                if tx.send(sample).await.is_err() {
                    break;
                }
                t += MOTION_SAMPLE_INTERVAL_MS as f64 / 1000.0;
            }
        }));
    }

    fn stop(&mut self) -> Vec<IMUSample> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.buffer.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_camera_produces_frames() {
        let mut camera = SimulatedCamera::new();
        let config = CameraConfig {
            width: 64,
            height: 48,
            frame_rate: 100,
            facing: CameraFacing::Back,
        };
        camera.start(&config).await.unwrap();

        let mut frames = camera.take_frames().unwrap();
        let frame = frames.recv().await.unwrap();
        assert_eq!(frame.data.len(), frame.expected_len());

        camera.stop();
        assert!(!camera.is_active());
    }

    #[tokio::test]
    async fn test_frame_stream_taken_once() {
        let mut camera = SimulatedCamera::new();
        camera.start(&CameraConfig::default()).await.unwrap();

        assert!(camera.take_frames().is_ok());
        assert!(camera.take_frames().is_err());
        camera.stop();
    }

    #[tokio::test]
    async fn test_permission_denial() {
        let mut camera = SimulatedCamera::deny_permission();
        let err = camera.start(&CameraConfig::default()).await.unwrap_err();
        assert_eq!(err.code(), "camera_permission_denied");
        assert!(err.recoverable());
    }

    #[tokio::test]
    async fn test_motion_samples_ordered() {
        let mut motion = SimulatedMotion::new();
        assert!(motion.request_permission().await.unwrap());
        motion.start();

        tokio::time::sleep(Duration::from_millis(100)).await;
        let samples = motion.stop();
        assert!(!samples.is_empty());
        let timestamps: Vec<i64> = samples.iter().map(|s| s.timestamp).collect();
        let mut sorted = timestamps.clone();
        sorted.sort_unstable();
        assert_eq!(timestamps, sorted);
    }

    #[tokio::test]
    async fn test_motion_restartable() {
        let mut motion = SimulatedMotion::new();
        motion.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let first = motion.stop();
        assert!(!first.is_empty());

        motion.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let second = motion.stop();
        assert!(!second.is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_motion_reports_false() {
        let mut motion = SimulatedMotion::unavailable();
        assert!(!motion.is_available());
        assert!(!motion.request_permission().await.unwrap());
        motion.start();
        assert!(motion.stop().is_empty());
    }
}
