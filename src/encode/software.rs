//! Software fallback path.
//!
//! Wraps the platform's stream recorder: compressed chunks arrive on a
//! channel and are buffered in order, then concatenated into one blob on
//! finalize. `encode_frame` on this path records timing only, since the
//! pixel data is consumed by the platform recorder, not by us; that is
//! how the achieved frame rate gets measured instead of assumed. A lower
//! frame-rate ceiling than the hardware path is expected and acceptable.

use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use super::{EncoderStats, FpsMeter, VideoEncoder};
use crate::capture::camera::RawFrame;
use crate::error::{Result, XLensError};

/// Chunk-buffering recorder over the platform's generic stream recorder.
pub struct SoftwareRecorder {
    chunks: Option<mpsc::Receiver<Vec<u8>>>,
    buffered: Vec<Vec<u8>>,
    meter: FpsMeter,
    /// Estimate used when no frame timestamps were observed
    fallback_fps: f64,
    started_at: Option<Instant>,
    elapsed_ms: u64,
    aborted: bool,
}

impl SoftwareRecorder {
    /// Wrap an already-started platform recorder chunk stream.
    pub fn new(chunks: mpsc::Receiver<Vec<u8>>, fallback_fps: f64) -> Self {
        Self {
            chunks: Some(chunks),
            buffered: Vec::new(),
            meter: FpsMeter::default(),
            fallback_fps,
            started_at: None,
            elapsed_ms: 0,
            aborted: false,
        }
    }

    /// Pull any chunks the recorder has already delivered, in order.
    fn drain_ready(&mut self) {
        if let Some(rx) = self.chunks.as_mut() {
            while let Ok(chunk) = rx.try_recv() {
                self.buffered.push(chunk);
            }
        }
    }
}

#[async_trait]
impl VideoEncoder for SoftwareRecorder {
    async fn initialize(&mut self) -> Result<()> {
        if self.chunks.is_none() {
            return Err(XLensError::EncodingFailed("recorder stream missing".into()));
        }
        self.started_at = Some(Instant::now());
        Ok(())
    }

    async fn encode_frame(&mut self, frame: RawFrame) -> Result<()> {
        // Timing only: the platform recorder taps the stream itself.
        self.meter.record(frame.timestamp_ms);
        self.drain_ready();
        Ok(())
    }

    async fn finalize(&mut self) -> Result<Vec<u8>> {
        if self.aborted {
            return Err(XLensError::EncodingFailed("recorder aborted".into()));
        }

        let mut rx = self
            .chunks
            .take()
            .ok_or_else(|| XLensError::EncodingFailed("recorder stream missing".into()))?;

        // The recorder has been stopped by the caller; drain until the
        // producer closes the channel so no trailing chunk is lost.
        while let Some(chunk) = rx.recv().await {
            self.buffered.push(chunk);
        }

        if let Some(start) = self.started_at.take() {
            self.elapsed_ms = start.elapsed().as_millis() as u64;
        }

        let total: usize = self.buffered.iter().map(Vec::len).sum();
        let mut video = Vec::with_capacity(total);
        for chunk in self.buffered.drain(..) {
            video.extend_from_slice(&chunk);
        }

        if video.is_empty() {
            return Err(XLensError::EncodingFailed(
                "recorder produced no data".into(),
            ));
        }

        debug!(bytes = video.len(), "Software recorder finalized");
        Ok(video)
    }

    async fn abort(&mut self) {
        self.aborted = true;
        self.chunks.take();
        self.buffered.clear();
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
            actual_fps: self.meter.actual_fps(self.fallback_fps),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(ts: i64) -> RawFrame {
        RawFrame {
            timestamp_ms: ts,
            width: 2,
            height: 2,
            data: vec![0; 12],
        }
    }

    #[tokio::test]
    async fn test_chunks_concatenated_in_order() {
        let (tx, rx) = mpsc::channel(8);
        let mut recorder = SoftwareRecorder::new(rx, 30.0);
        recorder.initialize().await.unwrap();

        tx.send(vec![1, 2]).await.unwrap();
        tx.send(vec![3]).await.unwrap();
        tx.send(vec![4, 5, 6]).await.unwrap();
        drop(tx);

        let video = recorder.finalize().await.unwrap();
        assert_eq!(video, vec![1, 2, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn test_fps_measured_from_frame_timestamps() {
        let (tx, rx) = mpsc::channel(8);
        let mut recorder = SoftwareRecorder::new(rx, 30.0);
        recorder.initialize().await.unwrap();

        // 25 fps worth of timing frames
        for i in 0..26 {
            recorder.encode_frame(frame(i * 40)).await.unwrap();
        }
        tx.send(vec![0; 64]).await.unwrap();
        drop(tx);

        recorder.finalize().await.unwrap();
        let fps = recorder.stats().actual_fps;
        assert!((fps - 25.0).abs() < 0.5, "measured {}", fps);
    }

    #[tokio::test]
    async fn test_fallback_fps_without_frames() {
        let (tx, rx) = mpsc::channel(8);
        let mut recorder = SoftwareRecorder::new(rx, 30.0);
        recorder.initialize().await.unwrap();
        tx.send(vec![0; 64]).await.unwrap();
        drop(tx);

        recorder.finalize().await.unwrap();
        assert_eq!(recorder.stats().actual_fps, 30.0);
    }

    #[tokio::test]
    async fn test_empty_recording_is_an_error() {
        let (tx, rx) = mpsc::channel::<Vec<u8>>(8);
        let mut recorder = SoftwareRecorder::new(rx, 30.0);
        recorder.initialize().await.unwrap();
        drop(tx);

        let err = recorder.finalize().await.unwrap_err();
        assert_eq!(err.code(), "encoding_failed");
    }

    #[tokio::test]
    async fn test_abort_then_finalize_fails() {
        let (_tx, rx) = mpsc::channel::<Vec<u8>>(8);
        let mut recorder = SoftwareRecorder::new(rx, 30.0);
        recorder.initialize().await.unwrap();
        recorder.abort().await;
        recorder.abort().await;
        assert!(recorder.finalize().await.is_err());
    }
}
