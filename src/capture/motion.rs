//! Inertial sensor sampling.
//!
//! Motion sensors are push sources: the platform delivers samples through
//! a callback, which lands them in a bounded channel. `stop()` atomically
//! swaps the accumulated sequence out, leaving the sampler ready to be
//! restarted fresh. Sensor data is an enrichment, not a hard requirement:
//! when no motion API exists, capture proceeds with an empty sequence and
//! the proof's `sensorsAvailable` flag tells the verifier to weight that
//! signal accordingly.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::warn;

use crate::domain::IMUSample;
use crate::error::Result;

/// Upper bound on buffered samples between start and stop.
/// 15 s of capture at 200 Hz fits with room to spare.
const SAMPLE_BUFFER_CAPACITY: usize = 8192;

/// A motion sensor backend.
#[async_trait]
pub trait MotionSensor: Send + Sync {
    /// Whether the platform exposes a motion API at all.
    fn is_available(&self) -> bool;

    /// Request the motion permission. Some platforms gate motion sensors
    /// behind an explicit grant distinct from camera permission; others
    /// return `true` immediately.
    async fn request_permission(&mut self) -> Result<bool>;

    /// Begin sampling into the internal buffer.
    fn start(&mut self);

    /// Stop sampling and return the accumulated samples in arrival order.
    /// Safe to call when not started (returns an empty sequence).
    fn stop(&mut self) -> Vec<IMUSample>;
}

/// Bounded append-only buffer between a platform sample callback and the
/// capture session.
///
/// The producer side pushes with `push` (dropping samples once the bound
/// is hit rather than blocking the callback); `drain` swaps the sequence
/// out and re-arms the buffer for the next capture.
pub struct SampleBuffer {
    tx: mpsc::Sender<IMUSample>,
    rx: mpsc::Receiver<IMUSample>,
}

impl SampleBuffer {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(SAMPLE_BUFFER_CAPACITY);
        Self { tx, rx }
    }

    /// Handle for the platform callback to push samples through.
    pub fn sender(&self) -> mpsc::Sender<IMUSample> {
        self.tx.clone()
    }

    /// Push a sample from the producer side. Drops the sample when the
    /// buffer is full (the callback must never block).
    pub fn push(&self, sample: IMUSample) {
        if self.tx.try_send(sample).is_err() {
            warn!("Sample buffer full, dropping IMU sample");
        }
    }

    /// Drain all buffered samples in arrival order and reset the buffer.
    pub fn drain(&mut self) -> Vec<IMUSample> {
        let mut samples = Vec::new();
        while let Ok(sample) = self.rx.try_recv() {
            samples.push(sample);
        }

        // Fresh channel so a restarted capture never sees stale samples
        let (tx, rx) = mpsc::channel(SAMPLE_BUFFER_CAPACITY);
        self.tx = tx;
        self.rx = rx;

        samples
    }
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::new()
    }
}
