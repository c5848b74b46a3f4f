//! The capture session state machine.
//!
//! One `CaptureClient` drives one capture at a time through a linear
//! flow: compatibility check, permission acquisition, session binding,
//! capture, processing, upload, submission. State, upload progress, and
//! recording duration are exposed as watch channels so a UI can observe
//! the flow without polling the client.
//!
//! On any failure the client settles into `Error` with the triggering
//! error attached; it never leaves a dangling `Capturing` or `Uploading`
//! state. `cancel()` and `reset()` are safe from every state, including
//! `Error`, and always land in `Idle`.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, Instant};
use tracing::{debug, info, instrument, warn};

use crate::adapters::{CreateSessionRequest, ServerApi, SubmitJumpRequest};
use crate::capture::camera::{CameraDevice, RawFrame};
use crate::capture::compat::{self, CompatibilityReport, EncoderPath};
use crate::capture::motion::MotionSensor;
use crate::config::ClientConfig;
use crate::crypto::{sha256_hex, KeyStore};
use crate::domain::capture::serialize_samples;
use crate::domain::{
    CaptureResult, DeviceInfo, JumpResult, ProofPayload, Session, SubmissionResult,
};
use crate::encode::{EncoderConfig, EncoderStats, HardwareEncoder, SoftwareRecorder, VideoEncoder};
use crate::error::{Result, XLensError};
use crate::proof::{verify_hashes_locally, ProofBuilder};
use crate::upload::{UploadProgress, Uploader};

/// Duration ticker period while capturing.
const TICK_INTERVAL_MS: u64 = 100;

/// Observable position in the capture flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    CheckingCompatibility,
    RequestingPermissions,
    PreparingSession,
    SessionReady,
    Capturing,
    Processing,
    Uploading,
    Submitted,
    Complete,
    Error,
    Unsupported,
}

/// Command channel into the frame pump task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PumpCommand {
    Run,
    /// Finalize the encoder after draining submitted frames
    Finish,
    /// Discard everything
    Abort,
}

/// Resources owned by an in-flight capture.
struct ActiveCapture {
    pump_cmd: watch::Sender<PumpCommand>,
    pump: JoinHandle<Result<(Vec<u8>, EncoderStats)>>,
    ticker: JoinHandle<()>,
    started_at_ms: i64,
}

/// The capture-and-proof client.
pub struct CaptureClient {
    config: ClientConfig,
    user_id: String,

    server: Arc<dyn ServerApi>,
    uploader: Arc<dyn Uploader>,
    key_store: KeyStore,
    camera: Box<dyn CameraDevice>,
    motion: Box<dyn MotionSensor>,

    state_tx: watch::Sender<CaptureState>,
    progress_tx: watch::Sender<Option<UploadProgress>>,
    duration_tx: watch::Sender<u64>,

    last_error: Option<XLensError>,
    report: Option<CompatibilityReport>,
    encoder_path: Option<EncoderPath>,
    motion_granted: bool,

    session: Option<Session>,
    active: Option<ActiveCapture>,
    capture: Option<CaptureResult>,
    submission: Option<SubmissionResult>,
}

impl CaptureClient {
    pub fn new(
        config: ClientConfig,
        server: Arc<dyn ServerApi>,
        uploader: Arc<dyn Uploader>,
        camera: Box<dyn CameraDevice>,
        motion: Box<dyn MotionSensor>,
    ) -> Result<Self> {
        let key_store = KeyStore::open(config.keys_dir())?;
        let user_id = config
            .user_id()
            .map_err(|e| XLensError::unknown("resolve user id", e))?;

        let (state_tx, _) = watch::channel(CaptureState::Idle);
        let (progress_tx, _) = watch::channel(None);
        let (duration_tx, _) = watch::channel(0);

        Ok(Self {
            config,
            user_id,
            server,
            uploader,
            key_store,
            camera,
            motion,
            state_tx,
            progress_tx,
            duration_tx,
            last_error: None,
            report: None,
            encoder_path: None,
            motion_granted: false,
            session: None,
            active: None,
            capture: None,
            submission: None,
        })
    }

    /// Current state.
    pub fn state(&self) -> CaptureState {
        *self.state_tx.borrow()
    }

    /// Subscribe to state transitions.
    pub fn watch_state(&self) -> watch::Receiver<CaptureState> {
        self.state_tx.subscribe()
    }

    /// Subscribe to upload progress (None outside the upload phase).
    pub fn watch_upload_progress(&self) -> watch::Receiver<Option<UploadProgress>> {
        self.progress_tx.subscribe()
    }

    /// Subscribe to recording duration in milliseconds, updated on a
    /// 100 ms tick while capturing.
    pub fn watch_recording_duration(&self) -> watch::Receiver<u64> {
        self.duration_tx.subscribe()
    }

    /// The error that moved the client into `Error`, if any.
    pub fn last_error(&self) -> Option<&XLensError> {
        self.last_error.as_ref()
    }

    /// The active session, if one is bound.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// The server's response to the last submission, if any.
    pub fn submission(&self) -> Option<&SubmissionResult> {
        self.submission.as_ref()
    }

    fn set_state(&self, state: CaptureState) {
        debug!(?state, "State transition");
        // send_replace: the value must update even with no subscribers
        self.state_tx.send_replace(state);
    }

    /// Settle into `Error` with devices released.
    fn fail(&mut self, err: XLensError) -> XLensError {
        warn!(code = err.code(), error = %err, "Capture flow failed");
        self.teardown_active();
        self.last_error = Some(err.clone());
        self.set_state(CaptureState::Error);
        err
    }

    fn teardown_active(&mut self) {
        if let Some(active) = self.active.take() {
            let _ = active.pump_cmd.send(PumpCommand::Abort);
            active.ticker.abort();
            active.pump.abort();
        }
        let _ = self.motion.stop();
        self.camera.stop();
        self.duration_tx.send_replace(0);
    }

    /// Probe the environment and record which encoder path to use.
    ///
    /// Incompatibility is terminal: the client enters `Unsupported`
    /// before acquiring any resource.
    pub async fn check_compatibility(&mut self) -> Result<&CompatibilityReport> {
        self.set_state(CaptureState::CheckingCompatibility);

        let report = compat::probe(
            self.camera.as_ref(),
            self.motion.as_ref(),
            &self.config.encoder.binary,
        )
        .await;

        if !report.is_compatible {
            let detail = report.errors.join("; ");
            self.report = Some(report);
            self.last_error = Some(XLensError::UnsupportedPlatform(detail.clone()));
            self.set_state(CaptureState::Unsupported);
            return Err(XLensError::UnsupportedPlatform(detail));
        }

        self.encoder_path = report.encoder_path();
        info!(path = ?self.encoder_path, "Platform compatible");
        self.set_state(CaptureState::Idle);
        Ok(self.report.insert(report))
    }

    /// Acquire camera access, then (only if inertial sensing exists)
    /// request the motion permission. Camera denial fails the transition;
    /// motion denial does not: capture proceeds without sensor data.
    pub async fn request_permissions(&mut self) -> Result<()> {
        if self.encoder_path.is_none() {
            return Err(XLensError::CaptureFailed(
                "compatibility not checked".into(),
            ));
        }
        self.set_state(CaptureState::RequestingPermissions);

        // A start/stop round trip proves the grant without holding the
        // device outside a capture.
        let camera_config = self.config.camera.clone();
        if let Err(e) = self.camera.start(&camera_config).await {
            return Err(self.fail(e));
        }
        self.camera.stop();

        self.motion_granted = if self.motion.is_available() {
            match self.motion.request_permission().await {
                Ok(granted) => {
                    if !granted {
                        info!("Motion permission denied, continuing without sensor data");
                    }
                    granted
                }
                Err(e) => {
                    warn!(error = %e, "Motion permission request failed");
                    false
                }
            }
        } else {
            false
        };

        self.set_state(CaptureState::Idle);
        Ok(())
    }

    /// Bind a fresh server-issued session (and its nonce) to this client.
    #[instrument(skip(self))]
    pub async fn create_session(&mut self) -> Result<&Session> {
        self.set_state(CaptureState::PreparingSession);

        let key = match self.key_store.get_or_create(&self.user_id) {
            Ok(key) => key,
            Err(e) => return Err(self.fail(e)),
        };

        let request = CreateSessionRequest {
            user_id: self.user_id.clone(),
            device_key_id: key.key_id,
            public_key: key.public_key,
            platform: DeviceInfo::current().platform,
        };

        let session = match self.server.create_session(&request).await {
            Ok(session) => session,
            Err(e) => return Err(self.fail(e)),
        };

        info!(session_id = %session.id, expires_at = %session.expires_at, "Session bound");
        self.set_state(CaptureState::SessionReady);
        Ok(self.session.insert(session))
    }

    /// Start recording.
    ///
    /// Refuses outside `SessionReady`, and refuses an expired session
    /// with `SessionExpired` before any device is touched.
    pub async fn start_capture(&mut self) -> Result<()> {
        if self.state() != CaptureState::SessionReady {
            return Err(XLensError::CaptureFailed(format!(
                "cannot start capture from {:?}",
                self.state()
            )));
        }

        // Expiry is checked before device acquisition: an expired session
        // must produce no device-level side effects.
        let expired = self.session.as_ref().map(Session::is_expired).unwrap_or(true);
        if expired {
            return Err(self.fail(XLensError::SessionExpired));
        }

        let path = match self.encoder_path {
            Some(path) => path,
            None => {
                return Err(self.fail(XLensError::CaptureFailed(
                    "no encoder path selected".into(),
                )))
            }
        };

        // A previous cancel leaves the uploader aborted; this capture's
        // transfers need it armed again.
        self.uploader.reset();

        let camera_config = self.config.camera.clone();
        if let Err(e) = self.camera.start(&camera_config).await {
            return Err(self.fail(e));
        }

        let (width, height) = self.camera.dimensions();
        let encoder_config = EncoderConfig {
            width,
            height,
            ..self.config.encoder.clone()
        };

        // Path chosen once; nothing branches on capability flags past here.
        let (encoder, frames): (Box<dyn VideoEncoder + Send>, Option<mpsc::Receiver<RawFrame>>) =
            match path {
                EncoderPath::Hardware => {
                    let mut encoder = HardwareEncoder::new(encoder_config);
                    if let Err(e) = encoder.initialize().await {
                        return Err(self.fail(e));
                    }
                    let frames = match self.camera.take_frames() {
                        Ok(frames) => frames,
                        Err(e) => return Err(self.fail(e)),
                    };
                    (Box::new(encoder), Some(frames))
                }
                EncoderPath::Software => {
                    let chunks = match self.camera.start_recorder() {
                        Ok(chunks) => chunks,
                        Err(e) => return Err(self.fail(e)),
                    };
                    let mut recorder =
                        SoftwareRecorder::new(chunks, encoder_config.frame_rate as f64);
                    if let Err(e) = recorder.initialize().await {
                        return Err(self.fail(e));
                    }
                    // Frames still flow on this path for timing measurement.
                    let frames = self.camera.take_frames().ok();
                    (Box::new(recorder), frames)
                }
            };

        if self.motion_granted {
            self.motion.start();
        }

        let (pump_cmd, cmd_rx) = watch::channel(PumpCommand::Run);
        let max_duration = Duration::from_millis(self.config.max_capture_ms);
        let pump = tokio::spawn(run_pump(encoder, frames, cmd_rx, max_duration));

        let duration_tx = self.duration_tx.clone();
        let started = Instant::now();
        let ticker = tokio::spawn(async move {
            let mut tick = interval(Duration::from_millis(TICK_INTERVAL_MS));
            loop {
                tick.tick().await;
                duration_tx.send_replace(started.elapsed().as_millis() as u64);
            }
        });

        self.active = Some(ActiveCapture {
            pump_cmd,
            pump,
            ticker,
            started_at_ms: Utc::now().timestamp_millis(),
        });

        info!(?path, "Capture started");
        self.set_state(CaptureState::Capturing);
        Ok(())
    }

    /// Stop recording: finalize the encoder, stop the sampler, hash the
    /// final artifacts, and assemble the `CaptureResult`.
    ///
    /// Both hashes are computed here exactly once, over the complete
    /// immutable byte sequences returned by finalize.
    pub async fn stop_capture(&mut self) -> Result<CaptureResult> {
        if self.state() != CaptureState::Capturing {
            return Err(XLensError::CaptureFailed(format!(
                "cannot stop capture from {:?}",
                self.state()
            )));
        }
        self.set_state(CaptureState::Processing);

        let active = match self.active.take() {
            Some(active) => active,
            None => {
                return Err(self.fail(XLensError::CaptureFailed("no active capture".into())))
            }
        };

        active.ticker.abort();
        let _ = active.pump_cmd.send(PumpCommand::Finish);
        // Closes the recorder chunk stream so the pump's finalize can
        // drain it to completion (no-op on the hardware path).
        self.camera.stop_recorder();

        let pump_result = active
            .pump
            .await
            .map_err(|e| XLensError::CaptureFailed(format!("encoder task: {}", e)));

        let sensor_data = self.motion.stop();
        self.camera.stop();
        self.duration_tx.send_replace(0);

        let (video_data, stats) = match pump_result.and_then(|inner| inner) {
            Ok(output) => output,
            Err(e) => return Err(self.fail(e)),
        };

        let sensor_bytes = match serialize_samples(&sensor_data) {
            Ok(bytes) => bytes,
            Err(e) => return Err(self.fail(e)),
        };

        let result = CaptureResult {
            video_hash: sha256_hex(&video_data),
            sensor_hash: sha256_hex(&sensor_bytes),
            video_data,
            sensor_data,
            started_at_ms: active.started_at_ms,
            ended_at_ms: Utc::now().timestamp_millis(),
            fps: stats.actual_fps,
            frame_count: stats.frame_count,
        };

        info!(
            duration_ms = result.duration_ms(),
            frames = result.frame_count,
            fps = result.fps,
            samples = result.sensor_data.len(),
            "Capture processed"
        );

        self.capture = Some(result.clone());
        Ok(result)
    }

    /// Generate and sign the proof, upload all three artifacts, and
    /// submit for verification.
    ///
    /// A successful submit consumes the capture: the session's nonce is
    /// spent, so a second call refuses instead of re-submitting.
    #[instrument(skip(self))]
    pub async fn submit_jump(&mut self) -> Result<SubmissionResult> {
        let (session, capture) = match (self.session.clone(), self.capture.clone()) {
            (Some(session), Some(capture)) => (session, capture),
            _ => {
                return Err(XLensError::CaptureFailed("nothing to submit".into()));
            }
        };
        self.set_state(CaptureState::Uploading);

        let sensors_available = self.motion_granted && self.motion.is_available();
        let proof = match ProofBuilder::new(&self.key_store, &self.user_id).build(
            &session,
            &capture,
            sensors_available,
        ) {
            Ok(proof) => proof,
            Err(e) => return Err(self.fail(e)),
        };

        // Fail-fast corruption check; never used to repair a payload.
        if !verify_hashes_locally(&proof, &capture) {
            return Err(self.fail(XLensError::CaptureFailed(
                "local hash verification failed".into(),
            )));
        }

        let result = match self.upload_and_submit(&session, &capture, proof).await {
            Ok(result) => result,
            Err(e) => return Err(self.fail(e)),
        };

        // The nonce is spent; drop the capture so it cannot be submitted
        // against this session a second time.
        self.capture = None;
        self.submission = Some(result.clone());
        self.set_state(CaptureState::Submitted);
        Ok(result)
    }

    async fn upload_and_submit(
        &self,
        session: &Session,
        capture: &CaptureResult,
        proof: ProofPayload,
    ) -> Result<SubmissionResult> {
        let destination = self.server.get_upload_destination(&session.id).await?;

        let progress_tx = self.progress_tx.clone();
        let on_progress = move |progress: UploadProgress| {
            progress_tx.send_replace(Some(progress));
        };

        let video_stream_id = self
            .uploader
            .upload_video(
                &capture.video_data,
                &destination.video_upload_endpoint,
                &on_progress,
            )
            .await?;

        let sensor_bytes = serialize_samples(&capture.sensor_data)?;
        self.uploader
            .upload_blob(
                &sensor_bytes,
                &destination.sensor_upload_endpoint,
                "application/json",
            )
            .await?;

        self.progress_tx.send_replace(None);

        self.server
            .submit_jump(&SubmitJumpRequest {
                proof,
                video_stream_id,
            })
            .await
    }

    /// Poll the verification outcome. Idempotent; enters `Complete` once
    /// the server reports a terminal status.
    pub async fn fetch_result(&mut self, jump_id: &str) -> Result<JumpResult> {
        let result = self.server.get_jump(jump_id).await?;
        if result.status.is_terminal() {
            self.set_state(CaptureState::Complete);
        }
        Ok(result)
    }

    /// Abort everything in flight and return to `Idle`. Never fails and
    /// is safe to call repeatedly from any state.
    pub fn cancel(&mut self) {
        self.teardown_active();
        self.uploader.abort();
        self.progress_tx.send_replace(None);
        self.session = None;
        self.capture = None;
        self.submission = None;
        self.set_state(CaptureState::Idle);
    }

    /// `cancel()` plus clearing the last error.
    pub fn reset(&mut self) {
        self.cancel();
        self.last_error = None;
    }
}

/// The frame pump: owns the encoder for the duration of a capture and
/// feeds it frames strictly in capture order. Recording stops taking
/// new frames at `max_duration`, the hard ceiling on capture length.
///
/// Finalize runs only after every submitted frame has been encoded, so
/// the video bytes the caller hashes are complete.
async fn run_pump(
    mut encoder: Box<dyn VideoEncoder + Send>,
    mut frames: Option<mpsc::Receiver<RawFrame>>,
    mut cmd: watch::Receiver<PumpCommand>,
    max_duration: Duration,
) -> Result<(Vec<u8>, EncoderStats)> {
    let deadline = Instant::now() + max_duration;

    loop {
        let command = *cmd.borrow();
        match command {
            PumpCommand::Abort => {
                encoder.abort().await;
                return Err(XLensError::CaptureFailed("capture cancelled".into()));
            }
            PumpCommand::Finish => break,
            PumpCommand::Run => {}
        }

        match frames.as_mut() {
            Some(rx) => {
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => break,
                    changed = cmd.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    frame = rx.recv() => {
                        match frame {
                            Some(frame) => encoder.encode_frame(frame).await?,
                            None => break,
                        }
                    }
                }
            }
            None => {
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => break,
                    changed = cmd.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }

    // Drain frames already queued at the moment of Finish so none are
    // dropped between the last tick and finalize.
    if let Some(rx) = frames.as_mut() {
        rx.close();
        while let Some(frame) = rx.recv().await {
            encoder.encode_frame(frame).await?;
        }
    }

    let video = encoder.finalize().await?;
    let stats = encoder.stats();
    Ok((video, stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pump_command_default_is_run() {
        let (tx, rx) = watch::channel(PumpCommand::Run);
        assert_eq!(*rx.borrow(), PumpCommand::Run);
        tx.send(PumpCommand::Finish).unwrap();
        assert_eq!(*rx.borrow(), PumpCommand::Finish);
    }
}
