//! Capture devices and platform probing.
//!
//! Cameras and motion sensors sit behind traits so the orchestrator is
//! independent of the platform backend. The `sim` module provides the
//! deterministic backend used by the CLI demo and the test suite.

pub mod camera;
pub mod compat;
pub mod motion;
pub mod sim;

pub use camera::{CameraConfig, CameraDevice, CameraFacing, RawFrame};
pub use compat::{probe, CompatibilityReport, EncoderPath};
pub use motion::{MotionSensor, SampleBuffer};
pub use sim::{SimulatedCamera, SimulatedMotion};
