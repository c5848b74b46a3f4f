//! Capture session orchestration.
//!
//! One linear, observable flow per client: compatibility check,
//! permission acquisition, session binding, capture, processing,
//! upload, submission.

pub mod client;

pub use client::{CaptureClient, CaptureState};
