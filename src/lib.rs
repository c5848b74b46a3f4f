//! xlens - capture-and-proof client for verified vertical jumps
//!
//! An untrusted device produces a video recording of a vertical jump
//! together with a portable, independently-checkable proof that the
//! recording is fresh, unaltered, and bound to this device and a
//! server-issued challenge.
//!
//! # Architecture
//!
//! The flow is a linear state machine:
//! - Probe the platform for camera, encoder, and motion capabilities
//! - Acquire permissions and bind a server-issued session nonce
//! - Capture camera frames and inertial samples over one interval
//! - Encode (hardware path or software fallback), hash once, sign
//! - Upload video (resumable), sensor data, and the proof
//!
//! # Modules
//!
//! - `adapters`: verification server API client
//! - `capture`: camera, motion sensor, compatibility prober
//! - `core`: the capture session state machine
//! - `crypto`: hashing and the durable device key store
//! - `domain`: sessions, captures, proofs, jump results
//! - `encode`: dual-path video encoding
//! - `proof`: proof assembly and signing
//! - `upload`: resumable and one-shot uploaders
//!
//! # Usage
//!
//! ```bash
//! # Check what this host can capture
//! xlens probe
//!
//! # Run a simulated capture against the server
//! xlens capture --duration 3
//!
//! # Poll a submission
//! xlens result <jump-id>
//! ```

pub mod adapters;
pub mod capture;
pub mod cli;
pub mod config;
pub mod core;
pub mod crypto;
pub mod domain;
pub mod encode;
pub mod error;
pub mod proof;
pub mod upload;

// Re-export main types at crate root for convenience
pub use config::ClientConfig;
pub use core::{CaptureClient, CaptureState};
pub use crypto::{DeviceKey, KeyStore};
pub use domain::{
    CaptureResult, IMUSample, JumpResult, ProofPayload, Session, SubmissionResult,
    VerificationTier,
};
pub use error::{Result, XLensError};
