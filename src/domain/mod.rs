//! Domain data structures shared across the client.
//!
//! These types are the vocabulary of the capture flow: sessions, sensor
//! samples, capture results, proofs, and jump outcomes. Wire-facing types
//! serialize with camelCase field names to match the server contract.

pub mod capture;
pub mod jump;
pub mod proof;
pub mod session;

// Re-export commonly used types
pub use capture::{CaptureResult, DeviceInfo, IMUSample};
pub use jump::{JumpHeight, JumpResult, JumpStatus, SubmissionResult, VerificationTier};
pub use proof::{CaptureMetadata, HashBundle, ProofPayload, SignatureBundle, TEST_TYPE_VERT_JUMP};
pub use session::Session;
