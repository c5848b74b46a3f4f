//! Jump submission outcomes and server-assigned verification tiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-assigned confidence label for a submission.
///
/// Ordered from weakest to strongest evidence. The client never computes a
/// tier itself; these values only ever arrive from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationTier {
    /// Submission rejected outright
    Rejected,
    /// Basic capture, no cryptographic chain established
    Measured,
    /// Valid signature over a fresh nonce
    Bronze,
    /// Bronze plus device attestation
    Silver,
    /// Silver plus hardware attestation (native clients only)
    Gold,
}

/// Processing status of a submitted jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JumpStatus {
    Uploading,
    Processing,
    Complete,
    Failed,
    Flagged,
    Challenged,
    Rejected,
}

impl JumpStatus {
    /// Whether the verification pipeline has finished with this jump.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Rejected)
    }
}

/// Immediate response to a jump submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResult {
    pub jump_id: String,
    pub status: JumpStatus,
    pub verification_tier: VerificationTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Measured jump height, in both units the server reports.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct JumpHeight {
    pub inches: f64,
    pub centimeters: f64,
}

impl JumpHeight {
    pub fn from_inches(inches: f64) -> Self {
        Self {
            inches,
            centimeters: (inches * 2.54 * 10.0).round() / 10.0,
        }
    }
}

/// Terminal (or in-flight) result of a verified jump.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JumpResult {
    pub jump_id: String,
    pub user_id: String,
    pub status: JumpStatus,
    pub verification_tier: VerificationTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<JumpHeight>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<Vec<String>>,
}
