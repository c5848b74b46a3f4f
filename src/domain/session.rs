//! Capture sessions issued by the verification server.
//!
//! A session binds exactly one capture to a server-issued nonce. Capture
//! must not start at or after `expires_at`; the orchestrator enforces this
//! before acquiring any device resources.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A server-issued capture challenge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Server-assigned session identifier (opaque)
    pub id: String,

    /// Single-use nonce bound 1:1 to this capture (opaque)
    pub nonce: String,

    /// Human-readable rendering of the nonce, e.g. "A7B3X9", for
    /// out-of-band verification (shown on screen during recording)
    pub nonce_display: String,

    /// Absolute deadline after which this session is unusable
    pub expires_at: DateTime<Utc>,

    /// Key id the session was created against
    pub device_key_id: String,
}

impl Session {
    /// Whether the session deadline has passed.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Seconds until expiry, clamped at zero.
    pub fn time_remaining_secs(&self) -> f64 {
        let remaining = (self.expires_at - Utc::now()).num_milliseconds() as f64 / 1000.0;
        remaining.max(0.0)
    }
}
