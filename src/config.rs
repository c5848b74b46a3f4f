//! Client configuration.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (XLENS_HOME, XLENS_SERVER_URL)
//! 2. Defaults (~/.xlens, production server URL)
//!
//! The home directory holds the device key files and the persisted
//! anonymous user identity.

use std::path::PathBuf;

use anyhow::{Context, Result};
use uuid::Uuid;

use crate::capture::camera::CameraConfig;
use crate::encode::EncoderConfig;

const DEFAULT_SERVER_URL: &str = "https://api.xlens.app";

/// Hard ceiling on recording length.
pub const MAX_CAPTURE_MS: u64 = 15_000;

/// Resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Verification server base URL
    pub server_url: String,

    /// State directory: device keys, anonymous identity
    pub home: PathBuf,

    pub camera: CameraConfig,
    pub encoder: EncoderConfig,

    /// Resumable upload chunk size in bytes
    pub upload_chunk_size: usize,

    /// Retry delay schedule for chunk uploads, milliseconds
    pub upload_retry_delays_ms: Vec<u64>,

    /// Maximum recording duration in milliseconds
    pub max_capture_ms: u64,
}

impl ClientConfig {
    /// Load configuration from environment variables and defaults.
    pub fn load() -> Result<Self> {
        let home = match std::env::var("XLENS_HOME") {
            Ok(path) => PathBuf::from(path),
            Err(_) => dirs::home_dir()
                .context("Failed to determine home directory")?
                .join(".xlens"),
        };

        let server_url = std::env::var("XLENS_SERVER_URL")
            .unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());

        Ok(Self {
            server_url,
            home,
            camera: CameraConfig::default(),
            encoder: EncoderConfig::default(),
            upload_chunk_size: crate::upload::resumable::DEFAULT_CHUNK_SIZE,
            upload_retry_delays_ms: crate::upload::resumable::default_retry_delays(),
            max_capture_ms: MAX_CAPTURE_MS,
        })
    }

    /// Directory holding device key files.
    pub fn keys_dir(&self) -> PathBuf {
        self.home.join("keys")
    }

    /// The stable anonymous user id for this install, created and
    /// persisted on first use. Deleting the file resets the identity.
    pub fn user_id(&self) -> Result<String> {
        let path = self.home.join("user_id");
        if path.exists() {
            let id = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let id = id.trim().to_string();
            if !id.is_empty() {
                return Ok(id);
            }
        }

        let id = format!("anon_{}", Uuid::new_v4());
        std::fs::create_dir_all(&self.home)
            .with_context(|| format!("Failed to create {}", self.home.display()))?;
        std::fs::write(&path, &id)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(id)
    }
}
