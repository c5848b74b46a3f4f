//! One-shot uploads for small payloads.

use tracing::debug;

use crate::error::{Result, XLensError};

/// Single-request uploader. No chunking, no resume; callers retry the
/// whole payload if they need to.
pub struct SimpleUploader {
    client: reqwest::Client,
}

impl SimpleUploader {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub async fn upload(&self, data: &[u8], endpoint: &str, content_type: &str) -> Result<()> {
        let response = self
            .client
            .post(endpoint)
            .header("Content-Type", content_type)
            .body(data.to_vec())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(XLensError::UploadFailed(format!(
                "upload returned {}",
                response.status()
            )));
        }

        debug!(bytes = data.len(), endpoint, "Payload uploaded");
        Ok(())
    }
}

impl Default for SimpleUploader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        let uploader = SimpleUploader::new();
        let err = uploader
            .upload(b"{}", "http://127.0.0.1:1/upload", "application/json")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "network_error");
    }
}
