//! HTTP client for the verification server.
//!
//! Endpoints:
//!   POST /xlens/session  -> session + nonce
//!   POST /xlens/upload   -> upload destinations
//!   POST /xlens/submit   -> proof submission
//!   GET  /xlens/result   -> verification outcome

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use super::{CreateSessionRequest, CreateSessionResponse, ServerApi, SubmitJumpRequest, UploadDestination};
use crate::domain::{JumpResult, Session, SubmissionResult};
use crate::error::{Result, XLensError};

/// Verification server client over HTTP.
pub struct HttpServerApi {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionIdBody<'a> {
    session_id: &'a str,
}

impl HttpServerApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<B: Serialize, R: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R> {
        let response = self.client.post(self.url(path)).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(XLensError::NetworkError(format!(
                "{} returned {}: {}",
                path,
                status,
                text.trim()
            )));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl ServerApi for HttpServerApi {
    async fn create_session(&self, request: &CreateSessionRequest) -> Result<Session> {
        let response: CreateSessionResponse = self
            .post_json("/xlens/session", request)
            .await
            .map_err(|e| XLensError::SessionCreateFailed(e.to_string()))?;

        info!(session_id = %response.session_id, "Session created");
        Ok(Session {
            id: response.session_id,
            nonce: response.nonce,
            nonce_display: response.nonce_display,
            expires_at: response.expires_at,
            device_key_id: request.device_key_id.clone(),
        })
    }

    async fn get_upload_destination(&self, session_id: &str) -> Result<UploadDestination> {
        self.post_json("/xlens/upload", &SessionIdBody { session_id })
            .await
    }

    async fn submit_jump(&self, request: &SubmitJumpRequest) -> Result<SubmissionResult> {
        let result: SubmissionResult = self.post_json("/xlens/submit", request).await?;
        info!(
            jump_id = %result.jump_id,
            tier = ?result.verification_tier,
            "Jump submitted"
        );
        Ok(result)
    }

    async fn get_jump(&self, jump_id: &str) -> Result<JumpResult> {
        let response = self
            .client
            .get(self.url("/xlens/result"))
            .query(&[("jumpId", jump_id)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(XLensError::NetworkError(format!(
                "/xlens/result returned {}",
                status
            )));
        }

        let result: JumpResult = response.json().await?;
        debug!(jump_id = %result.jump_id, status = ?result.status, "Result fetched");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalized() {
        let api = HttpServerApi::new("https://api.example.com/");
        assert_eq!(api.url("/xlens/session"), "https://api.example.com/xlens/session");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_session_create_failure() {
        let api = HttpServerApi::new("http://127.0.0.1:1");
        let err = api
            .create_session(&CreateSessionRequest {
                user_id: "anon_1".into(),
                device_key_id: "k1".into(),
                public_key: "pk".into(),
                platform: "rust-client".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "session_create_failed");
    }
}
