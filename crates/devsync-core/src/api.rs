//! Session list REST client
//!
//! The session list is owned by the backend; a refresh always re-fetches
//! the whole list rather than merging deltas.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ApiError;

/// One authenticated device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSession {
    pub device_id: String,
    #[serde(default)]
    pub device_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Set by the server for the requesting device
    #[serde(default)]
    pub current: bool,
}

#[derive(Debug, Deserialize)]
struct SessionListResponse {
    sessions: Vec<DeviceSession>,
}

/// Client for the session endpoints
#[derive(Clone)]
pub struct SessionApi {
    client: Client,
    base_url: String,
    token: String,
}

impl SessionApi {
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    fn sessions_url(&self) -> String {
        format!("{}/sessions", self.base_url)
    }

    fn session_url(&self, device_id: &str) -> String {
        format!(
            "{}/sessions/{}",
            self.base_url,
            urlencoding::encode(device_id)
        )
    }

    /// Fetch every active session of the current user
    pub async fn list_sessions(&self) -> Result<Vec<DeviceSession>, ApiError> {
        let url = self.sessions_url();
        debug!("Fetching sessions from {}", url);

        let body = self.send(self.client.get(&url), &url).await?;
        parse_session_list(&body).map_err(|source| ApiError::Decode { url, source })
    }

    /// Sign a device out remotely
    pub async fn revoke_session(&self, device_id: &str) -> Result<(), ApiError> {
        let url = self.session_url(device_id);
        debug!("Revoking session at {}", url);

        self.send(self.client.delete(&url), &url).await?;
        Ok(())
    }

    async fn send(&self, request: reqwest::RequestBuilder, url: &str) -> Result<String, ApiError> {
        let to_err = |source| ApiError::Request {
            url: url.to_string(),
            source,
        };

        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(to_err)?;

        let status = response.status();
        let body = response.text().await.map_err(to_err)?;

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }
}

fn parse_session_list(body: &str) -> Result<Vec<DeviceSession>, serde_json::Error> {
    serde_json::from_str::<SessionListResponse>(body).map(|r| r.sessions)
}
