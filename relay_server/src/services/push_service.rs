//! Push delivery through the Apple Push Notification service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;

use crate::config::RelayConfig;

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("push gateway is not configured")]
    NotConfigured,
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    #[error("APNs rejected notification ({status}): {reason}")]
    Rejected { status: u16, reason: String },
    #[error("Invalid APNs URL: {0}")]
    InvalidUrl(String),
}

/// Sends one alert to one device token.
#[async_trait]
pub trait PushGateway: Send + Sync {
    async fn send(&self, device_token: &str, alert: &str) -> Result<(), PushError>;
}

#[derive(Debug, Deserialize)]
struct ApnsErrorBody {
    reason: String,
}

/// HTTP/2 provider API client (`POST /3/device/{token}`).
pub struct ApnsGateway {
    client: reqwest::Client,
    url: Url,
    auth_token: String,
    topic: String,
}

impl ApnsGateway {
    pub fn new(config: &RelayConfig) -> Result<Self, PushError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.upstream_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: apns_base(&config.apns_url)?,
            auth_token: config.apns_auth_token.clone(),
            topic: config.apns_topic.clone(),
        })
    }
}

fn apns_base(raw: &str) -> Result<Url, PushError> {
    let url = Url::parse(raw).map_err(|e| PushError::InvalidUrl(format!("{raw}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(PushError::InvalidUrl(raw.to_string()));
    }
    Ok(url)
}

/// `{base}/3/device/{token}`. The token arrives percent-decoded from the
/// request path and is re-encoded as a single segment.
pub fn device_url(base: &Url, device_token: &str) -> Url {
    let mut url = base.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments
            .pop_if_empty()
            .extend(["3", "device", device_token]);
    }
    url
}

/// APNs payload for an alert with the badge set.
pub fn payload(alert: &str) -> serde_json::Value {
    serde_json::json!({
        "aps": {
            "alert": alert,
            "badge": 1,
        }
    })
}

#[async_trait]
impl PushGateway for ApnsGateway {
    async fn send(&self, device_token: &str, alert: &str) -> Result<(), PushError> {
        if self.auth_token.is_empty() {
            return Err(PushError::NotConfigured);
        }

        let url = device_url(&self.url, device_token);
        let mut request = self
            .client
            .post(url)
            .header("Authorization", format!("bearer {}", self.auth_token))
            .header("apns-push-type", "alert")
            .json(&payload(alert));
        if !self.topic.is_empty() {
            request = request.header("apns-topic", &self.topic);
        }

        let resp = request.send().await?;
        if resp.status().is_success() {
            return Ok(());
        }

        let status = resp.status().as_u16();
        let reason = resp
            .json::<ApnsErrorBody>()
            .await
            .map(|body| body.reason)
            .unwrap_or_else(|_| "unknown".to_string());
        Err(PushError::Rejected { status, reason })
    }
}
