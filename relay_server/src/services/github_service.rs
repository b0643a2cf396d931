//! GitHub integration: webhook validation and commit-status history.

use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Url;
use serde::Deserialize;
use sha2::Sha256;

use crate::config::RelayConfig;
use crate::services::decision::CommitState;

type HmacSha256 = Hmac<Sha256>;

/// Validate a GitHub webhook signature (X-Hub-Signature-256).
pub fn validate_signature(secret: &str, payload: &[u8], signature: &str) -> bool {
    if secret.is_empty() {
        return true;
    }

    let sig = signature.strip_prefix("sha256=").unwrap_or(signature);
    let sig_bytes = match hex::decode(sig) {
        Ok(b) => b,
        Err(_) => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(payload);

    mac.verify_slice(&sig_bytes).is_ok()
}

/// One status previously posted against a commit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommitStatus {
    pub state: CommitState,
}

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    #[error("GitHub returned {status} for {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },
    #[error("Unexpected GitHub status payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Invalid GitHub API URL: {0}")]
    InvalidApiUrl(String),
}

/// Lookup of statuses already recorded for a commit reference.
///
/// `commit_ref` is a branch name (its head) or `branch^` (the head's parent).
/// Entries are returned in the provider's order, most recent first. The
/// decision engine relies on that ordering.
#[async_trait]
pub trait StatusHistory: Send + Sync {
    async fn statuses_for_commit(
        &self,
        repository: &str,
        commit_ref: &str,
    ) -> Result<Vec<CommitStatus>, HistoryError>;
}

/// `GET /repos/{repo}/commits/{ref}/statuses` against the GitHub REST API.
pub struct GithubStatusClient {
    client: reqwest::Client,
    api_url: Url,
    token: String,
}

impl GithubStatusClient {
    pub fn new(config: &RelayConfig) -> Result<Self, HistoryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.upstream_timeout_secs))
            .user_agent("ci-relay")
            .build()?;
        Ok(Self {
            client,
            api_url: api_base(&config.github_api_url)?,
            token: config.github_token.clone(),
        })
    }

    pub fn statuses_url(&self, repository: &str, commit_ref: &str) -> Url {
        statuses_url(&self.api_url, repository, commit_ref)
    }
}

fn api_base(raw: &str) -> Result<Url, HistoryError> {
    let url = Url::parse(raw).map_err(|e| HistoryError::InvalidApiUrl(format!("{raw}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(HistoryError::InvalidApiUrl(raw.to_string()));
    }
    Ok(url)
}

/// Each path component is percent-encoded on its own, so refs containing
/// `#`, `%` or `/` stay inside their segment. `^` is kept as is.
pub fn statuses_url(api_url: &Url, repository: &str, commit_ref: &str) -> Url {
    let mut url = api_url.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments
            .pop_if_empty()
            .push("repos")
            .extend(repository.split('/'))
            .push("commits")
            .push(commit_ref)
            .push("statuses");
    }
    url
}

#[async_trait]
impl StatusHistory for GithubStatusClient {
    async fn statuses_for_commit(
        &self,
        repository: &str,
        commit_ref: &str,
    ) -> Result<Vec<CommitStatus>, HistoryError> {
        let url = self.statuses_url(repository, commit_ref);

        let mut request = self
            .client
            .get(url.clone())
            .header("Accept", "application/vnd.github+json");
        if !self.token.is_empty() {
            request = request.header("Authorization", format!("Bearer {}", self.token));
        }

        let resp = request.send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(%url, status, "GitHub status lookup failed");
            return Err(HistoryError::Status {
                status,
                url: url.to_string(),
                body,
            });
        }

        let body = resp.bytes().await?;
        let statuses: Vec<CommitStatus> = serde_json::from_slice(&body)?;
        tracing::debug!(%url, count = statuses.len(), "Fetched commit statuses");
        Ok(statuses)
    }
}
