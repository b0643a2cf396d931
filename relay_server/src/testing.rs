//! Test doubles for the external collaborators.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::services::decision::CommitState;
use crate::services::github_service::{CommitStatus, HistoryError, StatusHistory};
use crate::services::push_service::{PushError, PushGateway};

pub fn statuses(states: &[&str]) -> Vec<CommitStatus> {
    states
        .iter()
        .map(|state| CommitStatus {
            state: CommitState::from(state.to_string()),
        })
        .collect()
}

/// Status history keyed by commit ref. Unknown refs have no statuses.
#[derive(Default)]
pub struct ScriptedHistory {
    responses: HashMap<String, Vec<CommitStatus>>,
    failure: Option<String>,
    requested: Mutex<Vec<String>>,
}

impl ScriptedHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every lookup fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn with(mut self, commit_ref: &str, states: &[&str]) -> Self {
        self.responses
            .insert(commit_ref.to_string(), statuses(states));
        self
    }

    /// Commit refs looked up so far, in call order.
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatusHistory for ScriptedHistory {
    async fn statuses_for_commit(
        &self,
        repository: &str,
        commit_ref: &str,
    ) -> Result<Vec<CommitStatus>, HistoryError> {
        self.requested.lock().unwrap().push(commit_ref.to_string());
        if let Some(message) = &self.failure {
            return Err(HistoryError::Status {
                status: 503,
                url: format!("/repos/{repository}/commits/{commit_ref}/statuses"),
                body: message.clone(),
            });
        }
        Ok(self.responses.get(commit_ref).cloned().unwrap_or_default())
    }
}

/// Records every push. Tokens marked failing are rejected with "Oh no!".
#[derive(Default)]
pub struct RecordingGateway {
    failing: HashSet<String>,
    delay: Option<Duration>,
    attempted: Mutex<Vec<String>>,
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(mut self, device_token: &str) -> Self {
        self.failing.insert(device_token.to_string());
        self
    }

    /// Every send sleeps for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Attempted tokens, sorted. Fan-out sends concurrently.
    pub fn attempted(&self) -> Vec<String> {
        let mut attempted = self.attempted.lock().unwrap().clone();
        attempted.sort();
        attempted
    }

    /// Successful deliveries as (token, alert), sorted by token.
    pub fn sent(&self) -> Vec<(String, String)> {
        let mut sent = self.sent.lock().unwrap().clone();
        sent.sort();
        sent
    }
}

#[async_trait]
impl PushGateway for RecordingGateway {
    async fn send(&self, device_token: &str, alert: &str) -> Result<(), PushError> {
        self.attempted.lock().unwrap().push(device_token.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(device_token) {
            return Err(PushError::Rejected {
                status: 400,
                reason: "Oh no!".to_string(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((device_token.to_string(), alert.to_string()));
        Ok(())
    }
}
