//! Build-status transition analysis.
//!
//! Decides whether a status event is worth a push. Failures always are.
//! A success only is when it ends a failure, found by looking back first at
//! the other checks on the same commit and then at the parent commit.

use serde::Deserialize;

use crate::services::github_service::{CommitStatus, HistoryError, StatusHistory};

/// State of a commit status as reported by the CI provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum CommitState {
    Success,
    Failure,
    Error,
    /// Anything else (`pending`, empty, provider-specific values).
    Other(String),
}

impl From<String> for CommitState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "success" => Self::Success,
            "failure" => Self::Failure,
            "error" => Self::Error,
            _ => Self::Other(value),
        }
    }
}

impl CommitState {
    pub fn is_failing(&self) -> bool {
        matches!(self, Self::Failure | Self::Error)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Error => "error",
            Self::Other(value) => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Branch {
    #[serde(rename = "Name", alias = "name")]
    pub name: String,
}

/// Inbound commit-status webhook. Only the first branch is consulted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusEvent {
    pub name: String,
    #[serde(default)]
    pub context: Option<String>,
    pub state: CommitState,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub branches: Vec<Branch>,
}

impl StatusEvent {
    pub fn branch(&self) -> Option<&str> {
        self.branches
            .first()
            .map(|b| b.name.as_str())
            .filter(|name| !name.is_empty())
    }

    /// Alert text pushed to devices: `"<repo>: <description>"`.
    pub fn alert(&self) -> String {
        format!("{}: {}", self.name, self.description.as_deref().unwrap_or(""))
    }
}

/// Outcome of evaluating one status event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// `failure` or `error`; always surfaced.
    Failure,
    /// Success after a failing check on the same commit.
    RecoveredSameCommit,
    /// Success after a failing parent commit.
    RecoveredFromParent,
    /// Success with no failure to recover from.
    StillPassing,
    /// State outside success/failure/error.
    Ignored,
}

impl Decision {
    pub fn should_notify(self) -> bool {
        matches!(
            self,
            Self::Failure | Self::RecoveredSameCommit | Self::RecoveredFromParent
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Failure => "failure",
            Self::RecoveredSameCommit => "recovered_same_commit",
            Self::RecoveredFromParent => "recovered_from_parent",
            Self::StillPassing => "still_passing",
            Self::Ignored => "ignored",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecisionError {
    #[error("Did not receive a valid branch in GitHub status.")]
    MissingBranch,
    #[error(transparent)]
    History(#[from] HistoryError),
}

/// Evaluate a status event against the recorded history.
///
/// Issues at most two sequential lookups, and only for `success` events.
/// A lookup error aborts the evaluation.
pub async fn evaluate(
    history: &dyn StatusHistory,
    event: &StatusEvent,
) -> Result<Decision, DecisionError> {
    let branch = event.branch().ok_or(DecisionError::MissingBranch)?;

    match event.state {
        CommitState::Failure | CommitState::Error => Ok(Decision::Failure),
        CommitState::Other(_) => Ok(Decision::Ignored),
        CommitState::Success => evaluate_success(history, &event.name, branch).await,
    }
}

async fn evaluate_success(
    history: &dyn StatusHistory,
    repository: &str,
    branch: &str,
) -> Result<Decision, DecisionError> {
    let same_commit = history.statuses_for_commit(repository, branch).await?;
    if same_commit_recovered(&same_commit) {
        return Ok(Decision::RecoveredSameCommit);
    }

    let parent_ref = format!("{branch}^");
    let parent = history.statuses_for_commit(repository, &parent_ref).await?;
    if parent_commit_failed(&parent) {
        Ok(Decision::RecoveredFromParent)
    } else {
        Ok(Decision::StillPassing)
    }
}

/// Same-commit lookback.
///
/// Two successes settle it as "no prior failure". A failure seen right after
/// the first success means this success recovers from it. Failures before
/// any success are skipped.
pub fn same_commit_recovered(statuses: &[CommitStatus]) -> bool {
    let mut successes = 0;
    for status in statuses {
        match status.state {
            CommitState::Success => {
                successes += 1;
                if successes == 2 {
                    return false;
                }
            }
            ref state if state.is_failing() && successes == 1 => return true,
            _ => {}
        }
    }
    false
}

/// Parent-commit lookback: the first terminal status decides.
pub fn parent_commit_failed(statuses: &[CommitStatus]) -> bool {
    statuses
        .iter()
        .find_map(|status| match status.state {
            CommitState::Success => Some(false),
            CommitState::Failure | CommitState::Error => Some(true),
            CommitState::Other(_) => None,
        })
        .unwrap_or(false)
}
