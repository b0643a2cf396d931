//! HTTP error mapping. Every error body is `{"Error": "<message>"}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::services::decision::DecisionError;
use crate::services::github_service::HistoryError;
use crate::services::push_service::PushError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error(transparent)]
    Push(#[from] PushError),
}

impl From<DecisionError> for ApiError {
    fn from(err: DecisionError) -> Self {
        match err {
            DecisionError::MissingBranch => {
                ApiError::Validation(DecisionError::MissingBranch.to_string())
            }
            DecisionError::History(e) => ApiError::History(e),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorJson {
    #[serde(rename = "Error")]
    pub error: String,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            // Not-found has no dedicated path; it is reported like any
            // other storage failure.
            ApiError::Store(_) | ApiError::History(_) | ApiError::Push(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }
        (status, Json(ErrorJson { error: self.to_string() })).into_response()
    }
}
