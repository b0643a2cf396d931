//! GitHub status webhook: evaluates the event and fans out pushes.

use axum::body::Bytes;
use axum::http::HeaderMap;

use crate::error::ApiError;
use crate::routes::RelayState;
use crate::services::decision::{self, StatusEvent};
use crate::services::{dispatcher, github_service};

pub const ACCEPTED: &str = "Accepted.";

/// Handle an incoming GitHub `status` webhook payload.
pub async fn handle_status_webhook(
    state: &RelayState,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<&'static str, ApiError> {
    let signature = headers
        .get("x-hub-signature-256")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if !github_service::validate_signature(&state.config.webhook_secret, &body, signature) {
        tracing::warn!("Webhook signature validation failed");
        return Err(ApiError::Unauthorized(
            "Webhook signature validation failed.".to_string(),
        ));
    }

    // Deliveries without an event header are treated as status events.
    let event_type = headers
        .get("x-github-event")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("status");

    match event_type {
        "status" => handle_status(state, &body).await,
        "ping" => {
            tracing::info!("Received GitHub ping webhook");
            Ok(ACCEPTED)
        }
        _ => {
            tracing::debug!("Ignoring webhook event: {}", event_type);
            Ok(ACCEPTED)
        }
    }
}

async fn handle_status(state: &RelayState, body: &[u8]) -> Result<&'static str, ApiError> {
    let event: StatusEvent = serde_json::from_slice(body)
        .map_err(|e| ApiError::Validation(format!("Invalid GitHub status payload: {e}")))?;

    let decision = decision::evaluate(state.history.as_ref(), &event).await?;
    crate::metrics::decision_made(decision.as_str());
    tracing::info!(
        repo = %event.name,
        context = event.context.as_deref().unwrap_or(""),
        state = event.state.as_str(),
        decision = decision.as_str(),
        "Evaluated status event"
    );

    if decision.should_notify() {
        dispatcher::fan_out(
            state.store.as_ref(),
            state.gateway.clone(),
            &event.name,
            &event.alert(),
        )
        .await?;
    }

    Ok(ACCEPTED)
}
