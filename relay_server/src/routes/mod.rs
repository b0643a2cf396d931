//! Relay HTTP routes: status webhook and device REST API.

pub mod api;
pub mod webhook;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use axum::routing::{delete, get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::RelayConfig;
use crate::error::ApiError;
use crate::models::device::Device;
use crate::models::repository::RepositoryRef;
use crate::services::github_service::StatusHistory;
use crate::services::push_service::PushGateway;
use crate::store::{RegistrationStore, StoreInfo};

/// Shared state for relay route handlers.
#[derive(Clone)]
pub struct RelayState {
    pub store: Arc<dyn RegistrationStore>,
    pub history: Arc<dyn StatusHistory>,
    pub gateway: Arc<dyn PushGateway>,
    pub config: RelayConfig,
}

/// Build the relay's Axum router.
///
/// Handlers run under the request timeout; when it fires the handler future
/// is dropped, which also cancels any outbound lookup it was awaiting.
pub fn relay_router(state: RelayState) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    Router::new()
        // Webhook
        .route("/hooks/github", post(github_hook))
        // Device API
        .route("/devices", post(post_device))
        .route("/devices/{id}", delete(delete_device))
        .route(
            "/devices/{id}/repositories",
            get(get_repositories).post(post_repository),
        )
        .route("/devices/{id}/notifications", post(post_notification))
        // Store API
        .route("/store/info", get(store_info))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(timeout)),
        )
        .with_state(state)
}

// ── Webhook ──

async fn github_hook(
    State(state): State<RelayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, ApiError> {
    crate::metrics::webhook_received("github");
    webhook::handle_status_webhook(&state, &headers, body).await
}

// ── Device API ──

async fn post_device(
    State(state): State<RelayState>,
    body: Bytes,
) -> Result<(StatusCode, Json<Device>), ApiError> {
    let (status, device) = api::register_device(state.store.as_ref(), &body).await?;
    Ok((status, Json(device)))
}

async fn delete_device(
    State(state): State<RelayState>,
    Path(device_id): Path<String>,
) -> Result<Json<Device>, ApiError> {
    api::delete_device(state.store.as_ref(), &device_id)
        .await
        .map(Json)
}

async fn get_repositories(
    State(state): State<RelayState>,
    Path(device_id): Path<String>,
) -> Result<Json<Vec<RepositoryRef>>, ApiError> {
    api::list_repositories(state.store.as_ref(), &device_id)
        .await
        .map(Json)
}

async fn post_repository(
    State(state): State<RelayState>,
    Path(device_id): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<RepositoryRef>), ApiError> {
    let (status, repository) =
        api::add_repository(state.store.as_ref(), &device_id, &body).await?;
    Ok((status, Json(repository)))
}

async fn post_notification(
    State(state): State<RelayState>,
    Path(device_id): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<api::NotificationJson>), ApiError> {
    let notification =
        api::post_notification(state.gateway.as_ref(), &device_id, &body).await?;
    Ok((StatusCode::CREATED, Json(notification)))
}

// ── Store API ──

async fn store_info(State(state): State<RelayState>) -> Result<Json<StoreInfo>, ApiError> {
    Ok(Json(state.store.info().await?))
}
