//! REST API for devices, their repositories, and direct notifications.

use axum::http::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::models::device::Device;
use crate::models::repository::RepositoryRef;
use crate::services::dispatcher;
use crate::services::push_service::PushGateway;
use crate::store::RegistrationStore;

pub const MISSING_DEVICE_ID: &str = "POST to /devices must be a JSON with a DeviceId property.";
pub const MISSING_REPOSITORY_NAME: &str =
    "POST to /devices/{id}/repositories must be a JSON with a Name property.";
pub const MISSING_ALERT: &str =
    "POST to /devices/{id}/notifications must be a JSON with an Alert property.";

/// Request body for `POST /devices`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DeviceRequest {
    #[serde(default)]
    device_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RepositoryRequest {
    #[serde(default)]
    name: Option<String>,
}

/// Body of `POST /devices/{id}/notifications`, echoed back on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NotificationJson {
    pub alert: String,
}

/// 201 when the record was created, 200 when it already existed.
fn insert_code(created: bool) -> StatusCode {
    if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    }
}

/// Decode a JSON body, mapping any decode failure to a validation error.
fn decode<T: DeserializeOwned>(body: &[u8], message: &str) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|_| ApiError::Validation(message.to_string()))
}

fn required(value: Option<String>, message: &str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Validation(message.to_string()))
}

/// Register a device from a `{"DeviceId": ...}` body.
pub async fn register_device(
    store: &dyn RegistrationStore,
    body: &[u8],
) -> Result<(StatusCode, Device), ApiError> {
    let request: DeviceRequest = decode(body, MISSING_DEVICE_ID)?;
    let device = Device::new(required(request.device_id, MISSING_DEVICE_ID)?);

    let created = store.register_device(&device.device_id).await?;
    crate::metrics::device_registered(created);
    tracing::info!(device_id = %device.device_id, created, "Device registered");

    Ok((insert_code(created), device))
}

/// Delete a device and return the removed record.
pub async fn delete_device(
    store: &dyn RegistrationStore,
    device_id: &str,
) -> Result<Device, ApiError> {
    let device = store.delete_device(device_id).await?;
    tracing::info!(device_id = %device_id, "Device deleted");
    Ok(device)
}

/// Bind a device to the repository named in a `{"Name": ...}` body.
pub async fn add_repository(
    store: &dyn RegistrationStore,
    device_id: &str,
    body: &[u8],
) -> Result<(StatusCode, RepositoryRef), ApiError> {
    let request: RepositoryRequest = decode(body, MISSING_REPOSITORY_NAME)?;
    let repository = RepositoryRef::new(required(request.name, MISSING_REPOSITORY_NAME)?);

    let created = store
        .add_device_to_repository(device_id, &repository.name)
        .await?;
    tracing::info!(
        device_id = %device_id,
        repo = %repository.name,
        created,
        "Repository bound to device"
    );

    Ok((insert_code(created), repository))
}

pub async fn list_repositories(
    store: &dyn RegistrationStore,
    device_id: &str,
) -> Result<Vec<RepositoryRef>, ApiError> {
    Ok(store.repositories_for_device(device_id).await?)
}

/// Push an alert straight to one device. Delivery failure is an error.
pub async fn post_notification(
    gateway: &dyn PushGateway,
    device_id: &str,
    body: &[u8],
) -> Result<NotificationJson, ApiError> {
    let notification: NotificationJson = decode(body, MISSING_ALERT)?;
    dispatcher::notify_device(gateway, device_id, &notification.alert).await?;
    Ok(notification)
}
