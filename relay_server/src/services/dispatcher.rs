//! Notification fan-out and single-device delivery.

use std::sync::Arc;

use tokio::task::JoinSet;

use crate::services::push_service::{PushError, PushGateway};
use crate::store::{RegistrationStore, StoreError};

/// Per-request delivery tally for a fan-out.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Send `alert` to every device bound to `repository`.
///
/// Deliveries are independent: a failing device is logged and counted, and
/// the remaining devices are still attempted. Only the store lookup can fail.
///
/// The sends run concurrently on a detached task. Dropping the returned
/// future (request timeout, client disconnect) stops the wait, not the
/// deliveries.
pub async fn fan_out(
    store: &dyn RegistrationStore,
    gateway: Arc<dyn PushGateway>,
    repository: &str,
    alert: &str,
) -> Result<DispatchReport, StoreError> {
    let repo = store.find_repository(repository).await?;
    let total = repo.device_list.len();

    let deliveries = tokio::spawn(deliver_all(
        gateway,
        repo.name,
        repo.device_list,
        Arc::from(alert),
    ));

    match deliveries.await {
        Ok(report) => Ok(report),
        Err(e) => {
            tracing::error!(repo = %repository, error = %e, "Fan-out task failed");
            Ok(DispatchReport {
                delivered: 0,
                failed: total,
            })
        }
    }
}

async fn deliver_all(
    gateway: Arc<dyn PushGateway>,
    repository: String,
    device_list: Vec<String>,
    alert: Arc<str>,
) -> DispatchReport {
    let mut tasks: JoinSet<(String, Result<(), PushError>)> = JoinSet::new();
    for device_id in device_list {
        let gateway = gateway.clone();
        let alert = alert.clone();
        tasks.spawn(async move {
            let result = gateway.send(&device_id, &alert).await;
            (device_id, result)
        });
    }

    let mut report = DispatchReport::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(()))) => {
                report.delivered += 1;
                crate::metrics::push_attempted("delivered");
            }
            Ok((device_id, Err(e))) => {
                report.failed += 1;
                crate::metrics::push_attempted("failed");
                tracing::warn!(
                    device_id = %device_id,
                    repo = %repository,
                    error = %e,
                    "Push delivery failed"
                );
            }
            Err(e) => {
                report.failed += 1;
                crate::metrics::push_attempted("failed");
                tracing::error!(repo = %repository, error = %e, "Push task panicked");
            }
        }
    }

    tracing::info!(
        repo = %repository,
        delivered = report.delivered,
        failed = report.failed,
        "Fan-out complete"
    );
    report
}

/// Send `alert` to one device. Delivery failures propagate.
pub async fn notify_device(
    gateway: &dyn PushGateway,
    device_id: &str,
    alert: &str,
) -> Result<(), PushError> {
    match gateway.send(device_id, alert).await {
        Ok(()) => {
            crate::metrics::push_attempted("delivered");
            tracing::info!(device_id = %device_id, "Notification delivered");
            Ok(())
        }
        Err(e) => {
            crate::metrics::push_attempted("failed");
            tracing::error!(device_id = %device_id, error = %e, "Notification delivery failed");
            Err(e)
        }
    }
}
