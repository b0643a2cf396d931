//! Prometheus metrics for relay observability.

use metrics::counter;

/// Initialize metrics exporter (Prometheus).
pub fn init_metrics() {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    if let Err(e) = builder.install() {
        tracing::warn!("Failed to install Prometheus exporter: {}", e);
    }
}

/// Record a webhook received event.
pub fn webhook_received(provider: &str) {
    counter!("relay_webhooks_received_total", "provider" => provider.to_string()).increment(1);
}

/// Record the outcome of a status evaluation.
pub fn decision_made(decision: &'static str) {
    counter!("relay_decisions_total", "decision" => decision).increment(1);
}

/// Record one push attempt.
pub fn push_attempted(outcome: &'static str) {
    counter!("relay_push_total", "outcome" => outcome).increment(1);
}

/// Record a device registration.
pub fn device_registered(created: bool) {
    let outcome = if created { "created" } else { "existing" };
    counter!("relay_devices_registered_total", "outcome" => outcome).increment(1);
}
