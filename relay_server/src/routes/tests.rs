use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;

use super::{relay_router, RelayState};
use crate::config::RelayConfig;
use crate::store::{MemoryRegistrationStore, RegistrationStore};
use crate::testing::{RecordingGateway, ScriptedHistory};

const DEVICE: &str = "MotherBox";
const REPO: &str = "apokalypse/anti-life";

struct Harness {
    server: TestServer,
    store: Arc<MemoryRegistrationStore>,
    history: Arc<ScriptedHistory>,
    gateway: Arc<RecordingGateway>,
}

fn harness_with(
    config: RelayConfig,
    history: ScriptedHistory,
    gateway: RecordingGateway,
) -> Harness {
    let store = Arc::new(MemoryRegistrationStore::new());
    let history = Arc::new(history);
    let gateway = Arc::new(gateway);

    let state = RelayState {
        store: store.clone(),
        history: history.clone(),
        gateway: gateway.clone(),
        config,
    };
    let server = TestServer::new(relay_router(state)).unwrap();

    Harness {
        server,
        store,
        history,
        gateway,
    }
}

fn harness(history: ScriptedHistory, gateway: RecordingGateway) -> Harness {
    harness_with(RelayConfig::default(), history, gateway)
}

fn status_payload(state: &str, branches: &str) -> String {
    format!(
        r#"{{"name":"{REPO}","context":"","state":"{state}","description":"Fun!","branches":{branches}}}"#
    )
}

const MASTER: &str = r#"[{"Name":"master"}]"#;

// ── /devices ──

#[tokio::test]
async fn post_device_creates_then_reports_existing() {
    let h = harness(ScriptedHistory::new(), RecordingGateway::new());

    let response = h
        .server
        .post("/devices")
        .json(&json!({"DeviceId": "abracadabra"}))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.assert_json(&json!({"DeviceId": "abracadabra"}));
    assert_eq!(response.header("content-type"), "application/json");

    let response = h
        .server
        .post("/devices")
        .json(&json!({"DeviceId": "abracadabra"}))
        .await;
    response.assert_status(StatusCode::OK);
    response.assert_json(&json!({"DeviceId": "abracadabra"}));

    assert_eq!(h.store.info().await.unwrap().device_count, 1);
}

#[tokio::test]
async fn post_device_rejects_bad_bodies() {
    let h = harness(ScriptedHistory::new(), RecordingGateway::new());
    let expected = json!({"Error": "POST to /devices must be a JSON with a DeviceId property."});

    for body in [
        r#"{"Nothing":"nothing"}"#,
        r#"{"DeviceId":["nothing"]}"#,
        r#"{"DeviceId":null}"#,
        r#"{"DeviceId":""}"#,
        "null",
        "roguishly devilish raw text",
        "",
    ] {
        let response = h.server.post("/devices").text(body).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&expected);
    }

    assert_eq!(h.store.info().await.unwrap().device_count, 0);
}

#[tokio::test]
async fn delete_device_returns_removed_record() {
    let h = harness(ScriptedHistory::new(), RecordingGateway::new());
    h.server
        .post("/devices")
        .json(&json!({"DeviceId": "alakazham"}))
        .await;

    let response = h.server.delete("/devices/alakazham").await;
    response.assert_status(StatusCode::OK);
    response.assert_json(&json!({"DeviceId": "alakazham"}));
    assert_eq!(h.store.info().await.unwrap().device_count, 0);

    let response = h.server.delete("/devices/alakazham").await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    response.assert_json(&json!({"Error": "device not found: alakazham"}));
}

// ── /devices/{id}/repositories ──

#[tokio::test]
async fn repositories_start_empty_and_list_in_order() {
    let h = harness(ScriptedHistory::new(), RecordingGateway::new());
    let path = format!("/devices/{DEVICE}/repositories");

    h.server.get(&path).await.assert_json(&json!([]));

    h.server
        .post(&path)
        .json(&json!({"Name": "billandted/excellentadventure"}))
        .await;
    h.server
        .post(&path)
        .json(&json!({"Name": "billandted/bogusjourney"}))
        .await;
    h.server
        .post("/devices/differentDevice/repositories")
        .json(&json!({"Name": "red herring"}))
        .await;

    let response = h.server.get(&path).await;
    response.assert_status(StatusCode::OK);
    response.assert_json(&json!([
        {"Name": "billandted/excellentadventure"},
        {"Name": "billandted/bogusjourney"},
    ]));
}

#[tokio::test]
async fn post_repository_is_idempotent() {
    let h = harness(ScriptedHistory::new(), RecordingGateway::new());
    let path = format!("/devices/{DEVICE}/repositories");

    let response = h.server.post(&path).json(&json!({"Name": REPO})).await;
    response.assert_status(StatusCode::CREATED);
    response.assert_json(&json!({"Name": REPO}));

    let response = h.server.post(&path).json(&json!({"Name": REPO})).await;
    response.assert_status(StatusCode::OK);
    response.assert_json(&json!({"Name": REPO}));

    let repo = h.store.find_repository(REPO).await.unwrap();
    assert_eq!(repo.device_list, vec![DEVICE.to_string()]);
}

#[tokio::test]
async fn post_repository_requires_name() {
    let h = harness(ScriptedHistory::new(), RecordingGateway::new());

    let response = h
        .server
        .post("/devices/someone/repositories")
        .json(&json!({"Name": ""}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(h.store.repositories_for_device("someone").await.unwrap().is_empty());
}

// ── /devices/{id}/notifications ──

#[tokio::test]
async fn direct_notification_is_delivered() {
    let h = harness(ScriptedHistory::new(), RecordingGateway::new());

    let response = h
        .server
        .post("/devices/token/notifications")
        .json(&json!({"Alert": "Something important!"}))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.assert_json(&json!({"Alert": "Something important!"}));
    assert_eq!(
        h.gateway.sent(),
        vec![("token".to_string(), "Something important!".to_string())]
    );
}

#[tokio::test]
async fn direct_notification_failure_is_surfaced() {
    let h = harness(
        ScriptedHistory::new(),
        RecordingGateway::new().failing_for("token"),
    );

    let response = h
        .server
        .post("/devices/token/notifications")
        .json(&json!({"Alert": "Something important!"}))
        .await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    response.assert_json(&json!({"Error": "APNs rejected notification (400): Oh no!"}));
}

#[tokio::test]
async fn direct_notification_requires_alert() {
    let h = harness(ScriptedHistory::new(), RecordingGateway::new());

    let response = h
        .server
        .post("/devices/token/notifications")
        .json(&json!({"Message": "wrong field"}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(h.gateway.attempted().is_empty());
}

// ── /hooks/github ──

async fn register(h: &Harness, devices: &[&str]) {
    for device in devices {
        h.server
            .post(&format!("/devices/{device}/repositories"))
            .json(&json!({"Name": REPO}))
            .await
            .assert_status(StatusCode::CREATED);
    }
}

#[tokio::test]
async fn failure_and_error_always_notify_every_device() {
    for state in ["failure", "error"] {
        let h = harness(
            ScriptedHistory::new().with("master^", &["success"]),
            RecordingGateway::new(),
        );
        register(&h, &["A", "B"]).await;

        let response = h
            .server
            .post("/hooks/github")
            .text(status_payload(state, MASTER))
            .await;
        response.assert_status(StatusCode::OK);
        response.assert_text("Accepted.");

        let alert = format!("{REPO}: Fun!");
        assert_eq!(
            h.gateway.sent(),
            vec![("A".to_string(), alert.clone()), ("B".to_string(), alert)]
        );
        assert!(h.history.requested().is_empty());
    }
}

#[tokio::test]
async fn success_after_failing_parent_notifies() {
    let h = harness(
        ScriptedHistory::new()
            .with("master", &["success"])
            .with("master^", &["failure"]),
        RecordingGateway::new(),
    );
    register(&h, &[DEVICE]).await;

    let response = h
        .server
        .post("/hooks/github")
        .text(status_payload("success", MASTER))
        .await;
    response.assert_status(StatusCode::OK);
    response.assert_text("Accepted.");

    assert_eq!(
        h.gateway.sent(),
        vec![(DEVICE.to_string(), format!("{REPO}: Fun!"))]
    );
    assert_eq!(h.history.requested(), vec!["master", "master^"]);
}

#[tokio::test]
async fn success_on_specific_branch_checks_that_branch() {
    let h = harness(
        ScriptedHistory::new().with("experiment^", &["error"]),
        RecordingGateway::new(),
    );
    register(&h, &[DEVICE]).await;

    h.server
        .post("/hooks/github")
        .text(status_payload("success", r#"[{"Name":"experiment"}]"#))
        .await
        .assert_status(StatusCode::OK);

    assert_eq!(h.gateway.sent().len(), 1);
    assert_eq!(h.history.requested(), vec!["experiment", "experiment^"]);
}

#[tokio::test]
async fn success_after_passing_parent_is_quiet() {
    for parent in [&["success"][..], &["success", "failure"][..]] {
        let h = harness(
            ScriptedHistory::new().with("master^", parent),
            RecordingGateway::new(),
        );
        register(&h, &[DEVICE]).await;

        let response = h
            .server
            .post("/hooks/github")
            .text(status_payload("success", MASTER))
            .await;
        response.assert_status(StatusCode::OK);
        response.assert_text("Accepted.");
        assert!(h.gateway.attempted().is_empty());
    }
}

#[tokio::test]
async fn other_states_never_notify() {
    let h = harness(
        ScriptedHistory::new().with("master^", &["failure"]),
        RecordingGateway::new(),
    );
    register(&h, &[DEVICE]).await;

    let response = h
        .server
        .post("/hooks/github")
        .text(status_payload("intermediate", MASTER))
        .await;
    response.assert_status(StatusCode::OK);
    response.assert_text("Accepted.");
    assert!(h.gateway.attempted().is_empty());
    assert!(h.history.requested().is_empty());
}

#[tokio::test]
async fn missing_branch_is_rejected() {
    let h = harness(
        ScriptedHistory::new().with("master^", &["failure"]),
        RecordingGateway::new(),
    );
    register(&h, &[DEVICE]).await;

    let response = h
        .server
        .post("/hooks/github")
        .text(status_payload("failure", "[]"))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_json(&json!({"Error": "Did not receive a valid branch in GitHub status."}));
    assert!(h.history.requested().is_empty());
    assert!(h.gateway.attempted().is_empty());
}

#[tokio::test]
async fn history_outage_fails_the_request() {
    let h = harness(ScriptedHistory::failing("OH NO"), RecordingGateway::new());
    register(&h, &[DEVICE]).await;

    let response = h
        .server
        .post("/hooks/github")
        .text(status_payload("success", MASTER))
        .await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json();
    assert!(body["Error"].as_str().unwrap().contains("OH NO"));

    assert!(h.gateway.attempted().is_empty());
    assert_eq!(h.history.requested(), vec!["master"]);
}

#[tokio::test]
async fn one_failing_device_does_not_fail_the_webhook() {
    let h = harness(ScriptedHistory::new(), RecordingGateway::new().failing_for("A"));
    register(&h, &["A", "B"]).await;

    let response = h
        .server
        .post("/hooks/github")
        .text(status_payload("failure", MASTER))
        .await;
    response.assert_status(StatusCode::OK);
    response.assert_text("Accepted.");
    assert_eq!(h.gateway.attempted(), vec!["A", "B"]);
    assert_eq!(h.gateway.sent().len(), 1);
}

fn short_timeout() -> RelayConfig {
    RelayConfig {
        request_timeout_secs: 1,
        ..RelayConfig::default()
    }
}

#[tokio::test]
async fn slow_devices_do_not_exhaust_the_request_timeout() {
    let h = harness_with(
        short_timeout(),
        ScriptedHistory::new(),
        RecordingGateway::new().with_delay(Duration::from_millis(700)),
    );
    register(&h, &["A", "B", "C"]).await;

    let response = h
        .server
        .post("/hooks/github")
        .text(status_payload("failure", MASTER))
        .await;
    response.assert_status(StatusCode::OK);
    response.assert_text("Accepted.");
    assert_eq!(h.gateway.attempted(), vec!["A", "B", "C"]);
    assert_eq!(h.gateway.sent().len(), 3);
}

#[tokio::test]
async fn timed_out_webhook_keeps_delivering() {
    let h = harness_with(
        short_timeout(),
        ScriptedHistory::new(),
        RecordingGateway::new().with_delay(Duration::from_millis(1500)),
    );
    register(&h, &["A", "B", "C"]).await;

    h.server
        .post("/hooks/github")
        .text(status_payload("failure", MASTER))
        .await
        .assert_status(StatusCode::REQUEST_TIMEOUT);

    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(h.gateway.sent().len(), 3);
}

#[tokio::test]
async fn malformed_webhook_body_is_rejected() {
    let h = harness(ScriptedHistory::new(), RecordingGateway::new());

    h.server
        .post("/hooks/github")
        .text("not json")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn ping_event_is_accepted() {
    let h = harness(ScriptedHistory::new(), RecordingGateway::new());

    h.server
        .post("/hooks/github")
        .add_header(
            HeaderName::from_static("x-github-event"),
            HeaderValue::from_static("ping"),
        )
        .text(r#"{"zen":"Keep it logically awesome."}"#)
        .await
        .assert_text("Accepted.");
}

#[tokio::test]
async fn webhook_signature_is_enforced_when_configured() {
    let config = RelayConfig {
        webhook_secret: "s3cret".to_string(),
        ..RelayConfig::default()
    };
    let h = harness_with(config, ScriptedHistory::new(), RecordingGateway::new());
    register(&h, &[DEVICE]).await;
    let body = status_payload("failure", MASTER);

    h.server
        .post("/hooks/github")
        .text(body.clone())
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    assert!(h.gateway.attempted().is_empty());

    let mut mac = Hmac::<Sha256>::new_from_slice(b"s3cret").unwrap();
    mac.update(body.as_bytes());
    let signature = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));

    h.server
        .post("/hooks/github")
        .add_header(
            HeaderName::from_static("x-hub-signature-256"),
            HeaderValue::from_str(&signature).unwrap(),
        )
        .text(body)
        .await
        .assert_status(StatusCode::OK);
    assert_eq!(h.gateway.sent().len(), 1);
}

// ── /store/info ──

#[tokio::test]
async fn store_info_reports_counts() {
    let h = harness(ScriptedHistory::new(), RecordingGateway::new());
    h.server
        .post("/devices")
        .json(&json!({"DeviceId": DEVICE}))
        .await;
    register(&h, &[DEVICE]).await;

    h.server.get("/store/info").await.assert_json(&json!({
        "Backend": "memory",
        "DeviceCount": 1,
        "RepositoryCount": 1,
    }));
}
