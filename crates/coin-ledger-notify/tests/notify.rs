//! Wire-shape tests for the transaction-log client.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use coin_ledger_core::{ActorId, NotifyError, TransactionEvent, TxNotifier};
use coin_ledger_notify::TxLogClient;

fn fixed_now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn sample_event() -> TransactionEvent {
    TransactionEvent::new(
        ActorId::generate(),
        "recharge:u1:1714564800000000000",
        "u1",
        25.0,
        fixed_now(),
    )
}

#[tokio::test]
async fn posts_record_with_idempotency_key() {
    let server = MockServer::start().await;
    let event = sample_event();

    Mock::given(method("POST"))
        .and(path("/api/v1/transactions"))
        .and(header("x-idempotency-key", event.idempotency_key().as_str()))
        .and(header("x-user-id", "coin-service"))
        .and(body_partial_json(json!({
            "coinId": "u1",
            "userId": event.actor.to_string(),
            "dataId": "recharge:u1:1714564800000000000",
            "coinUsed": 25.0,
            "platformName": "coin-service",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = TxLogClient::new(server.uri(), None);
    client.create(&event).await.expect("post should succeed");
}

#[tokio::test]
async fn expiry_defaults_to_24h_after_occurrence() {
    let server = MockServer::start().await;
    let event = sample_event();
    let expected_expiry = (fixed_now() + Duration::hours(24)).to_rfc3339();

    Mock::given(method("POST"))
        .and(path("/api/v1/transactions"))
        .and(body_partial_json(json!({ "expiryDate": expected_expiry })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = TxLogClient::new(server.uri(), None);
    client.create(&event).await.expect("post should succeed");
}

#[tokio::test]
async fn bearer_token_is_sent_when_configured() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/transactions"))
        .and(header("authorization", "Bearer sekrit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = TxLogClient::new(server.uri(), Some("sekrit".into()));
    client.create(&sample_event()).await.expect("post should succeed");
}

#[tokio::test]
async fn service_error_body_is_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/transactions"))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(json!({ "error": "duplicate record" })),
        )
        .mount(&server)
        .await;

    let client = TxLogClient::new(server.uri(), None);
    let err = client.create(&sample_event()).await.unwrap_err();
    match err {
        NotifyError::Api { status, message } => {
            assert_eq!(status, 422);
            assert_eq!(message, "duplicate record");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn opaque_error_falls_back_to_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/transactions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client = TxLogClient::new(server.uri(), None);
    let err = client.create(&sample_event()).await.unwrap_err();
    match err {
        NotifyError::Api { status, .. } => assert_eq!(status, 500),
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_endpoint_is_a_transport_error() {
    // Nothing listens on this port.
    let client = TxLogClient::new("http://127.0.0.1:1", None);
    let err = client.create(&sample_event()).await.unwrap_err();
    assert!(matches!(err, NotifyError::Transport(_)));
}
