//! End-to-end API tests over a real database.
//!
//! Skipped when `DATABASE_URL` is not set. Account ids are randomized per
//! test run so the suite tolerates a shared database.

mod common;

use axum::http::StatusCode;
use common::{generous_config, TestHarness};
use serde_json::{json, Value};

use coin_ledger_core::ActorId;

fn uid(prefix: &str) -> String {
    format!("{prefix}-{}", ActorId::generate())
}

#[tokio::test]
async fn end_to_end_scenario() {
    let Some(harness) = TestHarness::gated(generous_config()).await else {
        return;
    };
    let actor = ActorId::generate().to_string();
    let u1 = uid("api-u1");
    let u2 = uid("api-u2");

    // Create both accounts.
    let create = "mutation($id:ID!,$coins:Int){ createUser(id:$id, coins:$coins){ id coins } }";
    let body = harness
        .graphql(create, json!({ "id": u1, "coins": 100 }))
        .await;
    assert_eq!(body["data"]["createUser"]["coins"], 100);
    harness
        .graphql(create, json!({ "id": u2, "coins": 50 }))
        .await;

    // Recharge u2 by 25.
    let body = harness
        .graphql(
            "mutation($id:ID!,$amt:Int!,$who:ID!){ rechargeCoins(id:$id, amount:$amt, userId:$who){ id coins lastRechargeDate } }",
            json!({ "id": u2, "amt": 25, "who": actor }),
        )
        .await;
    assert_eq!(body["data"]["rechargeCoins"]["coins"], 75);
    assert!(body["data"]["rechargeCoins"]["lastRechargeDate"].is_string());

    // Use 10 from u1.
    let body = harness
        .graphql(
            "mutation($id:ID!,$amt:Int!,$who:ID!){ useCoins(id:$id, amount:$amt, userId:$who){ id coins lastUsageDate } }",
            json!({ "id": u1, "amt": 10, "who": actor }),
        )
        .await;
    assert_eq!(body["data"]["useCoins"]["coins"], 90);

    // Transfer 40 from u1 to u2.
    let body = harness
        .graphql(
            "mutation($f:ID!,$t:ID!,$a:Int!,$who:ID!){ transferCoins(fromId:$f, toId:$t, amount:$a, userId:$who){ from{ id coins } to{ id coins } } }",
            json!({ "f": u1, "t": u2, "a": 40, "who": actor }),
        )
        .await;
    assert_eq!(body["data"]["transferCoins"]["from"]["coins"], 50);
    assert_eq!(body["data"]["transferCoins"]["to"]["coins"], 115);

    // Batch recharge both by 5.
    let body = harness
        .graphql(
            "mutation($ids:[ID!]!,$amt:Int!,$who:ID!){ batchRecharge(ids:$ids, amount:$amt, userId:$who) }",
            json!({ "ids": [u1, u2], "amt": 5, "who": actor }),
        )
        .await;
    assert_eq!(body["data"]["batchRecharge"], 2);

    // Set u2 to exactly 7, whatever it was.
    let body = harness
        .graphql(
            "mutation($id:ID!,$c:Int!,$who:ID!){ setCoins(id:$id, coins:$c, userId:$who){ id coins } }",
            json!({ "id": u2, "c": 7, "who": actor }),
        )
        .await;
    assert_eq!(body["data"]["setCoins"]["coins"], 7);

    // Reads: balances, existence, aggregate stats.
    let body = harness
        .graphql(
            "query($id:ID!){ getBalance(id:$id) existsUser(id:$id) countUsers totalCoins }",
            json!({ "id": u1 }),
        )
        .await;
    assert_eq!(body["data"]["getBalance"], 55);
    assert_eq!(body["data"]["existsUser"], true);
    assert!(body["data"]["countUsers"].as_i64().unwrap() >= 2);
    assert!(body.get("errors").is_none());

    // Aliased double lookup in one document.
    let body = harness
        .graphql(
            "query($a:ID!,$b:ID!){ one: getUser(id:$a){ id coins } two: getUser(id:$b){ id coins } }",
            json!({ "a": u1, "b": u2 }),
        )
        .await;
    assert_eq!(body["data"]["one"]["coins"], 55);
    assert_eq!(body["data"]["two"]["coins"], 7);

    // Touch usage and delete.
    let body = harness
        .graphql(
            "mutation($id:ID!){ touchUsage(id:$id){ id lastUsageDate } }",
            json!({ "id": u2 }),
        )
        .await;
    assert!(body["data"]["touchUsage"]["lastUsageDate"].is_string());

    let body = harness
        .graphql("mutation($id:ID!){ deleteUser(id:$id) }", json!({ "id": u2 }))
        .await;
    assert_eq!(body["data"]["deleteUser"], true);

    let body = harness
        .graphql("query($id:ID!){ getUser(id:$id){ id } }", json!({ "id": u2 }))
        .await;
    assert_eq!(body["data"]["getUser"], Value::Null);
}

#[tokio::test]
async fn time_window_queries_bind_rfc3339_arguments() {
    let Some(harness) = TestHarness::gated(generous_config()).await else {
        return;
    };
    let actor = ActorId::generate().to_string();
    let id = uid("api-window");

    harness
        .graphql(
            "mutation($id:ID!){ createUser(id:$id, coins: 10){ id } }",
            json!({ "id": id }),
        )
        .await;
    harness
        .graphql(
            "mutation($id:ID!,$who:ID!){ rechargeCoins(id:$id, amount: 1, userId:$who){ id } }",
            json!({ "id": id, "who": actor }),
        )
        .await;

    let since = (chrono::Utc::now() - chrono::Duration::hours(2)).to_rfc3339();
    let body = harness
        .graphql(
            "query($s:DateTime!){ getRecentRecharges(since:$s){ id lastRechargeDate } }",
            json!({ "s": since }),
        )
        .await;
    let recharged = body["data"]["getRecentRecharges"].as_array().unwrap();
    assert!(recharged.iter().any(|a| a["id"] == json!(id)));

    let before = (chrono::Utc::now() + chrono::Duration::seconds(1)).to_rfc3339();
    let body = harness
        .graphql(
            "query($b:DateTime!){ getInactiveSince(before:$b){ id } }",
            json!({ "b": before }),
        )
        .await;
    assert!(body["data"]["getInactiveSince"].is_array());
}

#[tokio::test]
async fn insufficient_balance_is_a_field_error_not_a_transport_error() {
    let Some(harness) = TestHarness::gated(generous_config()).await else {
        return;
    };
    let actor = ActorId::generate().to_string();
    let id = uid("api-poor");

    harness
        .graphql(
            "mutation($id:ID!){ createUser(id:$id, coins: 3){ id } }",
            json!({ "id": id }),
        )
        .await;

    let body = harness
        .graphql(
            "mutation($id:ID!,$who:ID!){ useCoins(id:$id, amount: 10, userId:$who){ id coins } }",
            json!({ "id": id, "who": actor }),
        )
        .await;
    assert_eq!(body["data"]["useCoins"], Value::Null);
    let message = body["errors"][0]["message"].as_str().unwrap();
    assert!(message.contains("insufficient balance"));

    // And the balance is untouched.
    let body = harness
        .graphql("query($id:ID!){ getBalance(id:$id) }", json!({ "id": id }))
        .await;
    assert_eq!(body["data"]["getBalance"], 3);
}

#[tokio::test]
async fn malformed_actor_uuid_is_rejected() {
    let Some(harness) = TestHarness::gated(generous_config()).await else {
        return;
    };
    let id = uid("api-actor");

    harness
        .graphql(
            "mutation($id:ID!){ createUser(id:$id, coins: 10){ id } }",
            json!({ "id": id }),
        )
        .await;

    let body = harness
        .graphql(
            "mutation($id:ID!){ rechargeCoins(id:$id, amount: 5, userId: \"not-a-uuid\"){ id } }",
            json!({ "id": id }),
        )
        .await;
    let message = body["errors"][0]["message"].as_str().unwrap();
    assert!(message.contains("invalid actor id"));
}

// ----------------------------------------------------------------------
// RPC surface
// ----------------------------------------------------------------------

#[tokio::test]
async fn rpc_create_and_deplete_roundtrip() {
    let Some(harness) = TestHarness::gated(generous_config()).await else {
        return;
    };
    let id = uid("rpc");
    let actor = ActorId::generate().to_string();

    let response = harness
        .server
        .post("/rpc/v1/accounts")
        .add_header("x-api-key", harness.service_api_key.as_str())
        .add_header("x-service-name", "agent-runtime")
        .json(&json!({ "id": id, "initial": 20 }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["coins"], 20);
    assert_eq!(body["last_usage_date"], "");

    let response = harness
        .server
        .post("/rpc/v1/deplete")
        .add_header("x-api-key", harness.service_api_key.as_str())
        .json(&json!({ "id": id, "amount": 8, "user_id": actor }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["coins"], 12);
    assert_ne!(body["last_usage_date"], "");
}

#[tokio::test]
async fn rpc_requires_the_service_api_key() {
    let Some(harness) = TestHarness::gated(generous_config()).await else {
        return;
    };

    let response = harness
        .server
        .post("/rpc/v1/accounts")
        .json(&json!({ "id": uid("rpc-noauth") }))
        .await;
    response.assert_status_unauthorized();

    let response = harness
        .server
        .post("/rpc/v1/accounts")
        .add_header("x-api-key", "wrong-key")
        .json(&json!({ "id": uid("rpc-badauth") }))
        .await;
    response.assert_status_unauthorized();
}

#[tokio::test]
async fn rpc_deplete_maps_insufficiency_to_payment_required() {
    let Some(harness) = TestHarness::gated(generous_config()).await else {
        return;
    };
    let id = uid("rpc-poor");
    let actor = ActorId::generate().to_string();

    harness
        .server
        .post("/rpc/v1/accounts")
        .add_header("x-api-key", harness.service_api_key.as_str())
        .json(&json!({ "id": id, "initial": 2 }))
        .await
        .assert_status_ok();

    let response = harness
        .server
        .post("/rpc/v1/deplete")
        .add_header("x-api-key", harness.service_api_key.as_str())
        .json(&json!({ "id": id, "amount": 10, "user_id": actor }))
        .await;
    assert_eq!(response.status_code(), StatusCode::PAYMENT_REQUIRED);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "insufficient_balance");
    assert_eq!(body["error"]["details"]["balance"], 2);
}

#[tokio::test]
async fn rpc_validates_before_touching_the_ledger() {
    let Some(harness) = TestHarness::gated(generous_config()).await else {
        return;
    };

    let response = harness
        .server
        .post("/rpc/v1/deplete")
        .add_header("x-api-key", harness.service_api_key.as_str())
        .json(&json!({ "id": "", "amount": 1, "user_id": "x" }))
        .await;
    response.assert_status_bad_request();

    let response = harness
        .server
        .post("/rpc/v1/deplete")
        .add_header("x-api-key", harness.service_api_key.as_str())
        .json(&json!({ "id": "someone", "amount": 0, "user_id": "x" }))
        .await;
    response.assert_status_bad_request();
}

#[tokio::test]
async fn health_endpoint_reports_service_identity() {
    let harness = TestHarness::lazy(generous_config());
    let response = harness.server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "coin-ledger");
}
