//! Typed dispatch from document fields to ledger operations.
//!
//! Arguments arrive as untyped literals; each operation binds them into a
//! typed request struct before touching the ledger, so a missing or
//! mistyped argument is a structured per-field error, not a panic deep in
//! a resolver.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use coin_ledger_store::LedgerError;

use crate::document::{resolve_value, FieldInvocation, OperationKind};
use crate::state::AppState;

/// Fallback per-operation timeout when the configured one is zero.
const FALLBACK_TIMEOUT_SECS: u64 = 10;

/// Resolve one top-level field: bind arguments, run the operation under
/// its class deadline, and shape the result.
pub(super) async fn resolve_field(
    state: &AppState,
    kind: OperationKind,
    field: &FieldInvocation,
    variables: &serde_json::Map<String, Value>,
) -> Result<Value, String> {
    let mut args = serde_json::Map::new();
    for (name, literal) in &field.args {
        args.insert(name.clone(), resolve_value(literal, variables)?);
    }

    let secs = match kind {
        OperationKind::Query => state.config.query_timeout_seconds,
        OperationKind::Mutation => state.config.mutation_timeout_seconds,
    };
    let secs = if secs == 0 { FALLBACK_TIMEOUT_SECS } else { secs };

    // The deadline covers the ledger call only. On expiry the in-flight
    // query future is dropped and any open transaction rolls back.
    tokio::time::timeout(
        Duration::from_secs(secs),
        dispatch(state, kind, &field.name, args),
    )
    .await
    .map_err(|_| format!("{}: operation timed out", field.name))?
}

// ----------------------------------------------------------------------
// Argument shapes
// ----------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NoArgs {}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct IdArgs {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ListArgs {
    #[serde(default)]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RangeArgs {
    min: Option<i64>,
    max: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SinceArgs {
    since: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BeforeArgs {
    before: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CreateArgs {
    id: String,
    coins: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct AmountArgs {
    id: String,
    amount: i64,
    user_id: String,
    data_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct BatchArgs {
    ids: Vec<String>,
    amount: i64,
    user_id: String,
    data_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct TransferArgs {
    from_id: String,
    to_id: String,
    amount: i64,
    user_id: String,
    data_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SetArgs {
    id: String,
    coins: i64,
    user_id: String,
    data_id: Option<String>,
}

// ----------------------------------------------------------------------
// Dispatch
// ----------------------------------------------------------------------

#[allow(clippy::too_many_lines)]
async fn dispatch(
    state: &AppState,
    kind: OperationKind,
    name: &str,
    args: serde_json::Map<String, Value>,
) -> Result<Value, String> {
    let store = &state.store;
    match kind {
        OperationKind::Query => match name {
            "getUser" => {
                let a: IdArgs = bind(name, args)?;
                let account = store.get_account(&a.id).await.map_err(message)?;
                to_json(&account)
            }
            "listUsers" => {
                let a: ListArgs = bind(name, args)?;
                let accounts = store.list_accounts(a.limit, a.offset).await.map_err(message)?;
                to_json(&accounts)
            }
            "getBalance" => {
                let a: IdArgs = bind(name, args)?;
                let account = store.get_account(&a.id).await.map_err(message)?;
                to_json(&account.map(|acc| acc.coins))
            }
            "getUsersByCoinsRange" => {
                let a: RangeArgs = bind(name, args)?;
                let accounts = store
                    .list_by_coins_range(a.min, a.max)
                    .await
                    .map_err(message)?;
                to_json(&accounts)
            }
            "getRecentRecharges" => {
                let a: SinceArgs = bind(name, args)?;
                let accounts = store.list_recent_recharges(a.since).await.map_err(message)?;
                to_json(&accounts)
            }
            "getInactiveSince" => {
                let a: BeforeArgs = bind(name, args)?;
                let accounts = store.list_inactive_since(a.before).await.map_err(message)?;
                to_json(&accounts)
            }
            "countUsers" => {
                let _: NoArgs = bind(name, args)?;
                let n = store.count_accounts().await.map_err(message)?;
                to_json(&n)
            }
            "totalCoins" => {
                let _: NoArgs = bind(name, args)?;
                let sum = store.sum_coins().await.map_err(message)?;
                to_json(&sum)
            }
            "existsUser" => {
                let a: IdArgs = bind(name, args)?;
                let exists = store.exists(&a.id).await.map_err(message)?;
                to_json(&exists)
            }
            _ => Err(format!("unknown query field: {name}")),
        },
        OperationKind::Mutation => match name {
            "createUser" => {
                let a: CreateArgs = bind(name, args)?;
                let account = store.create_account(&a.id, a.coins).await.map_err(message)?;
                to_json(&account)
            }
            "rechargeCoins" => {
                let a: AmountArgs = bind(name, args)?;
                let account = store
                    .recharge(&a.id, a.amount, &a.user_id, a.data_id.as_deref())
                    .await
                    .map_err(message)?;
                to_json(&account)
            }
            "batchRecharge" => {
                let a: BatchArgs = bind(name, args)?;
                let rows = store
                    .batch_recharge(&a.ids, a.amount, &a.user_id, a.data_id.as_deref())
                    .await
                    .map_err(message)?;
                to_json(&rows)
            }
            "useCoins" => {
                let a: AmountArgs = bind(name, args)?;
                let account = store
                    .deplete(&a.id, a.amount, &a.user_id, a.data_id.as_deref())
                    .await
                    .map_err(message)?;
                to_json(&account)
            }
            "transferCoins" => {
                let a: TransferArgs = bind(name, args)?;
                let (from, to) = store
                    .transfer(
                        &a.from_id,
                        &a.to_id,
                        a.amount,
                        &a.user_id,
                        a.data_id.as_deref(),
                    )
                    .await
                    .map_err(message)?;
                Ok(serde_json::json!({
                    "from": to_json(&from)?,
                    "to": to_json(&to)?,
                }))
            }
            "setCoins" => {
                let a: SetArgs = bind(name, args)?;
                let account = store
                    .set_coins_exact(&a.id, a.coins, &a.user_id, a.data_id.as_deref())
                    .await
                    .map_err(message)?;
                to_json(&account)
            }
            "touchUsage" => {
                let a: IdArgs = bind(name, args)?;
                let account = store.touch_usage(&a.id).await.map_err(message)?;
                to_json(&account)
            }
            "deleteUser" => {
                let a: IdArgs = bind(name, args)?;
                let deleted = store.delete_account(&a.id).await.map_err(message)?;
                to_json(&deleted)
            }
            _ => Err(format!("unknown mutation field: {name}")),
        },
    }
}

/// Bind an argument map into a typed request struct.
fn bind<T: DeserializeOwned>(name: &str, args: serde_json::Map<String, Value>) -> Result<T, String> {
    serde_json::from_value(Value::Object(args))
        .map_err(|e| format!("invalid arguments for {name}: {e}"))
}

/// User-facing message for a ledger error. Storage failures are redacted
/// to the caller and logged with detail here.
fn message(err: LedgerError) -> String {
    match &err {
        LedgerError::Database(e) => {
            tracing::error!(error = %e, "ledger operation failed");
            "internal error".to_string()
        }
        _ => err.to_string(),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|e| {
        tracing::error!(error = %e, "response serialization failed");
        "internal error".to_string()
    })
}
