//! Service-to-service RPC surface.
//!
//! Pass-through shims over the ledger engine for internal callers:
//! account creation and depletion. Authenticated with the shared service
//! API key, never exposed through the public gateway.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use coin_ledger_core::Account;

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Account reply shape shared by both shims.
///
/// Timestamps are RFC 3339, empty when the stamp is unset.
#[derive(Debug, Serialize)]
pub struct AccountReply {
    /// Account id.
    pub id: String,
    /// Current balance.
    pub coins: i64,
    /// Last balance increase, RFC 3339 or empty.
    pub last_recharge_date: String,
    /// Last balance decrease, RFC 3339 or empty.
    pub last_usage_date: String,
}

impl From<&Account> for AccountReply {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.clone(),
            coins: account.coins,
            last_recharge_date: account
                .last_recharge_date
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
            last_usage_date: account
                .last_usage_date
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
        }
    }
}

/// Create-account request.
#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    /// Account id.
    pub id: String,
    /// Optional initial balance (default 0).
    pub initial: Option<i64>,
}

/// Create an account (idempotent).
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<CreateAccountRequest>,
) -> Result<Json<AccountReply>, ApiError> {
    if body.id.trim().is_empty() {
        return Err(ApiError::BadRequest("id is required".into()));
    }

    let account = state.store.create_account(&body.id, body.initial).await?;

    tracing::info!(
        service = %auth.service_name,
        id = %account.id,
        coins = %account.coins,
        "account created via RPC"
    );

    Ok(Json(AccountReply::from(&account)))
}

/// Deplete request.
#[derive(Debug, Deserialize)]
pub struct DepleteRequest {
    /// Account id.
    pub id: String,
    /// Amount to debit (must be > 0).
    pub amount: i64,
    /// Acting user (UUID).
    pub user_id: String,
    /// Optional event id for the notification.
    pub data_id: Option<String>,
}

/// Debit an account.
pub async fn deplete(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<DepleteRequest>,
) -> Result<Json<AccountReply>, ApiError> {
    // Fail fast on the obvious; the ledger validates the UUID itself.
    if body.id.trim().is_empty() {
        return Err(ApiError::BadRequest("id is required".into()));
    }
    if body.amount <= 0 {
        return Err(ApiError::BadRequest("amount must be > 0".into()));
    }
    if body.user_id.trim().is_empty() {
        return Err(ApiError::BadRequest("user_id (UUID) is required".into()));
    }

    let account = state
        .store
        .deplete(&body.id, body.amount, &body.user_id, body.data_id.as_deref())
        .await?;

    tracing::info!(
        service = %auth.service_name,
        id = %account.id,
        amount = %body.amount,
        coins = %account.coins,
        "account depleted via RPC"
    );

    Ok(Json(AccountReply::from(&account)))
}
