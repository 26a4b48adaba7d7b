//! Account types for coin-ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A coin account.
///
/// One row per account: an opaque string id, the current balance, and the
/// activity stamps updated by the ledger operations. The balance is kept
/// non-negative by the mutation paths, not by a database constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// The account id (opaque, caller-chosen).
    pub id: String,

    /// Current coin balance.
    pub coins: i64,

    /// When the balance last increased, if ever.
    #[serde(rename = "lastRechargeDate")]
    pub last_recharge_date: Option<DateTime<Utc>>,

    /// When the balance last decreased (or was explicitly touched), if ever.
    #[serde(rename = "lastUsageDate")]
    pub last_usage_date: Option<DateTime<Utc>>,
}

impl Account {
    /// Create a new account value with the given balance and no activity.
    #[must_use]
    pub fn new(id: impl Into<String>, coins: i64) -> Self {
        Self {
            id: id.into(),
            coins,
            last_recharge_date: None,
            last_usage_date: None,
        }
    }

    /// Check whether the balance covers a debit of `amount`.
    #[must_use]
    pub fn has_sufficient_coins(&self, amount: i64) -> bool {
        self.coins >= amount
    }
}
