//! Transaction notification events.
//!
//! Every balance-changing ledger operation emits one `TransactionEvent` per
//! affected account (two for a transfer). The event is ephemeral: it is
//! never persisted locally, only handed to a [`TxNotifier`] after the
//! mutation has committed.
//!
//! [`TxNotifier`]: crate::notify::TxNotifier

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ids::ActorId;

/// Platform name stamped on every event.
pub const DEFAULT_PLATFORM: &str = "coin-service";

/// Default event expiry, relative to `occurred_at`.
pub const DEFAULT_EXPIRY_HOURS: i64 = 24;

/// A balance-change record posted to the external transaction log.
///
/// `amount` is always the positive magnitude of the change; the debit and
/// credit legs of a transfer are distinguished by their event ids, not by
/// sign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionEvent {
    /// The actor whose action changed the balance.
    pub actor: ActorId,

    /// Event identifier, unique(ish) per balance change.
    pub event_id: String,

    /// The account whose balance changed.
    pub coin_id: String,

    /// The source system.
    pub platform: String,

    /// Positive magnitude of the balance change.
    pub amount: f64,

    /// When the change happened.
    pub occurred_at: DateTime<Utc>,

    /// When the record stops being relevant to the log.
    pub expires_at: DateTime<Utc>,
}

impl TransactionEvent {
    /// Build an event with the default platform and expiry.
    #[must_use]
    pub fn new(
        actor: ActorId,
        event_id: impl Into<String>,
        coin_id: impl Into<String>,
        amount: f64,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            actor,
            event_id: event_id.into(),
            coin_id: coin_id.into(),
            platform: DEFAULT_PLATFORM.to_string(),
            amount,
            occurred_at,
            expires_at: occurred_at + Duration::hours(DEFAULT_EXPIRY_HOURS),
        }
    }

    /// Derive the idempotency key for this event.
    ///
    /// Hex-encoded SHA-256 over `(actor, event id, coin id, amount,
    /// timestamp nanoseconds)`. A retried delivery of the same event hashes
    /// to the same key, so the receiving side can detect the duplicate.
    #[must_use]
    pub fn idempotency_key(&self) -> String {
        let nanos = self.occurred_at.timestamp_nanos_opt().unwrap_or_default();
        let src = format!(
            "{}|{}|{}|{:.8}|{}",
            self.actor, self.event_id, self.coin_id, self.amount, nanos
        );
        let sum = Sha256::digest(src.as_bytes());
        hex::encode(sum)
    }
}

/// Event-id derivation for the ledger operations.
///
/// When the caller supplies no event id, one is synthesized from the
/// operation, the account id, and the wall clock; when a base id is
/// supplied for a multi-event operation, per-target suffixes keep the ids
/// distinct so the external log never coalesces them.
pub mod event_id {
    use chrono::{DateTime, Utc};

    fn nanos(at: DateTime<Utc>) -> i64 {
        at.timestamp_nanos_opt().unwrap_or_default()
    }

    /// Event id for a recharge, when the caller supplied none.
    #[must_use]
    pub fn recharge(coin_id: &str, at: DateTime<Utc>) -> String {
        format!("recharge:{coin_id}:{}", nanos(at))
    }

    /// Event id for a depletion, when the caller supplied none.
    #[must_use]
    pub fn deplete(coin_id: &str, at: DateTime<Utc>) -> String {
        format!("use:{coin_id}:{}", nanos(at))
    }

    /// Event id for an exact-set, when the caller supplied none.
    #[must_use]
    pub fn set_exact(coin_id: &str, at: DateTime<Utc>) -> String {
        format!("setexact:{coin_id}:{}", nanos(at))
    }

    /// Per-target event id for a batch recharge.
    #[must_use]
    pub fn batch_recharge(base: Option<&str>, coin_id: &str, at: DateTime<Utc>) -> String {
        match base {
            Some(base) if !base.trim().is_empty() => format!("{base}:{coin_id}"),
            _ => format!("batchrecharge:{coin_id}:{}", nanos(at)),
        }
    }

    /// Event ids for the two legs of a transfer: `(debit, credit)`.
    #[must_use]
    pub fn transfer_legs(
        base: Option<&str>,
        from_id: &str,
        to_id: &str,
        at: DateTime<Utc>,
    ) -> (String, String) {
        match base {
            Some(base) if !base.trim().is_empty() => {
                (format!("{base}:out"), format!("{base}:in"))
            }
            _ => {
                let n = nanos(at);
                (
                    format!("transfer:out:{from_id}->{to_id}:{n}"),
                    format!("transfer:in:{from_id}->{to_id}:{n}"),
                )
            }
        }
    }
}
