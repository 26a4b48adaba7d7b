//! The ledger store: every balance operation, in one place.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};

use coin_ledger_core::{event_id, Account, ActorId, TransactionEvent, TxNotifier};

use crate::error::{LedgerError, Result};
use crate::schema;

/// Upper bound on pool acquisition, so a saturated pool fails the request
/// instead of queueing past its deadline.
const POOL_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default connection pool size.
const POOL_MAX_CONNECTIONS: u32 = 10;

/// Deadline for a single notification post, independent of the mutation
/// deadline that already expired or succeeded by the time it runs.
const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Page clamp bounds for `list_accounts`.
const MAX_PAGE_SIZE: i64 = 200;
const DEFAULT_PAGE_SIZE: i64 = 50;

/// Database row shape for the coins table.
#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: String,
    coins: i64,
    last_recharge_date: Option<DateTime<Utc>>,
    last_usage_date: Option<DateTime<Utc>>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Self {
            id: row.id,
            coins: row.coins,
            last_recharge_date: row.last_recharge_date,
            last_usage_date: row.last_usage_date,
        }
    }
}

/// The ledger engine.
///
/// Safe to share across request handlers; all state lives in PostgreSQL and
/// the (optional) notifier is only ever read.
pub struct LedgerStore {
    pool: PgPool,
    notifier: Option<Arc<dyn TxNotifier>>,
}

impl LedgerStore {
    /// Connect to PostgreSQL.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection string is invalid or the server
    /// is unreachable.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(POOL_MAX_CONNECTIONS)
            .acquire_timeout(POOL_ACQUIRE_TIMEOUT)
            .connect(database_url)
            .await?;
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool (handy for tests).
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            notifier: None,
        }
    }

    /// Attach a transaction-log notifier.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn TxNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// The underlying pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the coins table if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(schema::CREATE_COINS_TABLE)
            .execute(&self.pool)
            .await?;
        tracing::info!(table = schema::COINS_TABLE, "schema ensured");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    /// Point lookup; a missing account is `None`, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub async fn get_account(&self, id: &str) -> Result<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT id, coins, last_recharge_date, last_usage_date FROM coins WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Account::from))
    }

    /// List accounts ordered by id ascending.
    ///
    /// `limit` outside `(0, 200]` falls back to 50; negative `offset` is
    /// treated as 0.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub async fn list_accounts(&self, limit: i64, offset: i64) -> Result<Vec<Account>> {
        let (limit, offset) = clamp_page(limit, offset);
        let rows = sqlx::query_as::<_, AccountRow>(
            "SELECT id, coins, last_recharge_date, last_usage_date FROM coins \
             ORDER BY id LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Account::from).collect())
    }

    /// List accounts whose balance falls in `[min, max]`, balance descending,
    /// id ascending as tiebreak. Either bound may be absent.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub async fn list_by_coins_range(
        &self,
        min: Option<i64>,
        max: Option<i64>,
    ) -> Result<Vec<Account>> {
        let mut sql = String::from(
            "SELECT id, coins, last_recharge_date, last_usage_date FROM coins WHERE 1=1",
        );
        let mut idx = 0;
        if min.is_some() {
            idx += 1;
            sql.push_str(&format!(" AND coins >= ${idx}"));
        }
        if max.is_some() {
            idx += 1;
            sql.push_str(&format!(" AND coins <= ${idx}"));
        }
        sql.push_str(" ORDER BY coins DESC, id ASC");

        let mut query = sqlx::query_as::<_, AccountRow>(&sql);
        if let Some(min) = min {
            query = query.bind(min);
        }
        if let Some(max) = max {
            query = query.bind(max);
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Account::from).collect())
    }

    /// Accounts recharged at or after `since`, most recent first.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub async fn list_recent_recharges(&self, since: DateTime<Utc>) -> Result<Vec<Account>> {
        let rows = sqlx::query_as::<_, AccountRow>(
            "SELECT id, coins, last_recharge_date, last_usage_date FROM coins \
             WHERE last_recharge_date IS NOT NULL AND last_recharge_date >= $1 \
             ORDER BY last_recharge_date DESC",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Account::from).collect())
    }

    /// Accounts never used, or not used since `before`. Never-used rows sort
    /// first, then id ascending.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub async fn list_inactive_since(&self, before: DateTime<Utc>) -> Result<Vec<Account>> {
        let rows = sqlx::query_as::<_, AccountRow>(
            "SELECT id, coins, last_recharge_date, last_usage_date FROM coins \
             WHERE last_usage_date IS NULL OR last_usage_date < $1 \
             ORDER BY last_usage_date NULLS FIRST, id",
        )
        .bind(before)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Account::from).collect())
    }

    /// Total number of accounts.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub async fn count_accounts(&self) -> Result<i64> {
        let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM coins")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    /// Sum of all balances.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub async fn sum_coins(&self) -> Result<i64> {
        // SUM(bigint) is numeric in Postgres; cast back down for decoding.
        let sum = sqlx::query_scalar::<_, i64>("SELECT COALESCE(SUM(coins), 0)::BIGINT FROM coins")
            .fetch_one(&self.pool)
            .await?;
        Ok(sum)
    }

    /// Whether an account exists.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub async fn exists(&self, id: &str) -> Result<bool> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM coins WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Idempotent insert: a duplicate id changes nothing, and the current
    /// row is returned either way.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub async fn create_account(&self, id: &str, initial: Option<i64>) -> Result<Account> {
        let initial = initial.unwrap_or(0);
        tracing::info!(id = %id, initial = %initial, "create account");
        sqlx::query("INSERT INTO coins (id, coins) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING")
            .bind(id)
            .bind(initial)
            .execute(&self.pool)
            .await?;
        self.get_account(id).await?.ok_or_else(|| {
            // Only reachable if a concurrent delete raced the readback.
            LedgerError::AccountNotFound { id: id.to_string() }
        })
    }

    /// Hard delete; returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub async fn delete_account(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM coins WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        let deleted = result.rows_affected() > 0;
        tracing::info!(id = %id, deleted = %deleted, "delete account");
        Ok(deleted)
    }

    /// Add `amount` to the balance and stamp the recharge date.
    ///
    /// A single atomic statement: the increment does not depend on a prior
    /// read, so no explicit row lock is taken.
    ///
    /// # Errors
    ///
    /// `InvalidAmount` if `amount <= 0`, `InvalidActor` if `actor` is not a
    /// UUID, `AccountNotFound` if the id matches no row.
    #[allow(clippy::cast_precision_loss)]
    pub async fn recharge(
        &self,
        id: &str,
        amount: i64,
        actor: &str,
        event_id: Option<&str>,
    ) -> Result<Account> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let actor: ActorId = actor.parse()?;

        let row = sqlx::query_as::<_, AccountRow>(
            "UPDATE coins SET coins = coins + $2, last_recharge_date = NOW() WHERE id = $1 \
             RETURNING id, coins, last_recharge_date, last_usage_date",
        )
        .bind(id)
        .bind(amount)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| LedgerError::AccountNotFound { id: id.to_string() })?;

        tracing::info!(id = %id, amount = %amount, coins = %row.coins, "recharge");

        let now = Utc::now();
        let event_id = supplied_or(event_id, || event_id::recharge(id, now));
        self.dispatch(TransactionEvent::new(actor, event_id, id, amount as f64, now));

        Ok(row.into())
    }

    /// Add `amount` to every matching account in one statement; returns the
    /// number of rows updated. One notification per id, with event ids
    /// derived from `base_event_id` plus the target id so the external log
    /// never coalesces them.
    ///
    /// # Errors
    ///
    /// `InvalidAmount` if `amount <= 0`, `InvalidActor` if `actor` is not a
    /// UUID.
    #[allow(clippy::cast_precision_loss)]
    pub async fn batch_recharge(
        &self,
        ids: &[String],
        amount: i64,
        actor: &str,
        base_event_id: Option<&str>,
    ) -> Result<u64> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let actor: ActorId = actor.parse()?;

        let result = sqlx::query(
            "UPDATE coins SET coins = coins + $2, last_recharge_date = NOW() WHERE id = ANY($1)",
        )
        .bind(ids)
        .bind(amount)
        .execute(&self.pool)
        .await?;

        let rows = result.rows_affected();
        tracing::info!(ids = ids.len(), amount = %amount, rows_affected = %rows, "batch recharge");

        let now = Utc::now();
        for id in ids {
            let event_id = event_id::batch_recharge(base_event_id, id, now);
            self.dispatch(TransactionEvent::new(actor, event_id, id, amount as f64, now));
        }

        Ok(rows)
    }

    /// Debit `amount` from the balance and stamp the usage date.
    ///
    /// The row is locked `FOR UPDATE` and the balance re-read under that
    /// lock before the write; concurrent debits of the same account are
    /// serialized on the lock and can never both observe the pre-decrement
    /// balance.
    ///
    /// # Errors
    ///
    /// `InvalidAmount` / `InvalidActor` as for `recharge`;
    /// `AccountNotFound` if the id matches no row; `InsufficientBalance`
    /// if the locked balance is below `amount` (the balance is unchanged).
    #[allow(clippy::cast_precision_loss)]
    pub async fn deplete(
        &self,
        id: &str,
        amount: i64,
        actor: &str,
        event_id: Option<&str>,
    ) -> Result<Account> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let actor: ActorId = actor.parse()?;

        let mut tx = self.pool.begin().await?;

        let balance =
            sqlx::query_scalar::<_, i64>("SELECT coins FROM coins WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| LedgerError::AccountNotFound { id: id.to_string() })?;

        if balance < amount {
            // Transaction rolls back on drop; nothing was written.
            return Err(LedgerError::InsufficientBalance {
                balance,
                required: amount,
            });
        }

        let row = sqlx::query_as::<_, AccountRow>(
            "UPDATE coins SET coins = coins - $2, last_usage_date = NOW() WHERE id = $1 \
             RETURNING id, coins, last_recharge_date, last_usage_date",
        )
        .bind(id)
        .bind(amount)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(id = %id, amount = %amount, coins = %row.coins, "deplete");

        let now = Utc::now();
        let event_id = supplied_or(event_id, || event_id::deplete(id, now));
        self.dispatch(TransactionEvent::new(actor, event_id, id, amount as f64, now));

        Ok(row.into())
    }

    /// Move `amount` from one account to another atomically.
    ///
    /// One transaction: the source row is locked `FOR UPDATE`, sufficiency
    /// checked under the lock, source debited, destination credited, one
    /// commit. Two notifications with distinct event ids follow the commit.
    ///
    /// # Errors
    ///
    /// `InvalidAmount` / `InvalidActor` as for `recharge`;
    /// `AccountNotFound` if either account is missing (no partial effect);
    /// `InsufficientBalance` if the source cannot cover `amount`.
    #[allow(clippy::cast_precision_loss)]
    pub async fn transfer(
        &self,
        from_id: &str,
        to_id: &str,
        amount: i64,
        actor: &str,
        event_id: Option<&str>,
    ) -> Result<(Account, Account)> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let actor: ActorId = actor.parse()?;

        let mut tx = self.pool.begin().await?;

        let from_coins =
            sqlx::query_scalar::<_, i64>("SELECT coins FROM coins WHERE id = $1 FOR UPDATE")
                .bind(from_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| LedgerError::AccountNotFound {
                    id: from_id.to_string(),
                })?;

        if from_coins < amount {
            return Err(LedgerError::InsufficientBalance {
                balance: from_coins,
                required: amount,
            });
        }

        let from = sqlx::query_as::<_, AccountRow>(
            "UPDATE coins SET coins = coins - $2, last_usage_date = NOW() WHERE id = $1 \
             RETURNING id, coins, last_recharge_date, last_usage_date",
        )
        .bind(from_id)
        .bind(amount)
        .fetch_one(&mut *tx)
        .await?;

        // A missing destination aborts the whole transaction: the debit
        // above is rolled back, never committed on its own.
        let to = sqlx::query_as::<_, AccountRow>(
            "UPDATE coins SET coins = coins + $2, last_recharge_date = NOW() WHERE id = $1 \
             RETURNING id, coins, last_recharge_date, last_usage_date",
        )
        .bind(to_id)
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| LedgerError::AccountNotFound {
            id: to_id.to_string(),
        })?;

        tx.commit().await?;

        tracing::info!(
            from = %from_id,
            to = %to_id,
            amount = %amount,
            "transfer"
        );

        let now = Utc::now();
        let (out_id, in_id) = event_id::transfer_legs(event_id, from_id, to_id, now);
        self.dispatch(TransactionEvent::new(actor, out_id, from_id, amount as f64, now));
        self.dispatch(TransactionEvent::new(actor, in_id, to_id, amount as f64, now));

        Ok((from.into(), to.into()))
    }

    /// Set the balance to an exact value, notifying the absolute delta.
    ///
    /// No notification is emitted when the balance did not change.
    ///
    /// # Errors
    ///
    /// `NegativeBalance` if `coins < 0` (the non-negative invariant holds
    /// here too), `InvalidActor` if `actor` is not a UUID,
    /// `AccountNotFound` if the id matches no row.
    #[allow(clippy::cast_precision_loss)]
    pub async fn set_coins_exact(
        &self,
        id: &str,
        coins: i64,
        actor: &str,
        event_id: Option<&str>,
    ) -> Result<Account> {
        if coins < 0 {
            return Err(LedgerError::NegativeBalance(coins));
        }
        let actor: ActorId = actor.parse()?;

        let previous = self
            .get_account(id)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound { id: id.to_string() })?;

        let row = sqlx::query_as::<_, AccountRow>(
            "UPDATE coins SET coins = $2 WHERE id = $1 \
             RETURNING id, coins, last_recharge_date, last_usage_date",
        )
        .bind(id)
        .bind(coins)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| LedgerError::AccountNotFound { id: id.to_string() })?;

        tracing::info!(id = %id, coins = %row.coins, "set exact balance");

        if row.coins != previous.coins {
            let delta = (row.coins - previous.coins).abs();
            let now = Utc::now();
            let event_id = supplied_or(event_id, || event_id::set_exact(id, now));
            self.dispatch(TransactionEvent::new(actor, event_id, id, delta as f64, now));
        }

        Ok(row.into())
    }

    /// Stamp the usage date without changing the balance. No notification.
    ///
    /// # Errors
    ///
    /// `AccountNotFound` if the id matches no row.
    pub async fn touch_usage(&self, id: &str) -> Result<Account> {
        let row = sqlx::query_as::<_, AccountRow>(
            "UPDATE coins SET last_usage_date = NOW() WHERE id = $1 \
             RETURNING id, coins, last_recharge_date, last_usage_date",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| LedgerError::AccountNotFound { id: id.to_string() })?;
        Ok(row.into())
    }

    // ------------------------------------------------------------------
    // Notification dispatch
    // ------------------------------------------------------------------

    /// Fire one post-commit notification, detached from the caller.
    ///
    /// The mutation has already committed; the post runs on its own task
    /// with its own deadline, and failure only reaches the log.
    fn dispatch(&self, event: TransactionEvent) {
        let Some(notifier) = &self.notifier else {
            tracing::debug!(event_id = %event.event_id, "notifier not configured; skipping");
            return;
        };
        let notifier = Arc::clone(notifier);
        tokio::spawn(async move {
            match tokio::time::timeout(NOTIFY_TIMEOUT, notifier.create(&event)).await {
                Ok(Ok(())) => {
                    tracing::debug!(
                        event_id = %event.event_id,
                        coin_id = %event.coin_id,
                        "transaction record posted"
                    );
                }
                Ok(Err(e)) => {
                    tracing::error!(
                        actor = %event.actor,
                        coin_id = %event.coin_id,
                        event_id = %event.event_id,
                        amount = %event.amount,
                        occurred_at = %event.occurred_at,
                        error = %e,
                        "failed to post transaction record"
                    );
                }
                Err(_) => {
                    tracing::error!(
                        actor = %event.actor,
                        coin_id = %event.coin_id,
                        event_id = %event.event_id,
                        "transaction record post timed out"
                    );
                }
            }
        });
    }
}

/// Clamp a page request: limit to `(0, 200]` with 50 as the fallback,
/// offset to non-negative.
fn clamp_page(limit: i64, offset: i64) -> (i64, i64) {
    let limit = if limit <= 0 || limit > MAX_PAGE_SIZE {
        DEFAULT_PAGE_SIZE
    } else {
        limit
    };
    (limit, offset.max(0))
}

/// Use the caller-supplied event id unless it is blank.
fn supplied_or(supplied: Option<&str>, fallback: impl FnOnce() -> String) -> String {
    match supplied {
        Some(s) if !s.trim().is_empty() => s.to_string(),
        _ => fallback(),
    }
}
