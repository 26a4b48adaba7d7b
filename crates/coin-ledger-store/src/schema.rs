//! Persisted schema for the ledger.

/// The one table the ledger owns.
pub const COINS_TABLE: &str = "coins";

/// Idempotent DDL for the coins table.
///
/// The balance column has no CHECK constraint: the non-negative invariant
/// is enforced by the mutation paths, which need the structured
/// insufficient-balance error rather than a constraint violation.
pub const CREATE_COINS_TABLE: &str = "\
CREATE TABLE IF NOT EXISTS coins (
    id TEXT PRIMARY KEY,
    coins BIGINT NOT NULL DEFAULT 0,
    last_recharge_date TIMESTAMPTZ NULL,
    last_usage_date TIMESTAMPTZ NULL
)";
