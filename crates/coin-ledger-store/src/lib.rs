//! PostgreSQL ledger engine for coin-ledger.
//!
//! [`LedgerStore`] owns the balance-mutation logic and its invariants:
//!
//! - debits never drive a balance negative (`SELECT ... FOR UPDATE` + re-read
//!   inside the same transaction as the write);
//! - transfers are atomic — one transaction, one commit;
//! - every balance-changing operation posts one notification per affected
//!   account to the external transaction log, after commit, on its own
//!   deadline, never failing the mutation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod schema;
mod store;

pub use error::{LedgerError, Result};
pub use store::LedgerStore;
