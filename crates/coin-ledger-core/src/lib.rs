//! Core types and utilities for the coin-ledger platform.
//!
//! This crate provides the foundational types used throughout coin-ledger:
//!
//! - **Accounts**: `Account`, the persisted balance row
//! - **Identifiers**: `ActorId`, the UUID identity attached to every mutation
//! - **Events**: `TransactionEvent`, the notification payload posted to the
//!   external transaction log, and the event-id derivation helpers
//! - **Notification**: the `TxNotifier` trait implemented by wire clients
//!
//! # Coin unit
//!
//! Balances are plain `i64` coin counts. The value is semantically unsigned:
//! every mutation enforces `coins >= 0` before committing.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod event;
pub mod ids;
pub mod notify;

pub use account::Account;
pub use event::{event_id, TransactionEvent, DEFAULT_EXPIRY_HOURS, DEFAULT_PLATFORM};
pub use ids::{ActorId, IdError};
pub use notify::{NotifyError, TxNotifier};
