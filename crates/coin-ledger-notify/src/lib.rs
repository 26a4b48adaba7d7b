//! Transaction-log client for coin-ledger.
//!
//! This crate provides the wire client that posts one transaction record per
//! balance-changing ledger event to the external transactions service.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use coin_ledger_notify::TxLogClient;
//!
//! let client = TxLogClient::new("http://transactions.svc:8080", None);
//! let notifier: Arc<dyn coin_ledger_core::TxNotifier> = Arc::new(client);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;

pub use client::{ClientOptions, TxLogClient};
