//! The transaction-log notification contract.

use async_trait::async_trait;

use crate::event::TransactionEvent;

/// Errors surfaced by a notifier implementation.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The transaction-log endpoint could not be reached.
    #[error("transport error: {0}")]
    Transport(String),

    /// The transaction-log service rejected the record.
    #[error("transaction log error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the service.
        message: String,
    },
}

/// Posts one transaction record per balance-changing event.
///
/// Implementations are best-effort collaborators: the ledger has already
/// committed by the time `create` runs, so errors are logged by the caller
/// and never propagate into the mutation's result. Each call carries the
/// event's derived idempotency key so retried deliveries are detectable on
/// the receiving side.
#[async_trait]
pub trait TxNotifier: Send + Sync {
    /// Post one transaction record.
    async fn create(&self, event: &TransactionEvent) -> Result<(), NotifyError>;
}
