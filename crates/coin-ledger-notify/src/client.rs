//! Transaction-log HTTP client implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use coin_ledger_core::{NotifyError, TransactionEvent, TxNotifier};

/// Options for [`TxLogClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self { timeout_seconds: 10 }
    }
}

/// Client for the external transactions service.
///
/// Each call posts one independent record. The derived idempotency key
/// travels in the `x-idempotency-key` header so a transport-level retry is
/// detectably duplicate on the receiving side.
#[derive(Debug, Clone)]
pub struct TxLogClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

/// One transaction record on the wire.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TransactionRecord<'a> {
    coin_id: &'a str,
    user_id: String,
    data_id: &'a str,
    coin_used: f64,
    transaction_timestamp: String,
    expiry_date: String,
    platform_name: &'a str,
}

/// Error body returned by the transactions service.
#[derive(Debug, Deserialize)]
struct TxLogErrorResponse {
    error: String,
}

impl TxLogClient {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Transactions service URL (e.g., `"http://localhost:6090"`)
    /// * `api_key` - Optional bearer token
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self::with_options(base_url, api_key, ClientOptions::default())
    }

    /// Create a new client with custom options.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built (should not happen with
    /// default settings).
    #[must_use]
    pub fn with_options(
        base_url: impl Into<String>,
        api_key: Option<String>,
        options: ClientOptions,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    async fn post_record(&self, event: &TransactionEvent) -> Result<(), NotifyError> {
        let url = format!("{}/api/v1/transactions", self.base_url);
        let record = TransactionRecord {
            coin_id: &event.coin_id,
            user_id: event.actor.to_string(),
            data_id: &event.event_id,
            coin_used: event.amount,
            transaction_timestamp: event.occurred_at.to_rfc3339(),
            expiry_date: event.expires_at.to_rfc3339(),
            platform_name: &event.platform,
        };

        let mut request = self
            .client
            .post(&url)
            .header("x-user-id", event.platform.as_str())
            .header("x-idempotency-key", event.idempotency_key())
            .json(&record);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        // Prefer the service's own error message when it sends one.
        let message = match response.json::<TxLogErrorResponse>().await {
            Ok(body) => body.error,
            Err(_) => format!("HTTP {status}"),
        };
        Err(NotifyError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl TxNotifier for TxLogClient {
    async fn create(&self, event: &TransactionEvent) -> Result<(), NotifyError> {
        self.post_record(event).await
    }
}
