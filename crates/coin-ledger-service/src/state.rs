//! Application state.

use std::sync::Arc;

use coin_ledger_store::LedgerStore;

use crate::config::ServiceConfig;
use crate::gateway::RateLimiter;

/// Application state shared across handlers.
pub struct AppState {
    /// The ledger engine.
    pub store: Arc<LedgerStore>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Admission-gateway token buckets.
    pub limiter: RateLimiter,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(store: Arc<LedgerStore>, config: ServiceConfig) -> Self {
        if config.service_api_key.is_none() {
            tracing::warn!("SERVICE_API_KEY not set - RPC surface will reject all requests");
        }
        Self {
            store,
            config,
            limiter: RateLimiter::new(),
        }
    }
}
