//! Common test utilities for coin-ledger integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum_test::TestServer;
use serde_json::{json, Value};

use coin_ledger_service::{create_router, AppState, ServiceConfig};
use coin_ledger_store::LedgerStore;

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// The service API key for RPC requests.
    pub service_api_key: String,
}

impl TestHarness {
    /// Harness over a lazily-connected store: nothing touches the
    /// database unless a resolver actually runs a query. Good for gateway
    /// and validation tests that must not need PostgreSQL.
    pub fn lazy(config: ServiceConfig) -> Self {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .expect("lazy pool");
        Self::with_store(LedgerStore::from_pool(pool), config)
    }

    /// Harness over a real database, or `None` when `DATABASE_URL` is not
    /// set (the test should skip itself).
    pub async fn gated(config: ServiceConfig) -> Option<Self> {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set; skipping integration test");
            return None;
        };
        let store = LedgerStore::connect(&url).await.expect("connect");
        store.ensure_schema().await.expect("ensure schema");
        Some(Self::with_store(store, config))
    }

    fn with_store(store: LedgerStore, config: ServiceConfig) -> Self {
        let service_api_key = config
            .service_api_key
            .clone()
            .unwrap_or_else(|| "test-service-key".into());
        let state = AppState::new(Arc::new(store), config);
        let server = TestServer::new(create_router(state)).expect("Failed to create test server");
        Self {
            server,
            service_api_key,
        }
    }

    /// POST a document to `/graphql` and decode the JSON response.
    pub async fn graphql(&self, query: &str, variables: Value) -> Value {
        let response = self
            .server
            .post("/graphql")
            .json(&json!({ "query": query, "variables": variables }))
            .await;
        response.json::<Value>()
    }
}

/// A config whose quotas never interfere with functional tests.
pub fn generous_config() -> ServiceConfig {
    use coin_ledger_service::gateway::RateCfg;

    ServiceConfig {
        service_api_key: Some("test-service-key".into()),
        query_rate: RateCfg {
            per_minute: 600,
            burst: 300,
        },
        mutation_rate: RateCfg {
            per_minute: 300,
            burst: 150,
        },
        rate_overrides: std::collections::HashMap::new(),
        ..ServiceConfig::default()
    }
}
