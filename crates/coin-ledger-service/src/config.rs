//! Service configuration.

use std::collections::HashMap;

use crate::gateway::RateCfg;

/// Default quota for query-class operations.
pub const DEFAULT_QUERY_RATE: RateCfg = RateCfg {
    per_minute: 60,
    burst: 30,
};

/// Default quota for mutation-class operations (stricter than queries).
pub const DEFAULT_MUTATION_RATE: RateCfg = RateCfg {
    per_minute: 20,
    burst: 10,
};

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:7080").
    pub listen_addr: String,

    /// PostgreSQL connection string (required to start).
    pub database_url: String,

    /// Transactions service URL (optional; notifications are skipped when
    /// unset).
    pub tx_log_url: Option<String>,

    /// Bearer token for the transactions service (optional).
    pub tx_log_api_key: Option<String>,

    /// API key for the service-to-service RPC surface.
    pub service_api_key: Option<String>,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Whole-request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Per-operation timeout for query-class resolvers.
    pub query_timeout_seconds: u64,

    /// Per-operation timeout for mutation-class resolvers.
    pub mutation_timeout_seconds: u64,

    /// Default quota for query-class operations.
    pub query_rate: RateCfg,

    /// Default quota for mutation-class operations.
    pub mutation_rate: RateCfg,

    /// Per-operation quota overrides, keyed by field name.
    pub rate_overrides: HashMap<String, RateCfg>,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:7080".into()),
            database_url: std::env::var("DATABASE_URL").unwrap_or_default(),
            tx_log_url: std::env::var("TX_LOG_URL").ok(),
            tx_log_api_key: std::env::var("TX_LOG_API_KEY").ok(),
            service_api_key: std::env::var("SERVICE_API_KEY").ok(),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: env_parsed("MAX_BODY_BYTES", 1024 * 1024),
            request_timeout_seconds: env_parsed("REQUEST_TIMEOUT_SECONDS", 30),
            query_timeout_seconds: env_parsed("QUERY_TIMEOUT_SECONDS", 10),
            mutation_timeout_seconds: env_parsed("MUTATION_TIMEOUT_SECONDS", 10),
            query_rate: DEFAULT_QUERY_RATE,
            mutation_rate: DEFAULT_MUTATION_RATE,
            rate_overrides: default_rate_overrides(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:7080".into(),
            database_url: String::new(),
            tx_log_url: None,
            tx_log_api_key: None,
            service_api_key: None,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            query_timeout_seconds: 10,
            mutation_timeout_seconds: 10,
            query_rate: DEFAULT_QUERY_RATE,
            mutation_rate: DEFAULT_MUTATION_RATE,
            rate_overrides: default_rate_overrides(),
        }
    }
}

/// The stock per-operation quota table. Expensive mutations get tighter
/// buckets than the class default; depletion is deliberately as permissive
/// as a query since it is the hot path.
#[must_use]
pub fn default_rate_overrides() -> HashMap<String, RateCfg> {
    HashMap::from([
        (
            "deleteUser".to_string(),
            RateCfg {
                per_minute: 5,
                burst: 2,
            },
        ),
        (
            "rechargeCoins".to_string(),
            RateCfg {
                per_minute: 30,
                burst: 15,
            },
        ),
        (
            "useCoins".to_string(),
            RateCfg {
                per_minute: 60,
                burst: 30,
            },
        ),
        (
            "batchRecharge".to_string(),
            RateCfg {
                per_minute: 10,
                burst: 5,
            },
        ),
        (
            "transferCoins".to_string(),
            RateCfg {
                per_minute: 20,
                burst: 10,
            },
        ),
    ])
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
