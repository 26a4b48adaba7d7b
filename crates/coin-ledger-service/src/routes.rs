//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::gateway;
use crate::graphql;
use crate::handlers::{health, rpc};
use crate::state::AppState;

/// Maximum concurrent requests for the RPC surface.
const RPC_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
/// - `GET /` - Redirect to the explorer
///
/// ## Document endpoint (admission-gated)
/// - `POST /graphql` - Execute a query/mutation document
/// - `GET /graphql` - Interactive explorer (bypasses the gateway)
///
/// ## RPC (service API key auth)
/// - `POST /rpc/v1/accounts` - Create an account
/// - `POST /rpc/v1/deplete` - Debit an account
pub fn create_router(state: AppState) -> Router {
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    // The gateway wraps only the document endpoint; health, the explorer
    // redirect, and the RPC surface are not operation-gated.
    let document_routes = Router::new()
        .route("/graphql", post(graphql::graphql).get(graphql::explorer))
        .layer(axum::middleware::from_fn_with_state(
            Arc::clone(&state),
            gateway::admit,
        ));

    let rpc_routes = Router::new()
        .route("/rpc/v1/accounts", post(rpc::create_account))
        .route("/rpc/v1/deplete", post(rpc::deplete))
        .layer(ConcurrencyLimitLayer::new(RPC_MAX_CONCURRENT_REQUESTS));

    Router::new()
        .route("/health", get(health::health))
        .route("/", get(|| async { axum::response::Redirect::temporary("/graphql") }))
        .merge(document_routes)
        .merge(rpc_routes)
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
