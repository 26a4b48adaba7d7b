//! HTTP API service for the coin-ledger.
//!
//! Two surfaces over one ledger engine:
//!
//! - the query/mutation document endpoint at `/graphql`, fronted by the
//!   admission gateway (per-client, per-operation token buckets);
//! - a service-to-service RPC surface at `/rpc/v1/*`, API-key
//!   authenticated.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod auth;
pub mod config;
pub mod document;
pub mod error;
pub mod gateway;
pub mod graphql;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::ServiceConfig;
pub use routes::create_router;
pub use state::AppState;
