//! Admission gateway: per-(client, operation) token-bucket rate limiting.
//!
//! The gateway sits in front of the document endpoint. For every POST it
//! buffers the body, extracts the top-level field names the document
//! invokes, and consumes one token from each field's bucket — keyed by the
//! caller's best-effort identity. If any bucket is empty the whole request
//! is denied with a structured 429; partial admission is not a thing. GETs
//! (the interactive explorer) and bodies the scanner cannot read pass
//! through ungated.

mod limiter;

pub use limiter::{RateCfg, RateLimiter};

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::document::{parse_document, OperationKind};
use crate::state::AppState;

/// The slice of the request body the gateway cares about.
#[derive(Debug, Deserialize)]
struct GatewayRequest {
    #[serde(default)]
    query: String,
}

/// Admission middleware for the document endpoint.
pub async fn admit(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    // Only POSTs can invoke operations; the explorer fetches with GET.
    if request.method() != axum::http::Method::POST {
        return next.run(request).await;
    }

    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, state.config.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return (StatusCode::BAD_REQUEST, "request too large or unreadable").into_response();
        }
    };

    // Unparseable bodies carry no fields: fail open, the handler decides.
    let query = serde_json::from_slice::<GatewayRequest>(&bytes)
        .map(|req| req.query)
        .unwrap_or_default();
    let document = parse_document(&query);
    let fields = document.unique_field_names();

    if fields.is_empty() {
        return next.run(Request::from_parts(parts, Body::from(bytes))).await;
    }

    let client = client_key(&parts);
    let mut denied = Vec::new();
    for field in fields {
        let cfg = quota_for(&state, document.kind, field);
        if !state.limiter.allow(&client, field, cfg).await {
            denied.push(field.to_string());
        }
    }

    if !denied.is_empty() {
        tracing::warn!(client = %client, denied = ?denied, "request denied by rate limit");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({
                "error": "rate limit exceeded",
                "deniedAPIs": denied,
                "retryAdvice": "retry later or contact server admin for higher limits",
            })),
        )
            .into_response();
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

/// Quota for one operation: the override table first, then the class
/// default.
fn quota_for(state: &AppState, kind: OperationKind, field: &str) -> RateCfg {
    if let Some(cfg) = state.config.rate_overrides.get(field) {
        return *cfg;
    }
    match kind {
        OperationKind::Mutation => state.config.mutation_rate,
        OperationKind::Query => state.config.query_rate,
    }
}

/// Best-effort client identity: first hop of `X-Forwarded-For` when
/// present, else the transport peer address. Spoofable; a quota key, not
/// a credential.
fn client_key(parts: &Parts) -> String {
    if let Some(forwarded) = parts
        .headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "unknown".to_string(), |info| info.0.ip().to_string())
}
