//! The query/mutation document endpoint.
//!
//! POST bodies are `{"query": "...", "variables": {...}}`. The endpoint is
//! not a schema-validating query engine: the shared document scanner finds
//! the top-level field invocations and each one is dispatched to a typed
//! ledger operation; sub-selections are not projected, complete objects
//! come back. Per-field failures land in `"errors"` with that field's data
//! set to null, and the response is 200 either way.

mod execute;

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::document::parse_document;
use crate::state::AppState;

/// A document request body.
#[derive(Debug, Deserialize)]
pub struct GraphQLRequest {
    /// The document text.
    #[serde(default)]
    pub query: String,
    /// Values for `$variables` referenced by the document.
    #[serde(default)]
    pub variables: Option<serde_json::Map<String, Value>>,
}

/// POST /graphql — execute a document.
pub async fn graphql(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request = match serde_json::from_slice::<GraphQLRequest>(&body) {
        Ok(request) => request,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "errors": [{ "message": "invalid request body: expected JSON with a \"query\" field" }]
                })),
            )
                .into_response();
        }
    };

    Json(run(&state, &request).await).into_response()
}

/// Execute a parsed request against the ledger.
pub async fn run(state: &AppState, request: &GraphQLRequest) -> Value {
    let document = parse_document(&request.query);
    if document.fields.is_empty() {
        return serde_json::json!({
            "errors": [{ "message": "no operations found in document" }]
        });
    }

    let variables = request.variables.clone().unwrap_or_default();
    let mut data = serde_json::Map::new();
    let mut errors = Vec::new();

    for field in &document.fields {
        let key = field.response_key().to_string();
        match execute::resolve_field(state, document.kind, field, &variables).await {
            Ok(value) => {
                data.insert(key, value);
            }
            Err(message) => {
                data.insert(key.clone(), Value::Null);
                errors.push(serde_json::json!({
                    "message": message,
                    "path": [key],
                }));
            }
        }
    }

    let mut response = serde_json::Map::new();
    response.insert("data".to_string(), Value::Object(data));
    if !errors.is_empty() {
        response.insert("errors".to_string(), Value::Array(errors));
    }
    Value::Object(response)
}

/// GET /graphql — the interactive explorer.
pub async fn explorer() -> Html<&'static str> {
    Html(EXPLORER_HTML)
}

const EXPLORER_HTML: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <title>coin-ledger explorer</title>
    <link rel="stylesheet" href="https://unpkg.com/graphiql/graphiql.min.css" />
  </head>
  <body style="margin: 0">
    <div id="graphiql" style="height: 100vh"></div>
    <script crossorigin src="https://unpkg.com/react/umd/react.production.min.js"></script>
    <script crossorigin src="https://unpkg.com/react-dom/umd/react-dom.production.min.js"></script>
    <script crossorigin src="https://unpkg.com/graphiql/graphiql.min.js"></script>
    <script>
      const fetcher = GraphiQL.createFetcher({ url: "/graphql" });
      ReactDOM.render(
        React.createElement(GraphiQL, { fetcher }),
        document.getElementById("graphiql")
      );
    </script>
  </body>
</html>
"#;
