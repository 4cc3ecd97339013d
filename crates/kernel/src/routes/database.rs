//! JsonSQL query endpoint.
//!
//! `GET /api/database/{table}` with body `{"logic": <expr>, "kind": "<kind>"}`.
//! POST is accepted too, for clients that cannot send a GET body.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::Value;

use crate::commands::records_payload;
use crate::jsonsql::{AccessError, Caller, CompileError, GateError};
use crate::middleware::authenticate_api_key;
use crate::state::AppState;

/// Query request body.
#[derive(Debug, Default, Deserialize)]
struct DatabaseRequest {
    /// Filter expression; absent means no filter.
    #[serde(default)]
    logic: Value,

    /// Query kind; defaults to the first kind covering the table.
    #[serde(default)]
    kind: Option<String>,
}

/// Create the database router.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/database/{table}", get(query_table).post(query_table))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            authenticate_api_key,
        ))
}

async fn query_table(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(table): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, GateError> {
    let request = parse_request(&body)?;

    let kind = match request.kind {
        Some(kind) => kind,
        None => default_kind(&state, &table)?,
    };

    let records = state
        .gate()
        .execute(&caller, &kind, &table, &request.logic)
        .await?;

    Ok(Json(records_payload(&records)))
}

fn parse_request(body: &[u8]) -> Result<DatabaseRequest, GateError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(DatabaseRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| CompileError::malformed("$", format!("invalid request body: {e}")).into())
}

fn default_kind(state: &AppState, table: &str) -> Result<String, GateError> {
    let registry = state.registry();
    let table = registry
        .table(table)
        .ok_or_else(|| AccessError::UnknownTable(table.to_string()))?;

    registry
        .default_kind_for(table)
        .map(str::to_owned)
        .ok_or_else(|| AccessError::UnknownQueryKind(format!("<none for {table}>")).into())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_means_no_filter() {
        let request = parse_request(b"").unwrap();
        assert!(request.logic.is_null());
        assert!(request.kind.is_none());
    }

    #[test]
    fn body_fields_are_read() {
        let request =
            parse_request(br#"{"logic": {"eq": ["creature", "owlbear"]}, "kind": "get_image_data"}"#)
                .unwrap();
        assert_eq!(request.kind.as_deref(), Some("get_image_data"));
        assert_eq!(request.logic["eq"][1], "owlbear");
    }

    #[test]
    fn garbage_body_is_malformed() {
        let err = parse_request(b"{logic:").unwrap_err();
        assert_eq!(err.rule(), "malformed_expression");
    }
}
