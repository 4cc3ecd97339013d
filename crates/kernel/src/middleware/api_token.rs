//! API key authentication middleware.
//!
//! Resolves the `Authorization` header (raw key or `Bearer <key>`) into a
//! [`Caller`] request extension for the JsonSQL routes.

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::IntoResponse, response::Response};

use crate::jsonsql::{AuthError, Caller, GateError};
use crate::state::AppState;

/// Middleware that authenticates via API key.
///
/// - No header -> `Caller::Anonymous`; the query kind decides whether that is enough
/// - Valid key -> `Caller::ApiKey`
/// - Unknown key -> 401 JsonSQL error
pub async fn authenticate_api_key(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let caller = match state.gate().authorize(auth_header.as_deref()).await {
        Ok(identity) => {
            tracing::debug!(user_id = identity.user_id, key = %identity.key_name, "API key accepted");
            Caller::ApiKey(identity)
        }
        Err(GateError::Auth(AuthError::MissingCredential)) => Caller::Anonymous,
        Err(e) => {
            if !e.is_retryable() {
                state.metrics().record_rejection(e.rule());
            }
            return e.into_response();
        }
    };

    request.extensions_mut().insert(caller);
    next.run(request).await
}
