use super::state::AppState;
use crate::domain::{Actor, User};
use axum::{
    http::{header, header::HeaderMap, StatusCode},
    Json,
};
use tracing::error;

pub(super) type Rejection = (StatusCode, Json<serde_json::Value>);

pub(super) fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
}

/// Resolves the session user, if any. Only store failures are errors.
pub(super) async fn optional_user(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Option<User>, Rejection> {
    let Some(token) = extract_bearer_token(headers) else {
        return Ok(None);
    };

    state.accounts.current_user(token).await.map_err(|e| {
        error!(error = %e, "Failed to resolve session");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": "Failed to resolve session" })),
        )
    })
}

pub(super) async fn require_user(state: &AppState, headers: &HeaderMap) -> Result<User, Rejection> {
    match optional_user(state, headers).await? {
        Some(user) => Ok(user),
        None => Err((
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "Sign in required" })),
        )),
    }
}

pub(super) async fn require_actor(state: &AppState, headers: &HeaderMap) -> Result<Actor, Rejection> {
    require_user(state, headers).await.map(|user| Actor::from(&user))
}
