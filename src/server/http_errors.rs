use crate::application::{AccountError, ListingError, SubscriptionError};
use crate::domain::{FieldErrors, Plan};
use crate::infrastructure::{MediaError, RepositoryError, SessionError};
use axum::http::StatusCode;
use tracing::error;

fn invalid_fields(message: &str, fields: &FieldErrors) -> (StatusCode, serde_json::Value) {
    (
        StatusCode::BAD_REQUEST,
        serde_json::json!({ "error": message, "fields": fields }),
    )
}

fn internal(err: &dyn std::fmt::Display, message: &str) -> (StatusCode, serde_json::Value) {
    error!(error = %err, "{}", message);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        serde_json::json!({ "error": message }),
    )
}

/// Request DTO failures, keyed by field like domain validation errors.
pub(super) fn map_request_validation(
    errors: &validator::ValidationErrors,
) -> (StatusCode, serde_json::Value) {
    let fields: FieldErrors = errors
        .field_errors()
        .into_iter()
        .filter_map(|(field, errs)| {
            errs.first().map(|e| {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string());
                (field.to_string(), message)
            })
        })
        .collect();
    invalid_fields("Invalid request", &fields)
}

pub(super) fn invalid_plan() -> (StatusCode, serde_json::Value) {
    (
        StatusCode::BAD_REQUEST,
        serde_json::json!({ "error": "Invalid plan", "allowed": Plan::names() }),
    )
}

pub(super) fn bad_request(message: &str) -> (StatusCode, serde_json::Value) {
    (StatusCode::BAD_REQUEST, serde_json::json!({ "error": message }))
}

pub(super) fn map_listing_error(err: &ListingError) -> (StatusCode, serde_json::Value) {
    match err {
        ListingError::Validation(fields) => invalid_fields("Please fix the highlighted fields", fields),
        ListingError::QuotaExceeded { limit, used } => (
            StatusCode::FORBIDDEN,
            serde_json::json!({ "error": err.to_string(), "limit": limit, "used": used }),
        ),
        ListingError::IllegalTransition(t) => (
            StatusCode::CONFLICT,
            serde_json::json!({
                "error": "Listing has already been reviewed",
                "status": t.from.to_string()
            }),
        ),
        ListingError::Unauthorized(msg) => {
            (StatusCode::FORBIDDEN, serde_json::json!({ "error": msg }))
        }
        ListingError::NotFound(_) | ListingError::Repository(RepositoryError::NotFound(_)) => {
            (StatusCode::NOT_FOUND, serde_json::json!({ "error": "Listing not found" }))
        }
        ListingError::Media(MediaError::RateLimited) => (
            StatusCode::TOO_MANY_REQUESTS,
            serde_json::json!({ "error": "Media storage is rate limited, please retry" }),
        ),
        ListingError::Media(e) => internal(e, "Media upload failed"),
        ListingError::Repository(e) => internal(e, "Listing operation failed"),
    }
}

pub(super) fn map_subscription_error(err: &SubscriptionError) -> (StatusCode, serde_json::Value) {
    match err {
        SubscriptionError::NotFound(_) => (
            StatusCode::NOT_FOUND,
            serde_json::json!({ "error": "Subscription not found" }),
        ),
        SubscriptionError::Repository(RepositoryError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            serde_json::json!({ "error": "User not found" }),
        ),
        SubscriptionError::Unauthorized(msg) => {
            (StatusCode::FORBIDDEN, serde_json::json!({ "error": msg }))
        }
        SubscriptionError::AlreadySubscribed(_) => (
            StatusCode::CONFLICT,
            serde_json::json!({ "error": err.to_string() }),
        ),
        SubscriptionError::InvalidInput(msg) => bad_request(msg),
        SubscriptionError::Repository(e) => internal(e, "Subscription operation failed"),
    }
}

pub(super) fn map_account_error(err: &AccountError) -> (StatusCode, serde_json::Value) {
    match err {
        AccountError::Validation(fields) => invalid_fields("Please fix the highlighted fields", fields),
        AccountError::Session(SessionError::EmailTaken) => (
            StatusCode::CONFLICT,
            serde_json::json!({ "error": "An account with this email already exists" }),
        ),
        AccountError::Session(SessionError::InvalidCredentials) => (
            StatusCode::UNAUTHORIZED,
            serde_json::json!({ "error": "Invalid email or password" }),
        ),
        AccountError::Session(e) => internal(e, "Authentication failed"),
        AccountError::NotFound(_) | AccountError::Repository(RepositoryError::NotFound(_)) => {
            (StatusCode::NOT_FOUND, serde_json::json!({ "error": "Dealer not found" }))
        }
        AccountError::Unauthorized(msg) => {
            (StatusCode::FORBIDDEN, serde_json::json!({ "error": msg }))
        }
        AccountError::InvalidState(msg) => {
            (StatusCode::CONFLICT, serde_json::json!({ "error": msg }))
        }
        AccountError::Repository(e) => internal(e, "Account operation failed"),
    }
}
