use super::http::{reply, Reply};
use super::http_auth::require_actor;
use super::http_errors::{
    invalid_plan, map_account_error, map_request_validation, map_subscription_error,
};
use super::http_parse::parse_plan;
use super::http_types::{
    AssignSubscriptionRequest, ChangePlanRequest, DealerProfileRequest, ExtendSubscriptionRequest,
    SubscriptionResponse, UserResponse,
};
use super::state::AppState;
use crate::domain::{Dealer, Subscription};
use axum::{
    extract::{Path, State},
    http::{header::HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

macro_rules! actor_or_reject {
    ($state:expr, $headers:expr) => {
        match require_actor(&$state, &$headers).await {
            Ok(actor) => actor,
            Err(rejection) => return rejection,
        }
    };
}

fn subscription_json(sub: Subscription) -> serde_json::Value {
    serde_json::json!(SubscriptionResponse::new(sub, Utc::now().date_naive()))
}

fn dealer_json(dealer: Dealer) -> serde_json::Value {
    let mut value = serde_json::json!(UserResponse::from(dealer.user));
    value["subscription"] = dealer
        .subscription
        .map(subscription_json)
        .unwrap_or(serde_json::Value::Null);
    value
}

#[utoipa::path(
    get,
    path = "/admin/users/pending",
    tag = "Admin",
    responses(
        (status = 200, description = "Dealers awaiting approval", body = [UserResponse]),
        (status = 403, description = "Admins only", body = Object)
    )
)]
pub(super) async fn pending_users(State(state): State<AppState>, headers: HeaderMap) -> Reply {
    let actor = actor_or_reject!(state, headers);
    match state.accounts.pending_users(&actor).await {
        Ok(users) => {
            let users: Vec<UserResponse> = users.into_iter().map(Into::into).collect();
            (StatusCode::OK, Json(serde_json::json!(users)))
        }
        Err(e) => reply(map_account_error(&e)),
    }
}

/// Approve a dealer and provision their default subscription
#[utoipa::path(
    post,
    path = "/admin/users/{id}/approve",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Dealer approved", body = Object),
        (status = 404, description = "Dealer not found", body = Object),
        (status = 409, description = "Already active", body = Object)
    )
)]
pub(super) async fn approve_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Reply {
    let actor = actor_or_reject!(state, headers);
    match state.accounts.approve_user(&actor, id).await {
        Ok(dealer) => (StatusCode::OK, Json(dealer_json(dealer))),
        Err(e) => reply(map_account_error(&e)),
    }
}

#[utoipa::path(
    post,
    path = "/admin/users/{id}/reject",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Dealer rejected", body = UserResponse),
        (status = 404, description = "Dealer not found", body = Object)
    )
)]
pub(super) async fn reject_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Reply {
    let actor = actor_or_reject!(state, headers);
    match state.accounts.reject_user(&actor, id).await {
        Ok(user) => (StatusCode::OK, Json(serde_json::json!(UserResponse::from(user)))),
        Err(e) => reply(map_account_error(&e)),
    }
}

#[utoipa::path(
    get,
    path = "/admin/dealers",
    tag = "Admin",
    responses(
        (status = 200, description = "Dealers with their subscriptions", body = Object),
        (status = 403, description = "Admins only", body = Object)
    )
)]
pub(super) async fn list_dealers(State(state): State<AppState>, headers: HeaderMap) -> Reply {
    let actor = actor_or_reject!(state, headers);
    match state.accounts.list_dealers(&actor).await {
        Ok(dealers) => {
            let dealers: Vec<serde_json::Value> = dealers.into_iter().map(dealer_json).collect();
            (StatusCode::OK, Json(serde_json::json!(dealers)))
        }
        Err(e) => reply(map_account_error(&e)),
    }
}

/// Dealer profile with subscription (admin, or the dealer themself)
#[utoipa::path(
    get,
    path = "/admin/dealers/{id}",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Dealer", body = Object),
        (status = 403, description = "Not allowed", body = Object),
        (status = 404, description = "Dealer not found", body = Object)
    )
)]
pub(super) async fn get_dealer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Reply {
    let actor = actor_or_reject!(state, headers);
    match state.accounts.get_dealer(&actor, id).await {
        Ok(dealer) => (StatusCode::OK, Json(dealer_json(dealer))),
        Err(e) => reply(map_account_error(&e)),
    }
}

#[utoipa::path(
    patch,
    path = "/admin/dealers/{id}",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = DealerProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = UserResponse),
        (status = 400, description = "Invalid fields", body = Object),
        (status = 403, description = "Not allowed", body = Object)
    )
)]
pub(super) async fn update_dealer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<DealerProfileRequest>,
) -> Reply {
    let actor = actor_or_reject!(state, headers);
    if let Err(e) = req.validate() {
        return reply(map_request_validation(&e));
    }

    match state
        .accounts
        .update_dealer_profile(&actor, id, req.into())
        .await
    {
        Ok(user) => (StatusCode::OK, Json(serde_json::json!(UserResponse::from(user)))),
        Err(e) => reply(map_account_error(&e)),
    }
}

#[utoipa::path(
    delete,
    path = "/admin/dealers/{id}",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Dealer deleted", body = Object),
        (status = 404, description = "Dealer not found", body = Object)
    )
)]
pub(super) async fn delete_dealer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Reply {
    let actor = actor_or_reject!(state, headers);
    match state.accounts.delete_dealer(&actor, id).await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "status": "deleted" }))),
        Err(e) => reply(map_account_error(&e)),
    }
}

#[utoipa::path(
    get,
    path = "/admin/dashboard",
    tag = "Admin",
    responses(
        (status = 200, description = "Dealer, listing and revenue counters", body = Object),
        (status = 403, description = "Admins only", body = Object)
    )
)]
pub(super) async fn dashboard(State(state): State<AppState>, headers: HeaderMap) -> Reply {
    let actor = actor_or_reject!(state, headers);
    match state.accounts.dashboard(&actor).await {
        Ok(stats) => (StatusCode::OK, Json(serde_json::json!(stats))),
        Err(e) => reply(map_account_error(&e)),
    }
}

#[utoipa::path(
    get,
    path = "/admin/subscriptions",
    tag = "Subscriptions",
    responses(
        (status = 200, description = "All subscriptions", body = [SubscriptionResponse]),
        (status = 403, description = "Admins only", body = Object)
    )
)]
pub(super) async fn list_subscriptions(State(state): State<AppState>, headers: HeaderMap) -> Reply {
    let actor = actor_or_reject!(state, headers);
    match state.subscriptions.list(&actor).await {
        Ok(subs) => {
            let subs: Vec<serde_json::Value> = subs.into_iter().map(subscription_json).collect();
            (StatusCode::OK, Json(serde_json::json!(subs)))
        }
        Err(e) => reply(map_subscription_error(&e)),
    }
}

#[utoipa::path(
    post,
    path = "/admin/subscriptions",
    tag = "Subscriptions",
    request_body = AssignSubscriptionRequest,
    responses(
        (status = 201, description = "Subscription created", body = SubscriptionResponse),
        (status = 400, description = "Invalid plan or duration", body = Object),
        (status = 409, description = "User already subscribed", body = Object)
    )
)]
pub(super) async fn assign_subscription(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AssignSubscriptionRequest>,
) -> Reply {
    let actor = actor_or_reject!(state, headers);
    if let Err(e) = req.validate() {
        return reply(map_request_validation(&e));
    }
    let Some(plan) = parse_plan(&req.plan) else {
        return reply(invalid_plan());
    };

    match state
        .subscriptions
        .assign(&actor, req.user_id, plan, req.days)
        .await
    {
        Ok(sub) => (StatusCode::CREATED, Json(subscription_json(sub))),
        Err(e) => reply(map_subscription_error(&e)),
    }
}

#[utoipa::path(
    post,
    path = "/admin/subscriptions/{id}/activate",
    tag = "Subscriptions",
    params(("id" = Uuid, Path, description = "Subscription ID")),
    responses(
        (status = 200, description = "Activated", body = SubscriptionResponse),
        (status = 404, description = "Subscription not found", body = Object)
    )
)]
pub(super) async fn activate_subscription(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Reply {
    let actor = actor_or_reject!(state, headers);
    match state.subscriptions.activate(&actor, id).await {
        Ok(sub) => (StatusCode::OK, Json(subscription_json(sub))),
        Err(e) => reply(map_subscription_error(&e)),
    }
}

#[utoipa::path(
    post,
    path = "/admin/subscriptions/{id}/deactivate",
    tag = "Subscriptions",
    params(("id" = Uuid, Path, description = "Subscription ID")),
    responses(
        (status = 200, description = "Deactivated", body = SubscriptionResponse),
        (status = 404, description = "Subscription not found", body = Object)
    )
)]
pub(super) async fn deactivate_subscription(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Reply {
    let actor = actor_or_reject!(state, headers);
    match state.subscriptions.deactivate(&actor, id).await {
        Ok(sub) => (StatusCode::OK, Json(subscription_json(sub))),
        Err(e) => reply(map_subscription_error(&e)),
    }
}

#[utoipa::path(
    post,
    path = "/admin/subscriptions/{id}/cancel",
    tag = "Subscriptions",
    params(("id" = Uuid, Path, description = "Subscription ID")),
    responses(
        (status = 200, description = "Cancelled", body = SubscriptionResponse),
        (status = 404, description = "Subscription not found", body = Object)
    )
)]
pub(super) async fn cancel_subscription(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Reply {
    let actor = actor_or_reject!(state, headers);
    match state.subscriptions.cancel(&actor, id).await {
        Ok(sub) => (StatusCode::OK, Json(subscription_json(sub))),
        Err(e) => reply(map_subscription_error(&e)),
    }
}

/// Push the end date out by a number of days
#[utoipa::path(
    post,
    path = "/admin/subscriptions/{id}/extend",
    tag = "Subscriptions",
    params(("id" = Uuid, Path, description = "Subscription ID")),
    request_body = ExtendSubscriptionRequest,
    responses(
        (status = 200, description = "Extended", body = SubscriptionResponse),
        (status = 400, description = "Invalid duration", body = Object),
        (status = 404, description = "Subscription not found", body = Object)
    )
)]
pub(super) async fn extend_subscription(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<ExtendSubscriptionRequest>,
) -> Reply {
    let actor = actor_or_reject!(state, headers);
    if let Err(e) = req.validate() {
        return reply(map_request_validation(&e));
    }

    match state.subscriptions.extend(&actor, id, req.days).await {
        Ok(sub) => (StatusCode::OK, Json(subscription_json(sub))),
        Err(e) => reply(map_subscription_error(&e)),
    }
}

/// Switch plan; the listing limit follows the plan
#[utoipa::path(
    post,
    path = "/admin/subscriptions/{id}/plan",
    tag = "Subscriptions",
    params(("id" = Uuid, Path, description = "Subscription ID")),
    request_body = ChangePlanRequest,
    responses(
        (status = 200, description = "Plan changed", body = SubscriptionResponse),
        (status = 400, description = "Invalid plan", body = Object),
        (status = 404, description = "Subscription not found", body = Object)
    )
)]
pub(super) async fn change_subscription_plan(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<ChangePlanRequest>,
) -> Reply {
    let actor = actor_or_reject!(state, headers);
    let Some(plan) = parse_plan(&req.plan) else {
        return reply(invalid_plan());
    };

    match state.subscriptions.change_plan(&actor, id, plan).await {
        Ok(sub) => (StatusCode::OK, Json(subscription_json(sub))),
        Err(e) => reply(map_subscription_error(&e)),
    }
}

/// A dealer's subscription (admin, or the dealer themself)
#[utoipa::path(
    get,
    path = "/subscriptions/user/{id}",
    tag = "Subscriptions",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Subscription, or null when none", body = Object),
        (status = 403, description = "Not allowed", body = Object)
    )
)]
pub(super) async fn user_subscription(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Reply {
    let actor = actor_or_reject!(state, headers);
    match state.subscriptions.for_user(&actor, id).await {
        Ok(sub) => (
            StatusCode::OK,
            Json(sub.map(subscription_json).unwrap_or(serde_json::Value::Null)),
        ),
        Err(e) => reply(map_subscription_error(&e)),
    }
}
