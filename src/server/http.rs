use super::http_admin;
use super::http_auth::{extract_bearer_token, optional_user, require_user};
use super::http_errors::{bad_request, map_account_error, map_request_validation};
use super::http_listings;
use super::http_parse::{parse_area, route_decision_label};
use super::http_types::*;
use super::state::AppState;
use crate::application::Registration;
use crate::domain::{guard_route, Actor};
use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::{header::HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use validator::Validate;

/// Photos and voice notes go through the API, so the body limit is raised above axum's 2 MB.
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

pub(super) type Reply = (StatusCode, Json<serde_json::Value>);

pub(super) fn reply((status, body): (StatusCode, serde_json::Value)) -> Reply {
    (status, Json(body))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(register))
        .route("/auth/sign-in", post(sign_in))
        .route("/auth/sign-out", post(sign_out))
        .route("/me", get(me))
        .route("/me/quota", get(http_listings::my_quota))
        .route("/me/route/:area", get(route_guard))
        .route("/media/images", post(http_listings::upload_image))
        .route(
            "/listings",
            get(http_listings::list_listings).post(http_listings::submit_listing),
        )
        .route("/listing-options/:field", get(http_listings::listing_options))
        .route(
            "/listings/:id",
            get(http_listings::get_listing)
                .patch(http_listings::update_listing)
                .delete(http_listings::delete_listing),
        )
        .route("/listings/:id/media", get(http_listings::listing_media))
        .route("/listings/:id/audio/:kind", post(http_listings::upload_audio))
        .route("/listings/:id/approve", post(http_listings::approve_listing))
        .route("/listings/:id/reject", post(http_listings::reject_listing))
        .route("/admin/users/pending", get(http_admin::pending_users))
        .route("/admin/users/:id/approve", post(http_admin::approve_user))
        .route("/admin/users/:id/reject", post(http_admin::reject_user))
        .route("/admin/dealers", get(http_admin::list_dealers))
        .route(
            "/admin/dealers/:id",
            get(http_admin::get_dealer)
                .patch(http_admin::update_dealer)
                .delete(http_admin::delete_dealer),
        )
        .route("/admin/dashboard", get(http_admin::dashboard))
        .route(
            "/admin/subscriptions",
            get(http_admin::list_subscriptions).post(http_admin::assign_subscription),
        )
        .route(
            "/admin/subscriptions/:id/activate",
            post(http_admin::activate_subscription),
        )
        .route(
            "/admin/subscriptions/:id/deactivate",
            post(http_admin::deactivate_subscription),
        )
        .route(
            "/admin/subscriptions/:id/cancel",
            post(http_admin::cancel_subscription),
        )
        .route(
            "/admin/subscriptions/:id/extend",
            post(http_admin::extend_subscription),
        )
        .route(
            "/admin/subscriptions/:id/plan",
            post(http_admin::change_subscription_plan),
        )
        .route(
            "/subscriptions/user/:id",
            get(http_admin::user_subscription),
        )
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        register,
        sign_in,
        sign_out,
        me,
        route_guard,
        http_listings::my_quota,
        http_listings::upload_image,
        http_listings::list_listings,
        http_listings::submit_listing,
        http_listings::listing_options,
        http_listings::get_listing,
        http_listings::update_listing,
        http_listings::delete_listing,
        http_listings::listing_media,
        http_listings::upload_audio,
        http_listings::approve_listing,
        http_listings::reject_listing,
        http_admin::pending_users,
        http_admin::approve_user,
        http_admin::reject_user,
        http_admin::list_dealers,
        http_admin::get_dealer,
        http_admin::update_dealer,
        http_admin::delete_dealer,
        http_admin::dashboard,
        http_admin::list_subscriptions,
        http_admin::assign_subscription,
        http_admin::activate_subscription,
        http_admin::deactivate_subscription,
        http_admin::cancel_subscription,
        http_admin::extend_subscription,
        http_admin::change_subscription_plan,
        http_admin::user_subscription,
    ),
    components(
        schemas(
            HealthResponse,
            RegisterRequest,
            SignInRequest,
            SessionResponse,
            UserResponse,
            SubscriptionResponse,
            QuotaResponse,
            AssignSubscriptionRequest,
            ExtendSubscriptionRequest,
            ChangePlanRequest,
            DealerProfileRequest,
            RouteResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Auth", description = "Registration and sessions"),
        (name = "Listings", description = "Car listing submission, search and review"),
        (name = "Admin", description = "Dealer administration and dashboard"),
        (name = "Subscriptions", description = "Dealer plans and quotas"),
    ),
    info(
        title = "Dealer Market API",
        version = "0.1.0",
        description = "API for the used-car dealer marketplace",
        license(name = "MIT")
    )
)]
struct ApiDoc;

/// Health check endpoint
///
/// Verifies database connectivity and returns service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse)
    )
)]
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match sqlx::query("SELECT 1").fetch_one(&state.pool).await {
        Ok(_) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy".to_string(),
                error: None,
            }),
        ),
        Err(e) => {
            error!(error = %e, "Health check failed: DB connectivity issue");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unhealthy".to_string(),
                    error: Some("Database connectivity failed".to_string()),
                }),
            )
        }
    }
}

/// Register a dealer account (starts pending)
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, awaiting approval", body = UserResponse),
        (status = 400, description = "Invalid fields", body = Object),
        (status = 409, description = "Email already registered", body = Object)
    )
)]
async fn register(State(state): State<AppState>, Json(req): Json<RegisterRequest>) -> impl IntoResponse {
    if let Err(e) = req.validate() {
        return reply(map_request_validation(&e));
    }

    let registration = Registration {
        name: req.name,
        email: req.email,
        phone: req.phone,
        password: req.password,
    };

    match state.accounts.register(registration).await {
        Ok(user) => (
            StatusCode::CREATED,
            Json(serde_json::json!(UserResponse::from(user))),
        ),
        Err(e) => reply(map_account_error(&e)),
    }
}

#[utoipa::path(
    post,
    path = "/auth/sign-in",
    tag = "Auth",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in", body = SessionResponse),
        (status = 400, description = "Invalid fields", body = Object),
        (status = 401, description = "Invalid email or password", body = Object)
    )
)]
async fn sign_in(State(state): State<AppState>, Json(req): Json<SignInRequest>) -> impl IntoResponse {
    if let Err(e) = req.validate() {
        return reply(map_request_validation(&e));
    }

    match state.accounts.sign_in(&req.email, &req.password).await {
        Ok(session) => {
            info!(user_id = %session.user.id, "Session started");
            (
                StatusCode::OK,
                Json(serde_json::json!(SessionResponse {
                    token: session.token,
                    user: session.user.into(),
                })),
            )
        }
        Err(e) => reply(map_account_error(&e)),
    }
}

#[utoipa::path(
    post,
    path = "/auth/sign-out",
    tag = "Auth",
    responses(
        (status = 200, description = "Session ended", body = Object),
        (status = 401, description = "Missing session token", body = Object)
    )
)]
async fn sign_out(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let Some(token) = extract_bearer_token(&headers) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "Missing or invalid authorization token" })),
        );
    };

    match state.accounts.sign_out(token).await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "status": "signed_out" }))),
        Err(e) => reply(map_account_error(&e)),
    }
}

/// The signed-in user
#[utoipa::path(
    get,
    path = "/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Sign in required", body = Object)
    )
)]
async fn me(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    match require_user(&state, &headers).await {
        Ok(user) => (StatusCode::OK, Json(serde_json::json!(UserResponse::from(user)))),
        Err(rejection) => rejection,
    }
}

/// Where a user should land when opening an area of the app
#[utoipa::path(
    get,
    path = "/me/route/{area}",
    tag = "Auth",
    params(("area" = String, Path, description = "`admin` or `dealer`")),
    responses(
        (status = 200, description = "Routing decision", body = RouteResponse),
        (status = 400, description = "Unknown area", body = Object)
    )
)]
async fn route_guard(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(area): Path<String>,
) -> impl IntoResponse {
    let Some(area) = parse_area(&area) else {
        return reply(bad_request("Unknown area"));
    };

    let user = match optional_user(&state, &headers).await {
        Ok(user) => user,
        Err(rejection) => return rejection,
    };
    let actor = user.as_ref().map(Actor::from);
    let decision = guard_route(actor.as_ref(), area);

    (
        StatusCode::OK,
        Json(serde_json::json!(RouteResponse {
            decision: route_decision_label(decision).to_string(),
        })),
    )
}
