use super::http::{reply, Reply};
use super::http_auth::require_actor;
use super::http_errors::{bad_request, map_listing_error};
use super::http_parse::{parse_audio_kind, parse_listing_field, parse_scope, parse_status};
use super::http_types::{ImageUploadQuery, ListingQuery, QuotaResponse, ScopeQuery};
use super::state::AppState;
use crate::domain::{ListingDraft, ListingUpdate};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, header::HeaderMap, StatusCode},
    Json,
};
use uuid::Uuid;

macro_rules! actor_or_reject {
    ($state:expr, $headers:expr) => {
        match require_actor(&$state, &$headers).await {
            Ok(actor) => actor,
            Err(rejection) => return rejection,
        }
    };
}

fn ok(value: serde_json::Value) -> Reply {
    (StatusCode::OK, Json(value))
}

/// The caller's listing quota
#[utoipa::path(
    get,
    path = "/me/quota",
    tag = "Subscriptions",
    responses(
        (status = 200, description = "Current quota", body = QuotaResponse),
        (status = 401, description = "Sign in required", body = Object)
    )
)]
pub(super) async fn my_quota(State(state): State<AppState>, headers: HeaderMap) -> Reply {
    let actor = actor_or_reject!(state, headers);
    match state.listings.quota(&actor).await {
        Ok(decision) => ok(serde_json::json!(QuotaResponse::from(decision))),
        Err(e) => reply(map_listing_error(&e)),
    }
}

/// Upload a listing photo; returns its public URL for the draft
#[utoipa::path(
    post,
    path = "/media/images",
    tag = "Listings",
    params(ImageUploadQuery),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 201, description = "Uploaded", body = Object),
        (status = 403, description = "Not an approved dealer", body = Object)
    )
)]
pub(super) async fn upload_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ImageUploadQuery>,
    body: Bytes,
) -> Reply {
    let actor = actor_or_reject!(state, headers);
    if body.is_empty() {
        return reply(bad_request("Empty upload"));
    }
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("image/jpeg")
        .to_string();

    match state
        .listings
        .upload_image(&actor, body.to_vec(), &query.file_name, &content_type)
        .await
    {
        Ok(url) => (StatusCode::CREATED, Json(serde_json::json!({ "url": url }))),
        Err(e) => reply(map_listing_error(&e)),
    }
}

/// Browse listings: scope, status tab and search filters
#[utoipa::path(
    get,
    path = "/listings",
    tag = "Listings",
    params(ListingQuery),
    responses(
        (status = 200, description = "Matching listings", body = Object),
        (status = 400, description = "Unknown scope or status", body = Object),
        (status = 403, description = "Scope not allowed", body = Object)
    )
)]
pub(super) async fn list_listings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListingQuery>,
) -> Reply {
    let actor = actor_or_reject!(state, headers);

    let Some(scope) = parse_scope(query.scope.as_deref()) else {
        return reply(bad_request("Invalid scope"));
    };
    let Ok(status) = parse_status(query.status.as_deref()) else {
        return reply(bad_request("Invalid status"));
    };
    let filters = query.filters(status);

    match state.listings.list(&actor, scope, &filters).await {
        Ok(listings) => ok(serde_json::json!({
            "listings": listings,
            "active_filters": filters.active_count(),
        })),
        Err(e) => reply(map_listing_error(&e)),
    }
}

/// Submit a listing for review
#[utoipa::path(
    post,
    path = "/listings",
    tag = "Listings",
    request_body = Object,
    responses(
        (status = 201, description = "Listing pending review", body = Object),
        (status = 400, description = "Invalid fields", body = Object),
        (status = 403, description = "Quota exhausted or not an approved dealer", body = Object)
    )
)]
pub(super) async fn submit_listing(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(draft): Json<ListingDraft>,
) -> Reply {
    let actor = actor_or_reject!(state, headers);
    match state.listings.submit(&actor, draft).await {
        Ok(listing) => (StatusCode::CREATED, Json(serde_json::json!(listing))),
        Err(e) => reply(map_listing_error(&e)),
    }
}

/// Distinct values of one field, for filter pickers
#[utoipa::path(
    get,
    path = "/listing-options/{field}",
    tag = "Listings",
    params(("field" = String, Path, description = "brand, model, color, fuel_type, transmission_type or rto_number"), ScopeQuery),
    responses(
        (status = 200, description = "Sorted distinct values", body = [String]),
        (status = 400, description = "Unknown field", body = Object)
    )
)]
pub(super) async fn listing_options(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(field): Path<String>,
    Query(query): Query<ScopeQuery>,
) -> Reply {
    let actor = actor_or_reject!(state, headers);
    let Some(field) = parse_listing_field(&field) else {
        return reply(bad_request("Unknown field"));
    };
    let Some(scope) = parse_scope(query.scope.as_deref()) else {
        return reply(bad_request("Invalid scope"));
    };

    match state.listings.field_options(&actor, scope, field).await {
        Ok(values) => ok(serde_json::json!(values)),
        Err(e) => reply(map_listing_error(&e)),
    }
}

#[utoipa::path(
    get,
    path = "/listings/{id}",
    tag = "Listings",
    params(("id" = Uuid, Path, description = "Listing ID")),
    responses(
        (status = 200, description = "Listing", body = Object),
        (status = 403, description = "Not visible to caller", body = Object),
        (status = 404, description = "Listing not found", body = Object)
    )
)]
pub(super) async fn get_listing(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Reply {
    let actor = actor_or_reject!(state, headers);
    match state.listings.get(&actor, id).await {
        Ok(listing) => ok(serde_json::json!(listing)),
        Err(e) => reply(map_listing_error(&e)),
    }
}

/// Edit a listing (owner or admin); the status is unchanged
#[utoipa::path(
    patch,
    path = "/listings/{id}",
    tag = "Listings",
    params(("id" = Uuid, Path, description = "Listing ID")),
    request_body = Object,
    responses(
        (status = 200, description = "Updated listing", body = Object),
        (status = 400, description = "Invalid fields", body = Object),
        (status = 403, description = "Not the owner", body = Object),
        (status = 404, description = "Listing not found", body = Object)
    )
)]
pub(super) async fn update_listing(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(update): Json<ListingUpdate>,
) -> Reply {
    let actor = actor_or_reject!(state, headers);
    match state.listings.update(&actor, id, update).await {
        Ok(listing) => ok(serde_json::json!(listing)),
        Err(e) => reply(map_listing_error(&e)),
    }
}

#[utoipa::path(
    delete,
    path = "/listings/{id}",
    tag = "Listings",
    params(("id" = Uuid, Path, description = "Listing ID")),
    responses(
        (status = 200, description = "Deleted", body = Object),
        (status = 403, description = "Not the owner", body = Object),
        (status = 404, description = "Listing not found", body = Object)
    )
)]
pub(super) async fn delete_listing(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Reply {
    let actor = actor_or_reject!(state, headers);
    match state.listings.delete(&actor, id).await {
        Ok(()) => ok(serde_json::json!({ "status": "deleted" })),
        Err(e) => reply(map_listing_error(&e)),
    }
}

#[utoipa::path(
    get,
    path = "/listings/{id}/media",
    tag = "Listings",
    params(("id" = Uuid, Path, description = "Listing ID")),
    responses(
        (status = 200, description = "Media attached to the listing", body = Object),
        (status = 403, description = "Not visible to caller", body = Object)
    )
)]
pub(super) async fn listing_media(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Reply {
    let actor = actor_or_reject!(state, headers);
    match state.listings.media(&actor, id).await {
        Ok(media) => ok(serde_json::json!(media)),
        Err(e) => reply(map_listing_error(&e)),
    }
}

/// Attach a repairs voice note (`repairs_needed` or `repairs_completed`)
#[utoipa::path(
    post,
    path = "/listings/{id}/audio/{kind}",
    tag = "Listings",
    params(
        ("id" = Uuid, Path, description = "Listing ID"),
        ("kind" = String, Path, description = "repairs_needed or repairs_completed")
    ),
    request_body(content = Vec<u8>, content_type = "audio/m4a"),
    responses(
        (status = 200, description = "Listing with audio attached", body = Object),
        (status = 400, description = "Unknown audio kind", body = Object),
        (status = 403, description = "Not the owner", body = Object)
    )
)]
pub(super) async fn upload_audio(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((id, kind)): Path<(Uuid, String)>,
    body: Bytes,
) -> Reply {
    let actor = actor_or_reject!(state, headers);
    let Some(kind) = parse_audio_kind(&kind) else {
        return reply(bad_request("Unknown audio kind"));
    };
    if body.is_empty() {
        return reply(bad_request("Empty upload"));
    }

    match state
        .listings
        .attach_audio(&actor, id, kind, body.to_vec())
        .await
    {
        Ok(listing) => ok(serde_json::json!(listing)),
        Err(e) => reply(map_listing_error(&e)),
    }
}

#[utoipa::path(
    post,
    path = "/listings/{id}/approve",
    tag = "Listings",
    params(("id" = Uuid, Path, description = "Listing ID")),
    responses(
        (status = 200, description = "Listing approved", body = Object),
        (status = 403, description = "Admins only", body = Object),
        (status = 409, description = "Already reviewed", body = Object)
    )
)]
pub(super) async fn approve_listing(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Reply {
    let actor = actor_or_reject!(state, headers);
    match state.listings.approve(&actor, id).await {
        Ok(listing) => ok(serde_json::json!(listing)),
        Err(e) => reply(map_listing_error(&e)),
    }
}

#[utoipa::path(
    post,
    path = "/listings/{id}/reject",
    tag = "Listings",
    params(("id" = Uuid, Path, description = "Listing ID")),
    responses(
        (status = 200, description = "Listing rejected", body = Object),
        (status = 403, description = "Admins only", body = Object),
        (status = 409, description = "Already reviewed", body = Object)
    )
)]
pub(super) async fn reject_listing(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Reply {
    let actor = actor_or_reject!(state, headers);
    match state.listings.reject(&actor, id).await {
        Ok(listing) => ok(serde_json::json!(listing)),
        Err(e) => reply(map_listing_error(&e)),
    }
}
