// ============================================================================
// Collectives API - Listing Handlers
// File: crates/collectives-api/src/handlers/listings.rs
// Description: Filter/sort/page listings; query keys follow
//              filters[i][field|value|type], sorters[0][field|dir], page, size
// ============================================================================

use axum::{
    extract::{Path, Query, State},
    Json,
};
use collectives_core::domain::Event;
use collectives_core::listing::{badges::BadgeRow, ListingParams};
use collectives_core::repositories::UserEventRow;
use collectives_shared::Page;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::extract::Ctx;
use crate::response::ApiResponse;
use crate::state::AppState;

/// Decoded query string, in order, with repeated keys kept.
pub type RawQuery = Query<Vec<(String, String)>>;

fn params(Query(pairs): RawQuery) -> ListingParams {
    ListingParams::from_pairs(pairs)
}

/// GET /api/v1/events
pub async fn events(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    query: RawQuery,
) -> ApiResult<Json<ApiResponse<Page<Event>>>> {
    let page = state.listings.list_events(&ctx, &params(query)).await?;
    Ok(Json(ApiResponse::success(page)))
}

/// GET /api/v1/leaders/{id}/events
pub async fn leader_events(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(leader_id): Path<Uuid>,
    query: RawQuery,
) -> ApiResult<Json<ApiResponse<Page<Event>>>> {
    let page = state
        .listings
        .list_leader_events(&ctx, &leader_id, &params(query))
        .await?;
    Ok(Json(ApiResponse::success(page)))
}

/// GET /api/v1/users/{id}/events
pub async fn user_events(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(user_id): Path<Uuid>,
    query: RawQuery,
) -> ApiResult<Json<ApiResponse<Page<UserEventRow>>>> {
    let page = state.listings.list_user_events(&ctx, &user_id, &params(query)).await?;
    Ok(Json(ApiResponse::success(page)))
}

/// GET /api/v1/badges
pub async fn badges(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    query: RawQuery,
) -> ApiResult<Json<ApiResponse<Page<BadgeRow>>>> {
    let page = state.listings.list_badges(&ctx, &params(query)).await?;
    Ok(Json(ApiResponse::success(page)))
}
