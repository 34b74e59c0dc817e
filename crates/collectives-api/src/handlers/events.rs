// ============================================================================
// Collectives API - Event Handlers
// File: crates/collectives-api/src/handlers/events.rs
// ============================================================================

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use collectives_core::domain::Event;
use collectives_core::services::EventDraft;
use serde::Serialize;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::extract::Ctx;
use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct VisibilityResponse {
    pub visible: bool,
}

/// POST /api/v1/events
pub async fn create(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Json(draft): Json<EventDraft>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Event>>)> {
    let event = state.events.create_event(&ctx, draft).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(event))))
}

/// PUT /api/v1/events/{id}
pub async fn update(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(event_id): Path<Uuid>,
    Json(draft): Json<EventDraft>,
) -> ApiResult<Json<ApiResponse<Event>>> {
    let event = state.events.update_event(&ctx, &event_id, draft).await?;
    Ok(Json(ApiResponse::success(event)))
}

/// GET /api/v1/events/{id}/visible
pub async fn visible(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(event_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<VisibilityResponse>>> {
    let visible = state.listings.event_visible_to(&ctx, &event_id).await?;
    Ok(Json(ApiResponse::success(VisibilityResponse { visible })))
}
