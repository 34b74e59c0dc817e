// ============================================================================
// Collectives API - Registration Handlers
// File: crates/collectives-api/src/handlers/registrations.rs
// ============================================================================
//! Registration commands. Every one of them is throttled per member.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use collectives_core::access::Placement;
use collectives_core::domain::{Absence, Registration, RegistrationLevel};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::extract::Ctx;
use crate::response::ApiResponse;
use crate::state::AppState;

/// Admit request payload
#[derive(Debug, Deserialize)]
pub struct AdmitRequest {
    pub user_id: Uuid,
    #[serde(default = "default_level")]
    pub level: RegistrationLevel,
}

fn default_level() -> RegistrationLevel {
    RegistrationLevel::Normal
}

#[derive(Debug, Deserialize)]
pub struct LevelRequest {
    pub level: RegistrationLevel,
}

#[derive(Debug, Deserialize)]
pub struct Outcome {
    pub registration_id: Uuid,
    pub absence: Absence,
}

/// Close request payload: one classification per absent registration
#[derive(Debug, Deserialize)]
pub struct CloseRequest {
    #[serde(default)]
    pub outcomes: Vec<Outcome>,
}

#[derive(Debug, Serialize)]
pub struct PlacementResponse {
    pub placement: Placement,
}

/// POST /api/v1/events/{id}/register
pub async fn register(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(event_id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Registration>>)> {
    let ctx = ctx.throttled(&state)?;
    let registration = state.registrations.self_register(&ctx, &event_id).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(registration))))
}

/// GET /api/v1/events/{id}/register
pub async fn check_register(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(event_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<PlacementResponse>>> {
    let placement = state.registrations.check_self_register(&ctx, &event_id).await?;
    Ok(Json(ApiResponse::success(PlacementResponse { placement })))
}

/// POST /api/v1/events/{id}/admit
pub async fn admit(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(event_id): Path<Uuid>,
    Json(payload): Json<AdmitRequest>,
) -> ApiResult<Json<ApiResponse<Registration>>> {
    let ctx = ctx.throttled(&state)?;
    let registration = state
        .registrations
        .leader_admit(&ctx, &event_id, &payload.user_id, payload.level)
        .await?;
    Ok(Json(ApiResponse::success(registration)))
}

/// POST /api/v1/registrations/{id}/cancel
pub async fn cancel(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(registration_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Registration>>> {
    let ctx = ctx.throttled(&state)?;
    let registration = state.registrations.cancel(&ctx, &registration_id).await?;
    Ok(Json(ApiResponse::success(registration)))
}

/// POST /api/v1/registrations/{id}/reject
pub async fn reject(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(registration_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Registration>>> {
    let ctx = ctx.throttled(&state)?;
    let registration = state.registrations.reject(&ctx, &registration_id).await?;
    Ok(Json(ApiResponse::success(registration)))
}

/// POST /api/v1/registrations/{id}/level
pub async fn change_level(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(registration_id): Path<Uuid>,
    Json(payload): Json<LevelRequest>,
) -> ApiResult<Json<ApiResponse<Registration>>> {
    let ctx = ctx.throttled(&state)?;
    let registration = state
        .registrations
        .change_level(&ctx, &registration_id, payload.level)
        .await?;
    Ok(Json(ApiResponse::success(registration)))
}

/// DELETE /api/v1/registrations/{id}
pub async fn delete(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(registration_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let ctx = ctx.throttled(&state)?;
    state.registrations.delete_registration(&ctx, &registration_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/events/{id}/close
pub async fn close_event(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(event_id): Path<Uuid>,
    Json(payload): Json<CloseRequest>,
) -> ApiResult<Json<ApiResponse<Vec<Registration>>>> {
    let ctx = ctx.throttled(&state)?;
    let outcomes: Vec<(Uuid, Absence)> = payload
        .outcomes
        .into_iter()
        .map(|o| (o.registration_id, o.absence))
        .collect();
    let registrations = state.registrations.close_event(&ctx, &event_id, &outcomes).await?;
    Ok(Json(ApiResponse::success(registrations)))
}

/// POST /api/v1/registrations/{id}/payment/confirmed
pub async fn payment_confirmed(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(registration_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Registration>>> {
    let ctx = ctx.throttled(&state)?;
    let registration = state.registrations.payment_confirmed(&ctx, &registration_id).await?;
    Ok(Json(ApiResponse::success(registration)))
}

/// POST /api/v1/registrations/{id}/payment/expired
pub async fn payment_expired(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(registration_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let ctx = ctx.throttled(&state)?;
    state.registrations.payment_expired(&ctx, &registration_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
