use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{
    AttemptBookingRequest, AvailableSlotsQuery, CreateOverrideRequest, OverrideRangeQuery,
    UpsertWeeklyScheduleRequest,
};
use crate::services::AvailabilityService;

// ==============================================================================
// PUBLIC HANDLERS (NO AUTHENTICATION REQUIRED)
// ==============================================================================

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppConfig>>,
    Path(provider_id): Path<Uuid>,
    Query(query): Query<AvailableSlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let availability_service = AvailabilityService::new(&state, None);

    let resolution = availability_service
        .get_available_slots(provider_id, query.date, query.duration_minutes)
        .await?;

    let slots = resolution.labels();

    Ok(Json(json!({
        "provider_id": provider_id,
        "date": query.date,
        "duration_minutes": query.duration_minutes,
        "available_slots": slots,
        "total_slots": slots.len(),
        "reason": resolution.reason.map(|reason| reason.code()),
        "message": resolution.reason.map(|reason| reason.message())
    })))
}

#[axum::debug_handler]
pub async fn get_weekly_schedule(
    State(state): State<Arc<AppConfig>>,
    Path(provider_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let availability_service = AvailabilityService::new(&state, None);

    let schedule = availability_service.get_weekly_schedule(provider_id).await?;

    Ok(Json(json!({
        "provider_id": provider_id,
        "schedule": schedule,
        "total": schedule.len()
    })))
}

#[axum::debug_handler]
pub async fn get_overrides(
    State(state): State<Arc<AppConfig>>,
    Path(provider_id): Path<Uuid>,
    Query(query): Query<OverrideRangeQuery>,
) -> Result<Json<Value>, AppError> {
    let availability_service = AvailabilityService::new(&state, None);

    let overrides = availability_service
        .get_overrides(provider_id, query.start_date, query.end_date)
        .await?;

    Ok(Json(json!({
        "provider_id": provider_id,
        "overrides": overrides,
        "total": overrides.len()
    })))
}

// ==============================================================================
// PROTECTED HANDLERS (BEARER TOKEN FORWARDED TO THE STORE)
// ==============================================================================

#[axum::debug_handler]
pub async fn upsert_weekly_schedule(
    State(state): State<Arc<AppConfig>>,
    Path((provider_id, day_of_week)): Path<(Uuid, u8)>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<UpsertWeeklyScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let availability_service = AvailabilityService::new(&state, Some(auth.token()));

    let schedule = availability_service
        .upsert_weekly_schedule(provider_id, day_of_week, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "schedule": schedule
    })))
}

#[axum::debug_handler]
pub async fn delete_weekly_schedule(
    State(state): State<Arc<AppConfig>>,
    Path((provider_id, day_of_week)): Path<(Uuid, u8)>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let availability_service = AvailabilityService::new(&state, Some(auth.token()));

    availability_service
        .delete_weekly_schedule(provider_id, day_of_week)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Weekly schedule entry removed"
    })))
}

#[axum::debug_handler]
pub async fn create_override(
    State(state): State<Arc<AppConfig>>,
    Path(provider_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<CreateOverrideRequest>,
) -> Result<Json<Value>, AppError> {
    let availability_service = AvailabilityService::new(&state, Some(auth.token()));

    let created = availability_service.create_override(provider_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "override": created
    })))
}

#[axum::debug_handler]
pub async fn delete_override(
    State(state): State<Arc<AppConfig>>,
    Path((provider_id, override_id)): Path<(Uuid, Uuid)>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let availability_service = AvailabilityService::new(&state, Some(auth.token()));

    availability_service.delete_override(provider_id, override_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Override removed"
    })))
}

#[axum::debug_handler]
pub async fn attempt_booking(
    State(state): State<Arc<AppConfig>>,
    Path(provider_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<AttemptBookingRequest>,
) -> Result<Json<Value>, AppError> {
    let availability_service = AvailabilityService::new(&state, Some(auth.token()));

    let booking = availability_service
        .attempt_booking(provider_id, request.start_date_time, request.duration_minutes)
        .await?;

    Ok(Json(json!({
        "success": true,
        "booking": booking
    })))
}
