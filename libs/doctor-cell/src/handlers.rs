use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::require_doctor;

use crate::models::{AvailabilityRequest, DeleteAvailabilityRequest};
use crate::DoctorState;

// ==============================================================================
// AVAILABILITY HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_doctor_availability(
    State(state): State<Arc<DoctorState>>,
    Path(doctor_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let windows = state.availability.list_availability(doctor_id).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "availability": windows,
    })))
}

#[axum::debug_handler]
pub async fn create_availability(
    State(state): State<Arc<DoctorState>>,
    Path(doctor_id): Path<i64>,
    Extension(user): Extension<User>,
    Json(request): Json<AvailabilityRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_doctor(&user, doctor_id)?;

    let created = state.availability.add_availability(doctor_id, request).await?;

    Ok((StatusCode::CREATED, Json(json!({
        "success": true,
        "availability": created,
    }))))
}

#[axum::debug_handler]
pub async fn update_availability(
    State(state): State<Arc<DoctorState>>,
    Path((doctor_id, availability_id)): Path<(i64, i64)>,
    Extension(user): Extension<User>,
    Json(request): Json<AvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    require_doctor(&user, doctor_id)?;

    let replaced = state
        .availability
        .update_availability(doctor_id, availability_id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "replaced_id": availability_id,
        "availability": replaced,
    })))
}

#[axum::debug_handler]
pub async fn delete_availability(
    State(state): State<Arc<DoctorState>>,
    Path(doctor_id): Path<i64>,
    Extension(user): Extension<User>,
    Json(request): Json<DeleteAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    require_doctor(&user, doctor_id)?;

    let deleted = state
        .availability
        .delete_availability(doctor_id, &request.availability_ids)
        .await?;

    Ok(Json(json!({
        "success": true,
        "deleted": deleted,
    })))
}
