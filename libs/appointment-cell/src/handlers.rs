use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Duration;
use serde_json::{json, Value};

use shared_models::auth::User;
use shared_models::error::{AppError, SchedulingError};
use shared_utils::extractor::{caller_doctor_id, caller_patient_id, require_doctor, require_patient};

use crate::models::{
    AvailableSlotsQuery, BookAppointmentRequest, DoctorCancelRequest, OwnershipScope,
    RescheduleAppointmentRequest,
};
use crate::services::BookingRequest;
use crate::AppointmentState;

fn appointment_not_found() -> AppError {
    AppError::NotFound("Appointment not found".to_string())
}

// ==============================================================================
// SLOT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppointmentState>>,
    Path(doctor_id): Path<i64>,
    Query(query): Query<AvailableSlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let minutes = query
        .duration_minutes
        .unwrap_or(state.config.scheduling.slot_duration_minutes);
    let duration = Duration::try_minutes(minutes)
        .ok_or_else(|| SchedulingError::configuration("duration_minutes is out of range"))?;

    let slots = state
        .slots
        .generate_available_slots(doctor_id, query.date, duration)
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": query.date,
        "duration_minutes": minutes,
        "slots": slots,
    })))
}

// ==============================================================================
// BOOKING AND LIFECYCLE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let patient_id = match request.patient_id {
        Some(id) => id,
        None => caller_patient_id(&user)?,
    };
    require_patient(&user, patient_id)?;

    let appointment = state
        .booking
        .book(BookingRequest {
            patient_id,
            doctor_id: request.doctor_id,
            treatment_id: request.treatment_id,
            appointment_date: request.appointment_date,
            time_slot: request.time_slot,
            reference_number: request.reference_number,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(json!({
        "success": true,
        "appointment": appointment,
    }))))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<i64>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let scope = if let Ok(patient_id) = caller_patient_id(&user) {
        OwnershipScope::Patient(patient_id)
    } else {
        OwnershipScope::Doctor { doctor_id: caller_doctor_id(&user)?, patient_id: None }
    };

    let appointment = state
        .ledger
        .find_appointment(appointment_id, &scope)
        .await?
        .ok_or_else(appointment_not_found)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<i64>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let patient_id = caller_patient_id(&user)?;

    if !state.ledger.cancel_appointment(appointment_id, patient_id).await? {
        return Err(appointment_not_found());
    }

    Ok(Json(json!({
        "success": true,
        "appointment_id": appointment_id,
    })))
}

#[axum::debug_handler]
pub async fn doctor_cancel_appointment(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<i64>,
    Extension(user): Extension<User>,
    request: Option<Json<DoctorCancelRequest>>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = caller_doctor_id(&user)?;
    let patient_id = request.and_then(|Json(body)| body.patient_id);

    let cancelled = state
        .ledger
        .cancel_appointment_by_doctor(appointment_id, doctor_id, patient_id)
        .await?;
    if !cancelled {
        return Err(appointment_not_found());
    }

    Ok(Json(json!({
        "success": true,
        "appointment_id": appointment_id,
    })))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<i64>,
    Extension(user): Extension<User>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let patient_id = caller_patient_id(&user)?;

    let rescheduled = state
        .ledger
        .reschedule_appointment(appointment_id, patient_id, request.new_date, &request.new_time_slot)
        .await?;
    if !rescheduled {
        return Err(appointment_not_found());
    }

    Ok(Json(json!({
        "success": true,
        "appointment_id": appointment_id,
        "appointment_date": request.new_date,
        "time_slot": request.new_time_slot,
    })))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<i64>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = caller_doctor_id(&user)?;

    if !state.ledger.complete_appointment(appointment_id, doctor_id).await? {
        return Err(appointment_not_found());
    }

    Ok(Json(json!({
        "success": true,
        "appointment_id": appointment_id,
    })))
}

// ==============================================================================
// LISTING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_patient_appointments(
    State(state): State<Arc<AppointmentState>>,
    Path(patient_id): Path<i64>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_patient(&user, patient_id)?;

    let appointments = state.ledger.list_patient_appointments(patient_id).await?;

    Ok(Json(json!({
        "patient_id": patient_id,
        "appointments": appointments,
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_appointments(
    State(state): State<Arc<AppointmentState>>,
    Path(doctor_id): Path<i64>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_doctor(&user, doctor_id)?;

    let appointments = state.ledger.list_doctor_appointments(doctor_id).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "appointments": appointments,
    })))
}

#[axum::debug_handler]
pub async fn get_appointment_counts(
    State(state): State<Arc<AppointmentState>>,
    Path(doctor_id): Path<i64>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_doctor(&user, doctor_id)?;

    let counts = state.ledger.appointment_counts(doctor_id).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "counts": counts,
    })))
}
