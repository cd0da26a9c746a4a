use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};

use shared_config::SchedulingConfig;
use shared_models::error::{ConflictKind, SchedulingError};
use shared_utils::reference::generate_reference_number;

use crate::models::{Appointment, NewAppointment};
use crate::notification::EventKind;
use crate::services::ledger::{AppointmentLedger, Party};

/// A booking on behalf of a resolved patient.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub patient_id: i64,
    pub doctor_id: i64,
    pub treatment_id: Option<i64>,
    pub appointment_date: NaiveDate,
    pub time_slot: String,
    pub reference_number: Option<String>,
}

/// Booking policy around the ledger: date checks, reference tokens and the
/// confirmation to both parties.
pub struct BookingService {
    ledger: Arc<AppointmentLedger>,
    reference_retry_attempts: u32,
    reject_past_dates: bool,
}

impl BookingService {
    pub fn new(ledger: Arc<AppointmentLedger>, config: &SchedulingConfig) -> Self {
        Self {
            ledger,
            reference_retry_attempts: config.reference_retry_attempts,
            reject_past_dates: config.reject_past_dates,
        }
    }

    pub async fn book(&self, request: BookingRequest) -> Result<Appointment, SchedulingError> {
        debug!(
            "Booking {} {} with doctor {} for patient {}",
            request.appointment_date, request.time_slot, request.doctor_id, request.patient_id
        );

        if self.reject_past_dates && request.appointment_date < Utc::now().date_naive() {
            return Err(SchedulingError::configuration("appointment_date is in the past"));
        }

        // A caller-chosen reference is used as-is; only generated ones are retried.
        let caller_reference = request.reference_number.clone();
        let mut attempt = 0;

        let appointment = loop {
            attempt += 1;
            let reference_number = caller_reference
                .clone()
                .unwrap_or_else(generate_reference_number);

            let new = NewAppointment {
                patient_id: request.patient_id,
                doctor_id: request.doctor_id,
                treatment_id: request.treatment_id,
                appointment_date: request.appointment_date,
                time_slot: request.time_slot.clone(),
                reference_number,
            };

            match self.ledger.create_appointment(new).await {
                Ok(appointment) => break appointment,
                Err(SchedulingError::Conflict(ConflictKind::ReferenceTaken))
                    if caller_reference.is_none() && attempt <= self.reference_retry_attempts =>
                {
                    warn!("Generated reference collided (attempt {}), drawing a new one", attempt);
                }
                Err(e) => return Err(e),
            }
        };

        info!(
            "Booked appointment {} ({}) for patient {}",
            appointment.appointment_id, appointment.reference_number, appointment.patient_id
        );

        self.ledger.notify_party(&appointment, Party::Doctor, EventKind::AppointmentBooked);
        self.ledger.notify_party(&appointment, Party::Patient, EventKind::AppointmentBooked);

        Ok(appointment)
    }
}
