use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use doctor_cell::models::Slot;
use shared_config::SchedulingConfig;
use shared_models::error::{ConflictKind, SchedulingError};

use crate::directory::Directory;
use crate::models::{Appointment, AppointmentCounts, NewAppointment, OwnershipScope};
pub use crate::notification::Party;
use crate::notification::{EventKind, NotificationDispatcher};
use crate::services::lifecycle::LifecycleAction;
use crate::store::{AppointmentRepository, TransitionOutcome};

/// The authoritative appointment record.
///
/// Every write goes through the repository as one unit of work; conflicts
/// come back as `SchedulingError::Conflict`. Notifications are queued only
/// after the write committed and never affect the result.
pub struct AppointmentLedger {
    repository: Arc<dyn AppointmentRepository>,
    directory: Arc<dyn Directory>,
    notifications: NotificationDispatcher,
    sequence_retry_attempts: u32,
}

impl AppointmentLedger {
    pub fn new(
        repository: Arc<dyn AppointmentRepository>,
        directory: Arc<dyn Directory>,
        notifications: NotificationDispatcher,
        config: &SchedulingConfig,
    ) -> Self {
        Self {
            repository,
            directory,
            notifications,
            sequence_retry_attempts: config.sequence_retry_attempts,
        }
    }

    pub async fn create_appointment(&self, new: NewAppointment) -> Result<Appointment, SchedulingError> {
        debug!(
            "Creating appointment: patient {}, doctor {}, {} {}",
            new.patient_id, new.doctor_id, new.appointment_date, new.time_slot
        );

        validate_time_slot(&new.time_slot)?;

        if self.directory.find_patient(new.patient_id).await?.is_none() {
            return Err(SchedulingError::not_found("Patient"));
        }
        if self.directory.find_doctor(new.doctor_id).await?.is_none() {
            return Err(SchedulingError::not_found("Doctor"));
        }
        if let Some(treatment_id) = new.treatment_id {
            if self.directory.find_treatment(treatment_id).await?.is_none() {
                return Err(SchedulingError::not_found("Treatment"));
            }
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.repository.insert_appointment(&new).await {
                Ok(appointment) => {
                    info!(
                        "Appointment {} ({}) created as #{} for patient {}",
                        appointment.appointment_id,
                        appointment.reference_number,
                        appointment.patient_appointment_no,
                        appointment.patient_id
                    );
                    return Ok(appointment);
                }
                Err(SchedulingError::Conflict(ConflictKind::SequenceRace))
                    if attempt <= self.sequence_retry_attempts =>
                {
                    warn!(
                        "Sequence race for patient {} (attempt {}), retrying",
                        new.patient_id, attempt
                    );
                }
                Err(e) => {
                    if let SchedulingError::Conflict(kind) = &e {
                        warn!("Appointment for patient {} rejected: {}", new.patient_id, kind);
                    }
                    return Err(e);
                }
            }
        }
    }

    /// `false` means "not found or not yours"; the two are indistinguishable.
    pub async fn cancel_appointment(&self, appointment_id: i64, patient_id: i64) -> Result<bool, SchedulingError> {
        debug!("Patient {} cancelling appointment {}", patient_id, appointment_id);

        let outcome = self
            .repository
            .apply_transition(appointment_id, &OwnershipScope::Patient(patient_id), &LifecycleAction::Cancel)
            .await?;

        Ok(self.finish(outcome, Party::Doctor, EventKind::AppointmentCancelled))
    }

    /// Cancellation from the doctor's side. `patient_id`, when given, must
    /// also match.
    pub async fn cancel_appointment_by_doctor(
        &self,
        appointment_id: i64,
        doctor_id: i64,
        patient_id: Option<i64>,
    ) -> Result<bool, SchedulingError> {
        debug!("Doctor {} cancelling appointment {}", doctor_id, appointment_id);

        let scope = OwnershipScope::Doctor { doctor_id, patient_id };
        let outcome = self
            .repository
            .apply_transition(appointment_id, &scope, &LifecycleAction::Cancel)
            .await?;

        Ok(self.finish(outcome, Party::Patient, EventKind::AppointmentCancelled))
    }

    /// Moves the appointment in place. Id, reference and sequence number are
    /// kept; a cancelled appointment comes back as scheduled.
    pub async fn reschedule_appointment(
        &self,
        appointment_id: i64,
        patient_id: i64,
        new_date: NaiveDate,
        new_time_slot: &str,
    ) -> Result<bool, SchedulingError> {
        debug!(
            "Patient {} rescheduling appointment {} to {} {}",
            patient_id, appointment_id, new_date, new_time_slot
        );
        validate_time_slot(new_time_slot)?;

        let action = LifecycleAction::Reschedule {
            appointment_date: new_date,
            time_slot: new_time_slot.to_string(),
        };
        let outcome = self
            .repository
            .apply_transition(appointment_id, &OwnershipScope::Patient(patient_id), &action)
            .await?;

        Ok(self.finish(outcome, Party::Doctor, EventKind::AppointmentRescheduled))
    }

    /// Marks a scheduled appointment completed, typically once its
    /// prescription is finalised.
    pub async fn complete_appointment(&self, appointment_id: i64, doctor_id: i64) -> Result<bool, SchedulingError> {
        let scope = OwnershipScope::Doctor { doctor_id, patient_id: None };
        let outcome = self
            .repository
            .apply_transition(appointment_id, &scope, &LifecycleAction::Complete)
            .await?;

        if let Some(TransitionOutcome { changed: true, .. }) = &outcome {
            info!("Appointment {} completed by doctor {}", appointment_id, doctor_id);
        }
        Ok(outcome.is_some())
    }

    pub async fn find_appointment(
        &self,
        appointment_id: i64,
        scope: &OwnershipScope,
    ) -> Result<Option<Appointment>, SchedulingError> {
        self.repository.find_appointment(appointment_id, scope).await
    }

    pub async fn list_patient_appointments(&self, patient_id: i64) -> Result<Vec<Appointment>, SchedulingError> {
        self.repository.list_for_patient(patient_id).await
    }

    pub async fn list_doctor_appointments(&self, doctor_id: i64) -> Result<Vec<Appointment>, SchedulingError> {
        self.repository.list_for_doctor(doctor_id).await
    }

    pub async fn appointment_counts(&self, doctor_id: i64) -> Result<AppointmentCounts, SchedulingError> {
        let appointments = self.repository.list_for_doctor(doctor_id).await?;
        Ok(AppointmentCounts::tally(&appointments))
    }

    /// Slot labels already taken for the doctor on `date`.
    pub async fn booked_slots(&self, doctor_id: i64, date: NaiveDate) -> Result<Vec<String>, SchedulingError> {
        self.repository.booked_slots(doctor_id, date).await
    }

    /// Queues a notification for one party. The address lookup and delivery
    /// happen on the notification worker.
    pub fn notify_party(&self, appointment: &Appointment, party: Party, kind: EventKind) {
        self.notifications.notify_party(appointment.clone(), party, kind);
    }

    fn finish(&self, outcome: Option<TransitionOutcome>, party: Party, kind: EventKind) -> bool {
        match outcome {
            None => false,
            Some(TransitionOutcome { appointment, changed }) => {
                if changed {
                    info!(
                        "Appointment {} is now {} ({})",
                        appointment.appointment_id, appointment.status, kind.as_str()
                    );
                    self.notify_party(&appointment, party, kind);
                }
                true
            }
        }
    }
}

fn validate_time_slot(time_slot: &str) -> Result<(), SchedulingError> {
    if Slot::parse_label(time_slot).is_none() {
        return Err(SchedulingError::configuration(format!(
            "time_slot '{}' must be formatted as HH:MM - HH:MM",
            time_slot
        )));
    }
    Ok(())
}
