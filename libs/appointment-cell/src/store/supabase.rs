use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, SecondsFormat};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use shared_database::supabase::{SupabaseClient, SupabaseError};
use shared_models::error::{ConflictKind, SchedulingError};

use crate::models::{Appointment, NewAppointment, OwnershipScope};
use crate::services::lifecycle::{self, LifecycleAction, Transition};
use crate::store::{AppointmentRepository, TransitionOutcome};

const TABLE: &str = "/rest/v1/appointments";

#[derive(Debug, Deserialize)]
struct BookedSlot {
    time_slot: String,
}

/// Ledger rows in the `appointments` table.
///
/// Creation goes through the `create_appointment` function so that numbering
/// and insert share one transaction. Lifecycle writes are compare-and-set on
/// `updated_at`.
pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn select(&self, query: String) -> Result<Vec<Appointment>, SchedulingError> {
        let path = format!("{}?{}", TABLE, query);
        self.supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(map_supabase_error)
    }
}

/// Maps the violated constraint onto the conflict it represents.
fn conflict_for(constraint: &str) -> Option<ConflictKind> {
    match constraint {
        "unique_doctor_timeslot" => Some(ConflictKind::SlotAlreadyBooked),
        "unique_patient_appointment_no" => Some(ConflictKind::SequenceRace),
        "appointments_reference_number_key" => Some(ConflictKind::ReferenceTaken),
        _ => None,
    }
}

fn map_supabase_error(err: SupabaseError) -> SchedulingError {
    if let Some(kind) = err.violated_constraint().and_then(conflict_for) {
        warn!("Appointment write rejected: {}", kind);
        return SchedulingError::Conflict(kind);
    }
    error!("Appointment storage failure: {}", err);
    SchedulingError::Storage(err.to_string())
}

#[async_trait]
impl AppointmentRepository for SupabaseAppointmentStore {
    async fn insert_appointment(&self, new: &NewAppointment) -> Result<Appointment, SchedulingError> {
        let args = json!({
            "p_patient_id": new.patient_id,
            "p_doctor_id": new.doctor_id,
            "p_treatment_id": new.treatment_id,
            "p_appointment_date": new.appointment_date,
            "p_time_slot": new.time_slot,
            "p_reference_number": new.reference_number,
        });

        debug!("Creating appointment for patient {} with doctor {}", new.patient_id, new.doctor_id);
        self.supabase
            .rpc("create_appointment", None, args)
            .await
            .map_err(map_supabase_error)
    }

    async fn find_appointment(
        &self,
        appointment_id: i64,
        scope: &OwnershipScope,
    ) -> Result<Option<Appointment>, SchedulingError> {
        let rows = self
            .select(format!("appointment_id=eq.{}&{}", appointment_id, scope.query_filter()))
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn apply_transition(
        &self,
        appointment_id: i64,
        scope: &OwnershipScope,
        action: &LifecycleAction,
    ) -> Result<Option<TransitionOutcome>, SchedulingError> {
        let Some(current) = self.find_appointment(appointment_id, scope).await? else {
            return Ok(None);
        };

        let status = match lifecycle::apply(current.status, action)? {
            Transition::NoOp => {
                return Ok(Some(TransitionOutcome { appointment: current, changed: false }));
            }
            Transition::Changed(status) => status,
        };

        let mut patch = json!({ "status": status });
        if let LifecycleAction::Reschedule { appointment_date, time_slot } = action {
            patch["appointment_date"] = json!(appointment_date);
            patch["time_slot"] = Value::String(time_slot.clone());
        }

        // Only succeeds if nobody wrote the row since we read it.
        let observed = current.updated_at.to_rfc3339_opts(SecondsFormat::AutoSi, true);
        let path = format!(
            "{}?appointment_id=eq.{}&{}&updated_at=eq.{}",
            TABLE,
            appointment_id,
            scope.query_filter(),
            observed
        );

        let updated: Vec<Appointment> = self
            .supabase
            .request_returning(Method::PATCH, &path, None, Some(patch))
            .await
            .map_err(map_supabase_error)?;

        match updated.into_iter().next() {
            Some(appointment) => Ok(Some(TransitionOutcome { appointment, changed: true })),
            None => {
                warn!("Appointment {} changed under a {}", appointment_id, action.name());
                Err(SchedulingError::Conflict(ConflictKind::ConcurrentUpdate))
            }
        }
    }

    async fn booked_slots(&self, doctor_id: i64, date: NaiveDate) -> Result<Vec<String>, SchedulingError> {
        let path = format!(
            "{}?doctor_id=eq.{}&appointment_date=eq.{}&select=time_slot",
            TABLE, doctor_id, date
        );
        let rows: Vec<BookedSlot> = self
            .supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(map_supabase_error)?;
        Ok(rows.into_iter().map(|row| row.time_slot).collect())
    }

    async fn list_for_patient(&self, patient_id: i64) -> Result<Vec<Appointment>, SchedulingError> {
        self.select(format!(
            "patient_id=eq.{}&order=appointment_date.asc,time_slot.asc",
            patient_id
        ))
        .await
    }

    async fn list_for_doctor(&self, doctor_id: i64) -> Result<Vec<Appointment>, SchedulingError> {
        self.select(format!("doctor_id=eq.{}&order=appointment_id.asc", doctor_id)).await
    }
}
