pub mod memory;
pub mod supabase;

use async_trait::async_trait;
use chrono::NaiveDate;

use shared_models::error::SchedulingError;

use crate::models::{Appointment, NewAppointment, OwnershipScope};
use crate::services::lifecycle::LifecycleAction;

pub use memory::InMemoryAppointmentStore;
pub use supabase::SupabaseAppointmentStore;

/// What a lifecycle write did to the row.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    pub appointment: Appointment,
    /// False when the action was an accepted no-op.
    pub changed: bool,
}

/// Storage for appointment rows.
///
/// Implementations enforce three unique indexes at write time:
/// (doctor_id, appointment_date, time_slot), (patient_id, patient_appointment_no)
/// and reference_number. Violations come back as `SchedulingError::Conflict`.
#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    /// Assigns `max(patient_appointment_no) + 1` and inserts, atomically.
    async fn insert_appointment(&self, new: &NewAppointment) -> Result<Appointment, SchedulingError>;

    /// `None` when the row is missing or outside `scope`.
    async fn find_appointment(
        &self,
        appointment_id: i64,
        scope: &OwnershipScope,
    ) -> Result<Option<Appointment>, SchedulingError>;

    /// Runs the lifecycle state machine and persists the result in one step.
    /// `None` when the row is missing or outside `scope`.
    async fn apply_transition(
        &self,
        appointment_id: i64,
        scope: &OwnershipScope,
        action: &LifecycleAction,
    ) -> Result<Option<TransitionOutcome>, SchedulingError>;

    /// Labels of every row for the doctor on `date`, whatever its status.
    async fn booked_slots(&self, doctor_id: i64, date: NaiveDate) -> Result<Vec<String>, SchedulingError>;

    /// Ordered by date, then slot.
    async fn list_for_patient(&self, patient_id: i64) -> Result<Vec<Appointment>, SchedulingError>;

    /// Ordered by appointment id.
    async fn list_for_doctor(&self, doctor_id: i64) -> Result<Vec<Appointment>, SchedulingError>;
}
