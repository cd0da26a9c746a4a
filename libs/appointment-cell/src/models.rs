use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub appointment_id: i64,
    pub patient_id: i64,
    pub doctor_id: i64,
    pub treatment_id: Option<i64>,
    pub patient_appointment_no: i32,
    pub appointment_date: NaiveDate,
    pub time_slot: String,
    pub reference_number: String,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the caller decides about a new appointment. The ledger assigns
/// the id, the per-patient sequence number and the timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAppointment {
    pub patient_id: i64,
    pub doctor_id: i64,
    pub treatment_id: Option<i64>,
    pub appointment_date: NaiveDate,
    pub time_slot: String,
    pub reference_number: String,
}

/// Who is allowed to see or touch an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipScope {
    Patient(i64),
    Doctor { doctor_id: i64, patient_id: Option<i64> },
}

impl OwnershipScope {
    pub fn admits(&self, appointment: &Appointment) -> bool {
        match *self {
            OwnershipScope::Patient(patient_id) => appointment.patient_id == patient_id,
            OwnershipScope::Doctor { doctor_id, patient_id } => {
                let patient_matches = match patient_id {
                    Some(id) => appointment.patient_id == id,
                    None => true,
                };
                appointment.doctor_id == doctor_id && patient_matches
            }
        }
    }

    /// PostgREST filters equivalent to `admits`.
    pub fn query_filter(&self) -> String {
        match *self {
            OwnershipScope::Patient(patient_id) => format!("patient_id=eq.{}", patient_id),
            OwnershipScope::Doctor { doctor_id, patient_id: None } => format!("doctor_id=eq.{}", doctor_id),
            OwnershipScope::Doctor { doctor_id, patient_id: Some(patient_id) } => {
                format!("doctor_id=eq.{}&patient_id=eq.{}", doctor_id, patient_id)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentCounts {
    pub total: usize,
    pub scheduled: usize,
    pub cancelled: usize,
    pub completed: usize,
}

impl AppointmentCounts {
    pub fn tally<'a>(appointments: impl IntoIterator<Item = &'a Appointment>) -> Self {
        appointments.into_iter().fold(Self::default(), |mut counts, appointment| {
            counts.total += 1;
            match appointment.status {
                AppointmentStatus::Scheduled => counts.scheduled += 1,
                AppointmentStatus::Cancelled => counts.cancelled += 1,
                AppointmentStatus::Completed => counts.completed += 1,
            }
            counts
        })
    }
}

// ==============================================================================
// DIRECTORY RECORDS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub patient_id: i64,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub doctor_id: i64,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Treatment {
    pub treatment_id: i64,
    pub doctor_id: i64,
    pub treatment_name: String,
}

// ==============================================================================
// REQUEST / RESPONSE MODELS
// ==============================================================================

/// A booking as the caller sees it. `reference_number` is optional; one is
/// generated when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub patient_id: Option<i64>,
    pub doctor_id: i64,
    pub treatment_id: Option<i64>,
    pub appointment_date: NaiveDate,
    pub time_slot: String,
    pub reference_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub new_date: NaiveDate,
    pub new_time_slot: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DoctorCancelRequest {
    pub patient_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailableSlotsQuery {
    pub date: NaiveDate,
    pub duration_minutes: Option<i64>,
}
