use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use shared_models::error::{ConflictKind, SchedulingError};

use crate::models::{Appointment, AppointmentStatus, NewAppointment, OwnershipScope};
use crate::services::lifecycle::{self, LifecycleAction, Transition};
use crate::store::{AppointmentRepository, TransitionOutcome};

type SlotKey = (i64, NaiveDate, String);

/// Rows plus the unique indexes over them.
#[derive(Debug, Default)]
struct LedgerTables {
    last_id: i64,
    rows: BTreeMap<i64, Appointment>,
    slots: HashMap<SlotKey, i64>,
    sequences: HashSet<(i64, i32)>,
    references: HashSet<String>,
    max_sequence: HashMap<i64, i32>,
}

impl LedgerTables {
    fn slot_holder(&self, doctor_id: i64, date: NaiveDate, time_slot: &str) -> Option<i64> {
        self.slots.get(&(doctor_id, date, time_slot.to_string())).copied()
    }

    fn insert(&mut self, new: &NewAppointment) -> Result<Appointment, SchedulingError> {
        if self.slot_holder(new.doctor_id, new.appointment_date, &new.time_slot).is_some() {
            return Err(SchedulingError::Conflict(ConflictKind::SlotAlreadyBooked));
        }
        if self.references.contains(&new.reference_number) {
            return Err(SchedulingError::Conflict(ConflictKind::ReferenceTaken));
        }

        let sequence = self.max_sequence.get(&new.patient_id).copied().unwrap_or(0) + 1;
        if self.sequences.contains(&(new.patient_id, sequence)) {
            return Err(SchedulingError::Conflict(ConflictKind::SequenceRace));
        }

        let now = Utc::now();
        self.last_id += 1;
        let appointment = Appointment {
            appointment_id: self.last_id,
            patient_id: new.patient_id,
            doctor_id: new.doctor_id,
            treatment_id: new.treatment_id,
            patient_appointment_no: sequence,
            appointment_date: new.appointment_date,
            time_slot: new.time_slot.clone(),
            reference_number: new.reference_number.clone(),
            status: AppointmentStatus::Scheduled,
            created_at: now,
            updated_at: now,
        };

        self.slots.insert(
            (appointment.doctor_id, appointment.appointment_date, appointment.time_slot.clone()),
            appointment.appointment_id,
        );
        self.sequences.insert((appointment.patient_id, sequence));
        self.references.insert(appointment.reference_number.clone());
        self.max_sequence.insert(appointment.patient_id, sequence);
        self.rows.insert(appointment.appointment_id, appointment.clone());

        Ok(appointment)
    }

    fn transition(
        &mut self,
        appointment_id: i64,
        scope: &OwnershipScope,
        action: &LifecycleAction,
    ) -> Result<Option<TransitionOutcome>, SchedulingError> {
        let current = match self.rows.get(&appointment_id) {
            Some(row) if scope.admits(row) => row.clone(),
            _ => return Ok(None),
        };

        let status = match lifecycle::apply(current.status, action)? {
            Transition::NoOp => {
                return Ok(Some(TransitionOutcome { appointment: current, changed: false }));
            }
            Transition::Changed(status) => status,
        };

        let mut updated = current.clone();
        updated.status = status;
        updated.updated_at = Utc::now();

        if let LifecycleAction::Reschedule { appointment_date, time_slot } = action {
            match self.slot_holder(current.doctor_id, *appointment_date, time_slot) {
                Some(holder) if holder != appointment_id => {
                    warn!("Reschedule of {} collides with appointment {}", appointment_id, holder);
                    return Err(SchedulingError::Conflict(ConflictKind::SlotAlreadyBooked));
                }
                _ => {}
            }

            self.slots
                .remove(&(current.doctor_id, current.appointment_date, current.time_slot.clone()));
            self.slots
                .insert((current.doctor_id, *appointment_date, time_slot.clone()), appointment_id);
            updated.appointment_date = *appointment_date;
            updated.time_slot = time_slot.clone();
        }

        self.rows.insert(appointment_id, updated.clone());
        Ok(Some(TransitionOutcome { appointment: updated, changed: true }))
    }
}

/// Process-local ledger. One mutex guards every table, so each operation is
/// a unit of work: validate all indexes, then write, then release.
#[derive(Debug, Default)]
pub struct InMemoryAppointmentStore {
    tables: Mutex<LedgerTables>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppointmentRepository for InMemoryAppointmentStore {
    async fn insert_appointment(&self, new: &NewAppointment) -> Result<Appointment, SchedulingError> {
        let mut tables = self.tables.lock().await;
        let appointment = tables.insert(new)?;
        debug!(
            "Stored appointment {} as #{} for patient {}",
            appointment.appointment_id, appointment.patient_appointment_no, appointment.patient_id
        );
        Ok(appointment)
    }

    async fn find_appointment(
        &self,
        appointment_id: i64,
        scope: &OwnershipScope,
    ) -> Result<Option<Appointment>, SchedulingError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .rows
            .get(&appointment_id)
            .filter(|row| scope.admits(row))
            .cloned())
    }

    async fn apply_transition(
        &self,
        appointment_id: i64,
        scope: &OwnershipScope,
        action: &LifecycleAction,
    ) -> Result<Option<TransitionOutcome>, SchedulingError> {
        self.tables.lock().await.transition(appointment_id, scope, action)
    }

    async fn booked_slots(&self, doctor_id: i64, date: NaiveDate) -> Result<Vec<String>, SchedulingError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .rows
            .values()
            .filter(|row| row.doctor_id == doctor_id && row.appointment_date == date)
            .map(|row| row.time_slot.clone())
            .collect())
    }

    async fn list_for_patient(&self, patient_id: i64) -> Result<Vec<Appointment>, SchedulingError> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<_> = tables
            .rows
            .values()
            .filter(|row| row.patient_id == patient_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            (a.appointment_date, &a.time_slot).cmp(&(b.appointment_date, &b.time_slot))
        });
        Ok(rows)
    }

    async fn list_for_doctor(&self, doctor_id: i64) -> Result<Vec<Appointment>, SchedulingError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .rows
            .values()
            .filter(|row| row.doctor_id == doctor_id)
            .cloned()
            .collect())
    }
}
