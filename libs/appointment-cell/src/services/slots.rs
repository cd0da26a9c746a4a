use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use tracing::debug;

use doctor_cell::models::Slot;
use doctor_cell::services::AvailabilityService;
use shared_models::error::SchedulingError;

use crate::services::ledger::AppointmentLedger;

/// Turns weekly availability into bookable slots for a concrete date.
pub struct SlotGenerator {
    availability: Arc<AvailabilityService>,
    ledger: Arc<AppointmentLedger>,
}

impl SlotGenerator {
    pub fn new(availability: Arc<AvailabilityService>, ledger: Arc<AppointmentLedger>) -> Self {
        Self { availability, ledger }
    }

    /// Free slots for the doctor on `date`, ordered by start time.
    ///
    /// Unknown doctors and days without availability both yield an empty
    /// list. Past dates are not rejected here. Labels booked by any
    /// appointment on that date are removed, cancelled ones included.
    pub async fn generate_available_slots(
        &self,
        doctor_id: i64,
        date: NaiveDate,
        slot_duration: Duration,
    ) -> Result<Vec<Slot>, SchedulingError> {
        if slot_duration <= Duration::zero() {
            return Err(SchedulingError::configuration("slot duration must be positive"));
        }

        let windows = self.availability.windows_on(doctor_id, date).await?;
        if windows.is_empty() {
            debug!("Doctor {} has no availability on {}", doctor_id, date);
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();
        let mut slots: Vec<Slot> = windows
            .iter()
            .flat_map(|window| window.tile(slot_duration))
            .filter(|slot| seen.insert(slot.label.clone()))
            .collect();
        slots.sort_by_key(|slot| (slot.start_time, slot.end_time));

        let booked: HashSet<String> = self
            .ledger
            .booked_slots(doctor_id, date)
            .await?
            .into_iter()
            .collect();
        slots.retain(|slot| !booked.contains(&slot.label));

        debug!(
            "Doctor {} has {} free slots on {} ({} booked)",
            doctor_id,
            slots.len(),
            date,
            booked.len()
        );
        Ok(slots)
    }
}
