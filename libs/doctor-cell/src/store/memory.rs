use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use shared_models::error::SchedulingError;

use crate::models::{AvailabilityRequest, AvailabilityWindow, DayOfWeek};
use crate::store::{sort_windows, AvailabilityRepository};

#[derive(Debug, Default)]
struct AvailabilityTable {
    last_id: i64,
    rows: BTreeMap<i64, AvailabilityWindow>,
}

impl AvailabilityTable {
    /// Builds the rows without touching the table so a failed batch leaves no trace.
    fn stage(&self, doctor_id: i64, request: &AvailabilityRequest) -> Result<Vec<AvailabilityWindow>, SchedulingError> {
        if request.start_time >= request.end_time {
            return Err(SchedulingError::configuration("start_time must be before end_time"));
        }

        Ok(request
            .days
            .iter()
            .zip(self.last_id + 1..)
            .map(|(day, availability_id)| AvailabilityWindow {
                availability_id,
                doctor_id,
                day_of_week: *day,
                start_time: request.start_time,
                end_time: request.end_time,
            })
            .collect())
    }

    fn commit(&mut self, rows: &[AvailabilityWindow]) {
        for row in rows {
            self.last_id = self.last_id.max(row.availability_id);
            self.rows.insert(row.availability_id, row.clone());
        }
    }
}

/// Process-local availability table. Slot readers share the read lock.
#[derive(Debug, Default)]
pub struct InMemoryAvailabilityStore {
    table: RwLock<AvailabilityTable>,
}

impl InMemoryAvailabilityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AvailabilityRepository for InMemoryAvailabilityStore {
    async fn insert_windows(
        &self,
        doctor_id: i64,
        request: &AvailabilityRequest,
    ) -> Result<Vec<AvailabilityWindow>, SchedulingError> {
        let mut table = self.table.write().await;
        let rows = table.stage(doctor_id, request)?;
        table.commit(&rows);
        debug!("Inserted {} availability rows for doctor {}", rows.len(), doctor_id);
        Ok(rows)
    }

    async fn replace_window(
        &self,
        doctor_id: i64,
        availability_id: i64,
        request: &AvailabilityRequest,
    ) -> Result<Vec<AvailabilityWindow>, SchedulingError> {
        let mut table = self.table.write().await;

        let owned = table
            .rows
            .get(&availability_id)
            .is_some_and(|row| row.doctor_id == doctor_id);
        if !owned {
            return Err(SchedulingError::not_found("Availability"));
        }

        let rows = table.stage(doctor_id, request)?;
        table.rows.remove(&availability_id);
        table.commit(&rows);
        Ok(rows)
    }

    async fn delete_windows(&self, doctor_id: i64, availability_ids: &[i64]) -> Result<usize, SchedulingError> {
        let mut table = self.table.write().await;
        let before = table.rows.len();
        table
            .rows
            .retain(|id, row| !(row.doctor_id == doctor_id && availability_ids.contains(id)));
        Ok(before - table.rows.len())
    }

    async fn windows_for_day(&self, doctor_id: i64, day: DayOfWeek) -> Result<Vec<AvailabilityWindow>, SchedulingError> {
        let table = self.table.read().await;
        let mut windows: Vec<_> = table
            .rows
            .values()
            .filter(|row| row.doctor_id == doctor_id && row.day_of_week == day)
            .cloned()
            .collect();
        sort_windows(&mut windows);
        Ok(windows)
    }

    async fn list_windows(&self, doctor_id: i64) -> Result<Vec<AvailabilityWindow>, SchedulingError> {
        let table = self.table.read().await;
        let mut windows: Vec<_> = table
            .rows
            .values()
            .filter(|row| row.doctor_id == doctor_id)
            .cloned()
            .collect();
        sort_windows(&mut windows);
        Ok(windows)
    }
}
