use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Timelike};
use tracing::{debug, info};

use shared_models::error::SchedulingError;

use crate::models::{AvailabilityRequest, AvailabilityWindow, DayOfWeek};
use crate::store::AvailabilityRepository;

/// A doctor's recurring weekly availability.
pub struct AvailabilityService {
    repository: Arc<dyn AvailabilityRepository>,
}

impl AvailabilityService {
    pub fn new(repository: Arc<dyn AvailabilityRepository>) -> Self {
        Self { repository }
    }

    /// Create one window per requested day. All rows are committed or none are.
    pub async fn add_availability(
        &self,
        doctor_id: i64,
        request: AvailabilityRequest,
    ) -> Result<Vec<AvailabilityWindow>, SchedulingError> {
        debug!("Adding availability for doctor {} on {:?}", doctor_id, request.days);
        validate_request(&request)?;

        let created = self.repository.insert_windows(doctor_id, &request).await?;
        info!("Added {} availability windows for doctor {}", created.len(), doctor_id);
        Ok(created)
    }

    /// Delete-and-recreate. The returned rows carry new ids.
    pub async fn update_availability(
        &self,
        doctor_id: i64,
        availability_id: i64,
        request: AvailabilityRequest,
    ) -> Result<Vec<AvailabilityWindow>, SchedulingError> {
        debug!("Replacing availability {} for doctor {}", availability_id, doctor_id);
        validate_request(&request)?;

        let replaced = self
            .repository
            .replace_window(doctor_id, availability_id, &request)
            .await?;
        info!(
            "Replaced availability {} for doctor {} with {} windows",
            availability_id, doctor_id, replaced.len()
        );
        Ok(replaced)
    }

    /// Removes windows owned by the doctor. Existing appointments are untouched.
    pub async fn delete_availability(
        &self,
        doctor_id: i64,
        availability_ids: &[i64],
    ) -> Result<usize, SchedulingError> {
        debug!("Deleting availability {:?} for doctor {}", availability_ids, doctor_id);

        let deleted = self.repository.delete_windows(doctor_id, availability_ids).await?;
        info!("Deleted {} availability windows for doctor {}", deleted, doctor_id);
        Ok(deleted)
    }

    pub async fn list_availability(&self, doctor_id: i64) -> Result<Vec<AvailabilityWindow>, SchedulingError> {
        self.repository.list_windows(doctor_id).await
    }

    /// Windows that apply on `date`, by its weekday.
    pub async fn windows_on(&self, doctor_id: i64, date: NaiveDate) -> Result<Vec<AvailabilityWindow>, SchedulingError> {
        let day = DayOfWeek::of(date);
        debug!("Looking up {} windows for doctor {}", day, doctor_id);
        self.repository.windows_for_day(doctor_id, day).await
    }
}

fn validate_request(request: &AvailabilityRequest) -> Result<(), SchedulingError> {
    if request.days.is_empty() {
        return Err(SchedulingError::configuration("at least one day is required"));
    }
    if request.start_time >= request.end_time {
        return Err(SchedulingError::configuration("start_time must be before end_time"));
    }
    // Slot labels carry minutes only.
    if !on_the_minute(request.start_time) || !on_the_minute(request.end_time) {
        return Err(SchedulingError::configuration(
            "start_time and end_time must be whole minutes",
        ));
    }
    Ok(())
}

fn on_the_minute(time: NaiveTime) -> bool {
    time.second() == 0 && time.nanosecond() == 0
}
