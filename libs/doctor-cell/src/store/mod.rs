pub mod memory;
pub mod supabase;

use async_trait::async_trait;

use shared_models::error::SchedulingError;

use crate::models::{AvailabilityRequest, AvailabilityWindow, DayOfWeek};

pub use memory::InMemoryAvailabilityStore;
pub use supabase::SupabaseAvailabilityStore;

/// Persistence for availability windows. Every write is a single unit of
/// work: either all of its rows land or none do.
#[async_trait]
pub trait AvailabilityRepository: Send + Sync {
    /// One new row per day in `request.days`.
    async fn insert_windows(
        &self,
        doctor_id: i64,
        request: &AvailabilityRequest,
    ) -> Result<Vec<AvailabilityWindow>, SchedulingError>;

    /// Deletes `availability_id` (scoped to the doctor) and inserts fresh rows
    /// for `request.days`. The old id is not reused.
    async fn replace_window(
        &self,
        doctor_id: i64,
        availability_id: i64,
        request: &AvailabilityRequest,
    ) -> Result<Vec<AvailabilityWindow>, SchedulingError>;

    /// Returns how many rows were removed.
    async fn delete_windows(
        &self,
        doctor_id: i64,
        availability_ids: &[i64],
    ) -> Result<usize, SchedulingError>;

    /// Windows for one weekday ordered by start time.
    async fn windows_for_day(
        &self,
        doctor_id: i64,
        day: DayOfWeek,
    ) -> Result<Vec<AvailabilityWindow>, SchedulingError>;

    /// Every window of the doctor ordered by day, then start time.
    async fn list_windows(&self, doctor_id: i64) -> Result<Vec<AvailabilityWindow>, SchedulingError>;
}

pub(crate) fn sort_windows(windows: &mut [AvailabilityWindow]) {
    windows.sort_by(|a, b| {
        (a.day_of_week, a.start_time, a.availability_id)
            .cmp(&(b.day_of_week, b.start_time, b.availability_id))
    });
}
