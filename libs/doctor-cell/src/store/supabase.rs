use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, error};

use shared_database::supabase::{SupabaseClient, SupabaseError};
use shared_models::error::SchedulingError;

use crate::models::{AvailabilityRequest, AvailabilityWindow, DayOfWeek};
use crate::store::{sort_windows, AvailabilityRepository};

const TABLE: &str = "/rest/v1/doctor_availability";

/// Availability rows in the `doctor_availability` table.
pub struct SupabaseAvailabilityStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAvailabilityStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn select(&self, query: String) -> Result<Vec<AvailabilityWindow>, SchedulingError> {
        let path = format!("{}?{}", TABLE, query);
        self.supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(storage_error)
    }
}

fn storage_error(err: SupabaseError) -> SchedulingError {
    error!("Availability storage failure: {}", err);
    SchedulingError::Storage(err.to_string())
}

fn time_param(time: chrono::NaiveTime) -> String {
    time.format("%H:%M:%S").to_string()
}

#[async_trait]
impl AvailabilityRepository for SupabaseAvailabilityStore {
    async fn insert_windows(
        &self,
        doctor_id: i64,
        request: &AvailabilityRequest,
    ) -> Result<Vec<AvailabilityWindow>, SchedulingError> {
        // A single array POST is one INSERT statement, so the batch is atomic.
        let rows: Vec<Value> = request
            .days
            .iter()
            .map(|day| json!({
                "doctor_id": doctor_id,
                "day_of_week": day.as_str(),
                "start_time": time_param(request.start_time),
                "end_time": time_param(request.end_time),
            }))
            .collect();

        debug!("Inserting {} availability rows for doctor {}", rows.len(), doctor_id);
        self.supabase
            .request_returning(Method::POST, TABLE, None, Some(Value::Array(rows)))
            .await
            .map_err(storage_error)
    }

    async fn replace_window(
        &self,
        doctor_id: i64,
        availability_id: i64,
        request: &AvailabilityRequest,
    ) -> Result<Vec<AvailabilityWindow>, SchedulingError> {
        let days: Vec<&str> = request.days.iter().map(DayOfWeek::as_str).collect();
        let args = json!({
            "p_doctor_id": doctor_id,
            "p_availability_id": availability_id,
            "p_days": days,
            "p_start_time": time_param(request.start_time),
            "p_end_time": time_param(request.end_time),
        });

        self.supabase
            .rpc("replace_doctor_availability", None, args)
            .await
            .map_err(|err| match err {
                SupabaseError::NotFound(_) => SchedulingError::not_found("Availability"),
                other => storage_error(other),
            })
    }

    async fn delete_windows(&self, doctor_id: i64, availability_ids: &[i64]) -> Result<usize, SchedulingError> {
        if availability_ids.is_empty() {
            return Ok(0);
        }

        let ids = availability_ids
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let path = format!("{}?doctor_id=eq.{}&availability_id=in.({})", TABLE, doctor_id, ids);

        let deleted: Vec<AvailabilityWindow> = self.supabase
            .request_returning(Method::DELETE, &path, None, None)
            .await
            .map_err(storage_error)?;
        Ok(deleted.len())
    }

    async fn windows_for_day(&self, doctor_id: i64, day: DayOfWeek) -> Result<Vec<AvailabilityWindow>, SchedulingError> {
        self.select(format!(
            "doctor_id=eq.{}&day_of_week=eq.{}&order=start_time.asc",
            doctor_id, day
        ))
        .await
    }

    async fn list_windows(&self, doctor_id: i64) -> Result<Vec<AvailabilityWindow>, SchedulingError> {
        // Day names sort alphabetically in SQL, so order client-side.
        let mut windows = self.select(format!("doctor_id=eq.{}", doctor_id)).await?;
        sort_windows(&mut windows);
        Ok(windows)
    }
}
