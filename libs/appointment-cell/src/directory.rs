use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, error};

use shared_database::supabase::SupabaseClient;
use shared_models::error::SchedulingError;

use crate::models::{Doctor, Patient, Treatment};

/// Identity lookups the ledger needs before it writes.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn find_patient(&self, patient_id: i64) -> Result<Option<Patient>, SchedulingError>;
    async fn find_doctor(&self, doctor_id: i64) -> Result<Option<Doctor>, SchedulingError>;
    async fn find_treatment(&self, treatment_id: i64) -> Result<Option<Treatment>, SchedulingError>;
}

#[derive(Debug, Default)]
struct DirectoryTables {
    patients: HashMap<i64, Patient>,
    doctors: HashMap<i64, Doctor>,
    treatments: HashMap<i64, Treatment>,
}

/// Initial contents of an `InMemoryDirectory`, usually read from a JSON file.
#[derive(Debug, Default, Deserialize)]
pub struct DirectorySeed {
    #[serde(default)]
    pub patients: Vec<Patient>,
    #[serde(default)]
    pub doctors: Vec<Doctor>,
    #[serde(default)]
    pub treatments: Vec<Treatment>,
}

/// Directory backed by process memory; used by the in-memory backend and tests.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    tables: RwLock<DirectoryTables>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: DirectorySeed) -> Self {
        let tables = DirectoryTables {
            patients: seed.patients.into_iter().map(|p| (p.patient_id, p)).collect(),
            doctors: seed.doctors.into_iter().map(|d| (d.doctor_id, d)).collect(),
            treatments: seed.treatments.into_iter().map(|t| (t.treatment_id, t)).collect(),
        };
        Self { tables: RwLock::new(tables) }
    }

    pub async fn register_patient(&self, patient: Patient) {
        self.tables.write().await.patients.insert(patient.patient_id, patient);
    }

    pub async fn register_doctor(&self, doctor: Doctor) {
        self.tables.write().await.doctors.insert(doctor.doctor_id, doctor);
    }

    pub async fn register_treatment(&self, treatment: Treatment) {
        self.tables.write().await.treatments.insert(treatment.treatment_id, treatment);
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn find_patient(&self, patient_id: i64) -> Result<Option<Patient>, SchedulingError> {
        Ok(self.tables.read().await.patients.get(&patient_id).cloned())
    }

    async fn find_doctor(&self, doctor_id: i64) -> Result<Option<Doctor>, SchedulingError> {
        Ok(self.tables.read().await.doctors.get(&doctor_id).cloned())
    }

    async fn find_treatment(&self, treatment_id: i64) -> Result<Option<Treatment>, SchedulingError> {
        Ok(self.tables.read().await.treatments.get(&treatment_id).cloned())
    }
}

/// Directory reading the `patients`, `doctors` and `treatments` tables.
pub struct SupabaseDirectory {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseDirectory {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn find_one<T>(&self, table: &str, key: &str, id: i64) -> Result<Option<T>, SchedulingError>
    where
        T: DeserializeOwned,
    {
        let path = format!("/rest/v1/{}?{}=eq.{}&limit=1", table, key, id);
        debug!("Directory lookup: {}", path);

        let rows: Vec<T> = self
            .supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(|e| {
                error!("Directory lookup in {} failed: {}", table, e);
                SchedulingError::Storage(e.to_string())
            })?;

        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl Directory for SupabaseDirectory {
    async fn find_patient(&self, patient_id: i64) -> Result<Option<Patient>, SchedulingError> {
        self.find_one("patients", "patient_id", patient_id).await
    }

    async fn find_doctor(&self, doctor_id: i64) -> Result<Option<Doctor>, SchedulingError> {
        self.find_one("doctors", "doctor_id", doctor_id).await
    }

    async fn find_treatment(&self, treatment_id: i64) -> Result<Option<Treatment>, SchedulingError> {
        self.find_one("treatments", "treatment_id", treatment_id).await
    }
}
