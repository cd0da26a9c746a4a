use std::sync::Arc;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::{AppConfig, SchedulingConfig, StorageBackend};
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub storage_backend: StorageBackend,
    pub scheduling: SchedulingConfig,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            storage_backend: StorageBackend::Memory,
            scheduling: SchedulingConfig::default(),
        }
    }
}

impl TestConfig {
    /// Points the Supabase URL at a mock server.
    pub fn with_supabase(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            storage_backend: StorageBackend::Supabase,
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            storage_backend: self.storage_backend,
            notification_webhook_url: None,
            notification_timeout_seconds: 1,
            directory_seed_file: None,
            port: 0,
            scheduling: self.scheduling.clone(),
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
    pub patient_id: Option<i64>,
    pub doctor_id: Option<i64>,
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
            patient_id: None,
            doctor_id: None,
        }
    }

    pub fn patient(email: &str, patient_id: i64) -> Self {
        Self { patient_id: Some(patient_id), ..Self::new(email, "patient") }
    }

    pub fn doctor(email: &str, doctor_id: i64) -> Self {
        Self { doctor_id: Some(doctor_id), ..Self::new(email, "doctor") }
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    fn metadata(&self) -> Value {
        let mut metadata = serde_json::Map::new();
        if let Some(id) = self.patient_id {
            metadata.insert("patient_id".to_string(), json!(id));
        }
        if let Some(id) = self.doctor_id {
            metadata.insert("doctor_id".to_string(), json!(id));
        }
        Value::Object(metadata)
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: Some(self.metadata()),
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "user_metadata": user.metadata(),
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn bearer(user: &TestUser, config: &AppConfig) -> String {
        format!("Bearer {}", Self::create_test_token(user, &config.supabase_jwt_secret, Some(1)))
    }
}

/// PostgREST row shapes for wiremock responses.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn patient_row(patient_id: i64, email: &str, name: &str) -> Value {
        json!({
            "patient_id": patient_id,
            "name": name,
            "email": email
        })
    }

    pub fn doctor_row(doctor_id: i64, email: &str, name: &str) -> Value {
        json!({
            "doctor_id": doctor_id,
            "name": name,
            "email": email
        })
    }

    pub fn treatment_row(treatment_id: i64, doctor_id: i64, name: &str) -> Value {
        json!({
            "treatment_id": treatment_id,
            "doctor_id": doctor_id,
            "treatment_name": name
        })
    }

    pub fn availability_row(availability_id: i64, doctor_id: i64, day: &str, start: &str, end: &str) -> Value {
        json!({
            "availability_id": availability_id,
            "doctor_id": doctor_id,
            "day_of_week": day,
            "start_time": start,
            "end_time": end
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn appointment_row(
        appointment_id: i64,
        patient_id: i64,
        doctor_id: i64,
        patient_appointment_no: i32,
        date: &str,
        time_slot: &str,
        reference_number: &str,
        status: &str,
    ) -> Value {
        json!({
            "appointment_id": appointment_id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "treatment_id": null,
            "patient_appointment_no": patient_appointment_no,
            "appointment_date": date,
            "time_slot": time_slot,
            "reference_number": reference_number,
            "status": status,
            "created_at": "2025-01-01T08:00:00Z",
            "updated_at": "2025-01-01T08:00:00Z"
        })
    }

    pub fn unique_violation(constraint: &str) -> Value {
        json!({
            "code": "23505",
            "details": null,
            "hint": null,
            "message": format!("duplicate key value violates unique constraint \"{}\"", constraint)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default();
        let app_config = config.to_app_config();

        assert_eq!(app_config.supabase_url, "http://localhost:54321");
        assert_eq!(app_config.storage_backend, StorageBackend::Memory);
        assert!(!app_config.supabase_jwt_secret.is_empty());
    }

    #[test]
    fn test_user_creation() {
        let user = TestUser::doctor("doc@example.com", 9);
        let user_model = user.to_user();
        assert_eq!(user_model.role.as_deref(), Some("doctor"));
        assert_eq!(user_model.doctor_id(), Some(9));
        assert_eq!(user_model.patient_id(), None);
    }

    #[test]
    fn test_jwt_token_creation() {
        let user = TestUser::patient("p@example.com", 1);
        let token = JwtTestUtils::create_test_token(&user, "test-secret", Some(1));
        assert_eq!(token.split('.').count(), 3);
    }
}
