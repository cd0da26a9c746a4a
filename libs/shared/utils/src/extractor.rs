use std::sync::Arc;

use axum::{
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
    body::Body,
};

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_config::AppConfig;

use crate::jwt::validate_token;

/// Validates the bearer token and stores the caller as a `User` extension.
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_value = request
        .headers()
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    let token = auth_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))?;

    let user = validate_token(token, &config.supabase_jwt_secret)
        .map_err(|e| AppError::Auth(e.to_string()))?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// The caller must be the given patient, or an admin.
pub fn require_patient(user: &User, patient_id: i64) -> Result<(), AppError> {
    if user.is_admin() || (user.has_role("patient") && user.patient_id() == Some(patient_id)) {
        Ok(())
    } else {
        Err(AppError::Forbidden("Not authorized for this patient".to_string()))
    }
}

/// The caller must be the given doctor, or an admin.
pub fn require_doctor(user: &User, doctor_id: i64) -> Result<(), AppError> {
    if user.is_admin() || (user.has_role("doctor") && user.doctor_id() == Some(doctor_id)) {
        Ok(())
    } else {
        Err(AppError::Forbidden("Not authorized for this doctor".to_string()))
    }
}

/// Patient id of a patient caller.
pub fn caller_patient_id(user: &User) -> Result<i64, AppError> {
    user.patient_id()
        .filter(|_| user.has_role("patient"))
        .ok_or_else(|| AppError::Forbidden("Caller is not a registered patient".to_string()))
}

/// Doctor id of a doctor caller.
pub fn caller_doctor_id(user: &User) -> Result<i64, AppError> {
    user.doctor_id()
        .filter(|_| user.has_role("doctor"))
        .ok_or_else(|| AppError::Forbidden("Caller is not a registered doctor".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestUser;

    #[test]
    fn patient_may_only_act_for_themselves() {
        let user = TestUser::patient("p@example.com", 5).to_user();
        assert!(require_patient(&user, 5).is_ok());
        assert!(require_patient(&user, 6).is_err());
        assert!(require_doctor(&user, 5).is_err());
        assert_eq!(caller_patient_id(&user).unwrap(), 5);
        assert!(caller_doctor_id(&user).is_err());
    }

    #[test]
    fn admin_passes_every_check() {
        let admin = TestUser::admin("a@example.com").to_user();
        assert!(require_patient(&admin, 1).is_ok());
        assert!(require_doctor(&admin, 2).is_ok());
    }
}
