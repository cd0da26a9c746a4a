use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
    middleware,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::DoctorState;

pub fn doctor_routes(state: Arc<DoctorState>) -> Router {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/{doctor_id}/availability", get(handlers::get_doctor_availability));

    // Availability management is limited to the doctor and admins
    let protected_routes = Router::new()
        .route("/{doctor_id}/availability", post(handlers::create_availability).delete(handlers::delete_availability))
        .route("/{doctor_id}/availability/{availability_id}", put(handlers::update_availability))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
