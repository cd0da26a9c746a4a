use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, patch},
    middleware,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::AppointmentState;

pub fn appointment_routes(state: Arc<AppointmentState>) -> Router {
    // Free slots are public so patients can browse before signing in
    let public_routes = Router::new()
        .route("/doctors/{doctor_id}/slots", get(handlers::get_available_slots));

    let protected_routes = Router::new()
        // Booking and lifecycle
        .route("/", post(handlers::book_appointment))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/{appointment_id}/doctor-cancel", post(handlers::doctor_cancel_appointment))
        .route("/{appointment_id}/reschedule", patch(handlers::reschedule_appointment))
        .route("/{appointment_id}/complete", post(handlers::complete_appointment))

        // Listings
        .route("/patients/{patient_id}", get(handlers::get_patient_appointments))
        .route("/doctors/{doctor_id}", get(handlers::get_doctor_appointments))
        .route("/doctors/{doctor_id}/counts", get(handlers::get_appointment_counts))

        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
