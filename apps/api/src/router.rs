use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::router::appointment_routes;
use appointment_cell::AppointmentState;
use doctor_cell::router::doctor_routes;
use doctor_cell::DoctorState;

pub fn create_router(doctors: Arc<DoctorState>, appointments: Arc<AppointmentState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic booking API is running!" }))
        .nest("/doctors", doctor_routes(doctors))
        .nest("/appointments", appointment_routes(appointments))
}
