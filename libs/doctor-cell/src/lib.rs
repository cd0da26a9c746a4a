pub mod handlers;
pub mod router;
pub mod models;
pub mod services;
pub mod store;

pub use models::*;
pub use services::*;
pub use store::{AvailabilityRepository, InMemoryAvailabilityStore, SupabaseAvailabilityStore};

use std::sync::Arc;

use shared_config::AppConfig;

/// Shared state for the doctor routes.
pub struct DoctorState {
    pub config: Arc<AppConfig>,
    pub availability: Arc<AvailabilityService>,
}
