pub mod directory;
pub mod handlers;
pub mod models;
pub mod notification;
pub mod router;
pub mod services;
pub mod store;

pub use models::*;
pub use services::*;

use std::sync::Arc;

use shared_config::AppConfig;

/// Shared state for the appointment routes.
pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub ledger: Arc<AppointmentLedger>,
    pub slots: Arc<SlotGenerator>,
    pub booking: Arc<BookingService>,
}
