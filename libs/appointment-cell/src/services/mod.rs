pub mod booking;
pub mod ledger;
pub mod lifecycle;
pub mod slots;

pub use booking::{BookingRequest, BookingService};
pub use ledger::{AppointmentLedger, Party};
pub use slots::SlotGenerator;
