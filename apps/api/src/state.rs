use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use tracing::{info, warn};

use appointment_cell::directory::{Directory, DirectorySeed, InMemoryDirectory, SupabaseDirectory};
use appointment_cell::notification::{
    LogNotificationSender, NotificationDispatcher, NotificationSender, WebhookNotificationSender,
};
use appointment_cell::services::{AppointmentLedger, BookingService, SlotGenerator};
use appointment_cell::store::{AppointmentRepository, InMemoryAppointmentStore, SupabaseAppointmentStore};
use appointment_cell::AppointmentState;
use doctor_cell::services::AvailabilityService;
use doctor_cell::store::{AvailabilityRepository, InMemoryAvailabilityStore, SupabaseAvailabilityStore};
use doctor_cell::DoctorState;
use shared_config::{AppConfig, StorageBackend};
use shared_database::SupabaseClient;

struct Stores {
    availability: Arc<dyn AvailabilityRepository>,
    appointments: Arc<dyn AppointmentRepository>,
    directory: Arc<dyn Directory>,
}

fn build_stores(config: &AppConfig) -> anyhow::Result<Stores> {
    match config.storage_backend {
        StorageBackend::Supabase => {
            if !config.is_configured() {
                bail!("STORAGE_BACKEND=supabase requires SUPABASE_URL, SUPABASE_ANON_PUBLIC_KEY and SUPABASE_JWT_SECRET");
            }
            info!("Using Supabase storage at {}", config.supabase_url);
            let supabase = Arc::new(SupabaseClient::new(config));
            Ok(Stores {
                availability: Arc::new(SupabaseAvailabilityStore::new(supabase.clone())),
                appointments: Arc::new(SupabaseAppointmentStore::new(supabase.clone())),
                directory: Arc::new(SupabaseDirectory::new(supabase)),
            })
        }
        StorageBackend::Memory => {
            info!("Using in-memory storage");
            Ok(Stores {
                availability: Arc::new(InMemoryAvailabilityStore::new()),
                appointments: Arc::new(InMemoryAppointmentStore::new()),
                directory: Arc::new(InMemoryDirectory::from_seed(load_seed(config)?)),
            })
        }
    }
}

fn load_seed(config: &AppConfig) -> anyhow::Result<DirectorySeed> {
    let Some(path) = &config.directory_seed_file else {
        warn!("DIRECTORY_SEED_FILE not set, in-memory directory starts empty");
        return Ok(DirectorySeed::default());
    };

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading directory seed {}", path))?;
    let seed: DirectorySeed = serde_json::from_str(&raw)
        .with_context(|| format!("parsing directory seed {}", path))?;
    info!(
        "Seeded directory with {} patients, {} doctors, {} treatments",
        seed.patients.len(), seed.doctors.len(), seed.treatments.len()
    );
    Ok(seed)
}

/// Wires stores, services and the notification worker for the configured backend.
pub fn build_state(config: Arc<AppConfig>) -> anyhow::Result<(Arc<DoctorState>, Arc<AppointmentState>)> {
    let stores = build_stores(&config)?;

    let delivery_timeout = Duration::from_secs(config.notification_timeout_seconds);
    let sender: Arc<dyn NotificationSender> = match &config.notification_webhook_url {
        Some(url) => {
            info!("Delivering notifications to {}", url);
            Arc::new(WebhookNotificationSender::new(url.clone(), delivery_timeout)?)
        }
        None => Arc::new(LogNotificationSender),
    };

    let availability = Arc::new(AvailabilityService::new(stores.availability));
    let notifications = NotificationDispatcher::spawn(sender, stores.directory.clone(), delivery_timeout);
    let ledger = Arc::new(AppointmentLedger::new(
        stores.appointments,
        stores.directory,
        notifications,
        &config.scheduling,
    ));
    let slots = Arc::new(SlotGenerator::new(availability.clone(), ledger.clone()));
    let booking = Arc::new(BookingService::new(ledger.clone(), &config.scheduling));

    let doctors = Arc::new(DoctorState {
        config: config.clone(),
        availability,
    });
    let appointments = Arc::new(AppointmentState {
        config,
        ledger,
        slots,
        booking,
    });

    Ok((doctors, appointments))
}
