#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use tokio::sync::mpsc;

use appointment_cell::directory::{Directory, InMemoryDirectory};
use appointment_cell::models::{Doctor, NewAppointment, Patient, Treatment};
use appointment_cell::notification::{Notification, NotificationDispatcher, NotificationError, NotificationSender};
use appointment_cell::services::{AppointmentLedger, BookingService, SlotGenerator};
use appointment_cell::store::InMemoryAppointmentStore;
use doctor_cell::models::{AvailabilityRequest, DayOfWeek};
use doctor_cell::services::AvailabilityService;
use doctor_cell::store::InMemoryAvailabilityStore;
use shared_config::SchedulingConfig;
use shared_models::error::SchedulingError;

pub const DOCTOR_ID: i64 = 10;
pub const OTHER_DOCTOR_ID: i64 = 11;
pub const TREATMENT_ID: i64 = 100;

/// Forwards every delivered notification to the test.
pub struct RecordingSender(pub mpsc::UnboundedSender<Notification>);

#[async_trait]
impl NotificationSender for RecordingSender {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        let _ = self.0.send(notification.clone());
        Ok(())
    }
}

pub struct FailingSender;

#[async_trait]
impl NotificationSender for FailingSender {
    async fn send(&self, _notification: &Notification) -> Result<(), NotificationError> {
        Err(NotificationError::Rejected(502))
    }
}

pub struct Harness {
    pub availability: Arc<AvailabilityService>,
    pub directory: Arc<InMemoryDirectory>,
    pub ledger: Arc<AppointmentLedger>,
    pub slots: Arc<SlotGenerator>,
    pub booking: Arc<BookingService>,
    pub delivered: mpsc::UnboundedReceiver<Notification>,
}

impl Harness {
    /// Next delivered notification, failing the test after a second.
    pub async fn next_notification(&mut self) -> Notification {
        tokio::time::timeout(Duration::from_secs(1), self.delivered.recv())
            .await
            .expect("notification within a second")
            .expect("notification channel open")
    }

    pub async fn add_window(&self, doctor_id: i64, day: DayOfWeek, start: (u32, u32), end: (u32, u32)) {
        self.availability
            .add_availability(doctor_id, AvailabilityRequest {
                days: vec![day],
                start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
                end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
            })
            .await
            .expect("valid window");
    }
}

pub async fn harness() -> Harness {
    harness_with(SchedulingConfig::default()).await
}

pub async fn harness_with(config: SchedulingConfig) -> Harness {
    let (tx, delivered) = mpsc::unbounded_channel();
    build(config, Arc::new(RecordingSender(tx)), delivered).await
}

pub async fn harness_with_failing_notifications() -> Harness {
    let (_tx, delivered) = mpsc::unbounded_channel();
    build(SchedulingConfig::default(), Arc::new(FailingSender), delivered).await
}

async fn build(
    config: SchedulingConfig,
    sender: Arc<dyn NotificationSender>,
    delivered: mpsc::UnboundedReceiver<Notification>,
) -> Harness {
    let directory = Arc::new(seeded_directory().await);

    let availability = Arc::new(AvailabilityService::new(Arc::new(InMemoryAvailabilityStore::new())));
    let ledger = Arc::new(AppointmentLedger::new(
        Arc::new(InMemoryAppointmentStore::new()),
        directory.clone(),
        NotificationDispatcher::spawn(sender, directory.clone(), Duration::from_secs(1)),
        &config,
    ));
    let slots = Arc::new(SlotGenerator::new(availability.clone(), ledger.clone()));
    let booking = Arc::new(BookingService::new(ledger.clone(), &config));

    Harness { availability, directory, ledger, slots, booking, delivered }
}

/// Directory with patients 1..=3, both doctors and one treatment.
pub async fn seeded_directory() -> InMemoryDirectory {
    let directory = InMemoryDirectory::new();
    for patient_id in 1..=3 {
        directory
            .register_patient(Patient {
                patient_id,
                name: format!("Patient {}", patient_id),
                email: format!("patient{}@example.com", patient_id),
            })
            .await;
    }
    for doctor_id in [DOCTOR_ID, OTHER_DOCTOR_ID] {
        directory
            .register_doctor(Doctor {
                doctor_id,
                name: format!("Dr. {}", doctor_id),
                email: format!("doctor{}@example.com", doctor_id),
            })
            .await;
    }
    directory
        .register_treatment(Treatment {
            treatment_id: TREATMENT_ID,
            doctor_id: DOCTOR_ID,
            treatment_name: "Cleaning".to_string(),
        })
        .await;

    directory
}

/// Answers lookups until `stall` is called, then never answers again.
pub struct StallingDirectory {
    inner: InMemoryDirectory,
    stalled: AtomicBool,
}

impl StallingDirectory {
    pub async fn seeded() -> Self {
        Self { inner: seeded_directory().await, stalled: AtomicBool::new(false) }
    }

    pub fn stall(&self) {
        self.stalled.store(true, Ordering::SeqCst);
    }

    async fn wait_if_stalled(&self) {
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
    }
}

#[async_trait]
impl Directory for StallingDirectory {
    async fn find_patient(&self, patient_id: i64) -> Result<Option<Patient>, SchedulingError> {
        self.wait_if_stalled().await;
        self.inner.find_patient(patient_id).await
    }

    async fn find_doctor(&self, doctor_id: i64) -> Result<Option<Doctor>, SchedulingError> {
        self.wait_if_stalled().await;
        self.inner.find_doctor(doctor_id).await
    }

    async fn find_treatment(&self, treatment_id: i64) -> Result<Option<Treatment>, SchedulingError> {
        self.wait_if_stalled().await;
        self.inner.find_treatment(treatment_id).await
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// 2025-03-03 is a Monday.
pub fn monday() -> NaiveDate {
    date(2025, 3, 3)
}

pub fn new_appointment(patient_id: i64, slot: &str, reference: &str) -> NewAppointment {
    NewAppointment {
        patient_id,
        doctor_id: DOCTOR_ID,
        treatment_id: None,
        appointment_date: monday(),
        time_slot: slot.to_string(),
        reference_number: reference.to_string(),
    }
}
