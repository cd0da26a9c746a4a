use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::directory::Directory;
use crate::models::Appointment;

/// Which side of an appointment to tell about a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Patient,
    Doctor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    AppointmentBooked,
    AppointmentCancelled,
    AppointmentRescheduled,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::AppointmentBooked => "appointment_booked",
            EventKind::AppointmentCancelled => "appointment_cancelled",
            EventKind::AppointmentRescheduled => "appointment_rescheduled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: String,
    pub kind: EventKind,
    pub payload: Value,
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Notification transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Notification rejected with status {0}")]
    Rejected(u16),

    #[error("Notification not delivered within {0:?}")]
    TimedOut(Duration),

    #[error("Notification channel closed")]
    ChannelClosed,
}

/// Delivers one notification. Implementations may be slow or fail; the
/// dispatcher isolates callers from both.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError>;
}

/// Writes notifications to the log. Default when no webhook is configured.
pub struct LogNotificationSender;

#[async_trait]
impl NotificationSender for LogNotificationSender {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        info!(
            "Notify {} of {}: {}",
            notification.recipient,
            notification.kind.as_str(),
            notification.payload
        );
        Ok(())
    }
}

/// POSTs each notification as JSON to a webhook.
pub struct WebhookNotificationSender {
    client: Client,
    url: String,
}

impl WebhookNotificationSender {
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Result<Self, NotificationError> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl NotificationSender for WebhookNotificationSender {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        let response = self.client.post(&self.url).json(notification).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotificationError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}

enum Job {
    Send(Notification),
    Party {
        appointment: Appointment,
        party: Party,
        kind: EventKind,
    },
}

impl Job {
    fn describe(&self) -> String {
        match self {
            Job::Send(n) => format!("{} to {}", n.kind.as_str(), n.recipient),
            Job::Party { appointment, party, kind } => format!(
                "{} to {:?} of appointment {}",
                kind.as_str(),
                party,
                appointment.appointment_id
            ),
        }
    }
}

/// Fire-and-forget front of a `NotificationSender`.
///
/// `notify` and `notify_party` only enqueue. A single background worker
/// drains the queue in order, resolves party addresses through the
/// directory and delivers. Each job gets `delivery_timeout`; a job that
/// fails or runs out of time is logged and dropped.
#[derive(Clone)]
pub struct NotificationDispatcher {
    queue: mpsc::UnboundedSender<Job>,
}

struct Worker {
    sender: Arc<dyn NotificationSender>,
    directory: Arc<dyn Directory>,
}

impl NotificationDispatcher {
    /// Must be called inside a tokio runtime.
    pub fn spawn(
        sender: Arc<dyn NotificationSender>,
        directory: Arc<dyn Directory>,
        delivery_timeout: Duration,
    ) -> Self {
        let (queue, mut pending) = mpsc::unbounded_channel::<Job>();
        let worker = Worker { sender, directory };

        tokio::spawn(async move {
            while let Some(job) = pending.recv().await {
                let outcome = match timeout(delivery_timeout, worker.run(&job)).await {
                    Ok(result) => result,
                    Err(_) => Err(NotificationError::TimedOut(delivery_timeout)),
                };
                if let Err(e) = outcome {
                    warn!("Failed to deliver {}: {}", job.describe(), e);
                }
            }
            debug!("Notification worker stopped");
        });

        Self { queue }
    }

    pub fn notify(&self, recipient: impl Into<String>, kind: EventKind, payload: Value) {
        self.enqueue(Job::Send(Notification {
            recipient: recipient.into(),
            kind,
            payload,
        }));
    }

    /// Queues a notification for one party of `appointment`; the address is
    /// looked up by the worker.
    pub fn notify_party(&self, appointment: Appointment, party: Party, kind: EventKind) {
        self.enqueue(Job::Party { appointment, party, kind });
    }

    fn enqueue(&self, job: Job) {
        if self.queue.send(job).is_err() {
            warn!("{}", NotificationError::ChannelClosed);
        }
    }
}

impl Worker {
    async fn run(&self, job: &Job) -> Result<(), NotificationError> {
        match job {
            Job::Send(notification) => self.sender.send(notification).await,
            Job::Party { appointment, party, kind } => {
                let Some(recipient) = self.resolve(appointment, *party).await else {
                    return Ok(());
                };
                let notification = Notification {
                    recipient,
                    kind: *kind,
                    payload: json!({
                        "appointment_id": appointment.appointment_id,
                        "reference_number": appointment.reference_number,
                        "appointment_date": appointment.appointment_date,
                        "time_slot": appointment.time_slot,
                        "status": appointment.status,
                    }),
                };
                self.sender.send(&notification).await
            }
        }
    }

    async fn resolve(&self, appointment: &Appointment, party: Party) -> Option<String> {
        let recipient = match party {
            Party::Doctor => self
                .directory
                .find_doctor(appointment.doctor_id)
                .await
                .map(|doctor| doctor.map(|d| d.email)),
            Party::Patient => self
                .directory
                .find_patient(appointment.patient_id)
                .await
                .map(|patient| patient.map(|p| p.email)),
        };

        match recipient {
            Ok(Some(email)) => Some(email),
            Ok(None) => {
                warn!("No {:?} contact for appointment {}", party, appointment.appointment_id);
                None
            }
            Err(e) => {
                warn!(
                    "Could not resolve {:?} contact for appointment {}: {}",
                    party, appointment.appointment_id, e
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use chrono::{NaiveDate, Utc};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::directory::InMemoryDirectory;
    use crate::models::{AppointmentStatus, Doctor, Patient, Treatment};
    use shared_models::error::SchedulingError;

    const DELIVERY_TIMEOUT: Duration = Duration::from_millis(200);

    struct ForwardingSender(mpsc::UnboundedSender<Notification>);

    #[async_trait]
    impl NotificationSender for ForwardingSender {
        async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
            let _ = self.0.send(notification.clone());
            Ok(())
        }
    }

    struct FailingSender;

    #[async_trait]
    impl NotificationSender for FailingSender {
        async fn send(&self, _notification: &Notification) -> Result<(), NotificationError> {
            Err(NotificationError::Rejected(503))
        }
    }

    /// Never answers the first send, forwards the rest.
    struct StallsOnceSender {
        stalled: AtomicBool,
        forward: mpsc::UnboundedSender<Notification>,
    }

    #[async_trait]
    impl NotificationSender for StallsOnceSender {
        async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
            if !self.stalled.swap(true, Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            let _ = self.forward.send(notification.clone());
            Ok(())
        }
    }

    struct UnresponsiveDirectory;

    #[async_trait]
    impl Directory for UnresponsiveDirectory {
        async fn find_patient(&self, _: i64) -> Result<Option<Patient>, SchedulingError> {
            std::future::pending().await
        }
        async fn find_doctor(&self, _: i64) -> Result<Option<Doctor>, SchedulingError> {
            std::future::pending().await
        }
        async fn find_treatment(&self, _: i64) -> Result<Option<Treatment>, SchedulingError> {
            std::future::pending().await
        }
    }

    fn empty_directory() -> Arc<dyn Directory> {
        Arc::new(InMemoryDirectory::new())
    }

    fn appointment() -> Appointment {
        Appointment {
            appointment_id: 9,
            patient_id: 1,
            doctor_id: 2,
            treatment_id: None,
            patient_appointment_no: 1,
            appointment_date: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            time_slot: "09:00 - 09:30".to_string(),
            reference_number: "REF00009".to_string(),
            status: AppointmentStatus::Cancelled,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<Notification>) -> Notification {
        tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn dispatcher_delivers_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher =
            NotificationDispatcher::spawn(Arc::new(ForwardingSender(tx)), empty_directory(), DELIVERY_TIMEOUT);

        dispatcher.notify("a@example.com", EventKind::AppointmentCancelled, json!({"n": 1}));
        dispatcher.notify("b@example.com", EventKind::AppointmentRescheduled, json!({"n": 2}));

        let first = next(&mut rx).await;
        let second = next(&mut rx).await;
        assert_eq!(first.recipient, "a@example.com");
        assert_eq!(second.kind, EventKind::AppointmentRescheduled);
    }

    #[tokio::test]
    async fn failing_sender_does_not_surface_to_caller() {
        let dispatcher = NotificationDispatcher::spawn(Arc::new(FailingSender), empty_directory(), DELIVERY_TIMEOUT);
        // Returns immediately; the failure is only logged by the worker.
        dispatcher.notify("a@example.com", EventKind::AppointmentBooked, json!({}));
    }

    #[tokio::test]
    async fn stalled_delivery_times_out_and_queue_keeps_draining() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sender = StallsOnceSender { stalled: AtomicBool::new(false), forward: tx };
        let dispatcher = NotificationDispatcher::spawn(Arc::new(sender), empty_directory(), DELIVERY_TIMEOUT);

        for n in 1..=50 {
            dispatcher.notify(format!("p{}@example.com", n), EventKind::AppointmentBooked, json!({"n": n}));
        }

        // The first job is abandoned after the timeout; the rest follow in order.
        let first_delivered = next(&mut rx).await;
        assert_eq!(first_delivered.recipient, "p2@example.com");
        let mut last = first_delivered;
        for _ in 3..=50 {
            last = next(&mut rx).await;
        }
        assert_eq!(last.payload["n"], 50);
    }

    #[tokio::test]
    async fn party_address_is_resolved_by_the_worker() {
        let directory = Arc::new(InMemoryDirectory::new());
        directory
            .register_doctor(Doctor { doctor_id: 2, name: "Dr. Two".into(), email: "two@example.com".into() })
            .await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher = NotificationDispatcher::spawn(Arc::new(ForwardingSender(tx)), directory, DELIVERY_TIMEOUT);

        dispatcher.notify_party(appointment(), Party::Doctor, EventKind::AppointmentCancelled);

        let delivered = next(&mut rx).await;
        assert_eq!(delivered.recipient, "two@example.com");
        assert_eq!(delivered.kind, EventKind::AppointmentCancelled);
        assert_eq!(delivered.payload["reference_number"], "REF00009");
        assert_eq!(delivered.payload["status"], "cancelled");
    }

    #[tokio::test]
    async fn unknown_party_is_skipped() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher =
            NotificationDispatcher::spawn(Arc::new(ForwardingSender(tx)), empty_directory(), DELIVERY_TIMEOUT);

        dispatcher.notify_party(appointment(), Party::Patient, EventKind::AppointmentCancelled);
        dispatcher.notify("marker@example.com", EventKind::AppointmentBooked, json!({}));

        assert_eq!(next(&mut rx).await.recipient, "marker@example.com");
    }

    #[tokio::test]
    async fn unresponsive_directory_times_out() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher = NotificationDispatcher::spawn(
            Arc::new(ForwardingSender(tx)),
            Arc::new(UnresponsiveDirectory),
            DELIVERY_TIMEOUT,
        );

        dispatcher.notify_party(appointment(), Party::Doctor, EventKind::AppointmentRescheduled);
        dispatcher.notify("marker@example.com", EventKind::AppointmentBooked, json!({}));

        assert_eq!(next(&mut rx).await.recipient, "marker@example.com");
    }

    #[tokio::test]
    async fn webhook_sender_posts_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks/notify"))
            .and(body_partial_json(json!({
                "recipient": "doc@example.com",
                "kind": "appointment_cancelled"
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let sender =
            WebhookNotificationSender::new(format!("{}/hooks/notify", server.uri()), Duration::from_secs(5)).unwrap();
        let notification = Notification {
            recipient: "doc@example.com".to_string(),
            kind: EventKind::AppointmentCancelled,
            payload: json!({"appointment_id": 1}),
        };

        sender.send(&notification).await.unwrap();
    }

    #[tokio::test]
    async fn webhook_rejection_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let sender = WebhookNotificationSender::new(server.uri(), Duration::from_secs(5)).unwrap();
        let notification = Notification {
            recipient: "p@example.com".to_string(),
            kind: EventKind::AppointmentBooked,
            payload: json!({}),
        };

        let result = sender.send(&notification).await;
        assert!(matches!(result, Err(NotificationError::Rejected(500))));
    }

    #[tokio::test]
    async fn slow_webhook_hits_request_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let sender = WebhookNotificationSender::new(server.uri(), Duration::from_millis(100)).unwrap();
        let notification = Notification {
            recipient: "p@example.com".to_string(),
            kind: EventKind::AppointmentBooked,
            payload: json!({}),
        };

        let result = sender.send(&notification).await;
        assert!(matches!(result, Err(NotificationError::Transport(ref e)) if e.is_timeout()));
    }
}
