mod common;

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Datelike, Duration, Utc, Weekday};
use serde_json::{json, Value};
use tower::ServiceExt;

use appointment_cell::router::appointment_routes;
use appointment_cell::AppointmentState;
use doctor_cell::models::DayOfWeek;
use shared_config::AppConfig;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

use common::*;

struct App {
    router: Router,
    config: Arc<AppConfig>,
    harness: Harness,
}

async fn app() -> App {
    let harness = harness().await;
    let config = TestConfig::default().to_arc();
    let state = Arc::new(AppointmentState {
        config: config.clone(),
        ledger: harness.ledger.clone(),
        slots: harness.slots.clone(),
        booking: harness.booking.clone(),
    });

    App { router: appointment_routes(state), config, harness }
}

fn next_monday() -> chrono::NaiveDate {
    let mut day = Utc::now().date_naive() + Duration::days(1);
    while day.weekday() != Weekday::Mon {
        day += Duration::days(1);
    }
    day
}

fn request(method: Method, uri: &str, bearer: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(bearer) = bearer {
        builder = builder.header(header::AUTHORIZATION, bearer);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_slots_are_public_and_reflect_bookings() {
    let app = app().await;
    app.harness.add_window(DOCTOR_ID, DayOfWeek::Monday, (9, 0), (11, 0)).await;
    let monday = next_monday();

    let patient = TestUser::patient("patient1@example.com", 1);
    let bearer = JwtTestUtils::bearer(&patient, &app.config);
    let booked = app
        .router
        .clone()
        .oneshot(request(
            Method::POST,
            "/",
            Some(&bearer),
            Some(json!({
                "doctor_id": DOCTOR_ID,
                "appointment_date": monday,
                "time_slot": "09:30 - 10:00"
            })),
        ))
        .await
        .unwrap();
    assert_eq!(booked.status(), StatusCode::CREATED);

    let response = app
        .router
        .clone()
        .oneshot(request(Method::GET, &format!("/doctors/{}/slots?date={}", DOCTOR_ID, monday), None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    let labels: Vec<_> = body["slots"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["label"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(labels, vec!["09:00 - 09:30", "10:00 - 10:30", "10:30 - 11:00"]);
}

#[tokio::test]
async fn test_invalid_slot_duration_is_bad_request() {
    let app = app().await;

    let response = app
        .router
        .oneshot(request(
            Method::GET,
            &format!("/doctors/{}/slots?date=2025-03-03&duration_minutes=0", DOCTOR_ID),
            None,
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_booking_requires_authentication() {
    let app = app().await;

    let response = app
        .router
        .oneshot(request(
            Method::POST,
            "/",
            None,
            Some(json!({"doctor_id": DOCTOR_ID, "appointment_date": next_monday(), "time_slot": "09:00 - 09:30"})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_patient_cannot_book_for_someone_else() {
    let app = app().await;
    let bearer = JwtTestUtils::bearer(&TestUser::patient("patient1@example.com", 1), &app.config);

    let response = app
        .router
        .oneshot(request(
            Method::POST,
            "/",
            Some(&bearer),
            Some(json!({
                "patient_id": 2,
                "doctor_id": DOCTOR_ID,
                "appointment_date": next_monday(),
                "time_slot": "09:00 - 09:30"
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_double_booking_returns_conflict() {
    let app = app().await;
    let body = json!({"doctor_id": DOCTOR_ID, "appointment_date": next_monday(), "time_slot": "14:00 - 14:30"});

    let first = JwtTestUtils::bearer(&TestUser::patient("patient1@example.com", 1), &app.config);
    let second = JwtTestUtils::bearer(&TestUser::patient("patient2@example.com", 2), &app.config);

    let ok = app.router.clone().oneshot(request(Method::POST, "/", Some(&first), Some(body.clone()))).await.unwrap();
    assert_eq!(ok.status(), StatusCode::CREATED);

    let clash = app.router.clone().oneshot(request(Method::POST, "/", Some(&second), Some(body))).await.unwrap();
    assert_eq!(clash.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(clash).await["error"], "slot already booked");
}

#[tokio::test]
async fn test_cancel_by_other_patient_looks_like_not_found() {
    let app = app().await;
    let appt = app
        .harness
        .ledger
        .create_appointment(new_appointment(1, "09:00 - 09:30", "HTTPCAN1"))
        .await
        .unwrap();

    let intruder = JwtTestUtils::bearer(&TestUser::patient("patient2@example.com", 2), &app.config);
    let response = app
        .router
        .clone()
        .oneshot(request(Method::POST, &format!("/{}/cancel", appt.appointment_id), Some(&intruder), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let owner = JwtTestUtils::bearer(&TestUser::patient("patient1@example.com", 1), &app.config);
    let response = app
        .router
        .oneshot(request(Method::POST, &format!("/{}/cancel", appt.appointment_id), Some(&owner), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_doctor_completes_and_counts() {
    let app = app().await;
    let appt = app
        .harness
        .ledger
        .create_appointment(new_appointment(1, "09:00 - 09:30", "HTTPDONE"))
        .await
        .unwrap();
    let doctor = JwtTestUtils::bearer(&TestUser::doctor("doctor10@example.com", DOCTOR_ID), &app.config);

    let completed = app
        .router
        .clone()
        .oneshot(request(Method::POST, &format!("/{}/complete", appt.appointment_id), Some(&doctor), None))
        .await
        .unwrap();
    assert_eq!(completed.status(), StatusCode::OK);

    let counts = app
        .router
        .clone()
        .oneshot(request(Method::GET, &format!("/doctors/{}/counts", DOCTOR_ID), Some(&doctor), None))
        .await
        .unwrap();
    assert_eq!(counts.status(), StatusCode::OK);
    let body = json_body(counts).await;
    assert_eq!(body["counts"]["completed"], 1);
    assert_eq!(body["counts"]["total"], 1);

    let other_doctor = JwtTestUtils::bearer(&TestUser::doctor("doctor11@example.com", OTHER_DOCTOR_ID), &app.config);
    let forbidden = app
        .router
        .oneshot(request(Method::GET, &format!("/doctors/{}/counts", DOCTOR_ID), Some(&other_doctor), None))
        .await
        .unwrap();
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_reschedule_endpoint_moves_appointment() {
    let app = app().await;
    let appt = app
        .harness
        .ledger
        .create_appointment(new_appointment(3, "09:00 - 09:30", "HTTPMOVE"))
        .await
        .unwrap();
    let patient = JwtTestUtils::bearer(&TestUser::patient("patient3@example.com", 3), &app.config);

    let response = app
        .router
        .clone()
        .oneshot(request(
            Method::PATCH,
            &format!("/{}/reschedule", appt.appointment_id),
            Some(&patient),
            Some(json!({"new_date": "2025-03-04", "new_time_slot": "12:00 - 12:30"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let listing = app
        .router
        .oneshot(request(Method::GET, "/patients/3", Some(&patient), None))
        .await
        .unwrap();
    let body = json_body(listing).await;
    assert_eq!(body["appointments"][0]["time_slot"], "12:00 - 12:30");
    assert_eq!(body["appointments"][0]["reference_number"], "HTTPMOVE");
}
