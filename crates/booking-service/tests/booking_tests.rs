//! Integration tests for POST /api/meetings/bookings.
//!
//! Covers the commit happy path, the definitive loser errors
//! (TOKEN_ALREADY_USED, SLOT_FULL, SLOT_NOT_FOUND), confirmation email
//! behavior, and two commits racing for the last spot.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use booking_service::models::LeadSourceType;
use booking_test_utils::{
    hex_token, sample_lead, sample_slot, test_app, MemoryStore, NoopMailer, RecordingMailer,
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

async fn read_json(body: Body) -> serde_json::Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn booking_request(token: &str, slot_id: Uuid, agenda: Option<&str>) -> Request<Body> {
    let mut body = serde_json::json!({
        "token": token,
        "slot_id": slot_id,
    });
    if let Some(agenda) = agenda {
        body["agenda"] = serde_json::Value::String(agenda.to_string());
    }
    Request::builder()
        .method("POST")
        .uri("/api/meetings/bookings")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn seeded_store(token: &str, capacity: i32) -> (Arc<MemoryStore>, Uuid, Uuid) {
    let store = Arc::new(MemoryStore::new());
    let lead_id = store
        .add_lead(LeadSourceType::DemoRequest, sample_lead())
        .await;
    store
        .add_token(
            token,
            LeadSourceType::DemoRequest,
            lead_id,
            Utc::now() + Duration::days(7),
        )
        .await;
    let slot_id = store
        .add_slot(sample_slot(Utc::now() + Duration::days(2), capacity))
        .await;
    (store, lead_id, slot_id)
}

#[tokio::test]
async fn booking_commits_and_sends_confirmation() {
    let token = hex_token('a');
    let (store, lead_id, slot_id) = seeded_store(&token, 1).await;
    let mailer = Arc::new(RecordingMailer::new());
    let app = test_app(store.clone(), mailer.clone());

    let response = app
        .oneshot(booking_request(&token, slot_id, Some("Pricing discussion")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = read_json(response.into_body()).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["booking_status"], "CONFIRMED");
    assert_eq!(json["data"]["confirmation_sent"], true);
    assert_eq!(json["data"]["meeting_slot"]["title"], "Demo session");
    let booking_id: Uuid = json["data"]["booking_id"].as_str().unwrap().parse().unwrap();

    // Token consumed, slot count incremented, booking row present
    let token_row = store.token_by_string(&token).await.unwrap();
    assert!(token_row.used);
    assert!(token_row.used_at.is_some());

    let slot = store.slot_by_id(slot_id).await.unwrap();
    assert_eq!(slot.current_bookings, 1);

    let bookings = store.bookings().await;
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0].id, booking_id);
    assert_eq!(bookings[0].lead_id, lead_id);
    assert_eq!(bookings[0].requested_agenda.as_deref(), Some("Pricing discussion"));
    assert_eq!(bookings[0].company_name, "Acme Logistics");

    // Confirmation email and activity trail
    assert_eq!(mailer.confirmations().await.len(), 1);
    let activities = store.activities().await;
    assert_eq!(activities.len(), 1);
    assert_eq!(activities[0].activity_type, "MEETING_BOOKED");
}

#[tokio::test]
async fn booking_succeeds_when_confirmation_mail_fails() {
    let token = hex_token('b');
    let (store, _, slot_id) = seeded_store(&token, 1).await;
    let app = test_app(store.clone(), Arc::new(RecordingMailer::failing_confirmations()));

    let response = app
        .oneshot(booking_request(&token, slot_id, None))
        .await
        .unwrap();
    // The booking stands; only the flag reports the mail failure
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = read_json(response.into_body()).await;
    assert_eq!(json["data"]["confirmation_sent"], false);
    assert_eq!(store.bookings().await.len(), 1);
}

#[tokio::test]
async fn booking_second_commit_is_rejected() {
    let token = hex_token('c');
    let (store, _, slot_id) = seeded_store(&token, 5).await;
    let app = test_app(store.clone(), Arc::new(NoopMailer));

    let first = app
        .clone()
        .oneshot(booking_request(&token, slot_id, None))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = app
        .oneshot(booking_request(&token, slot_id, None))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::GONE);

    let json = read_json(second.into_body()).await;
    assert_eq!(json["error"]["code"], "TOKEN_ALREADY_USED");
    assert!(json["error"]["used_at"].is_string());

    // Only one booking exists and the count incremented once
    assert_eq!(store.bookings().await.len(), 1);
    assert_eq!(store.slot_by_id(slot_id).await.unwrap().current_bookings, 1);
}

#[tokio::test]
async fn booking_full_slot_is_conflict() {
    let token = hex_token('d');
    let (store, _, slot_id) = seeded_store(&token, 1).await;

    // Fill the slot through another token
    let other = hex_token('e');
    let lead2 = store
        .add_lead(LeadSourceType::ContactForm, sample_lead())
        .await;
    store
        .add_token(
            &other,
            LeadSourceType::ContactForm,
            lead2,
            Utc::now() + Duration::days(7),
        )
        .await;

    let app = test_app(store.clone(), Arc::new(NoopMailer));
    let fill = app
        .clone()
        .oneshot(booking_request(&other, slot_id, None))
        .await
        .unwrap();
    assert_eq!(fill.status(), StatusCode::CREATED);

    let response = app
        .oneshot(booking_request(&token, slot_id, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let json = read_json(response.into_body()).await;
    assert_eq!(json["error"]["code"], "SLOT_FULL");

    // The losing token is NOT consumed
    assert!(!store.token_by_string(&token).await.unwrap().used);
    assert_eq!(store.slot_by_id(slot_id).await.unwrap().current_bookings, 1);
}

#[tokio::test]
async fn booking_unknown_slot_is_not_found() {
    let token = hex_token('f');
    let (store, _, _) = seeded_store(&token, 1).await;
    let app = test_app(store.clone(), Arc::new(NoopMailer));

    let response = app
        .oneshot(booking_request(&token, Uuid::new_v4(), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = read_json(response.into_body()).await;
    assert_eq!(json["error"]["code"], "SLOT_NOT_FOUND");

    // The token survives the failed attempt
    assert!(!store.token_by_string(&token).await.unwrap().used);
}

#[tokio::test]
async fn booking_token_state_errors() {
    let store = Arc::new(MemoryStore::new());
    let lead_id = store
        .add_lead(LeadSourceType::ContactForm, sample_lead())
        .await;
    let slot_id = store
        .add_slot(sample_slot(Utc::now() + Duration::days(2), 1))
        .await;

    let expired = hex_token('1');
    store
        .add_token(
            &expired,
            LeadSourceType::ContactForm,
            lead_id,
            Utc::now() - Duration::minutes(1),
        )
        .await;

    let app = test_app(store, Arc::new(NoopMailer));

    // Malformed token
    let response = app
        .clone()
        .oneshot(booking_request("nope", slot_id, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = read_json(response.into_body()).await;
    assert_eq!(json["error"]["code"], "INVALID_TOKEN");

    // Unknown token
    let response = app
        .clone()
        .oneshot(booking_request(&hex_token('2'), slot_id, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Expired token
    let response = app
        .oneshot(booking_request(&expired, slot_id, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::GONE);
    let json = read_json(response.into_body()).await;
    assert_eq!(json["error"]["code"], "TOKEN_EXPIRED");
}

#[tokio::test]
async fn booking_agenda_over_limit_is_validation_error() {
    let token = hex_token('3');
    let (store, _, slot_id) = seeded_store(&token, 1).await;
    let app = test_app(store, Arc::new(NoopMailer));

    let agenda = "a".repeat(2001);
    let response = app
        .oneshot(booking_request(&token, slot_id, Some(&agenda)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = read_json(response.into_body()).await;
    assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn concurrent_commits_get_exactly_one_spot() {
    // Two tokens race for a slot with a single spot: exactly one 201 and
    // one 409, and the loser's token survives.
    let slot_start = Utc::now() + Duration::days(2);
    let store = Arc::new(MemoryStore::new());
    let lead_id = store
        .add_lead(LeadSourceType::DemoRequest, sample_lead())
        .await;
    let slot_id = store.add_slot(sample_slot(slot_start, 1)).await;

    let token_a = hex_token('a');
    let token_b = hex_token('b');
    for token in [&token_a, &token_b] {
        store
            .add_token(
                token,
                LeadSourceType::DemoRequest,
                lead_id,
                Utc::now() + Duration::days(7),
            )
            .await;
    }

    let app = test_app(store.clone(), Arc::new(NoopMailer));

    let (first, second) = tokio::join!(
        app.clone().oneshot(booking_request(&token_a, slot_id, None)),
        app.clone().oneshot(booking_request(&token_b, slot_id, None)),
    );
    let statuses = [first.unwrap().status(), second.unwrap().status()];

    assert!(statuses.contains(&StatusCode::CREATED), "statuses: {statuses:?}");
    assert!(statuses.contains(&StatusCode::CONFLICT), "statuses: {statuses:?}");

    // Capacity never exceeded, exactly one booking
    let slot = store.slot_by_id(slot_id).await.unwrap();
    assert_eq!(slot.current_bookings, 1);
    assert_eq!(store.bookings().await.len(), 1);

    // Exactly one of the two tokens was consumed
    let mut used_count = 0;
    for token in [&token_a, &token_b] {
        if store.token_by_string(token).await.unwrap().used {
            used_count += 1;
        }
    }
    assert_eq!(used_count, 1);
}
