//! Integration tests for GET /api/meetings/availability.
//!
//! Covers the token state machine (format, existence, expiry, used), the
//! booking-window filter, and the date-grouped response shape. Availability
//! reads are idempotent: they never change token state.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use booking_service::models::LeadSourceType;
use booking_test_utils::{
    hex_token, sample_lead, sample_slot, test_app, MemoryStore, NoopMailer,
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

fn availability_request(token: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(format!("/api/meetings/availability?token={token}"))
        .body(Body::empty())
        .unwrap()
}

async fn store_with_lead_and_token(token: &str) -> (Arc<MemoryStore>, Uuid) {
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
    (store, lead_id)
}

#[tokio::test]
async fn availability_lists_slots_grouped_by_date() {
    let token = hex_token('a');
    let (store, _) = store_with_lead_and_token(&token).await;

    // Two slots on one day, one on the next, one beyond the 30-day window
    let now = Utc::now();
    let d1 = now + Duration::days(3);
    let d1_later = d1 + Duration::hours(4);
    let d2 = now + Duration::days(4);
    let far = now + Duration::days(40);
    store.add_slot(sample_slot(d1, 2)).await;
    store.add_slot(sample_slot(d1_later, 1)).await;
    store.add_slot(sample_slot(d2, 1)).await;
    store.add_slot(sample_slot(far, 1)).await;

    let app = test_app(store, Arc::new(NoopMailer));
    let response = app.oneshot(availability_request(&token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = read_json(response.into_body()).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["token_valid"], true);
    assert_eq!(json["data"]["total_slots"], 3);
    assert_eq!(json["data"]["lead_info"]["company_name"], "Acme Logistics");

    let by_date = json["data"]["slots_by_date"].as_object().unwrap();
    assert_eq!(by_date.len(), 2);
    let counts: Vec<usize> = by_date
        .values()
        .map(|slots| slots.as_array().unwrap().len())
        .collect();
    assert_eq!(counts.iter().sum::<usize>(), 3);

    // Every slot view carries its remaining capacity
    for slots in by_date.values() {
        for slot in slots.as_array().unwrap() {
            assert!(slot["available_spots"].as_i64().unwrap() >= 1);
        }
    }
}

#[tokio::test]
async fn availability_excludes_full_and_closed_slots() {
    let token = hex_token('b');
    let (store, _) = store_with_lead_and_token(&token).await;

    let mut full = sample_slot(Utc::now() + Duration::days(2), 1);
    full.current_bookings = 1;
    store.add_slot(full).await;

    let mut closed = sample_slot(Utc::now() + Duration::days(3), 1);
    closed.is_available = false;
    store.add_slot(closed).await;

    let open_id = store
        .add_slot(sample_slot(Utc::now() + Duration::days(4), 1))
        .await;

    let app = test_app(store, Arc::new(NoopMailer));
    let response = app.oneshot(availability_request(&token)).await.unwrap();
    let json = read_json(response.into_body()).await;

    assert_eq!(json["data"]["total_slots"], 1);
    let by_date = json["data"]["slots_by_date"].as_object().unwrap();
    let only = by_date
        .values()
        .next()
        .unwrap()
        .as_array()
        .unwrap()
        .first()
        .unwrap();
    assert_eq!(only["id"], open_id.to_string());
}

#[tokio::test]
async fn availability_rejects_malformed_tokens() {
    let store = Arc::new(MemoryStore::new());
    let app = test_app(store, Arc::new(NoopMailer));

    for bad in ["", "abc", &hex_token('a')[..63], &"G".repeat(64)] {
        let response = app
            .clone()
            .oneshot(availability_request(bad))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "token {bad:?}");
        let json = read_json(response.into_body()).await;
        assert_eq!(json["error"]["code"], "INVALID_TOKEN");
    }

    // Missing query parameter entirely
    let request = Request::builder()
        .method("GET")
        .uri("/api/meetings/availability")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn availability_unknown_token_is_not_found() {
    let store = Arc::new(MemoryStore::new());
    let app = test_app(store, Arc::new(NoopMailer));

    let response = app
        .oneshot(availability_request(&hex_token('c')))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = read_json(response.into_body()).await;
    assert_eq!(json["error"]["code"], "TOKEN_NOT_FOUND");
}

#[tokio::test]
async fn availability_expired_token_is_gone_with_expiry() {
    let token = hex_token('d');
    let store = Arc::new(MemoryStore::new());
    let lead_id = store
        .add_lead(LeadSourceType::ContactForm, sample_lead())
        .await;
    let expires_at = Utc::now() - Duration::hours(1);
    store
        .add_token(&token, LeadSourceType::ContactForm, lead_id, expires_at)
        .await;

    let app = test_app(store, Arc::new(NoopMailer));
    let response = app.oneshot(availability_request(&token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::GONE);

    let json = read_json(response.into_body()).await;
    assert_eq!(json["error"]["code"], "TOKEN_EXPIRED");
    assert!(json["error"]["expires_at"].is_string());
}

#[tokio::test]
async fn availability_used_token_is_gone_with_used_at() {
    let token = hex_token('e');
    let (store, _) = store_with_lead_and_token(&token).await;
    store.mark_token_used(&token, Utc::now()).await;

    let app = test_app(store, Arc::new(NoopMailer));
    let response = app.oneshot(availability_request(&token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::GONE);

    let json = read_json(response.into_body()).await;
    assert_eq!(json["error"]["code"], "TOKEN_ALREADY_USED");
    assert!(json["error"]["used_at"].is_string());
}

#[tokio::test]
async fn availability_expired_wins_over_used() {
    let token = hex_token('f');
    let store = Arc::new(MemoryStore::new());
    let lead_id = store
        .add_lead(LeadSourceType::ContactForm, sample_lead())
        .await;
    store
        .add_token(
            &token,
            LeadSourceType::ContactForm,
            lead_id,
            Utc::now() - Duration::days(1),
        )
        .await;
    store.mark_token_used(&token, Utc::now() - Duration::days(2)).await;

    let app = test_app(store, Arc::new(NoopMailer));
    let response = app.oneshot(availability_request(&token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::GONE);

    let json = read_json(response.into_body()).await;
    assert_eq!(json["error"]["code"], "TOKEN_EXPIRED");
}

#[tokio::test]
async fn token_expired_at_exact_boundary() {
    use booking_service::errors::BookingError;
    use booking_service::services::availability::validate_token;
    use chrono::TimeZone;

    let token = hex_token('9');
    let store = Arc::new(MemoryStore::new());
    let lead_id = store
        .add_lead(LeadSourceType::ContactForm, sample_lead())
        .await;
    let expires_at = Utc.with_ymd_and_hms(2026, 9, 1, 12, 0, 0).unwrap();
    store
        .add_token(&token, LeadSourceType::ContactForm, lead_id, expires_at)
        .await;

    // now == expires_at is already expired
    let err = validate_token(store.as_ref(), &token, expires_at)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BookingError::TokenExpired { expires_at: at } if at == expires_at
    ));

    // One second earlier the same token is still valid
    let row = validate_token(store.as_ref(), &token, expires_at - Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(row.token, token);
}

#[tokio::test]
async fn availability_reads_are_idempotent() {
    let token = hex_token('1');
    let (store, _) = store_with_lead_and_token(&token).await;
    store
        .add_slot(sample_slot(Utc::now() + Duration::days(2), 1))
        .await;

    let app = test_app(store.clone(), Arc::new(NoopMailer));

    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(availability_request(&token))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    // Repeated reads never consume the token
    let row = store.token_by_string(&token).await.unwrap();
    assert!(!row.used);
}
