//! Public meeting endpoints.
//!
//! Implements the customer-facing flow:
//!
//! - `GET /api/meetings/availability?token=...` - list bookable slots
//! - `POST /api/meetings/bookings` - commit a booking
//!
//! # Security
//!
//! Both endpoints are public; the proposal token is the only credential.
//! The token format is checked before any storage lookup, and error
//! messages never reveal whether a well-formed token exists.

use crate::errors::BookingError;
use crate::models::{ApiSuccess, AvailabilityData, BookMeetingRequest, BookingConfirmation};
use crate::routes::AppState;
use crate::services::{availability, booking};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;

/// Query parameters for the availability endpoint.
#[derive(Debug, Deserialize)]
pub struct AvailabilityParams {
    #[serde(default)]
    pub token: Option<String>,
}

/// Handler for GET /api/meetings/availability
///
/// # Response
///
/// - 200 OK: slots grouped by date for a valid token
/// - 400 Bad Request: missing or malformed token
/// - 404 Not Found: well-formed token that does not exist
/// - 410 Gone: expired or already-used token
#[instrument(
    skip_all,
    name = "booking.handler.availability",
    fields(method = "GET", endpoint = "/api/meetings/availability")
)]
pub async fn get_availability(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AvailabilityParams>,
) -> Result<Json<ApiSuccess<AvailabilityData>>, BookingError> {
    let token = params.token.unwrap_or_default();

    let data = availability::lookup_availability(
        state.store.as_ref(),
        &state.config,
        &token,
        Utc::now(),
    )
    .await?;

    Ok(Json(ApiSuccess::new(data)))
}

/// Handler for POST /api/meetings/bookings
///
/// # Response
///
/// - 201 Created: booking committed
/// - 400 Bad Request: malformed body, malformed token, or field validation
/// - 404 Not Found: unknown token, lead, or slot
/// - 409 Conflict: slot at capacity
/// - 410 Gone: expired or already-used token
#[instrument(
    skip_all,
    name = "booking.handler.book",
    fields(method = "POST", endpoint = "/api/meetings/bookings")
)]
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    body: axum::body::Bytes,
) -> Result<(StatusCode, Json<ApiSuccess<BookingConfirmation>>), BookingError> {
    // Deserialize manually to return 400 (not Axum's default 422)
    let request: BookMeetingRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!(target: "booking.handlers.meetings", error = %e, "Invalid request body");
        BookingError::Validation("Invalid request body".to_string())
    })?;

    let confirmation = booking::book_meeting(
        state.store.as_ref(),
        state.mailer.as_ref(),
        request,
        Utc::now(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(ApiSuccess::new(confirmation))))
}
