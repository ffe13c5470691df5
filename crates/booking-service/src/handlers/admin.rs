//! Admin endpoints.
//!
//! All routes here sit behind the admin bearer-token middleware:
//!
//! - `POST /api/admin/leads/send-meeting-proposal` - issue a proposal token
//! - `GET /api/admin/meetings/slots` - list slots
//! - `POST /api/admin/meetings/slots` - create a slot
//! - `POST /api/admin/meetings/slots/generate` - bulk-generate weekday slots
//! - `PATCH /api/admin/meetings/slots/{id}` - update a slot
//! - `GET /api/admin/meetings/bookings` - list bookings
//! - `GET /api/admin/meetings/bookings/{id}` - booking detail
//! - `POST /api/admin/meetings/bookings/{id}/cancel` - cancel a booking

use crate::errors::BookingError;
use crate::models::{
    AdminBookingView, AdminSlotView, ApiPage, ApiSuccess, BookingDetail, BookingStatus,
    CancelBookingRequest, CreateSlotRequest, GenerateSlotsReport, GenerateSlotsRequest, MeetingType,
    PageMeta, SendProposalRequest, SendProposalResponse, UpdateSlotRequest, DEFAULT_PER_PAGE,
    MAX_PER_PAGE,
};
use crate::repositories::{BookingFilter, CancelOutcome, NewSlot, SlotFilter, SlotPatch};
use crate::routes::AppState;
use crate::services::{slot_planner, token_issuer};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Resolve pagination query values to (page, per_page, limit, offset) with
/// bounds applied.
///
/// The list params structs keep `page`/`per_page` as top-level fields rather
/// than a flattened struct: serde_urlencoded cannot deserialize numeric
/// fields through `#[serde(flatten)]`.
fn resolve_page(page: Option<i64>, per_page: Option<i64>) -> (i64, i64, i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
    (page, per_page, per_page, (page - 1) * per_page)
}

// ============================================================================
// Handler: POST /api/admin/leads/send-meeting-proposal
// ============================================================================

/// Handler for POST /api/admin/leads/send-meeting-proposal
///
/// Issues a proposal token for a lead and emails the booking link.
///
/// # Response
///
/// - 200 OK: token issued and email sent
/// - 400 Bad Request: invalid body or no slots inside the proposal horizon
/// - 404 Not Found: lead does not exist
/// - 502 Bad Gateway: mail API failure
#[instrument(
    skip_all,
    name = "booking.handler.send_proposal",
    fields(method = "POST", endpoint = "/api/admin/leads/send-meeting-proposal")
)]
pub async fn send_meeting_proposal(
    State(state): State<Arc<AppState>>,
    body: axum::body::Bytes,
) -> Result<Json<ApiSuccess<SendProposalResponse>>, BookingError> {
    // Deserialize manually to return 400 (not Axum's default 422)
    let request: SendProposalRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!(target: "booking.handlers.admin", error = %e, "Invalid request body");
        BookingError::Validation("Invalid request body".to_string())
    })?;

    let response = token_issuer::issue_proposal(
        state.store.as_ref(),
        state.mailer.as_ref(),
        &state.config,
        request,
        Utc::now(),
    )
    .await?;

    Ok(Json(ApiSuccess::new(response)))
}

// ============================================================================
// Handlers: slot administration
// ============================================================================

/// Query parameters for the slot listing.
#[derive(Debug, Deserialize)]
pub struct SlotListParams {
    #[serde(default)]
    meeting_type: Option<MeetingType>,
    #[serde(default)]
    is_available: Option<bool>,
    #[serde(default)]
    page: Option<i64>,
    #[serde(default)]
    per_page: Option<i64>,
}

/// Handler for GET /api/admin/meetings/slots
#[instrument(
    skip_all,
    name = "booking.handler.list_slots",
    fields(method = "GET", endpoint = "/api/admin/meetings/slots")
)]
pub async fn list_slots(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SlotListParams>,
) -> Result<Json<ApiPage<AdminSlotView>>, BookingError> {
    let (page, per_page, limit, offset) = resolve_page(params.page, params.per_page);

    let filter = SlotFilter {
        meeting_type: params.meeting_type,
        is_available: params.is_available,
        limit,
        offset,
    };
    let (rows, total) = state.store.list_slots(&filter).await?;

    let data = rows.into_iter().map(AdminSlotView::from).collect();
    Ok(Json(ApiPage::new(data, PageMeta::new(total, page, per_page))))
}

/// Handler for POST /api/admin/meetings/slots
///
/// # Response
///
/// - 201 Created: slot created
/// - 400 Bad Request: invalid body or field validation
#[instrument(
    skip_all,
    name = "booking.handler.create_slot",
    fields(method = "POST", endpoint = "/api/admin/meetings/slots")
)]
pub async fn create_slot(
    State(state): State<Arc<AppState>>,
    body: axum::body::Bytes,
) -> Result<(StatusCode, Json<ApiSuccess<AdminSlotView>>), BookingError> {
    let request: CreateSlotRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!(target: "booking.handlers.admin", error = %e, "Invalid request body");
        BookingError::Validation("Invalid request body".to_string())
    })?;

    request
        .validate()
        .map_err(|m| BookingError::Validation(m.to_string()))?;

    let duration_minutes = i32::try_from((request.end_time - request.start_time).num_minutes())
        .map_err(|_| BookingError::Validation("Slot duration is too long".to_string()))?;

    let row = state
        .store
        .insert_slot(NewSlot {
            title: request.title,
            description: request.description,
            meeting_type: request.meeting_type,
            start_time: request.start_time,
            end_time: request.end_time,
            duration_minutes,
            meeting_location: request.meeting_location,
            meeting_url: request.meeting_url,
            office_address: request.office_address,
            timezone: request
                .timezone
                .unwrap_or_else(|| state.config.slot_timezone.name().to_string()),
            max_bookings: request.max_bookings.unwrap_or(1),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiSuccess::new(AdminSlotView::from(row))),
    ))
}

/// Handler for POST /api/admin/meetings/slots/generate
///
/// Bulk-generates weekday slots over the rolling horizon. An empty body
/// uses the configured defaults.
#[instrument(
    skip_all,
    name = "booking.handler.generate_slots",
    fields(method = "POST", endpoint = "/api/admin/meetings/slots/generate")
)]
pub async fn generate_slots(
    State(state): State<Arc<AppState>>,
    body: axum::body::Bytes,
) -> Result<Json<ApiSuccess<GenerateSlotsReport>>, BookingError> {
    let request: GenerateSlotsRequest = if body.is_empty() {
        GenerateSlotsRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            tracing::debug!(target: "booking.handlers.admin", error = %e, "Invalid request body");
            BookingError::Validation("Invalid request body".to_string())
        })?
    };

    let report =
        slot_planner::generate_slots(state.store.as_ref(), &state.config, &request, Utc::now())
            .await?;

    Ok(Json(ApiSuccess::new(report)))
}

/// Handler for PATCH /api/admin/meetings/slots/{id}
///
/// # Response
///
/// - 200 OK: updated slot
/// - 400 Bad Request: invalid body, validation failure, or no fields set
/// - 404 Not Found: slot does not exist
#[instrument(
    skip_all,
    name = "booking.handler.update_slot",
    fields(method = "PATCH", endpoint = "/api/admin/meetings/slots/{id}")
)]
pub async fn update_slot(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    body: axum::body::Bytes,
) -> Result<Json<ApiSuccess<AdminSlotView>>, BookingError> {
    let request: UpdateSlotRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!(target: "booking.handlers.admin", error = %e, "Invalid request body");
        BookingError::Validation("Invalid request body".to_string())
    })?;

    if !request.has_changes() {
        return Err(BookingError::Validation(
            "At least one field must be provided".to_string(),
        ));
    }
    request
        .validate()
        .map_err(|m| BookingError::Validation(m.to_string()))?;

    let patch = SlotPatch {
        title: request.title,
        description: request.description,
        is_available: request.is_available,
        max_bookings: request.max_bookings,
    };

    let Some(row) = state.store.update_slot(id, &patch).await? else {
        return Err(BookingError::SlotNotFound);
    };

    Ok(Json(ApiSuccess::new(AdminSlotView::from(row))))
}

// ============================================================================
// Handlers: booking administration
// ============================================================================

/// Query parameters for the booking listing.
#[derive(Debug, Deserialize)]
pub struct BookingListParams {
    #[serde(default)]
    status: Option<BookingStatus>,
    #[serde(default)]
    page: Option<i64>,
    #[serde(default)]
    per_page: Option<i64>,
}

/// Handler for GET /api/admin/meetings/bookings
#[instrument(
    skip_all,
    name = "booking.handler.list_bookings",
    fields(method = "GET", endpoint = "/api/admin/meetings/bookings")
)]
pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    Query(params): Query<BookingListParams>,
) -> Result<Json<ApiPage<AdminBookingView>>, BookingError> {
    let (page, per_page, limit, offset) = resolve_page(params.page, params.per_page);

    let filter = BookingFilter {
        status: params.status,
        limit,
        offset,
    };
    let (rows, total) = state.store.list_bookings(&filter).await?;

    let data = rows.into_iter().map(AdminBookingView::from).collect();
    Ok(Json(ApiPage::new(data, PageMeta::new(total, page, per_page))))
}

/// Handler for GET /api/admin/meetings/bookings/{id}
///
/// # Response
///
/// - 200 OK: booking with its slot
/// - 404 Not Found: booking does not exist
#[instrument(
    skip_all,
    name = "booking.handler.get_booking",
    fields(method = "GET", endpoint = "/api/admin/meetings/bookings/{id}")
)]
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiSuccess<BookingDetail>>, BookingError> {
    let Some(booking) = state.store.find_booking(id).await? else {
        return Err(BookingError::NotFound("Booking not found".to_string()));
    };

    let slot = state
        .store
        .find_slot(booking.meeting_slot_id)
        .await?
        .ok_or_else(|| {
            BookingError::Internal(format!(
                "booking {} references missing slot {}",
                booking.id, booking.meeting_slot_id
            ))
        })?;

    Ok(Json(ApiSuccess::new(BookingDetail {
        booking: AdminBookingView::from(booking),
        meeting: AdminSlotView::from(slot),
    })))
}

/// Handler for POST /api/admin/meetings/bookings/{id}/cancel
///
/// Cancels a confirmed booking and releases its spot on the slot in the
/// same atomic unit. An empty body cancels without a reason.
///
/// # Response
///
/// - 200 OK: cancelled booking
/// - 400 Bad Request: booking already cancelled
/// - 404 Not Found: booking does not exist
#[instrument(
    skip_all,
    name = "booking.handler.cancel_booking",
    fields(method = "POST", endpoint = "/api/admin/meetings/bookings/{id}/cancel")
)]
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    body: axum::body::Bytes,
) -> Result<Json<ApiSuccess<AdminBookingView>>, BookingError> {
    let request: CancelBookingRequest = if body.is_empty() {
        CancelBookingRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            tracing::debug!(target: "booking.handlers.admin", error = %e, "Invalid request body");
            BookingError::Validation("Invalid request body".to_string())
        })?
    };

    let outcome = state
        .store
        .cancel_booking(id, request.cancellation_reason.as_deref())
        .await?;

    match outcome {
        CancelOutcome::Cancelled(booking) => {
            tracing::info!(
                target: "booking.handlers.admin",
                booking_id = %booking.id,
                "Booking cancelled"
            );
            Ok(Json(ApiSuccess::new(AdminBookingView::from(booking))))
        }
        CancelOutcome::AlreadyCancelled => Err(BookingError::Validation(
            "Booking is already cancelled".to_string(),
        )),
        CancelOutcome::NotFound => Err(BookingError::NotFound("Booking not found".to_string())),
    }
}
