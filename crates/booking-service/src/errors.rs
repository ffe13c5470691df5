//! Scheduling service error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl and
//! serialize as `{"success": false, "error": {code, message, ...}}`.
//! Messages for 5xx responses are intentionally generic; the actual
//! failure is logged server-side.

use crate::repositories::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Scheduling service error type.
///
/// Maps to HTTP status codes:
/// - InvalidToken, Validation, NoSlotsAvailable: 400 Bad Request
/// - Unauthorized: 401 Unauthorized
/// - TokenNotFound, LeadNotFound, SlotNotFound, NotFound: 404 Not Found
/// - SlotFull: 409 Conflict
/// - TokenExpired, TokenAlreadyUsed: 410 Gone
/// - MailDelivery: 502 Bad Gateway
/// - Database, Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum BookingError {
    /// Token fails the format pre-check (64 lowercase hex characters).
    #[error("Invalid token format")]
    InvalidToken,

    #[error("Validation failed: {0}")]
    Validation(String),

    /// Proposal issuance refused: nothing bookable inside the horizon.
    #[error("No slots available in the proposal horizon")]
    NoSlotsAvailable,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Token string is well-formed but unknown.
    #[error("Token not found")]
    TokenNotFound,

    #[error("Lead not found")]
    LeadNotFound,

    #[error("Slot not found")]
    SlotNotFound,

    #[error("Not found: {0}")]
    NotFound(String),

    /// Slot reached capacity, lost to a concurrent booking, or was closed.
    #[error("Slot is fully booked")]
    SlotFull,

    #[error("Token expired at {expires_at}")]
    TokenExpired { expires_at: DateTime<Utc> },

    #[error("Token already used")]
    TokenAlreadyUsed { used_at: Option<DateTime<Utc>> },

    #[error("Mail delivery failed: {0}")]
    MailDelivery(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BookingError {
    /// Returns the stable error code string for this error.
    pub fn code(&self) -> &'static str {
        match self {
            BookingError::InvalidToken => "INVALID_TOKEN",
            BookingError::Validation(_) => "VALIDATION_ERROR",
            BookingError::NoSlotsAvailable => "NO_SLOTS_AVAILABLE",
            BookingError::Unauthorized(_) => "UNAUTHORIZED",
            BookingError::TokenNotFound => "TOKEN_NOT_FOUND",
            BookingError::LeadNotFound => "LEAD_NOT_FOUND",
            BookingError::SlotNotFound => "SLOT_NOT_FOUND",
            BookingError::NotFound(_) => "NOT_FOUND",
            BookingError::SlotFull => "SLOT_FULL",
            BookingError::TokenExpired { .. } => "TOKEN_EXPIRED",
            BookingError::TokenAlreadyUsed { .. } => "TOKEN_ALREADY_USED",
            BookingError::MailDelivery(_) => "EMAIL_SEND_FAILED",
            BookingError::Database(_) => "DATABASE_ERROR",
            BookingError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            BookingError::InvalidToken
            | BookingError::Validation(_)
            | BookingError::NoSlotsAvailable => 400,
            BookingError::Unauthorized(_) => 401,
            BookingError::TokenNotFound
            | BookingError::LeadNotFound
            | BookingError::SlotNotFound
            | BookingError::NotFound(_) => 404,
            BookingError::SlotFull => 409,
            BookingError::TokenExpired { .. } | BookingError::TokenAlreadyUsed { .. } => 410,
            BookingError::MailDelivery(_) => 502,
            BookingError::Database(_) | BookingError::Internal(_) => 500,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    used_at: Option<DateTime<Utc>>,
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        let mut expires_at = None;
        let mut used_at = None;

        let (status, message) = match &self {
            BookingError::InvalidToken => {
                (StatusCode::BAD_REQUEST, "Invalid token format".to_string())
            }
            BookingError::Validation(reason) => (StatusCode::BAD_REQUEST, reason.clone()),
            BookingError::NoSlotsAvailable => (
                StatusCode::BAD_REQUEST,
                "No meeting slots are available for booking. Please create slots first."
                    .to_string(),
            ),
            BookingError::Unauthorized(reason) => (StatusCode::UNAUTHORIZED, reason.clone()),
            BookingError::TokenNotFound => {
                (StatusCode::NOT_FOUND, "Token not found".to_string())
            }
            BookingError::LeadNotFound => (StatusCode::NOT_FOUND, "Lead not found".to_string()),
            BookingError::SlotNotFound => (StatusCode::NOT_FOUND, "Slot not found".to_string()),
            BookingError::NotFound(resource) => (StatusCode::NOT_FOUND, resource.clone()),
            BookingError::SlotFull => (
                StatusCode::CONFLICT,
                "This slot is fully booked. Please choose another time.".to_string(),
            ),
            BookingError::TokenExpired { expires_at: at } => {
                expires_at = Some(*at);
                (StatusCode::GONE, "This booking link has expired".to_string())
            }
            BookingError::TokenAlreadyUsed { used_at: at } => {
                used_at = *at;
                (
                    StatusCode::GONE,
                    "This booking link has already been used".to_string(),
                )
            }
            BookingError::MailDelivery(reason) => {
                tracing::error!(target: "booking.mail", error = %reason, "Mail delivery failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "Failed to send the email. Please try again.".to_string(),
                )
            }
            BookingError::Database(err) => {
                // Log actual error server-side, return generic message to client
                tracing::error!(target: "booking.database", error = %err, "Database operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal database error occurred".to_string(),
                )
            }
            BookingError::Internal(err) => {
                tracing::error!(target: "booking.internal", error = %err, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        let error_response = ErrorResponse {
            success: false,
            error: ErrorDetail {
                code: self.code().to_string(),
                message,
                expires_at,
                used_at,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        // Add WWW-Authenticate header for 401 responses
        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) =
                "Bearer realm=\"booking-api\", error=\"invalid_token\"".parse()
            {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(detail) => BookingError::Internal(detail),
            StoreError::Backend(detail) => BookingError::Database(detail),
        }
    }
}
