//! Metrics definitions for the scheduling service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `booking_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: 7 values max (GET, POST, PATCH, DELETE, PUT, HEAD, OPTIONS)
//! - `endpoint`: ~10 values (parameterized paths)
//! - `status`: 3 values (success, error, timeout)
//! - `operation`: bounded by code (find_token, commit_booking, etc.)
//! - `outcome`: bounded by the commit/cancel outcome variants

use metrics::{counter, histogram};
use std::time::Duration;

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `booking_http_requests_total`, `booking_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
///
/// This captures ALL HTTP responses including framework-level errors like:
/// - 415 Unsupported Media Type (wrong Content-Type)
/// - 400 Bad Request (JSON parse errors)
/// - 404 Not Found
/// - 405 Method Not Allowed
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    // Normalize endpoint to prevent cardinality explosion
    let normalized_endpoint = normalize_endpoint(endpoint);

    // Determine status category for simplified querying
    let status = categorize_status_code(status_code);

    histogram!("booking_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.clone(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("booking_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Normalize endpoint path to prevent label cardinality explosion
///
/// Replaces dynamic segments (UUIDs) with placeholders.
fn normalize_endpoint(path: &str) -> String {
    // Known static paths
    match path {
        "/" => "/".to_string(),
        "/health" => "/health".to_string(),
        "/ready" => "/ready".to_string(),
        "/metrics" => "/metrics".to_string(),
        "/api/meetings/availability" => "/api/meetings/availability".to_string(),
        "/api/meetings/bookings" => "/api/meetings/bookings".to_string(),
        "/api/admin/leads/send-meeting-proposal" => {
            "/api/admin/leads/send-meeting-proposal".to_string()
        }
        "/api/admin/meetings/slots" => "/api/admin/meetings/slots".to_string(),
        "/api/admin/meetings/slots/generate" => "/api/admin/meetings/slots/generate".to_string(),
        "/api/admin/meetings/bookings" => "/api/admin/meetings/bookings".to_string(),
        _ => normalize_dynamic_endpoint(path),
    }
}

/// Normalize paths with dynamic segments
fn normalize_dynamic_endpoint(path: &str) -> String {
    if path.starts_with("/api/admin/meetings/slots/") {
        let parts: Vec<&str> = path.split('/').collect();

        // /api/admin/meetings/slots/{id} → parts.len() == 6
        if parts.len() == 6 {
            return "/api/admin/meetings/slots/{id}".to_string();
        }
    }

    if path.starts_with("/api/admin/meetings/bookings/") {
        let parts: Vec<&str> = path.split('/').collect();

        // /api/admin/meetings/bookings/{id} → parts.len() == 6
        if parts.len() == 6 {
            return "/api/admin/meetings/bookings/{id}".to_string();
        }

        // /api/admin/meetings/bookings/{id}/cancel → parts.len() == 7
        if parts.len() == 7 {
            if let Some(action) = parts.get(6) {
                if *action == "cancel" {
                    return "/api/admin/meetings/bookings/{id}/cancel".to_string();
                }
            }
        }
    }

    // Unknown paths normalized to "/other" to bound cardinality
    "/other".to_string()
}

// ============================================================================
// Database Metrics
// ============================================================================

/// Record database query execution
///
/// Metric: `booking_db_query_duration_seconds`, `booking_db_queries_total`
/// Labels: `operation`, `status`
///
/// Operations: find_token, insert_token, find_lead, list_open_slots,
///             insert_slot, commit_booking, cancel_booking, etc.
pub fn record_db_query(operation: &str, status: &str, duration: Duration) {
    histogram!("booking_db_query_duration_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("booking_db_queries_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Proposal / Booking Flow Metrics
// ============================================================================

/// Record a proposal token issuance attempt
///
/// Metric: `booking_tokens_issued_total`
/// Labels: `status` (issued, lead_not_found, no_slots, error)
pub fn record_token_issued(status: &str) {
    counter!("booking_tokens_issued_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record an availability lookup outcome
///
/// Metric: `booking_availability_lookups_total`
/// Labels: `status` (ok, invalid_format, not_found, expired, used, error)
pub fn record_availability_lookup(status: &str) {
    counter!("booking_availability_lookups_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a booking commit attempt and its duration
///
/// Metric: `booking_commits_total`, `booking_commit_duration_seconds`
/// Labels: `outcome` (booked, token_used, slot_full, slot_not_found, error)
pub fn record_booking_commit(outcome: &str, duration: Duration) {
    histogram!("booking_commit_duration_seconds",
        "outcome" => outcome.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("booking_commits_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a mail delivery attempt
///
/// Metric: `booking_mail_deliveries_total`
/// Labels: `kind` (proposal, confirmation), `status` (sent, failed)
pub fn record_mail_delivery(kind: &str, status: &str) {
    counter!("booking_mail_deliveries_total",
        "kind" => kind.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Tests
// ============================================================================
