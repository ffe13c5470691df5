//! HTTP routes for the scheduling service.
//!
//! Defines the Axum router and application state.

use crate::config::Config;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_admin_auth};
use crate::repositories::BookingStore;
use crate::services::mailer::ProposalMailer;
use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Storage backend.
    pub store: Arc<dyn BookingStore>,

    /// Outbound mailer.
    pub mailer: Arc<dyn ProposalMailer>,

    /// Service configuration.
    pub config: Config,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness probe (simple "OK") - public, unversioned
/// - `/ready` - Readiness probe (database ping) - public, unversioned
/// - `/metrics` - Prometheus metrics endpoint - public, unversioned
/// - `/api/meetings/*` - customer-facing availability and booking (public)
/// - `/api/admin/*` - proposal issuance and slot/booking administration
///   (admin bearer token required)
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        // Health check endpoints (unversioned operational endpoints)
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        // Customer-facing booking flow; the proposal token is the credential
        .route("/api/meetings/availability", get(handlers::get_availability))
        .route("/api/meetings/bookings", post(handlers::create_booking))
        .with_state(state.clone());

    // Metrics route with its own state
    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Admin routes (bearer token required)
    let admin_routes = Router::new()
        .route(
            "/api/admin/leads/send-meeting-proposal",
            post(handlers::send_meeting_proposal),
        )
        .route(
            "/api/admin/meetings/slots",
            get(handlers::list_slots).post(handlers::create_slot),
        )
        .route(
            "/api/admin/meetings/slots/generate",
            post(handlers::generate_slots),
        )
        .route("/api/admin/meetings/slots/:id", patch(handlers::update_slot))
        .route("/api/admin/meetings/bookings", get(handlers::list_bookings))
        .route(
            "/api/admin/meetings/bookings/:id",
            get(handlers::get_booking),
        )
        .route(
            "/api/admin/meetings/bookings/:id/cancel",
            post(handlers::cancel_booking),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_admin_auth,
        ))
        .with_state(state);

    // Merge routes and apply global middleware layers
    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}
