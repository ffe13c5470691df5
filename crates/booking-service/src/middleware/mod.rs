//! Middleware for the scheduling service.

pub mod auth;
pub mod http_metrics;

pub use auth::{require_admin_auth, AdminClaims};
pub use http_metrics::http_metrics_middleware;
