//! Meeting Scheduling Service Library
//!
//! This library implements the proposal-driven meeting booking flow:
//!
//! - Proposal token issuance (admin sends a lead a single-use booking link)
//! - Availability listing (token-gated, grouped by calendar date)
//! - Atomic booking commit (one booking per token, never over capacity)
//! - Slot and booking administration
//!
//! # Architecture
//!
//! The service follows the Handler -> Service -> Repository pattern:
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> services/*.rs -> repositories/*.rs
//! ```
//!
//! # Modules
//!
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Admin authentication and HTTP metrics
//! - `models` - Data models and API envelopes
//! - `observability` - Metrics definitions and recorder setup
//! - `repositories` - The `BookingStore` seam and its Postgres backend
//! - `routes` - Axum router setup
//! - `services` - Token issuance, availability, booking, slot planning, mail

pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
