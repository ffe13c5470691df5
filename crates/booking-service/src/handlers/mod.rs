//! HTTP request handlers.

pub mod admin;
pub mod health;
pub mod meetings;
pub mod metrics;

pub use admin::{
    cancel_booking, create_slot, generate_slots, get_booking, list_bookings, list_slots,
    send_meeting_proposal, update_slot,
};
pub use health::{health_check, readiness_check};
pub use meetings::{create_booking, get_availability};
pub use metrics::metrics_handler;
