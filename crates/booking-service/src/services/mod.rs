//! Business logic for the scheduling service.
//!
//! Services sit between handlers and the storage layer:
//!
//! - `token_issuer` - proposal token generation and issuance
//! - `availability` - token validation and slot listing
//! - `booking` - the atomic booking commit flow
//! - `slot_planner` - working-hours slot generation
//! - `mailer` - outbound proposal and confirmation email

pub mod availability;
pub mod booking;
pub mod mailer;
pub mod slot_planner;
pub mod token_issuer;
