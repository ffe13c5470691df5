//! Storage abstraction for the meeting scheduling service.
//!
//! `BookingStore` is the single seam between request handling and storage.
//! Production uses [`PgStore`]; tests inject an in-memory implementation.
//! The commit and cancel operations are atomic units: either every effect
//! applies or none does.

pub mod postgres;

pub use postgres::PgStore;

use crate::models::{
    BookingStatus, LeadInfo, LeadSourceType, MeetingBookingRow, MeetingSlotRow, MeetingType,
    ProposalTokenRow,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Storage-layer failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("duplicate key: {0}")]
    Duplicate(String),

    /// The backend failed or returned an unreadable row.
    #[error("storage error: {0}")]
    Backend(String),
}

/// Outcome of the atomic booking commit.
///
/// Losing a race is a definitive outcome, not an error to retry: the
/// conditional updates decide exactly one winner per token and never let a
/// slot exceed its capacity.
#[derive(Debug)]
pub enum CommitOutcome {
    Booked(MeetingBookingRow),
    TokenAlreadyUsed { used_at: Option<DateTime<Utc>> },
    SlotFull,
    SlotNotFound,
}

/// Outcome of a booking cancellation.
#[derive(Debug)]
pub enum CancelOutcome {
    Cancelled(MeetingBookingRow),
    AlreadyCancelled,
    NotFound,
}

/// Fields for a new meeting slot.
#[derive(Debug, Clone)]
pub struct NewSlot {
    pub title: String,
    pub description: Option<String>,
    pub meeting_type: MeetingType,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub meeting_location: crate::models::LocationMode,
    pub meeting_url: Option<String>,
    pub office_address: Option<String>,
    pub timezone: String,
    pub max_bookings: i32,
}

/// Partial slot update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct SlotPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_available: Option<bool>,
    pub max_bookings: Option<i32>,
}

/// Filter and pagination for admin slot listings.
#[derive(Debug, Clone)]
pub struct SlotFilter {
    pub meeting_type: Option<MeetingType>,
    pub is_available: Option<bool>,
    pub limit: i64,
    pub offset: i64,
}

/// Filter and pagination for admin booking listings.
#[derive(Debug, Clone)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub limit: i64,
    pub offset: i64,
}

/// Storage operations used by the scheduling service.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Liveness probe against the backend.
    async fn ping(&self) -> Result<(), StoreError>;

    // ------------------------------------------------------------------
    // Leads
    // ------------------------------------------------------------------

    /// Resolve lead contact details from the lead-source table.
    async fn find_lead(
        &self,
        lead_type: LeadSourceType,
        lead_id: Uuid,
    ) -> Result<Option<LeadInfo>, StoreError>;

    /// Update the lead's `last_contacted_at` marker.
    async fn touch_lead_contacted(
        &self,
        lead_type: LeadSourceType,
        lead_id: Uuid,
    ) -> Result<(), StoreError>;

    /// Append a lead activity record. Callers treat this as
    /// fire-and-forget; failures are logged, never propagated to clients.
    async fn log_lead_activity(
        &self,
        lead_type: LeadSourceType,
        lead_id: Uuid,
        activity_type: &str,
        description: &str,
        metadata: serde_json::Value,
    ) -> Result<(), StoreError>;

    // ------------------------------------------------------------------
    // Proposal tokens
    // ------------------------------------------------------------------

    /// Insert a new unused proposal token. Returns `StoreError::Duplicate`
    /// if the token string collides with an existing row.
    async fn insert_token(
        &self,
        token: &str,
        lead_type: LeadSourceType,
        lead_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<ProposalTokenRow, StoreError>;

    /// Look up a token by its opaque string.
    async fn find_token(&self, token: &str) -> Result<Option<ProposalTokenRow>, StoreError>;

    // ------------------------------------------------------------------
    // Slots
    // ------------------------------------------------------------------

    /// Count bookable slots with a start time inside `[from, until]`.
    async fn count_open_slots(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<i64, StoreError>;

    /// List bookable slots with a start time inside `[from, until]`,
    /// ordered by start time.
    async fn list_open_slots(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<MeetingSlotRow>, StoreError>;

    /// Insert a new slot.
    async fn insert_slot(&self, slot: NewSlot) -> Result<MeetingSlotRow, StoreError>;

    /// Look up a slot by id.
    async fn find_slot(&self, id: Uuid) -> Result<Option<MeetingSlotRow>, StoreError>;

    /// Whether a slot already occupies exactly this window (bulk-generation
    /// duplicate check).
    async fn slot_exists_at(
        &self,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Admin listing with filters; returns the page and the total count.
    async fn list_slots(
        &self,
        filter: &SlotFilter,
    ) -> Result<(Vec<MeetingSlotRow>, i64), StoreError>;

    /// Apply a partial update; returns `None` when the slot does not exist.
    async fn update_slot(
        &self,
        id: Uuid,
        patch: &SlotPatch,
    ) -> Result<Option<MeetingSlotRow>, StoreError>;

    // ------------------------------------------------------------------
    // Bookings
    // ------------------------------------------------------------------

    /// Atomically consume the token, claim one spot on the slot, and insert
    /// the confirmed booking. The three effects apply together or not at
    /// all; a lost race yields `TokenAlreadyUsed` or `SlotFull`.
    async fn commit_booking(
        &self,
        token_id: Uuid,
        slot_id: Uuid,
        lead_type: LeadSourceType,
        lead_id: Uuid,
        lead: &LeadInfo,
        agenda: Option<&str>,
    ) -> Result<CommitOutcome, StoreError>;

    /// Admin listing with filters; returns the page and the total count.
    async fn list_bookings(
        &self,
        filter: &BookingFilter,
    ) -> Result<(Vec<MeetingBookingRow>, i64), StoreError>;

    /// Look up a booking by id.
    async fn find_booking(&self, id: Uuid) -> Result<Option<MeetingBookingRow>, StoreError>;

    /// Atomically cancel a confirmed booking and release its spot on the
    /// slot (`current_bookings` decrement).
    async fn cancel_booking(
        &self,
        id: Uuid,
        reason: Option<&str>,
    ) -> Result<CancelOutcome, StoreError>;
}
