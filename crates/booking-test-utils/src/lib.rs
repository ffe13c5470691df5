//! # Booking Test Utilities
//!
//! Shared test utilities for the meeting scheduling service:
//!
//! - [`MemoryStore`] - in-memory `BookingStore` with fixture builders
//! - [`NoopMailer`] / [`RecordingMailer`] - `ProposalMailer` test doubles
//! - [`mint_admin_token`] - HS256 bearer tokens for the admin routes
//! - [`test_config`] / [`test_app`] - ready-to-use config and router
//!
//! `MemoryStore` serializes every operation through a single async mutex,
//! so the multi-step commit and cancel operations are atomic exactly like
//! their SQL-transaction counterparts.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use booking_service::config::Config;
use booking_service::middleware::AdminClaims;
use booking_service::models::{
    BookingStatus, LeadInfo, LeadSourceType, LocationMode, MeetingBookingRow, MeetingSlotRow,
    MeetingType, ProposalTokenRow,
};
use booking_service::observability;
use booking_service::repositories::{
    BookingFilter, BookingStore, CancelOutcome, CommitOutcome, NewSlot, SlotFilter, SlotPatch,
    StoreError,
};
use booking_service::routes::{build_routes, AppState};
use booking_service::services::mailer::{
    ConfirmationEmail, MailError, ProposalEmail, ProposalMailer,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::Mutex;
use uuid::Uuid;

// ============================================================================
// In-memory store
// ============================================================================

/// One recorded lead activity.
#[derive(Debug, Clone)]
pub struct ActivityRecord {
    pub lead_type: LeadSourceType,
    pub lead_id: Uuid,
    pub activity_type: String,
    pub description: String,
    pub metadata: serde_json::Value,
}

#[derive(Default)]
struct StoreState {
    leads: HashMap<(LeadSourceType, Uuid), LeadInfo>,
    contacted: Vec<(LeadSourceType, Uuid)>,
    activities: Vec<ActivityRecord>,
    tokens: Vec<ProposalTokenRow>,
    slots: Vec<MeetingSlotRow>,
    bookings: Vec<MeetingBookingRow>,
}

/// In-memory `BookingStore` for tests.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Fixtures
    // ------------------------------------------------------------------

    /// Register a lead and return its id.
    pub async fn add_lead(&self, lead_type: LeadSourceType, lead: LeadInfo) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().await.leads.insert((lead_type, id), lead);
        id
    }

    /// Insert a slot row directly (see [`sample_slot`]).
    pub async fn add_slot(&self, slot: MeetingSlotRow) -> Uuid {
        let id = slot.id;
        self.state.lock().await.slots.push(slot);
        id
    }

    /// Insert an unused proposal token row directly.
    pub async fn add_token(
        &self,
        token: &str,
        lead_type: LeadSourceType,
        lead_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> ProposalTokenRow {
        let row = ProposalTokenRow {
            id: Uuid::new_v4(),
            token: token.to_string(),
            lead_type,
            lead_id,
            expires_at,
            used: false,
            used_at: None,
            created_at: Utc::now(),
        };
        self.state.lock().await.tokens.push(row.clone());
        row
    }

    /// Mark an existing token used (for pre-used fixtures).
    pub async fn mark_token_used(&self, token: &str, used_at: DateTime<Utc>) {
        let mut state = self.state.lock().await;
        if let Some(row) = state.tokens.iter_mut().find(|t| t.token == token) {
            row.used = true;
            row.used_at = Some(used_at);
        }
    }

    // ------------------------------------------------------------------
    // Assertion accessors
    // ------------------------------------------------------------------

    pub async fn activities(&self) -> Vec<ActivityRecord> {
        self.state.lock().await.activities.clone()
    }

    pub async fn contacted(&self) -> Vec<(LeadSourceType, Uuid)> {
        self.state.lock().await.contacted.clone()
    }

    pub async fn bookings(&self) -> Vec<MeetingBookingRow> {
        self.state.lock().await.bookings.clone()
    }

    pub async fn slot_by_id(&self, id: Uuid) -> Option<MeetingSlotRow> {
        self.state
            .lock()
            .await
            .slots
            .iter()
            .find(|s| s.id == id)
            .cloned()
    }

    pub async fn token_by_string(&self, token: &str) -> Option<ProposalTokenRow> {
        self.state
            .lock()
            .await
            .tokens
            .iter()
            .find(|t| t.token == token)
            .cloned()
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn find_lead(
        &self,
        lead_type: LeadSourceType,
        lead_id: Uuid,
    ) -> Result<Option<LeadInfo>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .leads
            .get(&(lead_type, lead_id))
            .cloned())
    }

    async fn touch_lead_contacted(
        &self,
        lead_type: LeadSourceType,
        lead_id: Uuid,
    ) -> Result<(), StoreError> {
        self.state
            .lock()
            .await
            .contacted
            .push((lead_type, lead_id));
        Ok(())
    }

    async fn log_lead_activity(
        &self,
        lead_type: LeadSourceType,
        lead_id: Uuid,
        activity_type: &str,
        description: &str,
        metadata: serde_json::Value,
    ) -> Result<(), StoreError> {
        self.state.lock().await.activities.push(ActivityRecord {
            lead_type,
            lead_id,
            activity_type: activity_type.to_string(),
            description: description.to_string(),
            metadata,
        });
        Ok(())
    }

    async fn insert_token(
        &self,
        token: &str,
        lead_type: LeadSourceType,
        lead_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<ProposalTokenRow, StoreError> {
        let mut state = self.state.lock().await;
        if state.tokens.iter().any(|t| t.token == token) {
            return Err(StoreError::Duplicate(format!("token {token}")));
        }
        let row = ProposalTokenRow {
            id: Uuid::new_v4(),
            token: token.to_string(),
            lead_type,
            lead_id,
            expires_at,
            used: false,
            used_at: None,
            created_at: Utc::now(),
        };
        state.tokens.push(row.clone());
        Ok(row)
    }

    async fn find_token(&self, token: &str) -> Result<Option<ProposalTokenRow>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .tokens
            .iter()
            .find(|t| t.token == token)
            .cloned())
    }

    async fn count_open_slots(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .slots
            .iter()
            .filter(|s| slot_is_open(s, from, until))
            .count() as i64)
    }

    async fn list_open_slots(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<MeetingSlotRow>, StoreError> {
        let state = self.state.lock().await;
        let mut slots: Vec<MeetingSlotRow> = state
            .slots
            .iter()
            .filter(|s| slot_is_open(s, from, until))
            .cloned()
            .collect();
        slots.sort_by_key(|s| s.start_time);
        Ok(slots)
    }

    async fn insert_slot(&self, slot: NewSlot) -> Result<MeetingSlotRow, StoreError> {
        let now = Utc::now();
        let row = MeetingSlotRow {
            id: Uuid::new_v4(),
            title: slot.title,
            description: slot.description,
            meeting_type: slot.meeting_type,
            start_time: slot.start_time,
            end_time: slot.end_time,
            duration_minutes: slot.duration_minutes,
            meeting_location: slot.meeting_location,
            meeting_url: slot.meeting_url,
            office_address: slot.office_address,
            timezone: slot.timezone,
            max_bookings: slot.max_bookings,
            current_bookings: 0,
            is_available: true,
            created_at: now,
            updated_at: now,
        };
        self.state.lock().await.slots.push(row.clone());
        Ok(row)
    }

    async fn find_slot(&self, id: Uuid) -> Result<Option<MeetingSlotRow>, StoreError> {
        Ok(self.slot_by_id(id).await)
    }

    async fn slot_exists_at(
        &self,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .slots
            .iter()
            .any(|s| s.start_time == start_time && s.end_time == end_time))
    }

    async fn list_slots(
        &self,
        filter: &SlotFilter,
    ) -> Result<(Vec<MeetingSlotRow>, i64), StoreError> {
        let state = self.state.lock().await;
        let mut matching: Vec<MeetingSlotRow> = state
            .slots
            .iter()
            .filter(|s| {
                filter
                    .meeting_type
                    .map_or(true, |t| s.meeting_type == t)
                    && filter.is_available.map_or(true, |a| s.is_available == a)
            })
            .cloned()
            .collect();
        matching.sort_by_key(|s| s.start_time);
        let total = matching.len() as i64;
        let page = paginate(matching, filter.limit, filter.offset);
        Ok((page, total))
    }

    async fn update_slot(
        &self,
        id: Uuid,
        patch: &SlotPatch,
    ) -> Result<Option<MeetingSlotRow>, StoreError> {
        let mut state = self.state.lock().await;
        let Some(slot) = state.slots.iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };
        if let Some(title) = &patch.title {
            slot.title = title.clone();
        }
        if let Some(description) = &patch.description {
            slot.description = Some(description.clone());
        }
        if let Some(is_available) = patch.is_available {
            slot.is_available = is_available;
        }
        if let Some(max_bookings) = patch.max_bookings {
            // Never below the committed bookings, matching the SQL backend
            slot.max_bookings = max_bookings.max(slot.current_bookings);
        }
        slot.updated_at = Utc::now();
        Ok(Some(slot.clone()))
    }

    async fn commit_booking(
        &self,
        token_id: Uuid,
        slot_id: Uuid,
        lead_type: LeadSourceType,
        lead_id: Uuid,
        lead: &LeadInfo,
        agenda: Option<&str>,
    ) -> Result<CommitOutcome, StoreError> {
        // Single critical section: the whole commit is atomic.
        let mut state = self.state.lock().await;

        let Some(token) = state.tokens.iter_mut().find(|t| t.id == token_id) else {
            return Err(StoreError::Backend(format!("unknown token id {token_id}")));
        };
        if token.used {
            return Ok(CommitOutcome::TokenAlreadyUsed {
                used_at: token.used_at,
            });
        }

        let slot_state = state
            .slots
            .iter()
            .find(|s| s.id == slot_id)
            .map(|s| (s.is_available, s.current_bookings < s.max_bookings));
        match slot_state {
            None => return Ok(CommitOutcome::SlotNotFound),
            Some((false, _)) => return Ok(CommitOutcome::SlotNotFound),
            Some((true, false)) => return Ok(CommitOutcome::SlotFull),
            Some((true, true)) => {}
        }

        let now = Utc::now();
        if let Some(token) = state.tokens.iter_mut().find(|t| t.id == token_id) {
            token.used = true;
            token.used_at = Some(now);
        }
        if let Some(slot) = state.slots.iter_mut().find(|s| s.id == slot_id) {
            slot.current_bookings += 1;
            slot.updated_at = now;
        }

        let booking = MeetingBookingRow {
            id: Uuid::new_v4(),
            meeting_slot_id: slot_id,
            lead_type,
            lead_id,
            company_name: lead.company_name.clone(),
            contact_name: lead.contact_name.clone(),
            email: lead.email.clone(),
            phone: lead.phone.clone(),
            requested_agenda: agenda.map(str::to_string),
            booking_status: BookingStatus::Confirmed,
            cancellation_reason: None,
            created_at: now,
            cancelled_at: None,
        };
        state.bookings.push(booking.clone());

        Ok(CommitOutcome::Booked(booking))
    }

    async fn list_bookings(
        &self,
        filter: &BookingFilter,
    ) -> Result<(Vec<MeetingBookingRow>, i64), StoreError> {
        let state = self.state.lock().await;
        let mut matching: Vec<MeetingBookingRow> = state
            .bookings
            .iter()
            .filter(|b| filter.status.map_or(true, |s| b.booking_status == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = matching.len() as i64;
        let page = paginate(matching, filter.limit, filter.offset);
        Ok((page, total))
    }

    async fn find_booking(&self, id: Uuid) -> Result<Option<MeetingBookingRow>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .bookings
            .iter()
            .find(|b| b.id == id)
            .cloned())
    }

    async fn cancel_booking(
        &self,
        id: Uuid,
        reason: Option<&str>,
    ) -> Result<CancelOutcome, StoreError> {
        let mut state = self.state.lock().await;

        let Some(booking) = state.bookings.iter_mut().find(|b| b.id == id) else {
            return Ok(CancelOutcome::NotFound);
        };
        if booking.booking_status == BookingStatus::Cancelled {
            return Ok(CancelOutcome::AlreadyCancelled);
        }

        booking.booking_status = BookingStatus::Cancelled;
        booking.cancellation_reason = reason.map(str::to_string);
        booking.cancelled_at = Some(Utc::now());
        let cancelled = booking.clone();
        let slot_id = cancelled.meeting_slot_id;

        if let Some(slot) = state.slots.iter_mut().find(|s| s.id == slot_id) {
            if slot.current_bookings > 0 {
                slot.current_bookings -= 1;
                slot.updated_at = Utc::now();
            }
        }

        Ok(CancelOutcome::Cancelled(cancelled))
    }
}

fn slot_is_open(slot: &MeetingSlotRow, from: DateTime<Utc>, until: DateTime<Utc>) -> bool {
    slot.is_available
        && slot.current_bookings < slot.max_bookings
        && slot.start_time >= from
        && slot.start_time <= until
}

fn paginate<T>(items: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
    items
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

// ============================================================================
// Mailers
// ============================================================================

/// Mailer that accepts everything and records nothing.
#[derive(Default)]
pub struct NoopMailer;

#[async_trait]
impl ProposalMailer for NoopMailer {
    async fn send_proposal(&self, _email: &ProposalEmail) -> Result<(), MailError> {
        Ok(())
    }

    async fn send_confirmation(&self, _email: &ConfirmationEmail) -> Result<(), MailError> {
        Ok(())
    }
}

/// Mailer that records sent email and can be told to fail.
#[derive(Default)]
pub struct RecordingMailer {
    pub fail_proposals: AtomicBool,
    pub fail_confirmations: AtomicBool,
    proposals: Mutex<Vec<ProposalEmail>>,
    confirmations: Mutex<Vec<ConfirmationEmail>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_proposals() -> Self {
        let mailer = Self::default();
        mailer.fail_proposals.store(true, Ordering::SeqCst);
        mailer
    }

    pub fn failing_confirmations() -> Self {
        let mailer = Self::default();
        mailer.fail_confirmations.store(true, Ordering::SeqCst);
        mailer
    }

    pub async fn proposals(&self) -> Vec<ProposalEmail> {
        self.proposals.lock().await.clone()
    }

    pub async fn confirmations(&self) -> Vec<ConfirmationEmail> {
        self.confirmations.lock().await.clone()
    }
}

#[async_trait]
impl ProposalMailer for RecordingMailer {
    async fn send_proposal(&self, email: &ProposalEmail) -> Result<(), MailError> {
        if self.fail_proposals.load(Ordering::SeqCst) {
            return Err(MailError::Api("simulated mail API failure".to_string()));
        }
        self.proposals.lock().await.push(email.clone());
        Ok(())
    }

    async fn send_confirmation(&self, email: &ConfirmationEmail) -> Result<(), MailError> {
        if self.fail_confirmations.load(Ordering::SeqCst) {
            return Err(MailError::Api("simulated mail API failure".to_string()));
        }
        self.confirmations.lock().await.push(email.clone());
        Ok(())
    }
}

// ============================================================================
// Config, tokens, router
// ============================================================================

/// Admin JWT secret used by [`test_config`].
pub const TEST_ADMIN_SECRET: &str = "test-admin-secret";

/// Configuration with test defaults and required values filled in.
pub fn test_config() -> Config {
    let vars = HashMap::from([
        (
            "DATABASE_URL".to_string(),
            "postgres://localhost/booking_test".to_string(),
        ),
        (
            "ADMIN_JWT_SECRET".to_string(),
            TEST_ADMIN_SECRET.to_string(),
        ),
        ("MAIL_API_KEY".to_string(), "re_test_key".to_string()),
        ("SLOT_TIMEZONE".to_string(), "UTC".to_string()),
    ]);
    Config::from_vars(&vars).expect("test config must be valid")
}

/// Mint a valid admin bearer token for the given secret.
pub fn mint_admin_token(secret: &str) -> String {
    let now = Utc::now();
    let claims = AdminClaims {
        sub: "test-admin".to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::hours(1)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("token encoding must succeed")
}

/// Process-wide Prometheus handle. The recorder can only be installed once
/// per process, so every test router shares this handle.
pub fn test_metrics_handle() -> PrometheusHandle {
    static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
    HANDLE
        .get_or_init(|| {
            observability::init_metrics_recorder().unwrap_or_else(|_| {
                metrics_exporter_prometheus::PrometheusBuilder::new()
                    .build_recorder()
                    .handle()
            })
        })
        .clone()
}

/// Build the full application router over the given store and mailer.
pub fn test_app(store: Arc<MemoryStore>, mailer: Arc<dyn ProposalMailer>) -> axum::Router {
    let state = Arc::new(AppState {
        store,
        mailer,
        config: test_config(),
    });
    build_routes(state, test_metrics_handle())
}

// ============================================================================
// Fixture builders
// ============================================================================

/// A bookable online slot starting at `start` with the given capacity.
pub fn sample_slot(start: DateTime<Utc>, max_bookings: i32) -> MeetingSlotRow {
    let now = Utc::now();
    MeetingSlotRow {
        id: Uuid::new_v4(),
        title: "Demo session".to_string(),
        description: Some("Product walkthrough".to_string()),
        meeting_type: MeetingType::Demo,
        start_time: start,
        end_time: start + Duration::hours(1),
        duration_minutes: 60,
        meeting_location: LocationMode::Online,
        meeting_url: Some("https://meet.example.com/demo".to_string()),
        office_address: None,
        timezone: "UTC".to_string(),
        max_bookings,
        current_bookings: 0,
        is_available: true,
        created_at: now,
        updated_at: now,
    }
}

/// A lead with plausible contact details.
pub fn sample_lead() -> LeadInfo {
    LeadInfo {
        company_name: "Acme Logistics".to_string(),
        contact_name: "Jordan Kim".to_string(),
        email: "jordan.kim@acme.example".to_string(),
        phone: Some("+82-10-0000-0000".to_string()),
    }
}

/// A structurally valid 64-character token built from a short seed.
pub fn hex_token(seed: char) -> String {
    std::iter::repeat(seed).take(64).collect()
}
