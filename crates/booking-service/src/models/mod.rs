//! Meeting scheduling models.
//!
//! Contains the storage row types, API request/response types, and the
//! enumerations shared across handlers, services, and repositories.
//! String forms match the values stored in the database.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Maximum meeting purpose length for proposal emails (in bytes).
pub const MAX_MEETING_PURPOSE_LENGTH: usize = 500;

/// Maximum agenda length for booking requests (in bytes).
pub const MAX_AGENDA_LENGTH: usize = 2000;

/// Maximum token expiry horizon in days.
pub const MAX_TOKEN_EXPIRY_DAYS: i64 = 90;

/// Default page size for admin list endpoints.
pub const DEFAULT_PER_PAGE: i64 = 50;

/// Maximum page size for admin list endpoints.
pub const MAX_PER_PAGE: i64 = 200;

// ============================================================================
// Enumerations
// ============================================================================

/// Intake channel a lead originated from.
///
/// Each variant corresponds to its own lead table; lookups dispatch on this
/// enum to a fixed query per table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadSourceType {
    ContactForm,
    DemoRequest,
    EventRegistration,
    Partnership,
    LibraryLead,
}

impl LeadSourceType {
    /// Returns the stored string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadSourceType::ContactForm => "CONTACT_FORM",
            LeadSourceType::DemoRequest => "DEMO_REQUEST",
            LeadSourceType::EventRegistration => "EVENT_REGISTRATION",
            LeadSourceType::Partnership => "PARTNERSHIP",
            LeadSourceType::LibraryLead => "LIBRARY_LEAD",
        }
    }
}

impl FromStr for LeadSourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONTACT_FORM" => Ok(LeadSourceType::ContactForm),
            "DEMO_REQUEST" => Ok(LeadSourceType::DemoRequest),
            "EVENT_REGISTRATION" => Ok(LeadSourceType::EventRegistration),
            "PARTNERSHIP" => Ok(LeadSourceType::Partnership),
            "LIBRARY_LEAD" => Ok(LeadSourceType::LibraryLead),
            other => Err(format!("unknown lead source type: {other}")),
        }
    }
}

impl fmt::Display for LeadSourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of meeting a slot is offered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeetingType {
    Demo,
    Consultation,
    Onboarding,
    Followup,
    Other,
}

impl MeetingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeetingType::Demo => "DEMO",
            MeetingType::Consultation => "CONSULTATION",
            MeetingType::Onboarding => "ONBOARDING",
            MeetingType::Followup => "FOLLOWUP",
            MeetingType::Other => "OTHER",
        }
    }
}

impl FromStr for MeetingType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEMO" => Ok(MeetingType::Demo),
            "CONSULTATION" => Ok(MeetingType::Consultation),
            "ONBOARDING" => Ok(MeetingType::Onboarding),
            "FOLLOWUP" => Ok(MeetingType::Followup),
            "OTHER" => Ok(MeetingType::Other),
            other => Err(format!("unknown meeting type: {other}")),
        }
    }
}

/// Where a meeting takes place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationMode {
    Online,
    Office,
    ClientOffice,
}

impl LocationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationMode::Online => "ONLINE",
            LocationMode::Office => "OFFICE",
            LocationMode::ClientOffice => "CLIENT_OFFICE",
        }
    }
}

impl FromStr for LocationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ONLINE" => Ok(LocationMode::Online),
            "OFFICE" => Ok(LocationMode::Office),
            "CLIENT_OFFICE" => Ok(LocationMode::ClientOffice),
            other => Err(format!("unknown location mode: {other}")),
        }
    }
}

/// Lifecycle state of a booking.
///
/// The only transition is `Confirmed -> Cancelled`; cancellation must
/// decrement the slot's booking count in the same atomic unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            other => Err(format!("unknown booking status: {other}")),
        }
    }
}

// ============================================================================
// Storage rows
// ============================================================================

/// Lead contact details resolved from the lead-source table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadInfo {
    pub company_name: String,
    pub contact_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// A bookable time window as stored in the database.
#[derive(Debug, Clone)]
pub struct MeetingSlotRow {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub meeting_type: MeetingType,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub meeting_location: LocationMode,
    pub meeting_url: Option<String>,
    pub office_address: Option<String>,
    /// IANA timezone name the slot is presented in.
    pub timezone: String,
    pub max_bookings: i32,
    pub current_bookings: i32,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MeetingSlotRow {
    /// Remaining capacity of the slot.
    pub fn available_spots(&self) -> i32 {
        self.max_bookings - self.current_bookings
    }
}

/// A proposal token as stored in the database.
///
/// Expiry is a derived state (wall-clock comparison at read time);
/// `used` is the only stored terminal transition.
#[derive(Debug, Clone)]
pub struct ProposalTokenRow {
    pub id: Uuid,
    pub token: String,
    pub lead_type: LeadSourceType,
    pub lead_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A committed booking as stored in the database.
///
/// Lead contact fields are denormalized at commit time so the booking
/// remains readable even if the lead row later changes.
#[derive(Debug, Clone)]
pub struct MeetingBookingRow {
    pub id: Uuid,
    pub meeting_slot_id: Uuid,
    pub lead_type: LeadSourceType,
    pub lead_id: Uuid,
    pub company_name: String,
    pub contact_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub requested_agenda: Option<String>,
    pub booking_status: BookingStatus,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

// ============================================================================
// API envelopes
// ============================================================================

/// Success envelope wrapping every 2xx payload.
#[derive(Debug, Clone, Serialize)]
pub struct ApiSuccess<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiSuccess<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Pagination metadata for admin list endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct PageMeta {
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl PageMeta {
    pub fn new(total: i64, page: i64, per_page: i64) -> Self {
        let total_pages = if per_page > 0 {
            (total + per_page - 1) / per_page
        } else {
            0
        };
        Self {
            total,
            page,
            per_page,
            total_pages,
        }
    }
}

/// Paginated success envelope for admin list endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ApiPage<T> {
    pub success: bool,
    pub data: Vec<T>,
    pub meta: PageMeta,
}

impl<T> ApiPage<T> {
    pub fn new(data: Vec<T>, meta: PageMeta) -> Self {
        Self {
            success: true,
            data,
            meta,
        }
    }
}

// ============================================================================
// Proposal issuance API
// ============================================================================

/// Request to issue a proposal token and email the booking link.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendProposalRequest {
    pub lead_type: LeadSourceType,
    pub lead_id: Uuid,
    pub meeting_purpose: String,
    /// Expiry horizon in days (default 7).
    pub expiry_days: Option<i64>,
}

impl SendProposalRequest {
    /// Validate the request fields.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.meeting_purpose.trim().is_empty() {
            return Err("meeting_purpose is required");
        }
        if self.meeting_purpose.len() > MAX_MEETING_PURPOSE_LENGTH {
            return Err("meeting_purpose must be at most 500 characters");
        }
        if let Some(days) = self.expiry_days {
            if days < 1 {
                return Err("expiry_days must be a positive integer");
            }
            if days > MAX_TOKEN_EXPIRY_DAYS {
                return Err("expiry_days must be at most 90");
            }
        }
        Ok(())
    }
}

/// Response after issuing a proposal token.
#[derive(Debug, Clone, Serialize)]
pub struct SendProposalResponse {
    pub token: String,
    pub booking_url: String,
    pub expires_at: DateTime<Utc>,
}

// ============================================================================
// Availability API
// ============================================================================

/// One bookable slot as rendered to the customer.
#[derive(Debug, Clone, Serialize)]
pub struct SlotView {
    pub id: Uuid,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub meeting_type: MeetingType,
    pub duration_minutes: i32,
    pub meeting_location: LocationMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub office_address: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub timezone: String,
    pub available_spots: i32,
}

impl From<MeetingSlotRow> for SlotView {
    fn from(row: MeetingSlotRow) -> Self {
        let available_spots = row.available_spots();
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            meeting_type: row.meeting_type,
            duration_minutes: row.duration_minutes,
            meeting_location: row.meeting_location,
            meeting_url: row.meeting_url,
            office_address: row.office_address,
            start_time: row.start_time,
            end_time: row.end_time,
            timezone: row.timezone,
            available_spots,
        }
    }
}

/// Availability payload returned for a valid token.
///
/// `slots_by_date` is an ordered mapping keyed by the slot's calendar date
/// in its configured timezone.
#[derive(Debug, Clone, Serialize)]
pub struct AvailabilityData {
    pub token_valid: bool,
    pub expires_at: DateTime<Utc>,
    pub lead_info: Option<LeadInfo>,
    pub slots_by_date: BTreeMap<NaiveDate, Vec<SlotView>>,
    pub total_slots: usize,
}

// ============================================================================
// Booking API
// ============================================================================

/// Request to commit a booking against a slot.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BookMeetingRequest {
    pub token: String,
    pub slot_id: Uuid,
    #[serde(default)]
    pub agenda: Option<String>,
}

impl BookMeetingRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.token.is_empty() {
            return Err("token is required");
        }
        if let Some(agenda) = &self.agenda {
            if agenda.len() > MAX_AGENDA_LENGTH {
                return Err("agenda must be at most 2000 characters");
            }
        }
        Ok(())
    }
}

/// Slot details echoed back in the booking confirmation.
#[derive(Debug, Clone, Serialize)]
pub struct SlotSummary {
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub meeting_location: LocationMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub office_address: Option<String>,
}

/// Confirmation payload returned after a committed booking.
#[derive(Debug, Clone, Serialize)]
pub struct BookingConfirmation {
    pub booking_id: Uuid,
    pub meeting_slot: SlotSummary,
    pub booking_status: BookingStatus,
    pub confirmation_sent: bool,
}

// ============================================================================
// Slot administration API
// ============================================================================

/// Request to create a meeting slot.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateSlotRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub meeting_type: MeetingType,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub meeting_location: LocationMode,
    #[serde(default)]
    pub meeting_url: Option<String>,
    #[serde(default)]
    pub office_address: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub max_bookings: Option<i32>,
}

impl CreateSlotRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.title.trim().is_empty() {
            return Err("title is required");
        }
        if self.end_time <= self.start_time {
            return Err("end_time must be after start_time");
        }
        if let Some(max) = self.max_bookings {
            if max < 1 {
                return Err("max_bookings must be at least 1");
            }
        }
        if let Some(tz) = &self.timezone {
            if tz.parse::<chrono_tz::Tz>().is_err() {
                return Err("timezone must be a valid IANA timezone name");
            }
        }
        Ok(())
    }
}

/// Partial update to a meeting slot. Only provided fields change.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateSlotRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_available: Option<bool>,
    #[serde(default)]
    pub max_bookings: Option<i32>,
}

impl UpdateSlotRequest {
    pub fn has_changes(&self) -> bool {
        self.title.is_some()
            || self.description.is_some()
            || self.is_available.is_some()
            || self.max_bookings.is_some()
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err("title must not be empty");
            }
        }
        if let Some(max) = self.max_bookings {
            if max < 1 {
                return Err("max_bookings must be at least 1");
            }
        }
        Ok(())
    }
}

/// Request to bulk-generate weekday slots over the rolling horizon.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerateSlotsRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub meeting_type: Option<MeetingType>,
    /// Horizon in days (default: the configured booking window).
    #[serde(default)]
    pub horizon_days: Option<i64>,
}

impl GenerateSlotsRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if let Some(days) = self.horizon_days {
            if !(1..=365).contains(&days) {
                return Err("horizon_days must be between 1 and 365");
            }
        }
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err("title must not be empty");
            }
        }
        Ok(())
    }
}

/// Result of a bulk slot generation run.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateSlotsReport {
    pub created: usize,
    pub skipped: usize,
}

/// Admin-facing view of a slot.
#[derive(Debug, Clone, Serialize)]
pub struct AdminSlotView {
    pub id: Uuid,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub meeting_type: MeetingType,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub meeting_location: LocationMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub office_address: Option<String>,
    pub timezone: String,
    pub max_bookings: i32,
    pub current_bookings: i32,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<MeetingSlotRow> for AdminSlotView {
    fn from(row: MeetingSlotRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            meeting_type: row.meeting_type,
            start_time: row.start_time,
            end_time: row.end_time,
            duration_minutes: row.duration_minutes,
            meeting_location: row.meeting_location,
            meeting_url: row.meeting_url,
            office_address: row.office_address,
            timezone: row.timezone,
            max_bookings: row.max_bookings,
            current_bookings: row.current_bookings,
            is_available: row.is_available,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// ============================================================================
// Booking administration API
// ============================================================================

/// Request to cancel a confirmed booking.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CancelBookingRequest {
    #[serde(default)]
    pub cancellation_reason: Option<String>,
}

/// Admin-facing view of a booking.
#[derive(Debug, Clone, Serialize)]
pub struct AdminBookingView {
    pub id: Uuid,
    pub meeting_slot_id: Uuid,
    pub lead_type: LeadSourceType,
    pub lead_id: Uuid,
    pub company_name: String,
    pub contact_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_agenda: Option<String>,
    pub booking_status: BookingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl From<MeetingBookingRow> for AdminBookingView {
    fn from(row: MeetingBookingRow) -> Self {
        Self {
            id: row.id,
            meeting_slot_id: row.meeting_slot_id,
            lead_type: row.lead_type,
            lead_id: row.lead_id,
            company_name: row.company_name,
            contact_name: row.contact_name,
            email: row.email,
            phone: row.phone,
            requested_agenda: row.requested_agenda,
            booking_status: row.booking_status,
            cancellation_reason: row.cancellation_reason,
            created_at: row.created_at,
            cancelled_at: row.cancelled_at,
        }
    }
}

/// Booking detail with the slot it reserves.
#[derive(Debug, Clone, Serialize)]
pub struct BookingDetail {
    #[serde(flatten)]
    pub booking: AdminBookingView,
    pub meeting: AdminSlotView,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_lead_source_type_round_trip() {
        for (variant, text) in [
            (LeadSourceType::ContactForm, "CONTACT_FORM"),
            (LeadSourceType::DemoRequest, "DEMO_REQUEST"),
            (LeadSourceType::EventRegistration, "EVENT_REGISTRATION"),
            (LeadSourceType::Partnership, "PARTNERSHIP"),
            (LeadSourceType::LibraryLead, "LIBRARY_LEAD"),
        ] {
            assert_eq!(variant.as_str(), text);
            assert_eq!(text.parse::<LeadSourceType>().unwrap(), variant);
        }
        assert!("CONTACT".parse::<LeadSourceType>().is_err());
    }

    #[test]
    fn test_lead_source_type_serde_matches_stored_form() {
        let json = serde_json::to_string(&LeadSourceType::LibraryLead).unwrap();
        assert_eq!(json, "\"LIBRARY_LEAD\"");

        let parsed: LeadSourceType = serde_json::from_str("\"DEMO_REQUEST\"").unwrap();
        assert_eq!(parsed, LeadSourceType::DemoRequest);
    }

    #[test]
    fn test_meeting_type_round_trip() {
        for (variant, text) in [
            (MeetingType::Demo, "DEMO"),
            (MeetingType::Consultation, "CONSULTATION"),
            (MeetingType::Onboarding, "ONBOARDING"),
            (MeetingType::Followup, "FOLLOWUP"),
            (MeetingType::Other, "OTHER"),
        ] {
            assert_eq!(variant.as_str(), text);
            assert_eq!(text.parse::<MeetingType>().unwrap(), variant);
        }
    }

    #[test]
    fn test_booking_status_round_trip() {
        assert_eq!(BookingStatus::Confirmed.as_str(), "CONFIRMED");
        assert_eq!(
            "CANCELLED".parse::<BookingStatus>().unwrap(),
            BookingStatus::Cancelled
        );
        assert!("PENDING".parse::<BookingStatus>().is_err());
    }

    #[test]
    fn test_available_spots() {
        let slot = sample_slot(3, 1);
        assert_eq!(slot.available_spots(), 2);

        let full = sample_slot(2, 2);
        assert_eq!(full.available_spots(), 0);
    }

    #[test]
    fn test_send_proposal_request_validation() {
        let mut request = SendProposalRequest {
            lead_type: LeadSourceType::ContactForm,
            lead_id: Uuid::new_v4(),
            meeting_purpose: "Product walkthrough".to_string(),
            expiry_days: None,
        };
        assert!(request.validate().is_ok());

        request.expiry_days = Some(0);
        assert_eq!(
            request.validate().unwrap_err(),
            "expiry_days must be a positive integer"
        );

        request.expiry_days = Some(91);
        assert_eq!(request.validate().unwrap_err(), "expiry_days must be at most 90");

        request.expiry_days = Some(7);
        request.meeting_purpose = "   ".to_string();
        assert_eq!(request.validate().unwrap_err(), "meeting_purpose is required");
    }

    #[test]
    fn test_send_proposal_request_rejects_unknown_fields() {
        let json = r#"{"lead_type":"CONTACT_FORM","lead_id":"00000000-0000-0000-0000-000000000000","meeting_purpose":"x","extra":1}"#;
        let result: Result<SendProposalRequest, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_book_meeting_request_validation() {
        let request = BookMeetingRequest {
            token: "a".repeat(64),
            slot_id: Uuid::new_v4(),
            agenda: Some("a".repeat(2001)),
        };
        assert_eq!(
            request.validate().unwrap_err(),
            "agenda must be at most 2000 characters"
        );

        let request = BookMeetingRequest {
            token: String::new(),
            slot_id: Uuid::new_v4(),
            agenda: None,
        };
        assert_eq!(request.validate().unwrap_err(), "token is required");
    }

    #[test]
    fn test_create_slot_request_validation() {
        let now = Utc::now();
        let mut request = CreateSlotRequest {
            title: "Demo".to_string(),
            description: None,
            meeting_type: MeetingType::Demo,
            start_time: now,
            end_time: now + chrono::Duration::hours(1),
            meeting_location: LocationMode::Online,
            meeting_url: None,
            office_address: None,
            timezone: Some("Asia/Seoul".to_string()),
            max_bookings: Some(1),
        };
        assert!(request.validate().is_ok());

        request.end_time = request.start_time;
        assert_eq!(
            request.validate().unwrap_err(),
            "end_time must be after start_time"
        );

        request.end_time = request.start_time + chrono::Duration::hours(1);
        request.timezone = Some("Mars/Olympus".to_string());
        assert_eq!(
            request.validate().unwrap_err(),
            "timezone must be a valid IANA timezone name"
        );

        request.timezone = None;
        request.max_bookings = Some(0);
        assert_eq!(request.validate().unwrap_err(), "max_bookings must be at least 1");
    }

    #[test]
    fn test_update_slot_request_has_changes() {
        let empty = UpdateSlotRequest {
            title: None,
            description: None,
            is_available: None,
            max_bookings: None,
        };
        assert!(!empty.has_changes());

        let patch = UpdateSlotRequest {
            title: None,
            description: None,
            is_available: Some(false),
            max_bookings: None,
        };
        assert!(patch.has_changes());
    }

    #[test]
    fn test_page_meta_rounding() {
        let meta = PageMeta::new(101, 1, 50);
        assert_eq!(meta.total_pages, 3);

        let meta = PageMeta::new(0, 1, 50);
        assert_eq!(meta.total_pages, 0);

        let meta = PageMeta::new(50, 1, 50);
        assert_eq!(meta.total_pages, 1);
    }

    #[test]
    fn test_availability_data_serializes_dates_in_order() {
        let mut slots_by_date = BTreeMap::new();
        slots_by_date.insert(
            NaiveDate::from_ymd_opt(2026, 9, 2).unwrap(),
            vec![SlotView::from(sample_slot(1, 0))],
        );
        slots_by_date.insert(
            NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            vec![SlotView::from(sample_slot(1, 0))],
        );

        let data = AvailabilityData {
            token_valid: true,
            expires_at: Utc::now(),
            lead_info: None,
            slots_by_date,
            total_slots: 2,
        };

        let json = serde_json::to_string(&data).unwrap();
        let first = json.find("2026-09-01").unwrap();
        let second = json.find("2026-09-02").unwrap();
        assert!(first < second, "dates must serialize in ascending order");
    }

    #[test]
    fn test_slot_view_annotates_available_spots() {
        let view = SlotView::from(sample_slot(5, 2));
        assert_eq!(view.available_spots, 3);
    }

    fn sample_slot(max: i32, current: i32) -> MeetingSlotRow {
        let now = Utc::now();
        MeetingSlotRow {
            id: Uuid::new_v4(),
            title: "Demo session".to_string(),
            description: None,
            meeting_type: MeetingType::Demo,
            start_time: now + chrono::Duration::days(1),
            end_time: now + chrono::Duration::days(1) + chrono::Duration::hours(1),
            duration_minutes: 60,
            meeting_location: LocationMode::Online,
            meeting_url: Some("https://meet.example.com/demo".to_string()),
            office_address: None,
            timezone: "Asia/Seoul".to_string(),
            max_bookings: max,
            current_bookings: current,
            is_available: true,
            created_at: now,
            updated_at: now,
        }
    }
}
