//! Token validation and availability listing.
//!
//! Availability is a pure read: looking up a token never mutates it, so a
//! lead can revisit the booking page any number of times before committing.

use crate::config::Config;
use crate::errors::BookingError;
use crate::models::{AvailabilityData, MeetingSlotRow, ProposalTokenRow, SlotView};
use crate::observability::metrics;
use crate::repositories::BookingStore;
use crate::services::token_issuer::is_valid_token_format;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use std::collections::BTreeMap;
use tracing::instrument;

/// Resolve a token string to its row, rejecting every non-bookable state.
///
/// Checks run in a fixed order: format, existence, expiry, used. Expiry is
/// checked before the used flag, so a token that is both expired and used
/// reports expired. A token is expired from the exact moment `now` reaches
/// `expires_at`.
pub async fn validate_token(
    store: &dyn BookingStore,
    token: &str,
    now: DateTime<Utc>,
) -> Result<ProposalTokenRow, BookingError> {
    if !is_valid_token_format(token) {
        metrics::record_availability_lookup("invalid_format");
        return Err(BookingError::InvalidToken);
    }

    let Some(row) = store.find_token(token).await? else {
        metrics::record_availability_lookup("not_found");
        return Err(BookingError::TokenNotFound);
    };

    if now >= row.expires_at {
        metrics::record_availability_lookup("expired");
        return Err(BookingError::TokenExpired {
            expires_at: row.expires_at,
        });
    }

    if row.used {
        metrics::record_availability_lookup("used");
        return Err(BookingError::TokenAlreadyUsed {
            used_at: row.used_at,
        });
    }

    Ok(row)
}

/// List bookable slots for a valid token, grouped by calendar date.
#[instrument(skip_all, name = "booking.service.availability")]
pub async fn lookup_availability(
    store: &dyn BookingStore,
    config: &Config,
    token: &str,
    now: DateTime<Utc>,
) -> Result<AvailabilityData, BookingError> {
    let row = validate_token(store, token, now).await?;

    let lead_info = store.find_lead(row.lead_type, row.lead_id).await?;

    let window_end = now + Duration::days(config.booking_window_days);
    let slots = store.list_open_slots(now, window_end).await?;
    let total_slots = slots.len();

    metrics::record_availability_lookup("ok");

    Ok(AvailabilityData {
        token_valid: true,
        expires_at: row.expires_at,
        lead_info,
        slots_by_date: group_slots_by_date(slots),
        total_slots,
    })
}

/// Group slots under the calendar date of their start time, rendered in the
/// slot's own timezone. Unparseable timezone names fall back to UTC. The
/// ordered map keeps dates ascending; slots arrive sorted by start time and
/// stay that way inside each date.
pub fn group_slots_by_date(slots: Vec<MeetingSlotRow>) -> BTreeMap<NaiveDate, Vec<SlotView>> {
    let mut grouped: BTreeMap<NaiveDate, Vec<SlotView>> = BTreeMap::new();

    for slot in slots {
        let date = match slot.timezone.parse::<Tz>() {
            Ok(tz) => slot.start_time.with_timezone(&tz).date_naive(),
            Err(_) => slot.start_time.date_naive(),
        };
        grouped.entry(date).or_default().push(SlotView::from(slot));
    }

    grouped
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::models::{LocationMode, MeetingType};
    use chrono::TimeZone;
    use uuid::Uuid;

    fn slot_at(start: DateTime<Utc>, timezone: &str) -> MeetingSlotRow {
        MeetingSlotRow {
            id: Uuid::new_v4(),
            title: "Demo".to_string(),
            description: None,
            meeting_type: MeetingType::Demo,
            start_time: start,
            end_time: start + Duration::hours(1),
            duration_minutes: 60,
            meeting_location: LocationMode::Online,
            meeting_url: None,
            office_address: None,
            timezone: timezone.to_string(),
            max_bookings: 1,
            current_bookings: 0,
            is_available: true,
            created_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn test_grouping_uses_slot_timezone() {
        // 2026-09-01 23:00 UTC is already 2026-09-02 in Seoul (UTC+9)
        let start = Utc.with_ymd_and_hms(2026, 9, 1, 23, 0, 0).unwrap();
        let grouped = group_slots_by_date(vec![slot_at(start, "Asia/Seoul")]);

        let date = NaiveDate::from_ymd_opt(2026, 9, 2).unwrap();
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped.get(&date).map(Vec::len), Some(1));
    }

    #[test]
    fn test_grouping_falls_back_to_utc() {
        let start = Utc.with_ymd_and_hms(2026, 9, 1, 23, 0, 0).unwrap();
        let grouped = group_slots_by_date(vec![slot_at(start, "Not/AZone")]);

        let date = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();
        assert!(grouped.contains_key(&date));
    }

    #[test]
    fn test_grouping_keeps_dates_ordered_and_slots_sorted() {
        let day1 = Utc.with_ymd_and_hms(2026, 9, 1, 1, 0, 0).unwrap();
        let day1_later = Utc.with_ymd_and_hms(2026, 9, 1, 5, 0, 0).unwrap();
        let day2 = Utc.with_ymd_and_hms(2026, 9, 2, 1, 0, 0).unwrap();

        // Input arrives sorted by start time, as the store guarantees
        let grouped = group_slots_by_date(vec![
            slot_at(day1, "UTC"),
            slot_at(day1_later, "UTC"),
            slot_at(day2, "UTC"),
        ]);

        let dates: Vec<NaiveDate> = grouped.keys().copied().collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
                NaiveDate::from_ymd_opt(2026, 9, 2).unwrap(),
            ]
        );

        let first_day = grouped.get(&dates[0]).unwrap();
        assert_eq!(first_day.len(), 2);
        assert!(first_day[0].start_time < first_day[1].start_time);
    }

    #[test]
    fn test_grouping_empty_input() {
        assert!(group_slots_by_date(Vec::new()).is_empty());
    }
}
