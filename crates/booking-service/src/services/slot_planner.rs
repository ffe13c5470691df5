//! Working-hours slot planning and bulk generation.
//!
//! Planning is pure so it can be tested against a fixed clock: weekday
//! slots at the standard meeting hours, anchored in the configured
//! timezone, skipping configured dates and anything starting too soon.

use crate::config::Config;
use crate::errors::BookingError;
use crate::models::{
    GenerateSlotsReport, GenerateSlotsRequest, LocationMode, MeetingType,
};
use crate::repositories::{BookingStore, NewSlot};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::instrument;

/// Local hours a meeting can start at.
pub const MEETING_HOURS: [u32; 3] = [10, 14, 16];

/// Length of a generated slot.
pub const SLOT_DURATION_MINUTES: i64 = 60;

/// Minimum lead time before a generated slot may start.
pub const MIN_LEAD_TIME_HOURS: i64 = 2;

/// Default title for bulk-generated slots.
const DEFAULT_SLOT_TITLE: &str = "Online consultation";

/// One planned slot window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotPlan {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Plan the weekday slot windows inside `[now, now + horizon_days]`.
///
/// Weekends and `skip_dates` produce nothing. Windows starting less than
/// [`MIN_LEAD_TIME_HOURS`] from `now` are dropped. Local times that do not
/// exist in `tz` (DST gaps) are skipped.
pub fn plan_slots(
    now: DateTime<Utc>,
    horizon_days: i64,
    tz: Tz,
    skip_dates: &[NaiveDate],
) -> Vec<SlotPlan> {
    let mut plans = Vec::new();
    let earliest_start = now + Duration::hours(MIN_LEAD_TIME_HOURS);
    let today = now.with_timezone(&tz).date_naive();

    for offset in 0..=horizon_days {
        let Some(date) = today.checked_add_signed(Duration::days(offset)) else {
            break;
        };

        if matches!(date.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun) {
            continue;
        }
        if skip_dates.contains(&date) {
            continue;
        }

        for hour in MEETING_HOURS {
            let Some(local) = date.and_hms_opt(hour, 0, 0) else {
                continue;
            };
            let Some(start_local) = local.and_local_timezone(tz).earliest() else {
                continue;
            };
            let start_time = start_local.with_timezone(&Utc);
            if start_time < earliest_start {
                continue;
            }

            plans.push(SlotPlan {
                start_time,
                end_time: start_time + Duration::minutes(SLOT_DURATION_MINUTES),
            });
        }
    }

    plans
}

/// Generate weekday slots over the horizon, skipping windows a slot already
/// occupies. Returns how many were created and how many were skipped.
#[instrument(skip_all, name = "booking.service.generate_slots")]
pub async fn generate_slots(
    store: &dyn BookingStore,
    config: &Config,
    request: &GenerateSlotsRequest,
    now: DateTime<Utc>,
) -> Result<GenerateSlotsReport, BookingError> {
    request
        .validate()
        .map_err(|m| BookingError::Validation(m.to_string()))?;

    let horizon_days = request.horizon_days.unwrap_or(config.booking_window_days);
    let title = request
        .title
        .clone()
        .unwrap_or_else(|| DEFAULT_SLOT_TITLE.to_string());
    let meeting_type = request.meeting_type.unwrap_or(MeetingType::Consultation);

    let plans = plan_slots(now, horizon_days, config.slot_timezone, &config.slot_skip_dates);

    let mut created = 0;
    let mut skipped = 0;

    for plan in plans {
        if store.slot_exists_at(plan.start_time, plan.end_time).await? {
            skipped += 1;
            continue;
        }

        store
            .insert_slot(NewSlot {
                title: title.clone(),
                description: None,
                meeting_type,
                start_time: plan.start_time,
                end_time: plan.end_time,
                duration_minutes: SLOT_DURATION_MINUTES as i32,
                meeting_location: LocationMode::Online,
                meeting_url: None,
                office_address: None,
                timezone: config.slot_timezone.name().to_string(),
                max_bookings: 1,
            })
            .await?;
        created += 1;
    }

    tracing::info!(
        target: "booking.slots",
        created,
        skipped,
        horizon_days,
        "Bulk slot generation finished"
    );

    Ok(GenerateSlotsReport { created, skipped })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    // 2026-09-07 is a Monday.
    fn monday_morning_utc() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, 7, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_plan_skips_weekends() {
        // Horizon covers Mon..Sun; Sat and Sun contribute nothing
        let plans = plan_slots(monday_morning_utc(), 6, chrono_tz::UTC, &[]);
        let dates: Vec<NaiveDate> = plans.iter().map(|p| p.start_time.date_naive()).collect();

        assert!(!dates.contains(&NaiveDate::from_ymd_opt(2026, 9, 12).unwrap()));
        assert!(!dates.contains(&NaiveDate::from_ymd_opt(2026, 9, 13).unwrap()));
        // 5 weekdays * 3 hours; now is 00:00 so even 10:00 clears the minimum
        assert_eq!(plans.len(), 15);
    }

    #[test]
    fn test_plan_respects_lead_time() {
        // 09:00 UTC: the 10:00 slot is inside the 2h minimum, 14:00 is not
        let now = Utc.with_ymd_and_hms(2026, 9, 7, 9, 0, 0).unwrap();
        let plans = plan_slots(now, 0, chrono_tz::UTC, &[]);

        let hours: Vec<u32> = plans.iter().map(|p| p.start_time.hour()).collect();
        assert_eq!(hours, vec![14, 16]);
    }

    #[test]
    fn test_plan_skips_configured_dates() {
        let skip = vec![NaiveDate::from_ymd_opt(2026, 9, 8).unwrap()];
        let plans = plan_slots(monday_morning_utc(), 1, chrono_tz::UTC, &skip);

        // Only Monday's three slots remain
        assert_eq!(plans.len(), 3);
        assert!(plans
            .iter()
            .all(|p| p.start_time.date_naive() == NaiveDate::from_ymd_opt(2026, 9, 7).unwrap()));
    }

    #[test]
    fn test_plan_anchors_in_timezone() {
        // Sunday 20:00 UTC is Monday 05:00 in Seoul; Seoul 10:00 is 01:00 UTC
        let now = Utc.with_ymd_and_hms(2026, 9, 6, 20, 0, 0).unwrap();
        let plans = plan_slots(now, 0, chrono_tz::Asia::Seoul, &[]);
        assert_eq!(plans.len(), 3);
        assert_eq!(plans[0].start_time.hour(), 1);
        assert_eq!(
            plans[0].end_time - plans[0].start_time,
            Duration::minutes(60)
        );
    }

    #[test]
    fn test_plan_slots_are_sorted() {
        let plans = plan_slots(monday_morning_utc(), 4, chrono_tz::UTC, &[]);
        for pair in plans.windows(2) {
            assert!(pair[0].start_time < pair[1].start_time);
        }
    }
}
