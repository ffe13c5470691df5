//! The booking commit flow.
//!
//! Re-validates the token, pre-checks the slot, then delegates to the
//! store's atomic commit. The commit's conditional updates are what enforce
//! the at-most-one-booking and capacity invariants; everything before them
//! exists only to give losers a precise error.

use crate::errors::BookingError;
use crate::models::{BookMeetingRequest, BookingConfirmation, SlotSummary};
use crate::observability::metrics;
use crate::repositories::{BookingStore, CommitOutcome};
use crate::services::availability::validate_token;
use crate::services::mailer::{ConfirmationEmail, ProposalMailer};
use chrono::{DateTime, Utc};
use std::time::Instant;
use tracing::instrument;

/// Commit a booking for a proposal token against a slot.
///
/// Returns the confirmation payload with `confirmation_sent` reflecting
/// whether the confirmation email went out; a mail failure never unwinds a
/// committed booking.
#[instrument(skip_all, name = "booking.service.book", fields(slot_id = %request.slot_id))]
pub async fn book_meeting(
    store: &dyn BookingStore,
    mailer: &dyn ProposalMailer,
    request: BookMeetingRequest,
    now: DateTime<Utc>,
) -> Result<BookingConfirmation, BookingError> {
    request
        .validate()
        .map_err(|m| BookingError::Validation(m.to_string()))?;

    let token_row = validate_token(store, &request.token, now).await?;

    let Some(lead) = store
        .find_lead(token_row.lead_type, token_row.lead_id)
        .await?
    else {
        return Err(BookingError::LeadNotFound);
    };

    // Pre-check so a dangling slot id fails before the token is consumed.
    let Some(slot) = store.find_slot(request.slot_id).await? else {
        return Err(BookingError::SlotNotFound);
    };

    let start = Instant::now();
    let outcome = store
        .commit_booking(
            token_row.id,
            slot.id,
            token_row.lead_type,
            token_row.lead_id,
            &lead,
            request.agenda.as_deref(),
        )
        .await?;

    let booking = match outcome {
        CommitOutcome::Booked(booking) => {
            metrics::record_booking_commit("booked", start.elapsed());
            booking
        }
        CommitOutcome::TokenAlreadyUsed { used_at } => {
            metrics::record_booking_commit("token_used", start.elapsed());
            return Err(BookingError::TokenAlreadyUsed { used_at });
        }
        CommitOutcome::SlotFull => {
            metrics::record_booking_commit("slot_full", start.elapsed());
            return Err(BookingError::SlotFull);
        }
        CommitOutcome::SlotNotFound => {
            metrics::record_booking_commit("slot_not_found", start.elapsed());
            return Err(BookingError::SlotNotFound);
        }
    };

    tracing::info!(
        target: "booking.commit",
        booking_id = %booking.id,
        slot_id = %slot.id,
        "Booking committed"
    );

    // Side effects after the commit never fail the request.
    let metadata = serde_json::json!({
        "booking_id": booking.id,
        "slot_id": slot.id,
        "start_time": slot.start_time,
    });
    if let Err(e) = store
        .log_lead_activity(
            booking.lead_type,
            booking.lead_id,
            "MEETING_BOOKED",
            "Meeting booked through proposal link",
            metadata,
        )
        .await
    {
        tracing::warn!(target: "booking.commit", error = %e, "Failed to log lead activity");
    }

    let email = ConfirmationEmail {
        to: lead.email,
        contact_name: lead.contact_name,
        slot_title: slot.title.clone(),
        start_time: slot.start_time,
        end_time: slot.end_time,
        timezone: slot.timezone.clone(),
        meeting_location: slot.meeting_location,
        meeting_url: slot.meeting_url.clone(),
        office_address: slot.office_address.clone(),
    };
    let confirmation_sent = match mailer.send_confirmation(&email).await {
        Ok(()) => {
            metrics::record_mail_delivery("confirmation", "sent");
            true
        }
        Err(e) => {
            metrics::record_mail_delivery("confirmation", "failed");
            tracing::warn!(target: "booking.commit", error = %e, "Confirmation email failed");
            false
        }
    };

    Ok(BookingConfirmation {
        booking_id: booking.id,
        meeting_slot: SlotSummary {
            title: slot.title,
            start_time: slot.start_time,
            end_time: slot.end_time,
            meeting_location: slot.meeting_location,
            meeting_url: slot.meeting_url,
            office_address: slot.office_address,
        },
        booking_status: booking.booking_status,
        confirmation_sent,
    })
}
