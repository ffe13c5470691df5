//! Proposal token generation and issuance.
//!
//! Tokens are 32 bytes from the system CSPRNG, hex-encoded to 64 lowercase
//! characters. The issuance flow refuses to send a proposal when nothing is
//! bookable inside the proposal horizon, so leads never receive a link to an
//! empty calendar.

use crate::config::Config;
use crate::errors::BookingError;
use crate::models::{SendProposalRequest, SendProposalResponse};
use crate::observability::metrics;
use crate::repositories::{BookingStore, StoreError};
use crate::services::mailer::{ProposalEmail, ProposalMailer};
use chrono::{DateTime, Duration, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use tracing::instrument;

/// Token length in random bytes (hex-encodes to 64 characters).
const TOKEN_BYTES: usize = 32;

/// Generate a new proposal token: 32 CSPRNG bytes, hex-encoded.
pub fn generate_token() -> Result<String, BookingError> {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; TOKEN_BYTES];
    rng.fill(&mut bytes)
        .map_err(|_| BookingError::Internal("system CSPRNG failure".to_string()))?;
    Ok(hex::encode(bytes))
}

/// Whether a token string is structurally valid: exactly 64 lowercase hex
/// characters. Checked before any storage lookup.
pub fn is_valid_token_format(token: &str) -> bool {
    token.len() == 64
        && token
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Issue a proposal token for a lead and email the booking link.
///
/// # Flow
///
/// 1. Validate the request fields
/// 2. Resolve the lead's contact details
/// 3. Refuse if no slot is bookable inside the proposal horizon
/// 4. Insert the token (one retry on the astronomically unlikely collision)
/// 5. Send the proposal email; a delivery failure fails the request
/// 6. Record the lead activity and contact marker (fire-and-forget)
#[instrument(skip_all, name = "booking.service.issue_proposal", fields(lead_type = %request.lead_type))]
pub async fn issue_proposal(
    store: &dyn BookingStore,
    mailer: &dyn ProposalMailer,
    config: &Config,
    request: SendProposalRequest,
    now: DateTime<Utc>,
) -> Result<SendProposalResponse, BookingError> {
    request
        .validate()
        .map_err(|m| BookingError::Validation(m.to_string()))?;

    let Some(lead) = store.find_lead(request.lead_type, request.lead_id).await? else {
        metrics::record_token_issued("lead_not_found");
        return Err(BookingError::LeadNotFound);
    };

    let horizon = now + Duration::days(config.proposal_horizon_days);
    let open_slots = store.count_open_slots(now, horizon).await?;
    if open_slots == 0 {
        tracing::warn!(
            target: "booking.issuer",
            horizon_days = config.proposal_horizon_days,
            "Proposal refused: no bookable slots in horizon"
        );
        metrics::record_token_issued("no_slots");
        return Err(BookingError::NoSlotsAvailable);
    }

    let expiry_days = request
        .expiry_days
        .unwrap_or(config.default_token_expiry_days);
    let expires_at = now + Duration::days(expiry_days);

    let row = insert_with_retry(store, &request, expires_at).await?;

    let booking_url = config.booking_url(&row.token);

    let email = ProposalEmail {
        to: lead.email.clone(),
        contact_name: lead.contact_name.clone(),
        company_name: lead.company_name.clone(),
        meeting_purpose: request.meeting_purpose.clone(),
        booking_url: booking_url.clone(),
        expires_at,
    };

    if let Err(e) = mailer.send_proposal(&email).await {
        metrics::record_mail_delivery("proposal", "failed");
        metrics::record_token_issued("error");
        return Err(BookingError::MailDelivery(e.to_string()));
    }
    metrics::record_mail_delivery("proposal", "sent");

    // Side effects that never fail the request.
    let metadata = serde_json::json!({
        "token_expires_at": expires_at,
        "booking_url": booking_url,
    });
    if let Err(e) = store
        .log_lead_activity(
            row.lead_type,
            row.lead_id,
            "MEETING_PROPOSED",
            "Meeting proposal sent with booking link",
            metadata,
        )
        .await
    {
        tracing::warn!(target: "booking.issuer", error = %e, "Failed to log lead activity");
    }
    if let Err(e) = store.touch_lead_contacted(row.lead_type, row.lead_id).await {
        tracing::warn!(target: "booking.issuer", error = %e, "Failed to update last_contacted_at");
    }

    metrics::record_token_issued("issued");

    Ok(SendProposalResponse {
        token: row.token,
        booking_url,
        expires_at,
    })
}

async fn insert_with_retry(
    store: &dyn BookingStore,
    request: &SendProposalRequest,
    expires_at: DateTime<Utc>,
) -> Result<crate::models::ProposalTokenRow, BookingError> {
    let token = generate_token()?;
    match store
        .insert_token(&token, request.lead_type, request.lead_id, expires_at)
        .await
    {
        Ok(row) => Ok(row),
        Err(StoreError::Duplicate(_)) => {
            // 256-bit collision; regenerate once, then give up.
            tracing::warn!(target: "booking.issuer", "Token collision, regenerating");
            let token = generate_token()?;
            store
                .insert_token(&token, request.lead_type, request.lead_id, expires_at)
                .await
                .map_err(BookingError::from)
        }
        Err(e) => Err(e.into()),
    }
}
