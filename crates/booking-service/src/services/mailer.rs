//! Outbound email for proposals and booking confirmations.
//!
//! `ProposalMailer` is a trait so tests can substitute a recording
//! implementation; production uses [`HttpMailer`] against a JSON mail API.

use crate::config::Config;
use crate::models::LocationMode;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;

/// Timeout for a single mail API call.
const MAIL_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Content of a proposal email.
#[derive(Debug, Clone)]
pub struct ProposalEmail {
    pub to: String,
    pub contact_name: String,
    pub company_name: String,
    pub meeting_purpose: String,
    pub booking_url: String,
    pub expires_at: DateTime<Utc>,
}

/// Content of a booking confirmation email.
#[derive(Debug, Clone)]
pub struct ConfirmationEmail {
    pub to: String,
    pub contact_name: String,
    pub slot_title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub timezone: String,
    pub meeting_location: LocationMode,
    pub meeting_url: Option<String>,
    pub office_address: Option<String>,
}

/// Mail delivery failure.
#[derive(Debug, Error)]
pub enum MailError {
    /// The mail API rejected the request.
    #[error("mail API rejected the request: {0}")]
    Api(String),

    /// The request never reached the mail API.
    #[error("mail transport error: {0}")]
    Transport(String),
}

/// Outbound mail operations used by the scheduling flows.
#[async_trait]
pub trait ProposalMailer: Send + Sync {
    /// Send the proposal email carrying the booking link.
    async fn send_proposal(&self, email: &ProposalEmail) -> Result<(), MailError>;

    /// Send the booking confirmation email.
    async fn send_confirmation(&self, email: &ConfirmationEmail) -> Result<(), MailError>;
}

#[derive(Serialize)]
struct MailApiRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: String,
    html: String,
}

/// Mailer backed by an HTTP mail API with bearer-key authentication.
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: SecretString,
    from: String,
}

impl HttpMailer {
    pub fn new(config: &Config) -> Result<Self, MailError> {
        let client = reqwest::Client::builder()
            .timeout(MAIL_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| MailError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            api_url: config.mail_api_url.clone(),
            api_key: config.mail_api_key.clone(),
            from: config.mail_from.clone(),
        })
    }

    async fn post(&self, subject: String, to: &str, html: String) -> Result<(), MailError> {
        let request = MailApiRequest {
            from: &self.from,
            to: [to],
            subject,
            html,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Api(format!("status {status}: {body}")));
        }

        Ok(())
    }
}

#[async_trait]
impl ProposalMailer for HttpMailer {
    #[instrument(skip_all, name = "booking.mail.proposal")]
    async fn send_proposal(&self, email: &ProposalEmail) -> Result<(), MailError> {
        let subject = format!("Meeting proposal for {}", email.company_name);
        let html = render_proposal_html(email);
        self.post(subject, &email.to, html).await
    }

    #[instrument(skip_all, name = "booking.mail.confirmation")]
    async fn send_confirmation(&self, email: &ConfirmationEmail) -> Result<(), MailError> {
        let subject = format!("Meeting confirmed: {}", email.slot_title);
        let html = render_confirmation_html(email);
        self.post(subject, &email.to, html).await
    }
}

fn render_proposal_html(email: &ProposalEmail) -> String {
    format!(
        "<p>Hello {contact},</p>\
         <p>We would like to schedule a meeting with {company}.</p>\
         <p><strong>Purpose:</strong> {purpose}</p>\
         <p><a href=\"{url}\">Choose a time that works for you</a></p>\
         <p>This link expires on {expires}.</p>",
        contact = escape_html(&email.contact_name),
        company = escape_html(&email.company_name),
        purpose = escape_html(&email.meeting_purpose),
        url = escape_html(&email.booking_url),
        expires = email.expires_at.format("%Y-%m-%d %H:%M UTC"),
    )
}

fn render_confirmation_html(email: &ConfirmationEmail) -> String {
    let location = match email.meeting_location {
        LocationMode::Online => email
            .meeting_url
            .as_deref()
            .map(|url| format!("Online: <a href=\"{}\">{}</a>", escape_html(url), escape_html(url)))
            .unwrap_or_else(|| "Online (link to follow)".to_string()),
        LocationMode::Office => email
            .office_address
            .as_deref()
            .map(|addr| format!("Our office: {}", escape_html(addr)))
            .unwrap_or_else(|| "Our office".to_string()),
        LocationMode::ClientOffice => "Your office".to_string(),
    };

    format!(
        "<p>Hello {contact},</p>\
         <p>Your meeting is confirmed.</p>\
         <p><strong>{title}</strong><br>\
         {start} - {end} ({tz})<br>\
         {location}</p>",
        contact = escape_html(&email.contact_name),
        title = escape_html(&email.slot_title),
        start = email.start_time.format("%Y-%m-%d %H:%M"),
        end = email.end_time.format("%H:%M"),
        tz = escape_html(&email.timezone),
    )
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_proposal_html_contains_link_and_escapes() {
        let email = ProposalEmail {
            to: "lead@example.com".to_string(),
            contact_name: "Kim <script>".to_string(),
            company_name: "Acme & Co".to_string(),
            meeting_purpose: "Product demo".to_string(),
            booking_url: "https://example.com/meetings/schedule/abc".to_string(),
            expires_at: Utc::now(),
        };

        let html = render_proposal_html(&email);
        assert!(html.contains("https://example.com/meetings/schedule/abc"));
        assert!(html.contains("Acme &amp; Co"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_confirmation_html_location_modes() {
        let mut email = ConfirmationEmail {
            to: "lead@example.com".to_string(),
            contact_name: "Kim".to_string(),
            slot_title: "Demo session".to_string(),
            start_time: Utc::now(),
            end_time: Utc::now(),
            timezone: "Asia/Seoul".to_string(),
            meeting_location: LocationMode::Online,
            meeting_url: Some("https://meet.example.com/x".to_string()),
            office_address: None,
        };
        assert!(render_confirmation_html(&email).contains("https://meet.example.com/x"));

        email.meeting_location = LocationMode::Office;
        email.office_address = Some("12 Main St".to_string());
        assert!(render_confirmation_html(&email).contains("12 Main St"));

        email.meeting_location = LocationMode::ClientOffice;
        assert!(render_confirmation_html(&email).contains("Your office"));
    }
}
