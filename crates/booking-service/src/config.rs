//! Scheduling service configuration.
//!
//! Configuration is loaded from environment variables. All sensitive
//! fields are redacted in Debug output.

use chrono::NaiveDate;
use chrono_tz::Tz;
use secrecy::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default public site base the booking links point at.
pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:3000";

/// Default mail API endpoint.
pub const DEFAULT_MAIL_API_URL: &str = "https://api.resend.com/emails";

/// Default availability window shown to customers, in days.
pub const DEFAULT_BOOKING_WINDOW_DAYS: i64 = 30;

/// Default horizon checked before a proposal is issued, in days.
pub const DEFAULT_PROPOSAL_HORIZON_DAYS: i64 = 7;

/// Default proposal token lifetime in days.
pub const DEFAULT_TOKEN_EXPIRY_DAYS: i64 = 7;

/// Default timezone generated slots are anchored in.
pub const DEFAULT_SLOT_TIMEZONE: &str = "Asia/Seoul";

/// Scheduling service configuration.
///
/// Loaded from environment variables with sensible defaults.
/// Credentials are redacted in Debug output.
#[derive(Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Public site base URL; proposal emails link to
    /// `{public_base_url}/meetings/schedule/{token}`.
    pub public_base_url: String,

    /// HMAC secret validating admin bearer tokens.
    pub admin_jwt_secret: SecretString,

    /// Mail API endpoint.
    pub mail_api_url: String,

    /// Mail API key.
    pub mail_api_key: SecretString,

    /// Sender address for proposal and confirmation emails.
    pub mail_from: String,

    /// Availability window shown to customers, in days.
    pub booking_window_days: i64,

    /// Slot-count horizon checked before issuing a proposal, in days.
    pub proposal_horizon_days: i64,

    /// Proposal token lifetime when the request does not override it.
    pub default_token_expiry_days: i64,

    /// Timezone bulk-generated slots are anchored in.
    pub slot_timezone: Tz,

    /// Dates bulk generation skips (holidays), in `YYYY-MM-DD` form.
    pub slot_skip_dates: Vec<NaiveDate>,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("public_base_url", &self.public_base_url)
            .field("admin_jwt_secret", &"[REDACTED]")
            .field("mail_api_url", &self.mail_api_url)
            .field("mail_api_key", &"[REDACTED]")
            .field("mail_from", &self.mail_from)
            .field("booking_window_days", &self.booking_window_days)
            .field("proposal_horizon_days", &self.proposal_horizon_days)
            .field("default_token_expiry_days", &self.default_token_expiry_days)
            .field("slot_timezone", &self.slot_timezone)
            .field("slot_skip_dates", &self.slot_skip_dates)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid day-count configuration: {0}")]
    InvalidDayCount(String),

    #[error("Invalid timezone configuration: {0}")]
    InvalidTimezone(String),

    #[error("Invalid skip-date configuration: {0}")]
    InvalidSkipDate(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = vars
            .get("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?
            .clone();

        let admin_jwt_secret = vars
            .get("ADMIN_JWT_SECRET")
            .ok_or_else(|| ConfigError::MissingEnvVar("ADMIN_JWT_SECRET".to_string()))?
            .clone()
            .into();

        let mail_api_key = vars
            .get("MAIL_API_KEY")
            .ok_or_else(|| ConfigError::MissingEnvVar("MAIL_API_KEY".to_string()))?
            .clone()
            .into();

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let public_base_url = vars
            .get("PUBLIC_BASE_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_PUBLIC_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let mail_api_url = vars
            .get("MAIL_API_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_MAIL_API_URL.to_string());

        let mail_from = vars
            .get("MAIL_FROM")
            .cloned()
            .unwrap_or_else(|| "meetings@localhost".to_string());

        let booking_window_days =
            parse_day_count(vars, "BOOKING_WINDOW_DAYS", DEFAULT_BOOKING_WINDOW_DAYS)?;
        let proposal_horizon_days =
            parse_day_count(vars, "PROPOSAL_HORIZON_DAYS", DEFAULT_PROPOSAL_HORIZON_DAYS)?;
        let default_token_expiry_days =
            parse_day_count(vars, "TOKEN_EXPIRY_DAYS", DEFAULT_TOKEN_EXPIRY_DAYS)?;

        let slot_timezone = vars
            .get("SLOT_TIMEZONE")
            .map(String::as_str)
            .unwrap_or(DEFAULT_SLOT_TIMEZONE)
            .parse::<Tz>()
            .map_err(|e| {
                ConfigError::InvalidTimezone(format!(
                    "SLOT_TIMEZONE must be an IANA timezone name: {e}"
                ))
            })?;

        // Comma-separated YYYY-MM-DD list; empty entries are ignored.
        let slot_skip_dates = match vars.get("SLOT_SKIP_DATES") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(|entry| {
                    entry.parse::<NaiveDate>().map_err(|e| {
                        ConfigError::InvalidSkipDate(format!(
                            "SLOT_SKIP_DATES entry '{entry}' is not a YYYY-MM-DD date: {e}"
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        Ok(Config {
            database_url,
            bind_address,
            public_base_url,
            admin_jwt_secret,
            mail_api_url,
            mail_api_key,
            mail_from,
            booking_window_days,
            proposal_horizon_days,
            default_token_expiry_days,
            slot_timezone,
            slot_skip_dates,
        })
    }

    /// Booking URL a proposal email links to.
    pub fn booking_url(&self, token: &str) -> String {
        format!("{}/meetings/schedule/{}", self.public_base_url, token)
    }
}

fn parse_day_count(
    vars: &HashMap<String, String>,
    key: &str,
    default: i64,
) -> Result<i64, ConfigError> {
    let Some(value_str) = vars.get(key) else {
        return Ok(default);
    };

    let value: i64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidDayCount(format!(
            "{key} must be a valid integer, got '{value_str}': {e}"
        ))
    })?;

    if !(1..=365).contains(&value) {
        return Err(ConfigError::InvalidDayCount(format!(
            "{key} must be between 1 and 365, got {value}"
        )));
    }

    Ok(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn required_vars() -> HashMap<String, String> {
        HashMap::from([
            (
                "DATABASE_URL".to_string(),
                "postgres://localhost/booking".to_string(),
            ),
            ("ADMIN_JWT_SECRET".to_string(), "test-secret".to_string()),
            ("MAIL_API_KEY".to_string(), "re_test_key".to_string()),
        ])
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(&required_vars()).unwrap();
        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.public_base_url, DEFAULT_PUBLIC_BASE_URL);
        assert_eq!(config.booking_window_days, 30);
        assert_eq!(config.proposal_horizon_days, 7);
        assert_eq!(config.default_token_expiry_days, 7);
        assert_eq!(config.slot_timezone, chrono_tz::Asia::Seoul);
        assert!(config.slot_skip_dates.is_empty());
    }

    #[test]
    fn test_missing_database_url() {
        let mut vars = required_vars();
        vars.remove("DATABASE_URL");
        let err = Config::from_vars(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref v) if v == "DATABASE_URL"));
    }

    #[test]
    fn test_missing_admin_jwt_secret() {
        let mut vars = required_vars();
        vars.remove("ADMIN_JWT_SECRET");
        let err = Config::from_vars(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref v) if v == "ADMIN_JWT_SECRET"));
    }

    #[test]
    fn test_missing_mail_api_key() {
        let mut vars = required_vars();
        vars.remove("MAIL_API_KEY");
        let err = Config::from_vars(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref v) if v == "MAIL_API_KEY"));
    }

    #[test]
    fn test_day_count_validation() {
        let mut vars = required_vars();
        vars.insert("BOOKING_WINDOW_DAYS".to_string(), "0".to_string());
        assert!(matches!(
            Config::from_vars(&vars).unwrap_err(),
            ConfigError::InvalidDayCount(_)
        ));

        vars.insert("BOOKING_WINDOW_DAYS".to_string(), "400".to_string());
        assert!(matches!(
            Config::from_vars(&vars).unwrap_err(),
            ConfigError::InvalidDayCount(_)
        ));

        vars.insert("BOOKING_WINDOW_DAYS".to_string(), "not-a-number".to_string());
        assert!(matches!(
            Config::from_vars(&vars).unwrap_err(),
            ConfigError::InvalidDayCount(_)
        ));

        vars.insert("BOOKING_WINDOW_DAYS".to_string(), "14".to_string());
        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(config.booking_window_days, 14);
    }

    #[test]
    fn test_invalid_timezone() {
        let mut vars = required_vars();
        vars.insert("SLOT_TIMEZONE".to_string(), "Mars/Olympus".to_string());
        assert!(matches!(
            Config::from_vars(&vars).unwrap_err(),
            ConfigError::InvalidTimezone(_)
        ));
    }

    #[test]
    fn test_skip_dates_parsing() {
        let mut vars = required_vars();
        vars.insert(
            "SLOT_SKIP_DATES".to_string(),
            "2026-01-01, 2026-03-01,".to_string(),
        );
        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(
            config.slot_skip_dates,
            vec![
                NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            ]
        );

        vars.insert("SLOT_SKIP_DATES".to_string(), "january first".to_string());
        assert!(matches!(
            Config::from_vars(&vars).unwrap_err(),
            ConfigError::InvalidSkipDate(_)
        ));
    }

    #[test]
    fn test_booking_url_strips_trailing_slash() {
        let mut vars = required_vars();
        vars.insert(
            "PUBLIC_BASE_URL".to_string(),
            "https://example.com/".to_string(),
        );
        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(
            config.booking_url("abc123"),
            "https://example.com/meetings/schedule/abc123"
        );
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut vars = required_vars();
        vars.insert(
            "DATABASE_URL".to_string(),
            "postgres://user:hunter2@db/booking".to_string(),
        );
        let config = Config::from_vars(&vars).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("re_test_key"));
        assert!(debug.contains("[REDACTED]"));
    }
}
