//! Application configuration loaded from environment variables.

use crate::errors::{LedgerError, Result};

/// Upper bound for hour-valued settings (ten years).
const MAX_HOURS: i64 = 24 * 365 * 10;

#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file
    pub database_url: String,
    /// Port for the REST API server
    pub api_port: u16,
    /// Paystack secret key; doubles as the webhook HMAC key. `None` runs in test mode.
    pub paystack_secret_key: Option<String>,
    /// Paystack REST base URL
    pub paystack_base_url: String,
    /// Where the hosted checkout sends the donor back to
    pub payment_callback_url: Option<String>,
    /// Currency used when nothing more specific is known (general-fund subscriptions)
    pub default_currency: String,
    /// Trailing window for cash duplicate detection
    pub duplicate_window_hours: i64,
    /// Age after which a PENDING online donation is failed; 0 disables expiry
    pub pending_expiry_hours: i64,
    /// How often (in seconds) the pending sweeper runs
    pub sweep_interval_secs: u64,
    /// How many receipt codes to try before giving up on a collision streak
    pub receipt_code_attempts: u32,
    /// Capacity of the post-commit notification channel
    pub notification_queue_size: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            database_url: env_var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./donations.db".to_string()),
            api_port: parse_var("API_PORT", "3001")?,
            paystack_secret_key: env_var("PAYSTACK_SECRET_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            paystack_base_url: env_var("PAYSTACK_BASE_URL")
                .unwrap_or_else(|_| "https://api.paystack.co".to_string()),
            payment_callback_url: env_var("PAYMENT_CALLBACK_URL").ok(),
            default_currency: env_var("DEFAULT_CURRENCY").unwrap_or_else(|_| "NGN".to_string()),
            duplicate_window_hours: hours_in_range(
                "DUPLICATE_WINDOW_HOURS",
                parse_var("DUPLICATE_WINDOW_HOURS", "24")?,
                1,
            )?,
            pending_expiry_hours: hours_in_range(
                "PENDING_EXPIRY_HOURS",
                parse_var("PENDING_EXPIRY_HOURS", "72")?,
                0,
            )?,
            sweep_interval_secs: parse_var("SWEEP_INTERVAL_SECS", "300")?,
            receipt_code_attempts: parse_var("RECEIPT_CODE_ATTEMPTS", "5")?,
            notification_queue_size: parse_var("NOTIFICATION_QUEUE_SIZE", "1024")?,
        })
    }

    pub fn test_mode(&self) -> bool {
        self.paystack_secret_key.is_none()
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| LedgerError::Config(format!("Missing env var: {key}")))
}

fn parse_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T> {
    env_var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| LedgerError::Config(format!("Invalid {key}")))
}

fn hours_in_range(key: &str, hours: i64, min: i64) -> Result<i64> {
    if (min..=MAX_HOURS).contains(&hours) {
        Ok(hours)
    } else {
        Err(LedgerError::Config(format!(
            "{key} must be between {min} and {MAX_HOURS} hours, got {hours}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hour_settings_are_bounded() {
        assert_eq!(hours_in_range("DUPLICATE_WINDOW_HOURS", 24, 1).unwrap(), 24);
        assert_eq!(hours_in_range("PENDING_EXPIRY_HOURS", 0, 0).unwrap(), 0);

        for (hours, min) in [(-1, 1), (0, 1), (-5, 0), (MAX_HOURS + 1, 0), (i64::MAX, 0)] {
            let err = hours_in_range("DUPLICATE_WINDOW_HOURS", hours, min).unwrap_err();
            assert!(matches!(err, LedgerError::Config(_)), "{hours}");
        }
    }
}
