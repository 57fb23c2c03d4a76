//! Application configuration loaded from environment variables.
//!
//! Provider credentials are allowed to be absent or placeholders; the
//! corresponding adapter then reports itself unconfigured and its
//! endpoints return an actionable error instead of calling out with junk
//! credentials.

use crate::error::ApiError;

#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the REST API server
    pub api_port: u16,
    /// Public base URL of the frontend, used for redirect/return URLs
    pub client_url: String,
    /// Path or URL of the SQLite database file
    pub database_url: String,
    /// Stripe secret API key (may be a placeholder)
    pub stripe_secret_key: String,
    /// Stripe webhook signing secret
    pub stripe_webhook_secret: String,
    /// PayPal REST client id (may be a placeholder)
    pub paypal_client_id: String,
    /// PayPal REST client secret
    pub paypal_client_secret: String,
    /// Use the PayPal sandbox environment
    pub paypal_sandbox: bool,
    /// SMTP relay host
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    /// From address on outgoing mail
    pub email_from: String,
    /// Where admin notifications go; none disables them
    pub admin_email: Option<String>,
    /// Conference registration fee in cents
    pub registration_amount_cents: i64,
    /// Snapshot file for pending intents; none disables persistence
    pub pending_intents_file: Option<String>,
    /// Window during which a repeat submission for the same email is rejected
    pub intent_cooldown_secs: i64,
    /// Age at which an unresolved intent is swept
    pub intent_ttl_secs: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, ApiError> {
        Ok(Config {
            api_port: parse_var("API_PORT", "3001")?,
            client_url: env_or("CLIENT_URL", "http://localhost:5173"),
            database_url: env_or("DATABASE_URL", "sqlite:./esther.db?mode=rwc"),
            stripe_secret_key: env_or("STRIPE_SECRET_KEY", ""),
            stripe_webhook_secret: env_or("STRIPE_WEBHOOK_SECRET", ""),
            paypal_client_id: env_or("PAYPAL_CLIENT_ID", ""),
            paypal_client_secret: env_or("PAYPAL_CLIENT_SECRET", ""),
            paypal_sandbox: env_or("PAYPAL_ENV", "sandbox") != "live",
            smtp_host: env_or("SMTP_HOST", "smtp.gmail.com"),
            smtp_port: parse_var("SMTP_PORT", "587")?,
            smtp_username: env_or("SMTP_USER", ""),
            smtp_password: env_or("SMTP_PASS", ""),
            email_from: env_or("EMAIL_FROM", "noreply@feastofesther.org"),
            admin_email: std::env::var("ADMIN_EMAIL").ok().filter(|v| !v.is_empty()),
            registration_amount_cents: parse_var("REGISTRATION_AMOUNT_CENTS", "12000")?,
            pending_intents_file: std::env::var("PENDING_INTENTS_FILE")
                .ok()
                .filter(|v| !v.is_empty()),
            intent_cooldown_secs: parse_var("INTENT_COOLDOWN_SECS", "300")?,
            intent_ttl_secs: parse_var("INTENT_TTL_SECS", "86400")?,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ApiError> {
    std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| ApiError::Misconfigured(format!("Invalid {key}")))
}
