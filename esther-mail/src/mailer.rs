//! High-level mailer interface.

use std::sync::Arc;
use tracing::debug;

use crate::{Email, MailError, Result, SmtpConfig, SmtpTransport, Transport};

/// Mailer configuration.
#[derive(Debug, Clone)]
pub struct MailerConfig {
    /// Default from address.
    pub default_from: Option<String>,
    /// Retry count for failed sends.
    pub retry_count: u32,
    /// Retry delay.
    pub retry_delay: std::time::Duration,
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            default_from: None,
            retry_count: 3,
            retry_delay: std::time::Duration::from_secs(1),
        }
    }
}

/// High-level mailer for sending emails.
pub struct Mailer {
    transport: Arc<dyn Transport>,
    config: MailerConfig,
}

impl Mailer {
    /// Create a new mailer with an SMTP transport.
    pub fn smtp(smtp_config: SmtpConfig) -> Result<Self> {
        let transport = SmtpTransport::new(smtp_config)?;
        Ok(Self {
            transport: Arc::new(transport),
            config: MailerConfig::default(),
        })
    }

    /// Create a new mailer with a custom transport.
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
            config: MailerConfig::default(),
        }
    }

    /// Set the mailer configuration.
    pub fn with_config(mut self, config: MailerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default from address.
    pub fn default_from(mut self, from: impl Into<String>) -> Self {
        self.config.default_from = Some(from.into());
        self
    }

    /// Send an email.
    pub async fn send(&self, email: Email) -> Result<()> {
        let email = self.apply_defaults(email);
        self.send_with_retry(&email).await
    }

    /// Apply default configuration to an email.
    fn apply_defaults(&self, mut email: Email) -> Email {
        if email.from.is_none() {
            email.from = self.config.default_from.clone();
        }
        email
    }

    /// Send with retry logic.
    async fn send_with_retry(&self, email: &Email) -> Result<()> {
        let mut last_error = None;

        for attempt in 0..=self.config.retry_count {
            if attempt > 0 {
                debug!(attempt, "Retrying email send");
                tokio::time::sleep(self.config.retry_delay).await;
            }

            match self.transport.send(email).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    if !e.is_retryable() || attempt >= self.config.retry_count {
                        return Err(e);
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| MailError::Smtp("Unknown error after retries".to_string())))
    }
}
