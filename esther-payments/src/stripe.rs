//! Stripe hosted-checkout adapter
//!
//! Wraps the Checkout Sessions API: a draft registration or donation becomes
//! a hosted checkout session, the client is redirected to `session.url`, and
//! the outcome comes back either through the signed webhook or through a
//! `retrieve_session` call when the client returns.

use crate::{
    client::ProviderClient,
    error::{PaymentError, PaymentResult},
    money::Money,
};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;
use tracing::debug;

/// The only webhook event type that drives reconciliation.
pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";

fn is_placeholder(key: &str) -> bool {
    key.is_empty() || key.contains("your_stripe")
}

/// Stripe Checkout adapter
pub struct StripeCheckout {
    secret_key: SecretString,
    webhook_secret: Option<SecretString>,
    client: ProviderClient,
    configured: bool,
}

impl StripeCheckout {
    /// Create a new adapter from the secret API key
    pub fn new(secret_key: impl Into<String>) -> Self {
        let secret_key = secret_key.into();
        Self {
            configured: !is_placeholder(&secret_key),
            client: ProviderClient::new("https://api.stripe.com/v1", &secret_key),
            secret_key: SecretString::new(secret_key.into()),
            webhook_secret: None,
        }
    }

    /// Set the webhook signing secret
    pub fn with_webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.webhook_secret = Some(SecretString::new(secret.into().into()));
        self
    }

    /// Override the API base URL (used by tests against a mock server)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.client = ProviderClient::new(base_url, self.secret_key.expose_secret());
        self
    }

    /// Check credentials before any network call.
    ///
    /// The SDK-level failure for a placeholder key is cryptic; callers get an
    /// actionable message instead.
    fn ensure_configured(&self) -> PaymentResult<()> {
        if self.configured {
            Ok(())
        } else {
            Err(PaymentError::Misconfigured(
                "Stripe secret key is missing or still a placeholder. \
                 Set STRIPE_SECRET_KEY in the environment."
                    .into(),
            ))
        }
    }

    /// Create a hosted checkout session and return its redirect URL
    pub async fn create_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> PaymentResult<CheckoutSession> {
        self.ensure_configured()?;

        let mut params: Vec<(String, String)> = vec![
            ("payment_method_types[0]".into(), "card".into()),
            ("mode".into(), "payment".into()),
            (
                "line_items[0][price_data][currency]".into(),
                request.amount.currency.code().to_lowercase(),
            ),
            (
                "line_items[0][price_data][unit_amount]".into(),
                request.amount.amount.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".into(),
                request.product_name,
            ),
            ("line_items[0][quantity]".into(), "1".into()),
            ("success_url".into(), request.success_url),
            ("cancel_url".into(), request.cancel_url),
        ];

        if let Some(desc) = request.description {
            params.push((
                "line_items[0][price_data][product_data][description]".into(),
                desc,
            ));
        }

        for (key, value) in request.metadata {
            params.push((format!("metadata[{}]", key), value));
        }

        let response = self.client.post_form("/checkout/sessions", &params).await?;

        if !response.status().is_success() {
            let error: StripeError = response.json().await?;
            return Err(PaymentError::Provider(error.error.message));
        }

        let session: CheckoutSession = response.json().await?;
        debug!(session_id = %session.id, "Created checkout session");
        Ok(session)
    }

    /// Retrieve the authoritative state of a checkout session
    pub async fn retrieve_session(&self, session_id: &str) -> PaymentResult<CheckoutSession> {
        self.ensure_configured()?;

        let response = self
            .client
            .get(&format!("/checkout/sessions/{}", session_id))
            .await?;

        if !response.status().is_success() {
            let error: StripeError = response.json().await?;
            return Err(PaymentError::Provider(error.error.message));
        }

        let session: CheckoutSession = response.json().await?;
        Ok(session)
    }

    /// Verify the `Stripe-Signature` header and parse the event.
    ///
    /// Requires the byte-exact raw request body; a parsed-and-reserialized
    /// body breaks the signature.
    pub fn construct_event(&self, payload: &[u8], signature: &str) -> PaymentResult<StripeEvent> {
        let secret = self.webhook_secret.as_ref().ok_or_else(|| {
            PaymentError::Misconfigured("Stripe webhook secret not configured".into())
        })?;

        let parts: HashMap<&str, &str> = signature
            .split(',')
            .filter_map(|part| {
                let mut kv = part.split('=');
                Some((kv.next()?, kv.next()?))
            })
            .collect();

        let timestamp = parts.get("t").ok_or(PaymentError::InvalidSignature)?;
        let expected_sig = parts.get("v1").ok_or(PaymentError::InvalidSignature)?;

        let signed_payload = format!("{}.{}", timestamp, String::from_utf8_lossy(payload));
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.expose_secret().as_bytes())
            .map_err(|_| PaymentError::InvalidSignature)?;
        mac.update(signed_payload.as_bytes());
        let computed_sig = hex::encode(mac.finalize().into_bytes());

        if computed_sig != *expected_sig {
            return Err(PaymentError::InvalidSignature);
        }

        let raw: StripeWebhookEvent = serde_json::from_slice(payload)?;
        Ok(StripeEvent {
            id: raw.id,
            event_type: raw.event_type,
            livemode: raw.livemode,
            object: raw.data.object,
        })
    }
}

/// Request to create a hosted checkout session
#[derive(Debug, Clone)]
pub struct CheckoutSessionRequest {
    pub amount: Money,
    pub product_name: String,
    pub description: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
    /// Carried back verbatim on the session and in webhook events; used to
    /// find the local pending intent.
    pub metadata: HashMap<String, String>,
}

/// Payment status of a checkout session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
    #[serde(other)]
    Unknown,
}

/// A Stripe checkout session
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    /// Redirect URL; absent once the session is no longer open
    pub url: Option<String>,
    pub payment_status: SessionPaymentStatus,
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSession {
    pub fn is_paid(&self) -> bool {
        self.payment_status == SessionPaymentStatus::Paid
    }
}

/// A verified webhook event
#[derive(Debug, Clone)]
pub struct StripeEvent {
    pub id: String,
    pub event_type: String,
    pub livemode: bool,
    object: serde_json::Value,
}

impl StripeEvent {
    /// The session carried by a `checkout.session.completed` event.
    ///
    /// `None` for every other event type; those are acknowledged and
    /// ignored so Stripe stops retrying them.
    pub fn checkout_session(&self) -> Option<CheckoutSession> {
        if self.event_type == CHECKOUT_SESSION_COMPLETED {
            serde_json::from_value(self.object.clone()).ok()
        } else {
            None
        }
    }
}

// Stripe API types

#[derive(Debug, Deserialize)]
struct StripeError {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: String,
}

#[derive(Debug, Deserialize)]
struct StripeWebhookEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    livemode: bool,
    data: StripeWebhookData,
}

#[derive(Debug, Deserialize)]
struct StripeWebhookData {
    object: serde_json::Value,
}
