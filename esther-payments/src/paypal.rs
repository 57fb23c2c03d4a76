//! PayPal order/capture adapter
//!
//! Orders API v2: an order is created with the local intent id as its
//! `custom_id`, the payer approves it on PayPal's site, and the server
//! captures it when the client returns. Capture of an already-captured
//! order is a success, not an error; both the webhook and the client
//! return path may race to finish the same order.

use crate::{
    error::{PaymentError, PaymentResult},
    money::Money,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

fn is_placeholder(value: &str) -> bool {
    value.is_empty() || value.contains("your_paypal")
}

/// PayPal Orders adapter
pub struct PayPalOrders {
    client_id: String,
    client_secret: SecretString,
    sandbox: bool,
    base_url_override: Option<String>,
    configured: bool,
    client: Client,
    access_token: tokio::sync::RwLock<Option<PayPalToken>>,
}

#[derive(Debug, Clone)]
struct PayPalToken {
    token: String,
    expires_at: chrono::DateTime<Utc>,
}

impl PayPalOrders {
    /// Create a new adapter (sandbox by default)
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        let client_id = client_id.into();
        let client_secret = client_secret.into();
        Self {
            configured: !is_placeholder(&client_id) && !is_placeholder(&client_secret),
            client_id,
            client_secret: SecretString::new(client_secret.into()),
            sandbox: true,
            base_url_override: None,
            client: Client::new(),
            access_token: tokio::sync::RwLock::new(None),
        }
    }

    /// Use the live environment
    pub fn production(mut self) -> Self {
        self.sandbox = false;
        self
    }

    /// Override the API base URL (used by tests against a mock server)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url_override = Some(base_url.into());
        self
    }

    fn base_url(&self) -> &str {
        if let Some(ref url) = self.base_url_override {
            url
        } else if self.sandbox {
            "https://api-m.sandbox.paypal.com"
        } else {
            "https://api-m.paypal.com"
        }
    }

    fn ensure_configured(&self) -> PaymentResult<()> {
        if self.configured {
            Ok(())
        } else {
            Err(PaymentError::Misconfigured(
                "PayPal client id/secret are missing or still placeholders. \
                 Set PAYPAL_CLIENT_ID and PAYPAL_CLIENT_SECRET in the environment."
                    .into(),
            ))
        }
    }

    /// Get or refresh the OAuth access token
    async fn get_token(&self) -> PaymentResult<String> {
        {
            let token = self.access_token.read().await;
            if let Some(ref t) = *token {
                if t.expires_at > Utc::now() {
                    return Ok(t.token.clone());
                }
            }
        }

        let credentials = STANDARD.encode(format!(
            "{}:{}",
            self.client_id,
            self.client_secret.expose_secret()
        ));

        let response = self
            .client
            .post(format!("{}/v1/oauth2/token", self.base_url()))
            .header("Authorization", format!("Basic {}", credentials))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PaymentError::Authentication(
                "Failed to get PayPal token".into(),
            ));
        }

        let token_response: PayPalTokenResponse = response.json().await?;
        let new_token = PayPalToken {
            token: token_response.access_token.clone(),
            expires_at: Utc::now()
                + chrono::Duration::seconds(token_response.expires_in as i64 - 60),
        };

        let mut token = self.access_token.write().await;
        *token = Some(new_token);
        debug!("Refreshed PayPal access token");

        Ok(token_response.access_token)
    }

    async fn request(
        &self,
        method: reqwest::Method,
        path: &str,
    ) -> PaymentResult<reqwest::RequestBuilder> {
        let token = self.get_token().await?;
        Ok(self
            .client
            .request(method, format!("{}{}", self.base_url(), path))
            .bearer_auth(token))
    }

    /// Create an order and return the approval URL to redirect the payer to
    pub async fn create_order(&self, request: OrderRequest) -> PaymentResult<PayPalOrder> {
        self.ensure_configured()?;

        let body = PayPalOrderBody {
            intent: "CAPTURE".to_string(),
            purchase_units: vec![PayPalPurchaseUnit {
                reference_id: Some(request.intent_id.clone()),
                custom_id: Some(request.intent_id),
                amount: PayPalAmount {
                    currency_code: request.amount.currency.code().to_string(),
                    value: request.amount.to_amount_string(),
                },
                description: request.description,
            }],
            application_context: Some(PayPalApplicationContext {
                brand_name: request.brand_name,
                landing_page: "BILLING".to_string(),
                user_action: "PAY_NOW".to_string(),
                shipping_preference: "NO_SHIPPING".to_string(),
                return_url: request.return_url,
                cancel_url: request.cancel_url,
            }),
        };

        let response = self
            .request(reqwest::Method::POST, "/v2/checkout/orders")
            .await?
            .header("Prefer", "return=representation")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let error: PayPalError = response.json().await?;
            return Err(PaymentError::Provider(error.message.unwrap_or_default()));
        }

        let order: PayPalOrderResponse = response.json().await?;
        Ok(order.into())
    }

    /// Retrieve the authoritative state of an order
    pub async fn get_order(&self, order_id: &str) -> PaymentResult<PayPalOrder> {
        self.ensure_configured()?;

        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/v2/checkout/orders/{}", order_id),
            )
            .await?
            .send()
            .await?;

        if !response.status().is_success() {
            let error: PayPalError = response.json().await?;
            return Err(PaymentError::Provider(error.message.unwrap_or_default()));
        }

        let order: PayPalOrderResponse = response.json().await?;
        Ok(order.into())
    }

    /// Capture an approved order.
    ///
    /// A second capture attempt returns `Completed` rather than an error;
    /// the provider rejects it with `ORDER_ALREADY_CAPTURED`, which means
    /// the money already moved.
    pub async fn capture_order(&self, order_id: &str) -> PaymentResult<PayPalOrder> {
        self.ensure_configured()?;

        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/v2/checkout/orders/{}/capture", order_id),
            )
            .await?
            .header("Content-Type", "application/json")
            .body("{}")
            .send()
            .await?;

        if !response.status().is_success() {
            let error: PayPalError = response.json().await?;
            if error.has_issue("ORDER_ALREADY_CAPTURED") {
                return Ok(PayPalOrder {
                    id: order_id.to_string(),
                    status: OrderStatus::Completed,
                    custom_id: None,
                    approval_url: None,
                });
            }
            return Err(PaymentError::Provider(error.message.unwrap_or_default()));
        }

        let order: PayPalOrderResponse = response.json().await?;
        Ok(order.into())
    }
}

/// Request to create an order
#[derive(Debug, Clone)]
pub struct OrderRequest {
    /// Local pending-intent id; echoed back as the order's `custom_id`
    pub intent_id: String,
    pub amount: Money,
    pub description: Option<String>,
    pub brand_name: String,
    pub return_url: String,
    pub cancel_url: String,
}

/// Order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Created,
    Saved,
    Approved,
    Voided,
    Completed,
    PayerActionRequired,
    #[serde(other)]
    Unknown,
}

/// A PayPal order
#[derive(Debug, Clone)]
pub struct PayPalOrder {
    pub id: String,
    pub status: OrderStatus,
    /// The local intent id the order was created with
    pub custom_id: Option<String>,
    /// Where to send the payer for approval (present on freshly created orders)
    pub approval_url: Option<String>,
}

// PayPal API types

#[derive(Debug, Deserialize)]
struct PayPalTokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Serialize)]
struct PayPalOrderBody {
    intent: String,
    purchase_units: Vec<PayPalPurchaseUnit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    application_context: Option<PayPalApplicationContext>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PayPalPurchaseUnit {
    #[serde(skip_serializing_if = "Option::is_none")]
    reference_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_id: Option<String>,
    amount: PayPalAmount,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PayPalAmount {
    currency_code: String,
    value: String,
}

#[derive(Debug, Serialize)]
struct PayPalApplicationContext {
    brand_name: String,
    landing_page: String,
    user_action: String,
    shipping_preference: String,
    return_url: String,
    cancel_url: String,
}

#[derive(Debug, Deserialize)]
struct PayPalOrderResponse {
    id: String,
    status: OrderStatus,
    #[serde(default)]
    purchase_units: Vec<PayPalPurchaseUnitLite>,
    #[serde(default)]
    links: Vec<PayPalLink>,
}

#[derive(Debug, Deserialize)]
struct PayPalPurchaseUnitLite {
    custom_id: Option<String>,
    reference_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PayPalLink {
    href: String,
    rel: String,
}

impl From<PayPalOrderResponse> for PayPalOrder {
    fn from(r: PayPalOrderResponse) -> Self {
        let custom_id = r
            .purchase_units
            .first()
            .and_then(|u| u.custom_id.clone().or_else(|| u.reference_id.clone()));
        let approval_url = r
            .links
            .iter()
            .find(|l| l.rel == "approve" || l.rel == "payer-action")
            .map(|l| l.href.clone());
        Self {
            id: r.id,
            status: r.status,
            custom_id,
            approval_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PayPalError {
    #[allow(dead_code)]
    name: Option<String>,
    message: Option<String>,
    #[serde(default)]
    details: Vec<PayPalErrorDetail>,
}

impl PayPalError {
    fn has_issue(&self, issue: &str) -> bool {
        self.details.iter().any(|d| d.issue.as_deref() == Some(issue))
    }
}

#[derive(Debug, Deserialize)]
struct PayPalErrorDetail {
    issue: Option<String>,
}
