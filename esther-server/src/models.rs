//! Registration and donation records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// How the attendee or donor chose to pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentMethod {
    Card,
    Paypal,
    /// Offline payment arranged outside the providers; the record is
    /// written eagerly because no confirmation will ever arrive for it.
    BankTransfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::Paypal => "paypal",
            Self::BankTransfer => "bank-transfer",
        }
    }
}

/// Authoritative only after reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Attendee registration form fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationDraft {
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    #[serde(default)]
    pub phonenumber: Option<String>,
    #[serde(default)]
    pub streetaddress: Option<String>,
    #[serde(default)]
    pub apartment: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub zippostalcode: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub nameofchurch: Option<String>,
    #[serde(default)]
    pub positioninministry: Option<String>,
    #[serde(default)]
    pub titleofoffice: Option<String>,
    #[serde(default)]
    pub husbandname: Option<String>,
    #[serde(default)]
    pub tshirtsize: Option<String>,
}

impl RegistrationDraft {
    /// Field-level validation surfaced as a 400 with detail.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.firstname.trim().is_empty() {
            return Err(ApiError::validation("firstname", "first name is required"));
        }
        if self.lastname.trim().is_empty() {
            return Err(ApiError::validation("lastname", "last name is required"));
        }
        if self.email.trim().is_empty() || !self.email.contains('@') {
            return Err(ApiError::validation("email", "a valid email is required"));
        }
        Ok(())
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.firstname, self.lastname)
    }
}

/// Donor form fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationDraft {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    /// Donation amount in minor units (cents).
    pub amount_cents: i64,
}

impl DonationDraft {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.first_name.trim().is_empty() {
            return Err(ApiError::validation("firstName", "first name is required"));
        }
        if self.last_name.trim().is_empty() {
            return Err(ApiError::validation("lastName", "last name is required"));
        }
        if self.email.trim().is_empty() || !self.email.contains('@') {
            return Err(ApiError::validation("email", "a valid email is required"));
        }
        if self.phone.trim().is_empty() {
            return Err(ApiError::validation("phone", "phone is required"));
        }
        if self.amount_cents <= 0 {
            return Err(ApiError::validation("amount", "amount must be positive"));
        }
        Ok(())
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// What a pending intent is a draft of.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum IntentPayload {
    Registration(RegistrationDraft),
    Donation(DonationDraft),
}

impl IntentPayload {
    /// The identifying key for duplicate-submission suppression.
    pub fn email(&self) -> &str {
        match self {
            Self::Registration(r) => &r.email,
            Self::Donation(d) => &d.email,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Registration(_) => "registration",
            Self::Donation(_) => "donation",
        }
    }
}

/// A pending intent as held by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredIntent {
    pub payload: IntentPayload,
    pub created_at: DateTime<Utc>,
}

/// A durable registration row.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationRecord {
    pub draft: RegistrationDraft,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    /// Provider session/order id, the reconciliation key.
    pub provider_ref: Option<String>,
}

/// A durable donation row.
#[derive(Debug, Clone, Serialize)]
pub struct DonationRecord {
    pub draft: DonationDraft,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub provider_ref: Option<String>,
}
