//! API error taxonomy and HTTP mapping.
//!
//! User-visible failures stay generic; full detail goes to the log. The
//! one deliberate asymmetry: webhook handlers only ever 400 on signature
//! failure and 500 on a genuinely transient persistence failure; anything
//! else is acknowledged so the provider stops retrying.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use esther_payments::PaymentError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::db::StoreError;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing or malformed field; carries field-level detail for the client.
    #[error("Validation failed on {field}: {message}")]
    Validation { field: String, message: String },

    /// Provider credentials unset/placeholder; actionable, never retried live.
    #[error("{0}")]
    Misconfigured(String),

    /// A matching intent is already in flight within the cooldown window.
    #[error("A submission for this email is already being processed. Please wait a few minutes before trying again.")]
    DuplicateInFlight,

    /// Webhook signature verification failed.
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// Provider transport/API failure; logged in full, generic to the client.
    #[error("Payment provider error: {0}")]
    Provider(String),

    /// Database failure during a durable write; retryable.
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
}

impl ApiError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Misconfigured(msg) => ApiError::Misconfigured(msg),
            PaymentError::InvalidSignature => ApiError::InvalidSignature,
            other => ApiError::Provider(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                format!("{}: {}", field, message),
            ),
            ApiError::Misconfigured(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::DuplicateInFlight => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::InvalidSignature => (StatusCode::BAD_REQUEST, "Webhook Error".to_string()),
            ApiError::Provider(detail) => {
                error!(detail = %detail, "Payment provider request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Payment processing failed. Please try again.".to_string(),
                )
            }
            ApiError::Persistence(detail) => {
                error!(detail = %detail, "Durable write failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A temporary error occurred. Please try again.".to_string(),
                )
            }
        };

        (status, Json(json!({ "success": false, "message": message }))).into_response()
    }
}
