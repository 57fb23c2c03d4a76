//! Donation endpoints.
//!
//! Same shape as registrations, but the amount comes from the donor and
//! nothing is written until the payment is confirmed.

use std::collections::HashMap;

use axum::{extract::State, Json};
use esther_payments::{CheckoutSessionRequest, Currency, Money, OrderRequest};
use serde_json::{json, Value};
use tracing::info;

use crate::error::ApiError;
use crate::models::{
    DonationDraft, DonationRecord, IntentPayload, PaymentMethod, PaymentStatus,
};
use crate::state::AppState;

/// Bank-transfer donation pledge; written immediately as pending.
pub async fn create_offline(
    State(state): State<AppState>,
    Json(draft): Json<DonationDraft>,
) -> Result<Json<Value>, ApiError> {
    draft.validate()?;

    let record = DonationRecord {
        draft: draft.clone(),
        payment_method: PaymentMethod::BankTransfer,
        payment_status: PaymentStatus::Pending,
        provider_ref: None,
    };
    let id = state.records.insert_donation(&record).await?;
    info!(id, email = %draft.email, "Offline donation recorded");

    Ok(Json(json!({ "success": true, "id": id })))
}

pub async fn create_checkout_session(
    State(state): State<AppState>,
    Json(draft): Json<DonationDraft>,
) -> Result<Json<Value>, ApiError> {
    draft.validate()?;

    let amount = Money::new(draft.amount_cents, Currency::USD);
    let description = format!("Donation from {}", draft.full_name());
    let intent_id = state.intents.create(IntentPayload::Donation(draft)).await?;

    let request = CheckoutSessionRequest {
        amount,
        product_name: "Feast of Esther Donation".into(),
        description: Some(description),
        success_url: format!(
            "{}/donation-success?session_id={{CHECKOUT_SESSION_ID}}",
            state.config.client_url
        ),
        cancel_url: format!("{}/donate", state.config.client_url),
        metadata: HashMap::from([("intent_id".to_string(), intent_id.clone())]),
    };

    let session = match state.stripe.create_session(request).await {
        Ok(session) => session,
        Err(e) => {
            let _ = state.intents.remove(&intent_id).await;
            return Err(e.into());
        }
    };

    info!(session_id = %session.id, intent_id = %intent_id, "Donation checkout session created");
    Ok(Json(json!({
        "success": true,
        "sessionId": session.id,
        "url": session.url,
    })))
}

pub async fn create_paypal_order(
    State(state): State<AppState>,
    Json(draft): Json<DonationDraft>,
) -> Result<Json<Value>, ApiError> {
    draft.validate()?;

    let amount = Money::new(draft.amount_cents, Currency::USD);
    let description = format!("Donation from {}", draft.full_name());
    let intent_id = state.intents.create(IntentPayload::Donation(draft)).await?;

    let request = OrderRequest {
        intent_id: intent_id.clone(),
        amount,
        description: Some(description),
        brand_name: "Feast of Esther".into(),
        return_url: format!("{}/donation-success", state.config.client_url),
        cancel_url: format!("{}/donate", state.config.client_url),
    };

    let order = match state.paypal.create_order(request).await {
        Ok(order) => order,
        Err(e) => {
            let _ = state.intents.remove(&intent_id).await;
            return Err(e.into());
        }
    };

    info!(order_id = %order.id, intent_id = %intent_id, "Donation PayPal order created");
    Ok(Json(json!({
        "success": true,
        "orderId": order.id,
        "approvalUrl": order.approval_url,
    })))
}
