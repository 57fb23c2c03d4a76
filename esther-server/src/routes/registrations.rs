//! Registration endpoints.

use std::collections::HashMap;

use axum::{extract::State, Json};
use esther_payments::{CheckoutSessionRequest, Currency, Money, OrderRequest};
use serde_json::{json, Value};
use tracing::info;

use crate::error::ApiError;
use crate::models::{IntentPayload, PaymentMethod, PaymentStatus, RegistrationDraft, RegistrationRecord};
use crate::state::AppState;

/// Bank-transfer registration. No provider confirmation will ever arrive,
/// so the record is written immediately with a pending payment status.
pub async fn create_offline(
    State(state): State<AppState>,
    Json(draft): Json<RegistrationDraft>,
) -> Result<Json<Value>, ApiError> {
    draft.validate()?;

    if state
        .records
        .find_registration_by_email(&draft.email)
        .await?
        .is_some()
    {
        return Err(ApiError::validation(
            "email",
            "a registration already exists for this email",
        ));
    }

    let record = RegistrationRecord {
        draft: draft.clone(),
        payment_method: PaymentMethod::BankTransfer,
        payment_status: PaymentStatus::Pending,
        provider_ref: None,
    };
    let id = state.records.insert_registration(&record).await?;
    state.notifier.registration_pending(&draft);
    info!(id, email = %draft.email, "Offline registration recorded");

    Ok(Json(json!({ "success": true, "id": id })))
}

/// Start a Stripe hosted-checkout registration.
pub async fn create_checkout_session(
    State(state): State<AppState>,
    Json(draft): Json<RegistrationDraft>,
) -> Result<Json<Value>, ApiError> {
    draft.validate()?;

    let description = format!("Registration for {}", draft.full_name());
    let intent_id = state
        .intents
        .create(IntentPayload::Registration(draft))
        .await?;

    let request = CheckoutSessionRequest {
        amount: Money::new(state.config.registration_amount_cents, Currency::USD),
        product_name: "Feast of Esther Conference Registration".into(),
        description: Some(description),
        success_url: format!(
            "{}/registration-success?session_id={{CHECKOUT_SESSION_ID}}",
            state.config.client_url
        ),
        cancel_url: format!("{}/register", state.config.client_url),
        metadata: HashMap::from([("intent_id".to_string(), intent_id.clone())]),
    };

    let session = match state.stripe.create_session(request).await {
        Ok(session) => session,
        Err(e) => {
            // Creation never left the building; lift the cooldown so the
            // user can retry immediately.
            let _ = state.intents.remove(&intent_id).await;
            return Err(e.into());
        }
    };

    info!(session_id = %session.id, intent_id = %intent_id, "Checkout session created");
    Ok(Json(json!({
        "success": true,
        "sessionId": session.id,
        "url": session.url,
    })))
}

/// Start a PayPal registration order.
pub async fn create_paypal_order(
    State(state): State<AppState>,
    Json(draft): Json<RegistrationDraft>,
) -> Result<Json<Value>, ApiError> {
    draft.validate()?;

    let description = format!("Registration for {}", draft.full_name());
    let intent_id = state
        .intents
        .create(IntentPayload::Registration(draft))
        .await?;

    let request = OrderRequest {
        intent_id: intent_id.clone(),
        amount: Money::new(state.config.registration_amount_cents, Currency::USD),
        description: Some(description),
        brand_name: "Feast of Esther".into(),
        return_url: format!("{}/registration-success", state.config.client_url),
        cancel_url: format!("{}/register", state.config.client_url),
    };

    let order = match state.paypal.create_order(request).await {
        Ok(order) => order,
        Err(e) => {
            let _ = state.intents.remove(&intent_id).await;
            return Err(e.into());
        }
    };

    info!(order_id = %order.id, intent_id = %intent_id, "PayPal order created");
    Ok(Json(json!({
        "success": true,
        "orderId": order.id,
        "approvalUrl": order.approval_url,
    })))
}
