//! Stripe webhook receiver.
//!
//! Signature verification needs the byte-exact request body, so the
//! handler takes `Bytes` rather than a JSON extractor. Anything that is
//! not a transient failure on our side is answered 200; returning an
//! error for an event we will never be able to use only makes Stripe
//! retry it.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::models::PaymentMethod;
use crate::state::AppState;

pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::InvalidSignature)?;

    let event = state.stripe.construct_event(&body, signature)?;

    let Some(session) = event.checkout_session() else {
        debug!(event_type = %event.event_type, "Ignoring webhook event");
        return Ok(Json(json!({ "received": true })));
    };

    if !session.is_paid() {
        info!(session_id = %session.id, "Completed session not paid, skipping");
        return Ok(Json(json!({ "received": true })));
    }

    let intent_id = session
        .metadata
        .get("intent_id")
        .map(String::as_str)
        .unwrap_or("");

    // Persistence failure propagates as 500 so Stripe redelivers; every
    // other outcome is acknowledged.
    let outcome = state
        .engine
        .record_completed_payment(&session.id, intent_id, PaymentMethod::Card)
        .await?;
    info!(session_id = %session.id, ?outcome, "Webhook processed");

    Ok(Json(json!({ "received": true })))
}
