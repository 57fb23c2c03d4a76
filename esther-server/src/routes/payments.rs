//! Client-side payment verification.
//!
//! After the provider redirects the payer back, the frontend calls these
//! endpoints with the session/order id from the URL. They fetch the
//! authoritative state from the provider and, when paid, feed it to the
//! reconciliation engine, the same funnel the webhook uses, so a double
//! confirmation settles as `already_processed` rather than a second write.

use axum::{
    extract::{Path, State},
    Json,
};
use esther_payments::OrderStatus;
use serde_json::{json, Value};
use tracing::warn;

use crate::error::ApiError;
use crate::models::PaymentMethod;
use crate::reconcile::Outcome;
use crate::state::AppState;

fn outcome_label(outcome: &Outcome) -> &'static str {
    match outcome {
        Outcome::Completed { .. } => "completed",
        Outcome::AlreadyProcessed => "already_processed",
        Outcome::Orphaned => "orphaned",
    }
}

pub async fn verify_checkout_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let session = state.stripe.retrieve_session(&session_id).await?;

    if !session.is_paid() {
        return Ok(Json(json!({
            "success": true,
            "paid": false,
            "paymentStatus": "unpaid",
        })));
    }

    // A paid session without our metadata reconciles as an orphan.
    let intent_id = session
        .metadata
        .get("intent_id")
        .map(String::as_str)
        .unwrap_or("");
    let outcome = state
        .engine
        .record_completed_payment(&session.id, intent_id, PaymentMethod::Card)
        .await?;

    Ok(Json(json!({
        "success": true,
        "paid": true,
        "paymentStatus": "paid",
        "outcome": outcome_label(&outcome),
    })))
}

pub async fn verify_paypal_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let order = state.paypal.get_order(&order_id).await?;
    let intent_id = order.custom_id.clone().unwrap_or_default();

    let status = match order.status {
        OrderStatus::Completed => OrderStatus::Completed,
        // The payer approved on PayPal's site; the money moves on capture.
        OrderStatus::Approved => state.paypal.capture_order(&order_id).await?.status,
        other => other,
    };

    if status != OrderStatus::Completed {
        warn!(order_id = %order.id, ?status, "PayPal order verified but not payable");
        return Ok(Json(json!({
            "success": true,
            "paid": false,
        })));
    }

    let outcome = state
        .engine
        .record_completed_payment(&order.id, &intent_id, PaymentMethod::Paypal)
        .await?;

    Ok(Json(json!({
        "success": true,
        "paid": true,
        "outcome": outcome_label(&outcome),
    })))
}
